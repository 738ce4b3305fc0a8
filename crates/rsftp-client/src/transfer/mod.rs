//! The transfer subsystem: task model, collection, directory creation,
//! the execution engine and the single-file copy primitives.

pub mod collect;
pub mod copy;
pub mod engine;
pub mod mkdirs;
pub mod pool;
pub mod progress;

use std::path::PathBuf;

use rsftp_core::constants::MAX_CONCURRENT_TRANSFERS;

pub use engine::execute_tasks;
pub use mkdirs::{dirs_for_upload, DirCreator};

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

/// One single-file transfer. Paths are absolute after resolution and the
/// record is immutable once collected; `size` is advisory, used only for
/// progress display.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub direction: Direction,
    pub size: u64,
}

impl TransferTask {
    pub fn upload(local_path: PathBuf, remote_path: String, size: u64) -> Self {
        TransferTask {
            local_path,
            remote_path,
            direction: Direction::Upload,
            size,
        }
    }

    pub fn download(local_path: PathBuf, remote_path: String, size: u64) -> Self {
        TransferTask {
            local_path,
            remote_path,
            direction: Direction::Download,
            size,
        }
    }

    /// `upload /local/file` or `download /remote/file`, used to tag errors.
    pub fn label(&self) -> String {
        match self.direction {
            Direction::Upload => format!("upload {}", self.local_path.display()),
            Direction::Download => format!("download {}", self.remote_path),
        }
    }
}

/// Options for one batch of transfers.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Expand directories encountered by glob operations.
    pub recursive: bool,
    pub show_progress: bool,
    /// Upper bound on transfers in flight; clamped to at least 1.
    pub concurrency: usize,
    /// −1 = unbounded, 0 = only the named directory's direct children,
    /// k = up to k levels of subdirectory descent.
    pub max_depth: i32,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            recursive: true,
            show_progress: true,
            concurrency: MAX_CONCURRENT_TRANSFERS,
            max_depth: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = TransferOptions::default();
        assert!(opts.recursive);
        assert!(opts.show_progress);
        assert_eq!(opts.concurrency, 4);
        assert_eq!(opts.max_depth, -1);
    }

    #[test]
    fn task_labels() {
        let up = TransferTask::upload("/tmp/a".into(), "/r/a".into(), 1);
        assert_eq!(up.label(), "upload /tmp/a");
        let down = TransferTask::download("/tmp/b".into(), "/r/b".into(), 1);
        assert_eq!(down.label(), "download /r/b");
    }
}
