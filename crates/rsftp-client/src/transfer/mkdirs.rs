//! Idempotent `mkdir -p` over the remote tree.
//!
//! Concurrent requests for the same path are coalesced: the first caller
//! executes the creation, everyone else waits on the per-path gate and
//! re-checks. Across the whole process at most one creation attempt per
//! path is in flight at any instant.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_recursion::async_recursion;
use rsftp_core::{RemoteSession, Result};
use tracing::debug;

use crate::client::cache::DirCache;
use crate::path::parent_remote;
use crate::transfer::{Direction, TransferTask};

/// Coalescing coordinator for remote directory creation.
pub struct DirCreator {
    remote: Arc<dyn RemoteSession>,
    cache: Arc<DirCache>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DirCreator {
    pub fn new(remote: Arc<dyn RemoteSession>, cache: Arc<DirCache>) -> Self {
        DirCreator {
            remote,
            cache,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Guarantee that `path` exists and is a directory. `path` must be
    /// absolute and cleaned.
    #[async_recursion]
    pub async fn ensure_dir(&self, path: &str) -> Result<()> {
        // Fast path, no gate.
        if let Ok(stat) = self.remote.stat(path).await {
            if stat.is_dir() {
                return Ok(());
            }
        }

        let gate = {
            let mut gates = self.gates.lock().unwrap();
            gates
                .entry(path.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // Another caller may have created it while we waited.
        if let Ok(stat) = self.remote.stat(path).await {
            if stat.is_dir() {
                return Ok(());
            }
        }

        let parent = parent_remote(path);
        if parent != "/" && parent != "." && parent != path {
            self.ensure_dir(&parent).await?;
        }

        if let Err(mkdir_err) = self.remote.mkdir(path).await {
            // Raced by the server or another client: a directory that
            // exists now is a success.
            match self.remote.stat(path).await {
                Ok(stat) if stat.is_dir() => {}
                _ => return Err(mkdir_err),
            }
        }
        debug!(path, "created remote directory");

        self.cache.invalidate(&parent);
        Ok(())
    }

    /// Create every directory in `dirs`, which the caller passes in
    /// parent-first order (see [`dirs_for_upload`]).
    pub async fn ensure_dirs(&self, dirs: &[String]) -> Result<()> {
        for dir in dirs {
            self.ensure_dir(dir).await?;
        }
        Ok(())
    }
}

/// Derive the set of remote directories a batch of upload tasks needs:
/// the full parent chain of every upload destination, sorted ascending by
/// depth and then lexicographically, so parents always precede children.
pub fn dirs_for_upload(tasks: &[TransferTask]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dirs = Vec::new();

    for task in tasks {
        if task.direction != Direction::Upload {
            continue;
        }
        let mut dir = parent_remote(&task.remote_path);
        while dir != "/" && dir != "." {
            if seen.insert(dir.clone()) {
                dirs.push(dir.clone());
            }
            dir = parent_remote(&dir);
        }
    }

    dirs.sort_by(|a, b| {
        let depth_a = a.matches('/').count();
        let depth_b = b.matches('/').count();
        depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
    });
    dirs
}

/// Directory set for an upload rooted at `remote_dir`: the root itself
/// first, then everything the tasks need.
pub fn dirs_for_upload_rooted(remote_dir: &str, tasks: &[TransferTask]) -> Vec<String> {
    let mut dirs = vec![remote_dir.to_string()];
    for dir in dirs_for_upload(tasks) {
        if dir != remote_dir {
            dirs.push(dir);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn upload(remote_path: &str) -> TransferTask {
        TransferTask::upload(PathBuf::from("/l"), remote_path.to_string(), 0)
    }

    #[test]
    fn parent_chain_is_sorted_parent_first() {
        let tasks = vec![
            upload("/deep/a/b/c/one.txt"),
            upload("/deep/a/two.txt"),
            upload("/deep/a/b/three.txt"),
        ];
        let dirs = dirs_for_upload(&tasks);
        assert_eq!(dirs, vec!["/deep", "/deep/a", "/deep/a/b", "/deep/a/b/c"]);
    }

    #[test]
    fn duplicate_parents_collapse() {
        let tasks: Vec<TransferTask> = (0..50).map(|i| upload(&format!("/r/sub/f{i}"))).collect();
        let dirs = dirs_for_upload(&tasks);
        assert_eq!(dirs, vec!["/r", "/r/sub"]);
    }

    #[test]
    fn downloads_contribute_nothing() {
        let tasks = vec![TransferTask::download(
            PathBuf::from("/l/x"),
            "/r/x".to_string(),
            0,
        )];
        assert!(dirs_for_upload(&tasks).is_empty());
    }

    #[test]
    fn sibling_dirs_sort_lexicographically_within_depth() {
        let tasks = vec![upload("/r/b/x"), upload("/r/a/y")];
        let dirs = dirs_for_upload(&tasks);
        assert_eq!(dirs, vec!["/r", "/r/a", "/r/b"]);
    }

    #[test]
    fn rooted_set_prepends_the_root_once() {
        let tasks = vec![upload("/r/sub/x")];
        let dirs = dirs_for_upload_rooted("/r", &tasks);
        assert_eq!(dirs, vec!["/r", "/r/sub"]);
    }

}
