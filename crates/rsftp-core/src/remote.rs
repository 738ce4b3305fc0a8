//! The remote-session interface the client is written against.
//!
//! The transfer engine and the public operations never talk to russh
//! directly; they consume this trait. The real implementation lives in
//! `rsftp-client::session`, and the test suites substitute an in-memory
//! tree. Every path crossing this interface is absolute and cleaned.

use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;

/// What a directory entry is, as far as the client cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
}

/// Subset of SFTP file attributes used by the client.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub kind: FileKind,
    /// Size in bytes; advisory for progress display only.
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub permissions: Option<u32>,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn file(size: u64) -> Self {
        FileStat {
            kind: FileKind::File,
            size,
            modified: None,
            permissions: None,
        }
    }

    pub fn dir() -> Self {
        FileStat {
            kind: FileKind::Dir,
            size: 0,
            modified: None,
            permissions: None,
        }
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub stat: FileStat,
}

/// Boxed byte stream read from a remote file.
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed byte stream writing into a remote file. Callers must `shutdown`
/// the writer to flush and close the remote handle.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The authenticated SFTP channel plus remote command execution.
///
/// Implementations must be safe for concurrent use: the transfer engine
/// issues requests from several workers against one shared session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Server-reported initial working directory, treated as the user's
    /// home directory for `~` expansion.
    async fn canonical_home(&self) -> Result<String>;

    async fn stat(&self, path: &str) -> Result<FileStat>;

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn remove_dir(&self, path: &str) -> Result<()>;

    async fn remove_file(&self, path: &str) -> Result<()>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader>;

    /// Create or truncate a remote file for writing.
    async fn open_write(&self, path: &str) -> Result<RemoteWriter>;

    /// Run `command` on the remote host. `stdin` (when given) is sent to
    /// the command until EOF before output is drained; stdout and stderr
    /// are streamed into the given writers. Returns the exit status.
    async fn exec(
        &self,
        command: &str,
        stdin: Option<&mut (dyn AsyncRead + Send + Unpin)>,
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32>;

    /// Tear the session down: SFTP channel first, then the SSH connection.
    async fn close(&self) -> Result<()>;
}
