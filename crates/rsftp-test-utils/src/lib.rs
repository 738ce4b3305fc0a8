//! rsftp-test-utils: an in-memory remote session.
//!
//! `MockRemoteSession` implements the remote-session interface over a
//! plain map of paths, with instrumentation the test suites need:
//! per-path mkdir counters, server-call counters, injectable open
//! failures and panics, an open delay, and a high-water mark of
//! concurrently open streams.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use rsftp_core::{
    Error, FileKind, FileStat, RemoteEntry, RemoteReader, RemoteSession, RemoteWriter, Result,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Default)]
struct MockState {
    nodes: BTreeMap<String, Node>,
    mkdir_calls: HashMap<String, usize>,
    read_dir_calls: usize,
    fail_open: HashSet<String>,
    panic_open: HashSet<String>,
    active_streams: usize,
    max_active_streams: usize,
    exec_log: Vec<(String, Vec<u8>)>,
    exec_stdout: Vec<u8>,
    exec_stderr: Vec<u8>,
    exec_status: u32,
    closed: bool,
}

/// In-memory stand-in for an authenticated SFTP session.
pub struct MockRemoteSession {
    home: String,
    open_delay: Duration,
    state: Arc<Mutex<MockState>>,
}

impl MockRemoteSession {
    /// Empty tree containing only `/` and the home directory.
    pub fn new(home: &str) -> Self {
        let mock = MockRemoteSession {
            home: home.to_string(),
            open_delay: Duration::ZERO,
            state: Arc::new(Mutex::new(MockState::default())),
        };
        mock.state
            .lock()
            .unwrap()
            .nodes
            .insert("/".to_string(), Node::Dir);
        mock.add_dir(home);
        mock
    }

    /// Delay every `open_read`/`open_write`, to make transfer overlap
    /// observable in concurrency tests.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    // ── Tree construction ────────────────────────────────────────────

    /// Create a directory and all of its parents.
    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        for dir in ancestors_inclusive(path) {
            state.nodes.entry(dir).or_insert(Node::Dir);
        }
    }

    /// Create a file (and its parent directories) with the given bytes.
    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.add_dir(&parent_of(path));
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.to_string(), Node::File(data.to_vec()));
    }

    // ── Failure injection ────────────────────────────────────────────

    /// Make `open_read`/`open_write` of `path` fail with permission
    /// denied.
    pub fn fail_open(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_open
            .insert(path.to_string());
    }

    /// Make `open_read`/`open_write` of `path` panic.
    pub fn panic_on_open(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .panic_open
            .insert(path.to_string());
    }

    pub fn set_exec_result(&self, stdout: &[u8], stderr: &[u8], status: u32) {
        let mut state = self.state.lock().unwrap();
        state.exec_stdout = stdout.to_vec();
        state.exec_stderr = stderr.to_vec();
        state.exec_status = status;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.lock().unwrap().nodes.get(path), Some(Node::Dir))
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Every path currently in the tree, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().nodes.keys().cloned().collect()
    }

    /// How many `mkdir` calls were issued for `path`.
    pub fn mkdir_count(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .mkdir_calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn read_dir_calls(&self) -> usize {
        self.state.lock().unwrap().read_dir_calls
    }

    /// High-water mark of concurrently open byte streams.
    pub fn max_active_streams(&self) -> usize {
        self.state.lock().unwrap().max_active_streams
    }

    /// Commands run through `exec`, with the stdin bytes each received.
    pub fn exec_log(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().exec_log.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn guard(&self) -> StreamGuard {
        let mut state = self.state.lock().unwrap();
        state.active_streams += 1;
        state.max_active_streams = state.max_active_streams.max(state.active_streams);
        StreamGuard {
            state: Arc::clone(&self.state),
        }
    }

    fn check_open(&self, path: &str, context: &str) -> Result<()> {
        let (should_panic, should_fail) = {
            let state = self.state.lock().unwrap();
            (
                state.panic_open.contains(path),
                state.fail_open.contains(path),
            )
        };
        if should_panic {
            panic!("injected panic opening {path}");
        }
        if should_fail {
            return Err(Error::remote(
                format!("{context} {path}"),
                io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        Ok(())
    }
}

struct StreamGuard {
    state: Arc<Mutex<MockState>>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.state.lock().unwrap().active_streams -= 1;
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => "/".to_string(),
    }
}

fn ancestors_inclusive(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(seg);
        out.push(current.clone());
    }
    out
}

fn stat_of(node: &Node) -> FileStat {
    match node {
        Node::File(data) => FileStat {
            kind: FileKind::File,
            size: data.len() as u64,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            permissions: Some(0o644),
        },
        Node::Dir => FileStat {
            kind: FileKind::Dir,
            size: 0,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            permissions: Some(0o755),
        },
    }
}

fn not_found(context: String) -> Error {
    Error::remote(
        context,
        io::Error::new(io::ErrorKind::NotFound, "no such file"),
    )
}

#[async_trait]
impl RemoteSession for MockRemoteSession {
    async fn canonical_home(&self) -> Result<String> {
        Ok(self.home.clone())
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(path)
            .map(stat_of)
            .ok_or_else(|| not_found(format!("stat remote {path}")))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let mut state = self.state.lock().unwrap();
        state.read_dir_calls += 1;
        match state.nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(Error::NotADirectory {
                    path: path.to_string(),
                })
            }
            None => return Err(not_found(format!("read remote dir {path}"))),
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let entries = state
            .nodes
            .iter()
            .filter_map(|(key, node)| {
                let rest = key.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| RemoteEntry {
                    name: rest.to_string(),
                    stat: stat_of(node),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.mkdir_calls.entry(path.to_string()).or_insert(0) += 1;

        if state.nodes.contains_key(path) {
            return Err(Error::remote(
                format!("mkdir remote {path}"),
                io::Error::new(io::ErrorKind::AlreadyExists, "file exists"),
            ));
        }
        if !matches!(state.nodes.get(&parent_of(path)), Some(Node::Dir)) {
            return Err(not_found(format!("mkdir remote {path}")));
        }
        state.nodes.insert(path.to_string(), Node::Dir);
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::Dir) => {}
            _ => return Err(not_found(format!("rmdir remote {path}"))),
        }
        let prefix = format!("{path}/");
        if state.nodes.keys().any(|k| k.starts_with(&prefix)) {
            return Err(Error::remote(
                format!("rmdir remote {path}"),
                io::Error::other("directory not empty"),
            ));
        }
        state.nodes.remove(path);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::File(_)) => {
                state.nodes.remove(path);
                Ok(())
            }
            _ => Err(not_found(format!("remove remote {path}"))),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(node) = state.nodes.remove(from) else {
            return Err(not_found(format!("rename remote {from}")));
        };
        // Move any subtree along with a directory.
        let prefix = format!("{from}/");
        let children: Vec<(String, Node)> = state
            .nodes
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, child) in children {
            state.nodes.remove(&key);
            let new_key = format!("{to}{}", &key[from.len()..]);
            state.nodes.insert(new_key, child);
        }
        state.nodes.insert(to.to_string(), node);
        Ok(())
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader> {
        // The guard spans the open delay and the stream's lifetime, so
        // the high-water mark reflects concurrently active transfers.
        let guard = self.guard();
        tokio::time::sleep(self.open_delay).await;
        self.check_open(path, "open remote")?;
        let data = match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File(data)) => data.clone(),
            Some(Node::Dir) => {
                return Err(Error::remote(
                    format!("open remote {path}"),
                    io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
                ))
            }
            None => return Err(not_found(format!("open remote {path}"))),
        };
        Ok(Box::new(MockReader {
            inner: std::io::Cursor::new(data),
            _guard: guard,
        }))
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter> {
        let guard = self.guard();
        tokio::time::sleep(self.open_delay).await;
        self.check_open(path, "create remote")?;
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(state.nodes.get(&parent_of(path)), Some(Node::Dir)) {
                return Err(not_found(format!("create remote {path}")));
            }
            // Create/truncate semantics.
            state
                .nodes
                .insert(path.to_string(), Node::File(Vec::new()));
        }
        Ok(Box::new(MockWriter {
            path: path.to_string(),
            buf: Vec::new(),
            state: Arc::clone(&self.state),
            _guard: guard,
        }))
    }

    async fn exec(
        &self,
        command: &str,
        stdin: Option<&mut (dyn AsyncRead + Send + Unpin)>,
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32> {
        let mut stdin_bytes = Vec::new();
        if let Some(stdin) = stdin {
            stdin
                .read_to_end(&mut stdin_bytes)
                .await
                .map_err(|e| Error::remote("exec stdin".to_string(), e))?;
        }
        let (out, err, status) = {
            let mut state = self.state.lock().unwrap();
            state
                .exec_log
                .push((command.to_string(), stdin_bytes));
            (
                state.exec_stdout.clone(),
                state.exec_stderr.clone(),
                state.exec_status,
            )
        };
        stdout
            .write_all(&out)
            .await
            .map_err(|e| Error::remote("exec stdout".to_string(), e))?;
        stderr
            .write_all(&err)
            .await
            .map_err(|e| Error::remote("exec stderr".to_string(), e))?;
        Ok(status)
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

struct MockReader {
    inner: std::io::Cursor<Vec<u8>>,
    _guard: StreamGuard,
}

impl AsyncRead for MockReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

struct MockWriter {
    path: String,
    buf: Vec<u8>,
    state: Arc<Mutex<MockState>>,
    _guard: StreamGuard,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let data = std::mem::take(&mut self.buf);
        let path = self.path.clone();
        self.state.lock().unwrap().nodes.insert(path, Node::File(data));
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn tree_round_trip() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_file("/srv/data/a.txt", b"hello");

        let stat = mock.stat("/srv/data/a.txt").await.unwrap();
        assert_eq!(stat.size, 5);
        assert!(!stat.is_dir());
        assert!(mock.stat("/srv/data").await.unwrap().is_dir());

        let entries = mock.read_dir("/srv/data").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");

        let mut reader = mock.open_read("/srv/data/a.txt").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn write_commits_on_shutdown() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_dir("/srv");
        let mut w = mock.open_write("/srv/out.bin").await.unwrap();
        w.write_all(b"abc").await.unwrap();
        assert_eq!(mock.file_content("/srv/out.bin").unwrap(), b"");
        w.shutdown().await.unwrap();
        assert_eq!(mock.file_content("/srv/out.bin").unwrap(), b"abc");
    }

    #[tokio::test]
    async fn mkdir_requires_parent_and_counts_calls() {
        let mock = MockRemoteSession::new("/home/me");
        assert!(mock.mkdir("/a/b").await.is_err());
        mock.mkdir("/a").await.unwrap();
        mock.mkdir("/a/b").await.unwrap();
        assert!(mock.mkdir("/a/b").await.is_err());
        assert_eq!(mock.mkdir_count("/a/b"), 2);
        assert_eq!(mock.mkdir_count("/a"), 1);
    }

    #[tokio::test]
    async fn rename_moves_subtrees() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_file("/old/sub/f.txt", b"x");
        mock.rename("/old", "/new").await.unwrap();
        assert!(!mock.exists("/old"));
        assert!(mock.is_dir("/new"));
        assert_eq!(mock.file_content("/new/sub/f.txt").unwrap(), b"x");
    }

    #[tokio::test]
    async fn root_listing() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_dir("/srv");
        let names: Vec<String> = mock
            .read_dir("/")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["home", "srv"]);
    }
}
