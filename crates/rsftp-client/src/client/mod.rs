//! The client: session state plus the operations exposed to the shell.
//!
//! Owns the remote session handle, the two working directories, the
//! listing cache and the directory-creation coordinator. Transfer
//! operations live in the `xfer` sibling; everything here is the
//! remote/local filesystem surface.

pub mod cache;
mod xfer;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_recursion::async_recursion;
use rsftp_core::{Error, FileStat, RemoteEntry, RemoteSession, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::path::{self, join_remote, parent_remote};
use crate::transfer::DirCreator;
use self::cache::DirCache;

/// One authenticated session plus the state the shell needs.
///
/// Working directories change only through [`Client::chdir`] and
/// [`Client::local_chdir`], which verify the target first. Transfer
/// workers never touch them: every task carries absolute paths captured
/// at collection time.
pub struct Client {
    remote: Arc<dyn RemoteSession>,
    remote_home: String,
    remote_cwd: RwLock<String>,
    local_cwd: RwLock<PathBuf>,
    cache: Arc<DirCache>,
    dir_creator: DirCreator,
}

impl Client {
    /// Wrap an established session. The remote CWD starts at the
    /// server-reported home (`/` when the server reports nothing usable);
    /// the local CWD starts at the process CWD.
    pub async fn new(remote: Arc<dyn RemoteSession>) -> Self {
        let home = remote
            .canonical_home()
            .await
            .unwrap_or_else(|_| "/".to_string());
        let local_cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cache = Arc::new(DirCache::new());
        Client {
            dir_creator: DirCreator::new(Arc::clone(&remote), Arc::clone(&cache)),
            remote_home: home.clone(),
            remote_cwd: RwLock::new(home),
            local_cwd: RwLock::new(local_cwd),
            cache,
            remote,
        }
    }

    // ── Working directories ──────────────────────────────────────────

    pub fn getwd(&self) -> String {
        self.remote_cwd.read().unwrap().clone()
    }

    pub fn get_local_wd(&self) -> PathBuf {
        self.local_cwd.read().unwrap().clone()
    }

    pub(crate) fn resolve_remote(&self, input: &str) -> String {
        path::resolve_remote(&self.getwd(), &self.remote_home, input)
    }

    pub(crate) fn resolve_local(&self, input: &str) -> PathBuf {
        path::resolve_local(&self.get_local_wd(), dirs::home_dir().as_deref(), input)
    }

    /// Change the remote working directory; the target must exist and be
    /// a directory. Drops the whole listing cache.
    pub async fn chdir(&self, dir: &str) -> Result<()> {
        let target = self.resolve_remote(dir);
        let stat = self.remote.stat(&target).await?;
        if !stat.is_dir() {
            return Err(Error::NotADirectory { path: target });
        }
        *self.remote_cwd.write().unwrap() = target;
        self.cache.clear();
        Ok(())
    }

    /// Change the local working directory; the target must exist and be
    /// a directory.
    pub async fn local_chdir(&self, dir: &str) -> Result<()> {
        let target = self.resolve_local(dir);
        let meta = tokio::fs::metadata(&target)
            .await
            .map_err(|e| Error::local(format!("stat local {}", target.display()), e))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory {
                path: target.display().to_string(),
            });
        }
        *self.local_cwd.write().unwrap() = target;
        Ok(())
    }

    // ── Listings and metadata ────────────────────────────────────────

    /// List a remote directory through the 30-second cache.
    pub async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let target = self.resolve_remote(dir);
        if let Some(entries) = self.cache.get(&target) {
            return Ok(entries);
        }
        let entries = self.remote.read_dir(&target).await?;
        self.cache.insert(&target, entries.clone());
        Ok(entries)
    }

    /// List a local directory; entries that cannot be stat'ed are
    /// skipped.
    pub async fn local_list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let target = self.resolve_local(dir);
        let mut rd = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| Error::local(format!("read local dir {}", target.display()), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| Error::local(format!("read local dir {}", target.display()), e))?
        {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                stat: local_stat(&meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat> {
        let target = self.resolve_remote(path);
        self.remote.stat(&target).await
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn mkdir(&self, dir: &str) -> Result<()> {
        let target = self.resolve_remote(dir);
        self.remote.mkdir(&target).await?;
        self.cache.invalidate(&parent_remote(&target));
        Ok(())
    }

    pub async fn local_mkdir(&self, dir: &str) -> Result<()> {
        let target = self.resolve_local(dir);
        tokio::fs::create_dir(&target)
            .await
            .map_err(|e| Error::local(format!("mkdir local {}", target.display()), e))
    }

    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let old = self.resolve_remote(old);
        let new = self.resolve_remote(new);
        self.remote.rename(&old, &new).await?;
        self.cache.invalidate(&parent_remote(&old));
        self.cache.invalidate(&parent_remote(&new));
        Ok(())
    }

    /// Remove a file, or a directory tree depth-first. The first error
    /// aborts, leaving any partial deletion visible.
    pub async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve_remote(path);
        let stat = self.remote.stat(&target).await?;

        if stat.is_dir() {
            self.remove_dir_recursive(&target).await?;
        } else {
            self.remote.remove_file(&target).await?;
        }
        self.cache.invalidate(&parent_remote(&target));
        Ok(())
    }

    #[async_recursion]
    async fn remove_dir_recursive(&self, dir: &str) -> Result<()> {
        for entry in self.remote.read_dir(dir).await? {
            let full = join_remote(dir, &entry.name);
            if entry.stat.is_dir() {
                self.remove_dir_recursive(&full).await?;
            } else {
                self.remote.remove_file(&full).await?;
            }
        }
        self.cache.invalidate(dir);
        self.remote.remove_dir(dir).await
    }

    // ── Completion, exec, teardown ───────────────────────────────────

    /// Candidates for tab completion of a remote path. The candidate
    /// keeps the user's prefix format (relative stays relative);
    /// directories are suffixed with `/`. Matching is case-sensitive.
    pub async fn list_completion(&self, prefix: &str) -> Vec<String> {
        let resolved = self.resolve_remote(prefix);

        let (dir, partial) = if prefix.ends_with('/') || prefix.is_empty() {
            (resolved.as_str(), "")
        } else {
            match resolved.rfind('/') {
                Some(0) => ("/", &resolved[1..]),
                Some(i) => (&resolved[..i], &resolved[i + 1..]),
                None => return Vec::new(),
            }
        };

        let Ok(entries) = self.remote.read_dir(dir).await else {
            return Vec::new();
        };

        // The part of the user's input up to the last separator.
        let user_dir = match prefix.rfind('/') {
            Some(i) => &prefix[..=i],
            None => "",
        };

        let mut matches = Vec::new();
        for entry in entries {
            if entry.name.starts_with(partial) {
                let mut candidate = format!("{user_dir}{}", entry.name);
                if entry.stat.is_dir() {
                    candidate.push('/');
                }
                matches.push(candidate);
            }
        }
        matches.sort();
        matches
    }

    /// Run a command on the remote host from the remote CWD.
    pub async fn execute_remote(
        &self,
        command: &str,
        stdin: Option<&mut (dyn AsyncRead + Send + Unpin)>,
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32> {
        let full = format!("cd {} && {}", self.getwd(), command);
        info!(command, "executing remote command");
        self.remote.exec(&full, stdin, stdout, stderr).await
    }

    /// Drop every cached listing; the shell calls this on every explicit
    /// `ls` so the user always sees live contents.
    pub fn clear_dir_cache(&self) {
        self.cache.clear();
    }

    pub async fn close(&self) -> Result<()> {
        self.remote.close().await
    }

    // Shared internals for the transfer operations in `xfer`.

    pub(crate) fn remote_session(&self) -> &Arc<dyn RemoteSession> {
        &self.remote
    }

    pub(crate) fn dir_creator(&self) -> &DirCreator {
        &self.dir_creator
    }

    pub(crate) fn dir_cache(&self) -> &Arc<DirCache> {
        &self.cache
    }
}

fn local_stat(meta: &std::fs::Metadata) -> FileStat {
    use rsftp_core::FileKind;
    FileStat {
        kind: if meta.is_dir() {
            FileKind::Dir
        } else if meta.file_type().is_symlink() {
            FileKind::Symlink
        } else {
            FileKind::File
        },
        size: meta.len(),
        modified: meta.modified().ok(),
        permissions: None,
    }
}
