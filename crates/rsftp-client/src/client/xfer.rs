//! Public transfer operations: single files, glob batches and whole
//! directory trees.
//!
//! Every batch follows the same sequence: expand arguments, collect a
//! flat task list, materialize the destination directory tree, then
//! execute exactly once through the engine. The engine is the only place
//! that runs transfers concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;

use rsftp_core::{Error, Result};
use tracing::info;

use crate::glob;
use crate::path::{base_remote, join_remote, parent_remote};
use crate::transfer::collect::{collect_download_tasks, collect_upload_tasks};
use crate::transfer::mkdirs::{dirs_for_upload, dirs_for_upload_rooted};
use crate::transfer::{copy, engine, Direction, TransferOptions, TransferTask};

use super::Client;

impl Client {
    // ── Single files ─────────────────────────────────────────────────

    /// Upload one file with a per-file progress bar.
    pub async fn upload(&self, local: &str, remote: &str) -> Result<()> {
        self.upload_with_progress(local, remote, true).await
    }

    pub async fn upload_with_progress(
        &self,
        local: &str,
        remote: &str,
        show_progress: bool,
    ) -> Result<()> {
        let local_path = self.resolve_local(local);
        let remote_path = self.resolve_remote(remote);
        copy::upload_file(self.remote_session(), &local_path, &remote_path, show_progress).await?;
        // A fresh upload should appear in the next listing of its parent.
        self.dir_cache().invalidate(&remote_path);
        self.dir_cache().invalidate(&parent_remote(&remote_path));
        Ok(())
    }

    /// Download one file with a per-file progress bar.
    pub async fn download(&self, remote: &str, local: &str) -> Result<()> {
        self.download_with_progress(remote, local, true).await
    }

    pub async fn download_with_progress(
        &self,
        remote: &str,
        local: &str,
        show_progress: bool,
    ) -> Result<()> {
        let remote_path = self.resolve_remote(remote);
        let local_path = self.resolve_local(local);
        copy::download_file(self.remote_session(), &remote_path, &local_path, show_progress)
            .await?;
        Ok(())
    }

    // ── Glob batches ─────────────────────────────────────────────────

    /// Upload everything a local glob pattern matches into `remote_dest`.
    /// Directory matches expand recursively only when `opts.recursive`.
    /// Returns the number of files uploaded.
    pub async fn upload_glob(
        &self,
        pattern: &str,
        remote_dest: &str,
        opts: &TransferOptions,
    ) -> Result<usize> {
        let matches = glob::glob_local(&self.get_local_wd(), pattern)?;
        if matches.is_empty() {
            return Err(Error::NoMatches {
                pattern: pattern.to_string(),
            });
        }

        let remote_dest = self.resolve_remote(remote_dest);
        let mut tasks = Vec::new();
        for local_path in matches {
            let Ok(meta) = tokio::fs::metadata(&local_path).await else {
                continue;
            };
            let name = local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if meta.is_dir() {
                if !opts.recursive {
                    continue;
                }
                let sub_root = join_remote(&remote_dest, &name);
                let sub =
                    collect_upload_tasks(&local_path, &sub_root, opts.max_depth, 0).await?;
                tasks.extend(sub);
            } else {
                tasks.push(TransferTask::upload(
                    local_path,
                    join_remote(&remote_dest, &name),
                    meta.len(),
                ));
            }
        }
        if tasks.is_empty() {
            return Err(Error::NoFiles {
                what: format!("pattern {pattern}"),
            });
        }

        info!(count = tasks.len(), pattern, "uploading glob matches");
        let dirs = dirs_for_upload(&tasks);
        self.dir_creator().ensure_dirs(&dirs).await?;
        self.run_batch(tasks, opts).await
    }

    /// Download everything a remote glob pattern matches into
    /// `local_dest`. Returns the number of files downloaded.
    pub async fn download_glob(
        &self,
        pattern: &str,
        local_dest: &str,
        opts: &TransferOptions,
    ) -> Result<usize> {
        // Patterns resolve against the remote CWD; `~` is not expanded
        // inside patterns.
        let full_pattern = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("{}/{}", self.getwd(), pattern)
        };
        let matches = glob::glob_remote(self.remote_session(), &full_pattern).await?;
        if matches.is_empty() {
            return Err(Error::NoMatches {
                pattern: pattern.to_string(),
            });
        }

        let local_dest = self.resolve_local(local_dest);
        tokio::fs::create_dir_all(&local_dest)
            .await
            .map_err(|e| Error::local(format!("create local dir {}", local_dest.display()), e))?;

        let mut tasks = Vec::new();
        for remote_path in &matches {
            let Ok(stat) = self.remote_session().stat(remote_path).await else {
                continue;
            };
            if stat.is_dir() {
                if !opts.recursive {
                    continue;
                }
                let sub_local = local_dest.join(base_remote(remote_path));
                tokio::fs::create_dir_all(&sub_local).await.map_err(|e| {
                    Error::local(format!("create local dir {}", sub_local.display()), e)
                })?;
                let sub = collect_download_tasks(
                    self.remote_session(),
                    remote_path,
                    &sub_local,
                    opts.max_depth,
                    0,
                )
                .await?;
                tasks.extend(sub);
            } else {
                tasks.push(TransferTask::download(
                    local_dest.join(base_remote(remote_path)),
                    remote_path.clone(),
                    stat.size,
                ));
            }
        }
        if tasks.is_empty() {
            return Err(Error::NoFiles {
                what: format!("pattern {pattern}"),
            });
        }

        info!(count = tasks.len(), pattern, "downloading glob matches");
        self.run_batch(tasks, opts).await
    }

    // ── Directory trees ──────────────────────────────────────────────

    /// Upload a directory tree under `remote_dir`, bounded by
    /// `opts.max_depth`. Returns the number of files uploaded.
    pub async fn upload_dir(
        &self,
        local_dir: &str,
        remote_dir: &str,
        opts: &TransferOptions,
    ) -> Result<usize> {
        let local_dir = self.resolve_local(local_dir);
        let remote_dir = self.resolve_remote(remote_dir);

        let meta = tokio::fs::metadata(&local_dir)
            .await
            .map_err(|e| Error::local(format!("stat local dir {}", local_dir.display()), e))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory {
                path: local_dir.display().to_string(),
            });
        }

        let tasks = collect_upload_tasks(&local_dir, &remote_dir, opts.max_depth, 0).await?;
        if tasks.is_empty() {
            return Err(Error::NoFiles {
                what: format!("directory {}", local_dir.display()),
            });
        }

        info!(count = tasks.len(), "uploading directory");
        let dirs = dirs_for_upload_rooted(&remote_dir, &tasks);
        self.dir_creator().ensure_dirs(&dirs).await?;
        self.run_batch(tasks, opts).await
    }

    /// Download a directory tree into `local_dir`, bounded by
    /// `opts.max_depth`. The local mirror of the remote directory
    /// structure exists before any worker starts writing. Returns the
    /// number of files downloaded.
    pub async fn download_dir(
        &self,
        remote_dir: &str,
        local_dir: &str,
        opts: &TransferOptions,
    ) -> Result<usize> {
        let remote_dir = self.resolve_remote(remote_dir);
        let local_dir = self.resolve_local(local_dir);

        let stat = self.remote_session().stat(&remote_dir).await?;
        if !stat.is_dir() {
            return Err(Error::NotADirectory { path: remote_dir });
        }

        tokio::fs::create_dir_all(&local_dir)
            .await
            .map_err(|e| Error::local(format!("create local dir {}", local_dir.display()), e))?;

        let tasks = collect_download_tasks(
            self.remote_session(),
            &remote_dir,
            &local_dir,
            opts.max_depth,
            0,
        )
        .await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        info!(count = tasks.len(), "downloading directory");
        self.run_batch(tasks, opts).await
    }

    /// Execute a collected batch and invalidate the listings every
    /// upload touched, whether or not the batch fully succeeded.
    async fn run_batch(&self, tasks: Vec<TransferTask>, opts: &TransferOptions) -> Result<usize> {
        let touched: BTreeSet<String> = tasks
            .iter()
            .filter(|t| t.direction == Direction::Upload)
            .map(|t| parent_remote(&t.remote_path))
            .collect();

        let result = engine::execute_tasks(Arc::clone(self.remote_session()), tasks, opts).await;

        for dir in touched {
            self.dir_cache().invalidate(&dir);
        }
        result
    }
}
