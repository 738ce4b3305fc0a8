//! Task collection: depth-bounded walks that turn a directory pair into a
//! flat list of single-file transfers.
//!
//! The two walks are symmetric. Downloads create local directories
//! eagerly so the destination tree exists before any worker writes into
//! it; uploads defer remote directory creation to the coordinator, which
//! runs after collection completes.

use std::path::Path;
use std::sync::Arc;

use async_recursion::async_recursion;
use rsftp_core::{Error, RemoteSession, Result};

use crate::path::join_remote;
use crate::transfer::TransferTask;

/// Walk a remote directory and emit one download task per regular file.
///
/// `max_depth`: −1 = unbounded, 0 = direct children only, k = up to k
/// levels of descent. `current_depth` starts at 0 at the root call.
#[async_recursion]
pub async fn collect_download_tasks(
    remote: &Arc<dyn RemoteSession>,
    remote_dir: &str,
    local_dir: &Path,
    max_depth: i32,
    current_depth: i32,
) -> Result<Vec<TransferTask>> {
    let mut tasks = Vec::new();

    for entry in remote.read_dir(remote_dir).await? {
        let remote_path = join_remote(remote_dir, &entry.name);
        let local_path = local_dir.join(&entry.name);

        if entry.stat.is_dir() {
            if max_depth >= 0 && current_depth >= max_depth {
                continue;
            }
            tokio::fs::create_dir_all(&local_path).await.map_err(|e| {
                Error::local(format!("create local dir {}", local_path.display()), e)
            })?;
            let sub = collect_download_tasks(
                remote,
                &remote_path,
                &local_path,
                max_depth,
                current_depth + 1,
            )
            .await?;
            tasks.extend(sub);
        } else {
            tasks.push(TransferTask::download(
                local_path,
                remote_path,
                entry.stat.size,
            ));
        }
    }

    Ok(tasks)
}

/// Walk a local directory and emit one upload task per regular file.
///
/// Entries are classified with a following stat, so a symlink to a file
/// uploads its target's bytes; entries that cannot be stat'ed are
/// skipped.
#[async_recursion]
pub async fn collect_upload_tasks(
    local_dir: &Path,
    remote_dir: &str,
    max_depth: i32,
    current_depth: i32,
) -> Result<Vec<TransferTask>> {
    let mut tasks = Vec::new();

    let mut entries = tokio::fs::read_dir(local_dir)
        .await
        .map_err(|e| Error::local(format!("read local dir {}", local_dir.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::local(format!("read local dir {}", local_dir.display()), e))?
    {
        let local_path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let remote_path = join_remote(remote_dir, &name);

        let Ok(meta) = tokio::fs::metadata(&local_path).await else {
            continue;
        };

        if meta.is_dir() {
            if max_depth >= 0 && current_depth >= max_depth {
                continue;
            }
            let sub =
                collect_upload_tasks(&local_path, &remote_path, max_depth, current_depth + 1)
                    .await?;
            tasks.extend(sub);
        } else {
            tasks.push(TransferTask::upload(local_path, remote_path, meta.len()));
        }
    }

    Ok(tasks)
}
