//! Single-file byte-stream copy between the local filesystem and the
//! remote session, in both directions.
//!
//! Both directions share one loop: stat the source for the progress
//! denominator, open both ends (appending the source's base name when the
//! destination is an existing directory), then pump pooled 512 KiB
//! buffers. The buffer goes back to the pool and the destination is shut
//! down on every exit path.

use std::path::Path;
use std::sync::Arc;

use rsftp_core::{Error, RemoteSession, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::path::{base_remote, join_remote};
use crate::transfer::pool;
use crate::transfer::progress::{CountingWriter, IndicatifSink, NoopSink, ProgressSink};

/// Copy one local file to the remote side. Paths must already be
/// resolved; returns the number of bytes actually transferred.
pub async fn upload_file(
    remote: &Arc<dyn RemoteSession>,
    local_path: &Path,
    remote_path: &str,
    show_progress: bool,
) -> Result<u64> {
    let meta = tokio::fs::metadata(local_path)
        .await
        .map_err(|e| Error::local(format!("stat local {}", local_path.display()), e))?;
    let src = tokio::fs::File::open(local_path)
        .await
        .map_err(|e| Error::local(format!("open local {}", local_path.display()), e))?;

    // Uploading onto an existing directory drops the file inside it.
    let mut target = remote_path.to_string();
    if let Ok(stat) = remote.stat(&target).await {
        if stat.is_dir() {
            target = join_remote(&target, &local_name(local_path));
        }
    }

    let dst = remote.open_write(&target).await?;

    let sink = file_sink(
        show_progress,
        meta.len(),
        &format!("Uploading {}", local_name(local_path)),
    );
    let read_path = local_path.display().to_string();
    let write_path = target.clone();
    copy_stream(
        src,
        dst,
        sink,
        move |e| Error::local(format!("read local {read_path}"), e),
        move |e| Error::remote(format!("write remote {write_path}"), e),
    )
    .await
}

/// Copy one remote file to the local side. Paths must already be
/// resolved; returns the number of bytes actually transferred.
pub async fn download_file(
    remote: &Arc<dyn RemoteSession>,
    remote_path: &str,
    local_path: &Path,
    show_progress: bool,
) -> Result<u64> {
    let stat = remote.stat(remote_path).await?;
    let src = remote.open_read(remote_path).await?;

    let mut target = local_path.to_path_buf();
    if let Ok(meta) = tokio::fs::metadata(&target).await {
        if meta.is_dir() {
            target = target.join(base_remote(remote_path));
        }
    }

    let dst = tokio::fs::File::create(&target)
        .await
        .map_err(|e| Error::local(format!("create local {}", target.display()), e))?;

    let sink = file_sink(
        show_progress,
        stat.size,
        &format!("Downloading {}", base_remote(remote_path)),
    );
    let read_path = remote_path.to_string();
    let write_path = target.display().to_string();
    copy_stream(
        src,
        Box::new(dst),
        sink,
        move |e| Error::remote(format!("read remote {read_path}"), e),
        move |e| Error::local(format!("write local {write_path}"), e),
    )
    .await
}

fn file_sink(show_progress: bool, total: u64, label: &str) -> Arc<dyn ProgressSink> {
    if show_progress {
        Arc::new(IndicatifSink::bytes(total, label))
    } else {
        Arc::new(NoopSink)
    }
}

fn local_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The shared pump. Writes are teed through the byte-counting adapter so
/// the sink sees exactly what reached the destination.
async fn copy_stream(
    mut src: impl AsyncRead + Unpin,
    dst: Box<dyn AsyncWrite + Send + Unpin>,
    sink: Arc<dyn ProgressSink>,
    read_err: impl Fn(std::io::Error) -> Error,
    write_err: impl Fn(std::io::Error) -> Error,
) -> Result<u64> {
    let mut dst = CountingWriter::new(dst, sink.clone());
    let mut buf = pool::checkout();
    let mut copied: u64 = 0;

    let pumped: Result<()> = loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(read_err(e)),
        };
        if let Err(e) = dst.write_all(&buf[..n]).await {
            break Err(write_err(e));
        }
        copied += n as u64;
    };

    pool::checkin(buf);
    let closed = dst.shutdown().await;
    sink.finish();

    pumped?;
    closed.map_err(write_err)?;
    Ok(copied)
}
