//! Progress reporting for transfers.
//!
//! The engine and the copy primitives talk to a small sink trait instead
//! of rendering bars directly; the indicatif-backed sink is the one the
//! binary uses, and tests plug in the no-op sink.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWrite;

/// Where progress updates go.
pub trait ProgressSink: Send + Sync {
    fn set_total(&self, total: u64);
    fn add(&self, delta: u64);
    fn describe(&self, label: &str);
    fn finish(&self);
}

/// Sink that ignores every update.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn set_total(&self, _total: u64) {}
    fn add(&self, _delta: u64) {}
    fn describe(&self, _label: &str) {}
    fn finish(&self) {}
}

/// Terminal progress bar rendered with indicatif.
pub struct IndicatifSink {
    bar: ProgressBar,
    clear_on_finish: bool,
}

impl IndicatifSink {
    /// Per-file bar: bytes out of the stat size, with rate and ETA.
    pub fn bytes(total: u64, label: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
                )
                .expect("static progress template")
                .progress_chars("=>-"),
        );
        bar.set_message(label.to_string());
        IndicatifSink {
            bar,
            clear_on_finish: false,
        }
    }

    /// Batch bar: completed tasks out of the total, cleared when done.
    pub fn count(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({elapsed}) {msg}")
                .expect("static progress template")
                .progress_chars("=>-"),
        );
        bar.set_message("transferring");
        IndicatifSink {
            bar,
            clear_on_finish: true,
        }
    }
}

impl ProgressSink for IndicatifSink {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn add(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn describe(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn finish(&self) {
        if self.clear_on_finish {
            self.bar.finish_and_clear();
        } else {
            self.bar.finish();
        }
    }
}

/// `AsyncWrite` adapter that forwards writes and reports the byte count.
pub struct CountingWriter<W> {
    inner: W,
    sink: Arc<dyn ProgressSink>,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W, sink: Arc<dyn ProgressSink>) -> Self {
        CountingWriter { inner, sink }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match Pin::new(&mut self.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                self.sink.add(n as u64);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::io::AsyncWriteExt;

    struct RecordingSink {
        bytes: AtomicU64,
    }

    impl ProgressSink for RecordingSink {
        fn set_total(&self, _total: u64) {}
        fn add(&self, delta: u64) {
            self.bytes.fetch_add(delta, Ordering::SeqCst);
        }
        fn describe(&self, _label: &str) {}
        fn finish(&self) {}
    }

    #[tokio::test]
    async fn counting_writer_reports_every_byte() {
        let sink = Arc::new(RecordingSink {
            bytes: AtomicU64::new(0),
        });
        let mut out = Vec::new();
        {
            let mut w = CountingWriter::new(&mut out, sink.clone() as Arc<dyn ProgressSink>);
            w.write_all(b"hello, ").await.unwrap();
            w.write_all(b"world\n").await.unwrap();
            w.shutdown().await.unwrap();
        }
        assert_eq!(out, b"hello, world\n");
        assert_eq!(sink.bytes.load(Ordering::SeqCst), 13);
    }
}
