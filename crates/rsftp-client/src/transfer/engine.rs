//! The transfer engine: the single concurrency choke point.
//!
//! Every batch operation collects first and then executes exactly once
//! through [`execute_tasks`]; nothing else in the client spawns transfer
//! workers, so nested parallelism cannot happen. Workers share one
//! remote session, which multiplexes requests internally.

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use rsftp_core::{BatchError, Error, RemoteSession, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::transfer::progress::{IndicatifSink, ProgressSink};
use crate::transfer::{copy, Direction, TransferOptions, TransferTask};

/// Execute a batch of transfers with bounded concurrency.
///
/// Runs every task to completion regardless of individual failures.
/// Returns the number of tasks that succeeded; if any failed, returns
/// `Error::Batch` carrying that same count plus every per-task error.
/// Tasks complete in no particular order.
pub async fn execute_tasks(
    remote: Arc<dyn RemoteSession>,
    tasks: Vec<TransferTask>,
    opts: &TransferOptions,
) -> Result<usize> {
    if tasks.is_empty() {
        return Ok(0);
    }

    let total = tasks.len();
    let concurrency = opts.concurrency.max(1).min(total);

    // Progress policy: one batch bar when workers run in parallel,
    // per-file bars when they run one at a time, nothing when silenced.
    let show_file_progress = opts.show_progress && concurrency == 1;
    let batch_bar: Option<Arc<dyn ProgressSink>> = (opts.show_progress && concurrency > 1)
        .then(|| Arc::new(IndicatifSink::count(total as u64)) as Arc<dyn ProgressSink>);

    debug!(total, concurrency, "executing transfer batch");

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let succeeded = Arc::new(AtomicUsize::new(0));
    let failures: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));

    let mut workers = JoinSet::new();
    for task in tasks {
        let remote = Arc::clone(&remote);
        let semaphore = Arc::clone(&semaphore);
        let succeeded = Arc::clone(&succeeded);
        let failures = Arc::clone(&failures);
        let batch_bar = batch_bar.clone();

        workers.spawn(async move {
            let _permit = semaphore.acquire_owned().await.unwrap();

            let label = task.label();
            let outcome = std::panic::AssertUnwindSafe(run_task(&remote, &task, show_file_progress))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(bytes)) => {
                    debug!(label = %label, bytes, "transfer complete");
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Err(err)) => {
                    warn!(label = %label, error = %err, "transfer failed");
                    failures.lock().unwrap().push(Error::task(label, err));
                }
                Err(payload) => {
                    warn!(label = %label, "transfer worker panicked");
                    failures.lock().unwrap().push(Error::Panic {
                        label,
                        message: panic_message(payload),
                        backtrace: Backtrace::force_capture().to_string(),
                    });
                }
            }

            if let Some(bar) = batch_bar {
                bar.add(1);
            }
        });
    }

    // Every started worker is awaited before we return.
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            failures.lock().unwrap().push(Error::Panic {
                label: "transfer worker".to_string(),
                message: err.to_string(),
                backtrace: String::new(),
            });
        }
    }

    if let Some(bar) = batch_bar {
        bar.finish();
    }

    let succeeded = succeeded.load(Ordering::SeqCst);
    let failures = std::mem::take(&mut *failures.lock().unwrap());
    if failures.is_empty() {
        Ok(succeeded)
    } else {
        Err(Error::Batch(BatchError::new(succeeded, total, failures)))
    }
}

async fn run_task(
    remote: &Arc<dyn RemoteSession>,
    task: &TransferTask,
    show_progress: bool,
) -> Result<u64> {
    match task.direction {
        Direction::Upload => {
            copy::upload_file(remote, &task.local_path, &task.remote_path, show_progress).await
        }
        Direction::Download => {
            copy::download_file(remote, &task.remote_path, &task.local_path, show_progress).await
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
