//! Tracing setup for the client binary.
//!
//! Verbosity maps from repeated `-v` flags; `RUST_LOG` overrides the
//! computed filter. Logs go to stderr so they never interleave with
//! progress bars on stdout redirects, or to a file when requested.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{Error, Result};

/// Initialize the logging system.
///
/// `verbosity`: 0=error, 1=warn, 2=info, 3=debug, 4+=trace.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rsftp={level},rsftp_core={level},rsftp_client={level}"
        ))
    });

    match log_file {
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()
            .map_err(|e| Error::Config {
                message: format!("logging init: {e}"),
            })?,
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::local(format!("open log file {}", path.display()), e))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
                .map_err(|e| Error::Config {
                    message: format!("logging init: {e}"),
                })?;
        }
    }

    Ok(())
}
