//! rsftp-core: shared foundation for the rsftp client.
//!
//! Provides:
//! - Error types with operation context and batch aggregation
//! - The remote-session interface the transfer engine is written against
//! - SSH destination / `~/.ssh/config` parsing
//! - Tracing setup
//! - Size and timestamp formatting for directory listings

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod logging;
pub mod remote;

pub use error::{BatchError, Error, Result};
pub use logging::init_logging;
pub use remote::{FileKind, FileStat, RemoteEntry, RemoteReader, RemoteSession, RemoteWriter};
