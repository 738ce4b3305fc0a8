//! rsftp-client: the SFTP client proper.
//!
//! Provides:
//! - CLI argument parsing and the `rsftp` binary
//! - SSH/SFTP session establishment (auth, known_hosts, sftp subsystem)
//! - Path resolution for the remote and local namespaces
//! - Time-bounded remote listing cache
//! - Glob expansion, local and remote
//! - The transfer engine: bounded concurrency, progress, error aggregation
//! - Public operations exposed to the interactive shell
//! - The interactive shell and its tab completer

pub mod cli;
pub mod client;
pub mod glob;
pub mod path;
pub mod session;
pub mod shell;
pub mod transfer;

pub use cli::Cli;
pub use client::Client;
pub use session::SshSession;
pub use transfer::{Direction, TransferOptions, TransferTask};
