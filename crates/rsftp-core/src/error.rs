//! Error types for rsftp.
//!
//! Single-file operations fail with one contextualized error; batch
//! operations aggregate every per-task failure into a [`BatchError`] so the
//! shell can report a `succeeded/total` tally with per-file causes.

use std::fmt;

use thiserror::Error;

/// Main error type for rsftp operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local filesystem failure, wrapped with operation context
    /// (e.g. `open local /tmp/a.txt`).
    #[error("{context}: {source}")]
    Local {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// SSH/SFTP layer failure, wrapped with operation context
    /// (e.g. `open remote /srv/a.txt`).
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A path that must name a directory does not.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// A directory was named where a file operation was requested.
    #[error("{path} is a directory (use '{hint}')")]
    IsADirectory { path: String, hint: String },

    /// A glob pattern expanded to nothing.
    #[error("no files match pattern: {pattern}")]
    NoMatches { pattern: String },

    /// An expansion produced matches but none of them were transferable.
    #[error("no files to transfer in {what}")]
    NoFiles { what: String },

    /// Malformed glob pattern.
    #[error("glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Destination string or ssh config problem.
    #[error("config error: {message}")]
    Config { message: String },

    /// Bad interactive command invocation; the message is shown as-is.
    #[error("{0}")]
    Usage(String),

    /// Every authentication method was rejected.
    #[error("authentication failed for {user}@{host}")]
    Auth { user: String, host: String },

    /// The server presented a key that differs from the recorded one.
    #[error("host key for {host} changed; possible man-in-the-middle attack")]
    HostKeyChanged { host: String },

    /// The user declined to trust an unknown host key.
    #[error("host key verification failed: key for {host} rejected")]
    HostKeyRejected { host: String },

    /// Remote command execution failure outside the SFTP channel.
    #[error("remote command: {message}")]
    Exec { message: String },

    /// One transfer's failure, tagged with its direction and path.
    #[error("{label}: {source}")]
    Task {
        label: String,
        #[source]
        source: Box<Error>,
    },

    /// A worker panic captured at the engine boundary.
    #[error("panic during transfer {label}: {message}\n{backtrace}")]
    Panic {
        label: String,
        message: String,
        backtrace: String,
    },

    /// Aggregated batch failure; carries the exact success count.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl Error {
    /// Wrap a local I/O error with operation context.
    pub fn local(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Local {
            context: context.into(),
            source,
        }
    }

    /// Wrap a transport-layer error with operation context.
    pub fn remote(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Remote {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Tag a transfer failure with its task label (`upload /a/b.txt`).
    pub fn task(label: impl Into<String>, source: Error) -> Self {
        Error::Task {
            label: label.into(),
            source: Box::new(source),
        }
    }

    /// Returns true for failures that should terminate the whole session
    /// with a nonzero exit code (connect, auth, host key). Per-operation
    /// errors are reported by the shell and the session continues.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Auth { .. }
                | Error::HostKeyChanged { .. }
                | Error::HostKeyRejected { .. }
                | Error::Config { .. }
        )
    }
}

/// Aggregate of per-task failures from one transfer batch.
///
/// Preserves every underlying error (and its wrap chain) and the exact
/// number of tasks that succeeded.
#[derive(Debug)]
pub struct BatchError {
    succeeded: usize,
    total: usize,
    failures: Vec<Error>,
}

impl BatchError {
    pub fn new(succeeded: usize, total: usize, failures: Vec<Error>) -> Self {
        BatchError {
            succeeded,
            total,
            failures,
        }
    }

    /// Tasks that completed without error.
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Tasks in the batch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Every recorded failure, in completion order.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} transfers failed",
            self.total - self.succeeded,
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Convenience result type for rsftp operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(path: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, format!("{path}: not found"))
    }

    #[test]
    fn local_error_carries_context() {
        let err = Error::local("open local /tmp/a.txt", not_found("/tmp/a.txt"));
        assert_eq!(
            err.to_string(),
            "open local /tmp/a.txt: /tmp/a.txt: not found"
        );
    }

    #[test]
    fn task_error_wraps_source() {
        let inner = Error::local("open local file2", not_found("file2"));
        let err = Error::task("upload /r/file2", inner);
        let msg = err.to_string();
        assert!(msg.starts_with("upload /r/file2:"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn batch_error_mentions_every_failure() {
        let failures = vec![
            Error::task("upload a", Error::local("open", not_found("a"))),
            Error::task("upload b", Error::local("open", not_found("b"))),
        ];
        let batch = BatchError::new(3, 5, failures);
        assert_eq!(batch.succeeded(), 3);
        assert_eq!(batch.total(), 5);
        let msg = batch.to_string();
        assert!(msg.contains("2 of 5 transfers failed"));
        assert!(msg.contains("upload a"));
        assert!(msg.contains("upload b"));
    }

    #[test]
    fn session_fatal_classification() {
        assert!(Error::Auth {
            user: "u".into(),
            host: "h".into()
        }
        .is_session_fatal());
        assert!(Error::HostKeyRejected { host: "h".into() }.is_session_fatal());
        assert!(!Error::NotADirectory { path: "/x".into() }.is_session_fatal());
        assert!(!Error::local("open", not_found("x")).is_session_fatal());
    }
}
