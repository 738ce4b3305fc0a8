//! Configuration constants shared across the client.

use std::time::Duration;

/// Copy-loop buffer size (512 KiB).
pub const BUFFER_SIZE: usize = 512 * 1024;

/// Default number of parallel transfers in a batch.
pub const MAX_CONCURRENT_TRANSFERS: usize = 4;

/// How long a cached remote directory listing stays fresh.
pub const DIR_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default SSH port when neither the destination nor the config names one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Basename of the shell history file, created under the OS temp dir.
pub const HISTORY_FILE_NAME: &str = "rsftp-history";
