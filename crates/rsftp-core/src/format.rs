//! Human-readable formatting for listings and transfer summaries.

use std::time::SystemTime;

use chrono::{DateTime, Local};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format a byte count the way `ls` output wants it: `13 B`, `1.21 MB`.
pub fn format_size(size: u64) -> String {
    match size {
        s if s >= TB => format!("{:.2} TB", s as f64 / TB as f64),
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{s} B"),
    }
}

/// `2024-07-01 13:45:09` in local time; `-` when the server sent no mtime.
pub fn format_timestamp(t: Option<SystemTime>) -> String {
    match t {
        Some(t) => DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(13), "13 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * MB + MB / 4), "5.25 MB");
        assert_eq!(format_size(3 * GB), "3.00 GB");
        assert_eq!(format_size(2 * TB), "2.00 TB");
    }

    #[test]
    fn timestamp_none_is_dash() {
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn timestamp_renders_date() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let s = format_timestamp(Some(t));
        // Exact string depends on the local timezone; shape is stable.
        assert_eq!(s.len(), 19);
        assert_eq!(&s[4..5], "-");
        assert_eq!(&s[13..14], ":");
    }
}
