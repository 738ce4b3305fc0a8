//! Shell-style glob expansion for both namespaces.
//!
//! `*`, `?` and `[…]` match within a path segment; `**` matches across
//! any number of segments. The local flavor runs on the caller's
//! filesystem; the remote flavor is implemented client-side because SFTP
//! has no server-side glob.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use rsftp_core::{RemoteSession, Result};

use crate::path::join_remote;

/// Does this string contain glob metacharacters?
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', ']'])
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Expand a pattern on the local filesystem. A relative pattern is
/// joined with the local working directory first. Unreadable entries are
/// skipped; a malformed pattern is an error.
pub fn glob_local(cwd: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        cwd.join(pattern).to_string_lossy().into_owned()
    };
    let paths = glob::glob_with(&full, match_options())?;
    Ok(paths.filter_map(|entry| entry.ok()).collect())
}

/// Expand a pattern against the remote tree.
///
/// The literal prefix before the first metacharacter segment is the walk
/// root; the walk descends into subdirectories only when the pattern
/// contains `**`. Unreadable directories are swallowed (they cannot
/// match anyway).
pub async fn glob_remote(remote: &Arc<dyn RemoteSession>, pattern: &str) -> Result<Vec<String>> {
    let compiled = Pattern::new(pattern)?;
    let recursive = pattern.contains("**");
    let options = match_options();

    let mut matches = Vec::new();
    let mut stack = vec![literal_base(pattern)];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = remote.read_dir(&dir).await else {
            continue;
        };
        for entry in entries {
            let full = join_remote(&dir, &entry.name);
            if compiled.matches_with(&full, options) {
                matches.push(full.clone());
            }
            if entry.stat.is_dir() && recursive {
                stack.push(full);
            }
        }
    }
    matches.sort();
    Ok(matches)
}

/// Everything before the first pattern segment containing a
/// metacharacter; `/` when the pattern leads with one.
fn literal_base(pattern: &str) -> String {
    let parts: Vec<&str> = pattern.split('/').collect();
    let meta_idx = parts.iter().position(|p| has_glob_meta(p)).unwrap_or(0);
    if meta_idx == 0 {
        return "/".to_string();
    }
    let base = parts[..meta_idx].join("/");
    if base.is_empty() {
        "/".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsftp_test_utils::MockRemoteSession;

    #[test]
    fn meta_detection() {
        assert!(has_glob_meta("*.log"));
        assert!(has_glob_meta("file?.txt"));
        assert!(has_glob_meta("[ab].txt"));
        assert!(!has_glob_meta("plain/path.txt"));
    }

    #[test]
    fn literal_base_extraction() {
        assert_eq!(literal_base("/logs/app-*.log"), "/logs");
        assert_eq!(literal_base("/srv/**/*.go"), "/srv");
        assert_eq!(literal_base("/*.log"), "/");
        assert_eq!(literal_base("/a/b/c-?.txt"), "/a/b");
    }

    #[test]
    fn star_stays_within_a_segment() {
        let opts = match_options();
        let p = Pattern::new("/logs/app-*.log").unwrap();
        assert!(p.matches_with("/logs/app-1.log", opts));
        assert!(!p.matches_with("/logs/old/app-0.log", opts));
    }

    #[test]
    fn double_star_spans_segments() {
        let opts = match_options();
        let p = Pattern::new("/src/**/*.go").unwrap();
        assert!(p.matches_with("/src/a/b/main.go", opts));
        assert!(p.matches_with("/src/main.go", opts));
        assert!(!p.matches_with("/other/main.go", opts));
    }

    #[tokio::test]
    async fn remote_flat_glob() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_file("/logs/app-1.log", b"1");
        mock.add_file("/logs/app-2.log", b"2");
        mock.add_file("/logs/other.txt", b"x");
        mock.add_file("/logs/old/app-0.log", b"0");
        let remote: Arc<dyn RemoteSession> = Arc::new(mock);

        let matches = glob_remote(&remote, "/logs/app-*.log").await.unwrap();
        assert_eq!(matches, vec!["/logs/app-1.log", "/logs/app-2.log"]);
    }

    #[tokio::test]
    async fn remote_recursive_glob() {
        let mock = MockRemoteSession::new("/home/me");
        mock.add_file("/src/main.go", b"m");
        mock.add_file("/src/pkg/a/util.go", b"u");
        mock.add_file("/src/pkg/readme.md", b"r");
        let remote: Arc<dyn RemoteSession> = Arc::new(mock);

        let matches = glob_remote(&remote, "/src/**/*.go").await.unwrap();
        assert_eq!(matches, vec!["/src/main.go", "/src/pkg/a/util.go"]);
    }

    #[tokio::test]
    async fn remote_glob_bad_pattern_is_surfaced() {
        let mock = MockRemoteSession::new("/home/me");
        let remote: Arc<dyn RemoteSession> = Arc::new(mock);
        assert!(glob_remote(&remote, "/logs/[").await.is_err());
    }

    #[tokio::test]
    async fn remote_glob_missing_base_is_empty() {
        let mock = MockRemoteSession::new("/home/me");
        let remote: Arc<dyn RemoteSession> = Arc::new(mock);
        let matches = glob_remote(&remote, "/absent/*.log").await.unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn local_glob_expands_relative_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("x.log"), b"x").unwrap();
        std::fs::write(tmp.path().join("y.log"), b"y").unwrap();
        std::fs::write(tmp.path().join("z.txt"), b"z").unwrap();

        let mut matches = glob_local(tmp.path(), "*.log").unwrap();
        matches.sort();
        assert_eq!(
            matches,
            vec![tmp.path().join("x.log"), tmp.path().join("y.log")]
        );
    }

    #[test]
    fn local_glob_bad_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(glob_local(tmp.path(), "[").is_err());
    }
}
