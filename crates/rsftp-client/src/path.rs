//! Path resolution for the two namespaces.
//!
//! Remote paths always use `/`; local paths use the platform separator.
//! Resolution is pure: the caller supplies the working directory and the
//! home directory, so every function here is trivially testable and
//! idempotent on already-resolved input.

use std::path::{Component, Path, PathBuf};

/// Resolve a user-supplied remote path against the remote CWD.
///
/// Empty input names the CWD, `~` the server-reported home, `~/x` is
/// home-relative, a leading `/` is absolute, anything else is
/// CWD-relative. The result is always absolute and cleaned.
pub fn resolve_remote(cwd: &str, home: &str, input: &str) -> String {
    if input.is_empty() {
        return cwd.to_string();
    }
    if input == "~" {
        return home.to_string();
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return clean_remote(&format!("{home}/{rest}"));
    }
    if input.starts_with('/') {
        return clean_remote(input);
    }
    clean_remote(&format!("{cwd}/{input}"))
}

/// Resolve a user-supplied local path against the local CWD.
///
/// Same grammar as [`resolve_remote`], with the OS home directory and the
/// platform separator. Without a known home directory, `~` degrades to
/// the CWD and `~/x` is treated as relative.
pub fn resolve_local(cwd: &Path, home: Option<&Path>, input: &str) -> PathBuf {
    if input.is_empty() {
        return cwd.to_path_buf();
    }
    if input == "~" {
        return home.map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
    }
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = home {
            return clean_local(&home.join(rest));
        }
    }
    let p = Path::new(input);
    if p.is_absolute() {
        clean_local(p)
    } else {
        clean_local(&cwd.join(p))
    }
}

/// Lexically normalize a remote path: collapse `//`, drop `.`, resolve
/// `..` without consulting the server.
pub fn clean_remote(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|s| *s != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            seg => parts.push(seg),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Lexical normalization for local paths, mirroring [`clean_remote`].
pub fn clean_local(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            comp => out.push(comp.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Join a remote directory and an entry name.
pub fn join_remote(dir: &str, name: &str) -> String {
    clean_remote(&format!("{dir}/{name}"))
}

/// Parent directory of a remote path (`/` stays `/`, bare names yield `.`).
pub fn parent_remote(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => clean_remote(&path[..i]),
        None => ".".to_string(),
    }
}

/// Last element of a remote path.
pub fn base_remote(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
