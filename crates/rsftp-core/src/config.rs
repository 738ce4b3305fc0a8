//! SSH destination and `~/.ssh/config` handling.
//!
//! Resolves what the user typed on the command line into a concrete
//! `HostConfig`: either a `user@host[:port]` destination string or an
//! alias looked up in the OpenSSH client config.

use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_SSH_PORT;
use crate::{Error, Result};

/// Connection parameters resolved from the CLI and the ssh config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
}

impl HostConfig {
    /// Override fields from command-line flags; flags win over the config.
    pub fn merge(&mut self, port: Option<u16>, user: Option<&str>, identity: Option<&Path>) {
        if let Some(p) = port {
            self.port = p;
        }
        if let Some(u) = user {
            self.user = Some(u.to_string());
        }
        if let Some(i) = identity {
            self.identity_file = Some(i.to_path_buf());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config {
                message: "host is required".into(),
            });
        }
        if self.user.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Config {
                message: "user is required".into(),
            });
        }
        Ok(())
    }

    /// `user@host` for log and prompt output.
    pub fn display_target(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// Parse a `user@host[:port]` destination, including bracketed IPv6
/// literals such as `user@[2001:db8::1]:2222`.
pub fn parse_destination(dest: &str) -> Result<HostConfig> {
    if dest.is_empty() {
        return Err(Error::Config {
            message: "destination is empty".into(),
        });
    }

    let (user, host_part) = match dest.split_once('@') {
        Some((user, rest)) if !user.is_empty() && !rest.is_empty() => (Some(user), rest),
        _ => (None, dest),
    };

    let (host, port) = split_host_port(host_part)?;

    Ok(HostConfig {
        host: host.to_string(),
        port: port.unwrap_or(DEFAULT_SSH_PORT),
        user: user.map(str::to_string),
        identity_file: None,
    })
}

fn split_host_port(host_part: &str) -> Result<(&str, Option<u16>)> {
    // Bracketed IPv6: [::1] or [::1]:2222
    if let Some(rest) = host_part.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(Error::Config {
                message: format!("unclosed '[' in destination: {host_part}"),
            });
        };
        let port = match after.strip_prefix(':') {
            Some(p) => Some(parse_port(p)?),
            None if after.is_empty() => None,
            None => {
                return Err(Error::Config {
                    message: format!("trailing garbage after ']': {host_part}"),
                })
            }
        };
        return Ok((host, port));
    }

    // Unbracketed IPv6 literals have multiple colons and no port.
    if host_part.matches(':').count() > 1 {
        return Ok((host_part, None));
    }

    match host_part.split_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((host_part, None)),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse().map_err(|_| Error::Config {
        message: format!("invalid port number: {s}"),
    })
}

/// Look an alias up in the OpenSSH client config.
///
/// Understands the subset the original tool needs: `Host` blocks with
/// glob patterns, `HostName`, `Port`, `User` and `IdentityFile`. The
/// first match wins for each key, as in OpenSSH.
pub fn load_ssh_config(alias: &str) -> Result<HostConfig> {
    let path = ssh_config_path().ok_or_else(|| Error::Config {
        message: "SSH config file not found".into(),
    })?;
    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::local(format!("open config {}", path.display()), e))?;
    Ok(parse_ssh_config(&text, alias))
}

/// `$SSH_CONFIG` override, then `~/.ssh/config`.
fn ssh_config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SSH_CONFIG") {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    let p = dirs::home_dir()?.join(".ssh").join("config");
    p.is_file().then_some(p)
}

fn parse_ssh_config(text: &str, alias: &str) -> HostConfig {
    let mut config = HostConfig {
        host: alias.to_string(),
        port: 0,
        user: None,
        identity_file: None,
    };
    let mut in_matching_block = false;
    let mut hostname_set = false;

    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match split_keyword(line) {
            Some(kv) => kv,
            None => continue,
        };

        if key.eq_ignore_ascii_case("host") {
            in_matching_block = value.split_whitespace().any(|pat| pattern_match(pat, alias));
            continue;
        }
        if !in_matching_block {
            continue;
        }

        if key.eq_ignore_ascii_case("hostname") && !hostname_set {
            config.host = value.to_string();
            hostname_set = true;
        } else if key.eq_ignore_ascii_case("port") && config.port == 0 {
            config.port = value.parse().unwrap_or(0);
        } else if key.eq_ignore_ascii_case("user") && config.user.is_none() {
            config.user = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("identityfile") && config.identity_file.is_none() {
            config.identity_file = Some(expand_tilde(value));
        }
    }

    if config.port == 0 {
        config.port = DEFAULT_SSH_PORT;
    }
    config
}

/// `Key Value` or `Key=Value`, per ssh_config(5).
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c: char| c == '=' || c.is_whitespace())?;
    let key = &line[..idx];
    let value = line[idx + 1..].trim().trim_matches('"');
    (!value.is_empty()).then_some((key, value))
}

/// Minimal `Host` pattern matching: `*` and `?` wildcards.
fn pattern_match(pattern: &str, name: &str) -> bool {
    fn inner(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], n) || (!n.is_empty() && inner(p, &n[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &n[1..]),
            (Some(a), Some(b)) if a == b => inner(&p[1..], &n[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), name.as_bytes())
}

/// Expand a leading `~` against the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Default private keys to try, in preference order, filtered to those
/// that exist on disk.
pub fn find_default_keys() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let ssh_dir = home.join(".ssh");
    ["id_ed25519", "id_rsa", "id_ecdsa", "id_dsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .filter(|p| p.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_user_host() {
        let c = parse_destination("alice@example.com").unwrap();
        assert_eq!(c.user.as_deref(), Some("alice"));
        assert_eq!(c.host, "example.com");
        assert_eq!(c.port, 22);
    }

    #[test]
    fn destination_with_port() {
        let c = parse_destination("alice@example.com:2222").unwrap();
        assert_eq!(c.port, 2222);
    }

    #[test]
    fn destination_ipv6_bracketed() {
        let c = parse_destination("root@[2001:db8::1]:2200").unwrap();
        assert_eq!(c.host, "2001:db8::1");
        assert_eq!(c.port, 2200);

        let c = parse_destination("root@[2001:db8::1]").unwrap();
        assert_eq!(c.host, "2001:db8::1");
        assert_eq!(c.port, 22);
    }

    #[test]
    fn destination_ipv6_bare() {
        let c = parse_destination("root@2001:db8::1").unwrap();
        assert_eq!(c.host, "2001:db8::1");
        assert_eq!(c.port, 22);
    }

    #[test]
    fn destination_bad_port() {
        assert!(parse_destination("a@b:notaport").is_err());
        assert!(parse_destination("").is_err());
    }

    #[test]
    fn destination_without_user() {
        let c = parse_destination("example.com:2222").unwrap();
        assert_eq!(c.user, None);
        assert_eq!(c.host, "example.com");
        assert_eq!(c.port, 2222);
    }

    #[test]
    fn validate_requires_user_and_host() {
        let mut c = parse_destination("example.com").unwrap();
        assert!(c.validate().is_err());
        c.user = Some("bob".into());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn ssh_config_block_lookup() {
        let text = "\
# comment
Host other
    HostName other.example.com

Host dev staging-*
    HostName dev.internal
    Port 2022
    User deploy
    IdentityFile ~/.ssh/id_deploy
";
        let c = parse_ssh_config(text, "dev");
        assert_eq!(c.host, "dev.internal");
        assert_eq!(c.port, 2022);
        assert_eq!(c.user.as_deref(), Some("deploy"));
        assert!(c.identity_file.is_some());

        // Wildcard pattern in the same block
        let c = parse_ssh_config(text, "staging-7");
        assert_eq!(c.host, "dev.internal");

        // Unknown alias: falls back to the alias as the host name
        let c = parse_ssh_config(text, "nowhere");
        assert_eq!(c.host, "nowhere");
        assert_eq!(c.port, 22);
        assert_eq!(c.user, None);
    }

    #[test]
    fn ssh_config_first_match_wins() {
        let text = "\
Host box
    Port 2022
Host *
    Port 9999
    User fallback
";
        let c = parse_ssh_config(text, "box");
        assert_eq!(c.port, 2022);
        // User only appears in the catch-all block
        assert_eq!(c.user.as_deref(), Some("fallback"));
    }

    #[test]
    fn host_pattern_wildcards() {
        assert!(pattern_match("*", "anything"));
        assert!(pattern_match("web-*", "web-01"));
        assert!(pattern_match("db?", "db1"));
        assert!(!pattern_match("db?", "db12"));
        assert!(!pattern_match("web-*", "db-01"));
    }
}
