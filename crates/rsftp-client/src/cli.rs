//! Command-line interface for the rsftp binary.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use rsftp_core::config::{load_ssh_config, parse_destination, HostConfig};
use rsftp_core::Result;

/// Interactive SFTP client with concurrent transfers.
#[derive(Parser, Debug)]
#[command(name = "rsftp", version, about)]
pub struct Cli {
    /// Destination: user@host[:port] or an ~/.ssh/config alias
    pub destination: String,

    /// Port to connect to (overrides the config)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// User to log in as (overrides the destination and the config)
    #[arg(short = 'l', long = "login")]
    pub login: Option<String>,

    /// Identity (private key) file
    #[arg(short = 'i', long)]
    pub identity: Option<PathBuf>,

    /// Verbosity: -v warn, -vv info, -vvv debug (default: error)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Resolve the destination into connection parameters: a
    /// `user@host[:port]` string is parsed directly, anything else is
    /// looked up as an ssh config alias. Flags win over both.
    pub fn resolve_host(&self) -> Result<HostConfig> {
        let mut config = if self.destination.contains('@') {
            parse_destination(&self.destination)?
        } else {
            load_ssh_config(&self.destination)?
        };
        config.merge(self.port, self.login.as_deref(), self.identity.as_deref());
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_destination() {
        let cli = Cli::parse_from(["rsftp", "-p", "2200", "-l", "admin", "alice@example.com:22"]);
        let config = cli.resolve_host().unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 2200);
        assert_eq!(config.user.as_deref(), Some("admin"));
    }

    #[test]
    fn plain_destination_parses() {
        let cli = Cli::parse_from(["rsftp", "bob@server:2222"]);
        let config = cli.resolve_host().unwrap();
        assert_eq!(config.host, "server");
        assert_eq!(config.port, 2222);
        assert_eq!(config.user.as_deref(), Some("bob"));
    }

    #[test]
    fn verbose_counts() {
        let cli = Cli::parse_from(["rsftp", "-vvv", "a@b"]);
        assert_eq!(cli.verbose, 3);
    }
}
