//! SSH transport: connection, host-key verification, authentication and
//! the SFTP subsystem.
//!
//! `SshSession` is the production implementation of the remote-session
//! interface. Host keys are verified against `~/.ssh/known_hosts`;
//! unknown hosts fall back to an interactive fingerprint prompt, a
//! mismatch is a hard failure. Authentication tries the configured (or
//! default) identity files, then an interactively prompted password.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use rsftp_core::config::{find_default_keys, HostConfig};
use rsftp_core::{
    Error, FileKind, FileStat, RemoteEntry, RemoteReader, RemoteSession, RemoteWriter, Result,
};

/// Records why host-key verification failed, so the connect error can be
/// more specific than "connection rejected".
type VerifyOutcome = Arc<Mutex<Option<Error>>>;

struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: PathBuf,
    outcome: VerifyOutcome,
}

impl ClientHandler {
    fn prompt_unknown_host(&self, key: &PublicKey) -> bool {
        eprintln!(
            "\nThe authenticity of host '{}' can't be established.",
            self.host
        );
        eprintln!("{} key fingerprint is SHA256:{}.", key.name(), key.fingerprint());
        eprint!("Are you sure you want to continue connecting (yes/no)? ");
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("yes")
    }

    fn record(&self, err: Error) {
        *self.outcome.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        match russh_keys::check_known_hosts_path(&self.host, self.port, key, &self.known_hosts) {
            Ok(true) => Ok(true),
            Ok(false) => {
                if self.prompt_unknown_host(key) {
                    if let Err(e) = russh_keys::learn_known_hosts_path(
                        &self.host,
                        self.port,
                        key,
                        &self.known_hosts,
                    ) {
                        warn!(error = %e, "failed to record host key");
                    } else {
                        eprintln!(
                            "Warning: Permanently added '{}' ({}) to the list of known hosts.",
                            self.host,
                            key.name()
                        );
                    }
                    Ok(true)
                } else {
                    self.record(Error::HostKeyRejected {
                        host: self.host.clone(),
                    });
                    Ok(false)
                }
            }
            Err(russh_keys::Error::KeyChanged { line }) => {
                warn!(line, host = %self.host, "host key mismatch");
                self.record(Error::HostKeyChanged {
                    host: self.host.clone(),
                });
                Ok(false)
            }
            Err(e) => {
                self.record(Error::remote("read known_hosts", e));
                Ok(false)
            }
        }
    }
}

/// An authenticated SSH connection with its SFTP channel.
pub struct SshSession {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

impl SshSession {
    /// Dial, verify the host key, authenticate and start the `sftp`
    /// subsystem.
    pub async fn connect(config: &HostConfig) -> Result<SshSession> {
        config.validate()?;
        let user = config.user.clone().unwrap_or_default();
        let outcome: VerifyOutcome = Arc::new(Mutex::new(None));

        let handler = ClientHandler {
            host: config.host.clone(),
            port: config.port,
            known_hosts: known_hosts_path()?,
            outcome: Arc::clone(&outcome),
        };

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        });

        info!(host = %config.host, port = config.port, user = %user, "connecting");
        let mut handle = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| {
                // Surface the recorded verification failure when that is
                // what actually killed the connect.
                outcome.lock().unwrap().take().unwrap_or_else(|| {
                    Error::remote(format!("connect {}:{}", config.host, config.port), e)
                })
            })?;

        authenticate(&mut handle, &user, config).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::remote("open sftp channel", e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::remote("request sftp subsystem", e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::remote("sftp handshake", e))?;

        info!("sftp session established");
        Ok(SshSession { handle, sftp })
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    config: &HostConfig,
) -> Result<()> {
    let identities = match &config.identity_file {
        Some(path) => vec![path.clone()],
        None => find_default_keys(),
    };

    for key_path in &identities {
        let key = match russh_keys::load_secret_key(key_path, None) {
            Ok(key) => key,
            Err(e) => {
                debug!(path = %key_path.display(), error = %e, "skipping unreadable key");
                continue;
            }
        };
        match handle.authenticate_publickey(user, Arc::new(key)).await {
            Ok(true) => {
                info!(path = %key_path.display(), "public key accepted");
                return Ok(());
            }
            Ok(false) => debug!(path = %key_path.display(), "public key rejected"),
            Err(e) => return Err(Error::remote("authenticate", e)),
        }
    }

    // Fall back to a password prompt.
    let password = rpassword::prompt_password(format!("{user}@{}'s password: ", config.host))
        .map_err(|e| Error::local("read password", e))?;
    match handle.authenticate_password(user, &password).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::Auth {
            user: user.to_string(),
            host: config.host.clone(),
        }),
        Err(e) => Err(Error::remote("authenticate", e)),
    }
}

/// `~/.ssh/known_hosts`, created (with its directory) when absent.
fn known_hosts_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| Error::Config {
        message: "cannot determine home directory".into(),
    })?;
    let dir = home.join(".ssh");
    if !dir.is_dir() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::local(format!("create {}", dir.display()), e))?;
    }
    let path = dir.join("known_hosts");
    if !path.is_file() {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::local(format!("create {}", path.display()), e))?;
    }
    Ok(path)
}

// File-type bits of the permissions word, per SFTP v3 (same as POSIX).
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

fn stat_from_attrs(attrs: &FileAttributes) -> FileStat {
    let kind = if attrs.is_dir() {
        FileKind::Dir
    } else if attrs.permissions.is_some_and(|p| p & S_IFMT == S_IFLNK) {
        FileKind::Symlink
    } else {
        FileKind::File
    };
    FileStat {
        kind,
        size: attrs.size.unwrap_or(0),
        modified: attrs
            .mtime
            .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(secs))),
        permissions: attrs.permissions,
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn canonical_home(&self) -> Result<String> {
        self.sftp
            .canonicalize(".")
            .await
            .map_err(|e| Error::remote("canonicalize remote cwd", e))
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let attrs = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| Error::remote(format!("stat remote {path}"), e))?;
        Ok(stat_from_attrs(&attrs))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| Error::remote(format!("read remote dir {path}"), e))?;
        Ok(entries
            .into_iter()
            .filter(|e| e.file_name() != "." && e.file_name() != "..")
            .map(|e| {
                let stat = stat_from_attrs(&e.metadata());
                RemoteEntry {
                    name: e.file_name(),
                    stat,
                }
            })
            .collect())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.sftp
            .create_dir(path)
            .await
            .map_err(|e| Error::remote(format!("mkdir remote {path}"), e))
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        self.sftp
            .remove_dir(path)
            .await
            .map_err(|e| Error::remote(format!("rmdir remote {path}"), e))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| Error::remote(format!("remove remote {path}"), e))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.sftp
            .rename(from, to)
            .await
            .map_err(|e| Error::remote(format!("rename remote {from}"), e))
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader> {
        let file = self
            .sftp
            .open(path)
            .await
            .map_err(|e| Error::remote(format!("open remote {path}"), e))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter> {
        let file = self
            .sftp
            .create(path)
            .await
            .map_err(|e| Error::remote(format!("create remote {path}"), e))?;
        Ok(Box::new(file))
    }

    async fn exec(
        &self,
        command: &str,
        stdin: Option<&mut (dyn AsyncRead + Send + Unpin)>,
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::remote("open exec channel", e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::remote("exec request", e))?;

        if let Some(stdin) = stdin {
            channel
                .data(stdin)
                .await
                .map_err(|e| Error::remote("send exec stdin", e))?;
            channel
                .eof()
                .await
                .map_err(|e| Error::remote("close exec stdin", e))?;
        }

        let mut status = 0;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    stdout
                        .write_all(data)
                        .await
                        .map_err(|e| Error::local("write exec stdout", e))?;
                }
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    stderr
                        .write_all(data)
                        .await
                        .map_err(|e| Error::local("write exec stderr", e))?;
                }
                ChannelMsg::ExitStatus { exit_status } => status = exit_status,
                _ => {}
            }
        }
        stdout
            .flush()
            .await
            .map_err(|e| Error::local("flush exec stdout", e))?;
        Ok(status)
    }

    async fn close(&self) -> Result<()> {
        // SFTP channel first, then the SSH connection.
        if let Err(e) = self.sftp.close().await {
            warn!(error = %e, "sftp close failed");
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| Error::remote("disconnect", e))
    }
}
