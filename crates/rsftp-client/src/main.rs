//! rsftp binary entry point.
//!
//! Interactive SFTP client: connect, then hand control to the shell.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use rsftp_client::client::Client;
use rsftp_client::session::SshSession;
use rsftp_client::shell::Shell;
use rsftp_client::Cli;
use rsftp_core::RemoteSession;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = rsftp_core::init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("rsftp: failed to initialize logging: {e}");
        std::process::exit(1);
    }
    info!(version = env!("CARGO_PKG_VERSION"), "rsftp starting");

    let host_config = match cli.resolve_host() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rsftp: {e}");
            std::process::exit(1);
        }
    };

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    println!("Connecting to {}...", host_config.display_target());
    let session = match rt.block_on(SshSession::connect(&host_config)) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "connection failed");
            eprintln!("rsftp: {e}");
            std::process::exit(if e.is_session_fatal() { 2 } else { 1 });
        }
    };

    let remote: Arc<dyn RemoteSession> = Arc::new(session);
    let client = Arc::new(rt.block_on(Client::new(remote)));

    println!("✓ Connected successfully!");
    println!("Type 'help' for available commands, 'exit' to quit.");
    println!();

    let mut shell = Shell::new(Arc::clone(&client), rt.handle().clone());
    let result = shell.run();

    if let Err(e) = rt.block_on(client.close()) {
        error!(error = %e, "session teardown failed");
    }

    if let Err(e) = result {
        eprintln!("rsftp: {e}");
        std::process::exit(1);
    }
}
