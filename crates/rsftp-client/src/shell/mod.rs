//! The interactive shell: readline loop, command dispatch and output
//! formatting.
//!
//! The shell runs synchronously on the main thread and enters the tokio
//! runtime per command; the client itself is fully async. Commands
//! mirror classic sftp, plus local twins prefixed with `l`.

pub mod completer;

use std::sync::Arc;
use std::time::Instant;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::debug;

use rsftp_core::constants::HISTORY_FILE_NAME;
use rsftp_core::format::{format_size, format_timestamp};
use rsftp_core::{Error, RemoteEntry, Result};

use crate::client::Client;
use crate::glob::has_glob_meta;
use crate::path::base_remote;
use crate::transfer::TransferOptions;
use completer::ShellHelper;

/// Interactive command loop bound to one connected client.
pub struct Shell {
    client: Arc<Client>,
    runtime: tokio::runtime::Handle,
}

impl Shell {
    pub fn new(client: Arc<Client>, runtime: tokio::runtime::Handle) -> Self {
        Shell { client, runtime }
    }

    /// Run until `exit` or EOF.
    pub fn run(&mut self) -> Result<()> {
        let config = Config::builder().auto_add_history(false).build();
        let mut rl: Editor<ShellHelper, DefaultHistory> =
            Editor::with_config(config).map_err(|e| Error::Config {
                message: format!("readline init: {e}"),
            })?;
        rl.set_helper(Some(ShellHelper::new(
            Arc::clone(&self.client),
            self.runtime.clone(),
        )));

        let history_path = std::env::temp_dir().join(HISTORY_FILE_NAME);
        let _ = rl.load_history(&history_path);

        loop {
            let prompt = format!("\x1b[32m{}\x1b[0m > ", self.client.getwd());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    match self.execute(line) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("Error: {e}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("Error: {e}");
                    break;
                }
            }
        }

        let _ = rl.save_history(&history_path);
        Ok(())
    }

    /// Dispatch one command line. Returns Ok(true) when the shell should
    /// exit.
    fn execute(&self, line: &str) -> Result<bool> {
        let fields = tokenize(line);
        let Some((cmd, args)) = fields.split_first() else {
            return Ok(false);
        };
        debug!(command = %cmd, "dispatch");

        match cmd.as_str() {
            "help" | "?" => print_help(),
            "exit" | "quit" | "q" => {
                println!("Goodbye!");
                return Ok(true);
            }
            "pwd" => println!("{}", self.client.getwd()),
            "cd" => {
                let dir = args.first().map_or("~", String::as_str);
                self.block_on(self.client.chdir(dir))?;
            }
            "ls" | "ll" | "dir" => self.cmd_ls(args)?,
            "get" | "download" => self.cmd_get(args)?,
            "put" | "upload" => self.cmd_put(args)?,
            "rm" | "del" | "delete" | "rmdir" | "rd" => self.cmd_rm(args)?,
            "mkdir" | "md" => self.cmd_mkdir(args)?,
            "rename" | "mv" => self.cmd_rename(args)?,
            "stat" | "info" => self.cmd_stat(args)?,
            "exec" | "!" => self.cmd_exec(args)?,
            // Local twins
            "lpwd" => println!("{}", self.client.get_local_wd().display()),
            "lcd" => {
                let dir = args.first().map_or("~", String::as_str);
                self.block_on(self.client.local_chdir(dir))?;
            }
            "lls" | "ldir" => self.cmd_lls(args)?,
            "lmkdir" => self.cmd_lmkdir(args)?,
            other => {
                return Err(Error::Usage(format!(
                    "unknown command: {other} (type 'help' for available commands)"
                )))
            }
        }
        Ok(false)
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    // ── Listings ─────────────────────────────────────────────────────

    fn cmd_ls(&self, args: &[String]) -> Result<()> {
        let dir = args.first().map_or("", String::as_str);
        // An explicit ls always shows live contents.
        self.client.clear_dir_cache();
        let entries = self.block_on(self.client.list(dir))?;
        println!("Total: {} items", entries.len());
        print_entries(&entries);
        Ok(())
    }

    fn cmd_lls(&self, args: &[String]) -> Result<()> {
        let dir = args.first().map_or("", String::as_str);
        let entries = self.block_on(self.client.local_list(dir))?;
        println!("Local: {} items", entries.len());
        print_entries(&entries);
        Ok(())
    }

    // ── Transfers ────────────────────────────────────────────────────

    fn cmd_get(&self, args: &[String]) -> Result<()> {
        let (recursive, rest) = split_recursive_flag(args);
        let Some(remote) = rest.first() else {
            return Err(usage("get [-r] <remote_path> [local_path]"));
        };
        let local_owned;
        let local = match rest.get(1) {
            Some(l) => l.as_str(),
            None => {
                local_owned = base_remote(remote).to_string();
                &local_owned
            }
        };

        let started = Instant::now();
        let stat = self.block_on(self.client.stat(remote))?;

        if stat.is_dir() {
            if !recursive {
                return Err(Error::IsADirectory {
                    path: remote.clone(),
                    hint: "get -r".to_string(),
                });
            }
            let opts = TransferOptions::default();
            let count = self.block_on(self.client.download_dir(remote, local, &opts))?;
            println!("✓ Downloaded {count} file(s) in {:.2?}", started.elapsed());
            return Ok(());
        }

        self.block_on(self.client.download(remote, local))?;
        println!(
            "✓ Downloaded: {} in {:.2?}",
            format_size(stat.size),
            started.elapsed()
        );
        Ok(())
    }

    fn cmd_put(&self, args: &[String]) -> Result<()> {
        let (recursive, rest) = split_recursive_flag(args);
        let Some(local) = rest.first() else {
            return Err(usage("put [-r] <local_path|pattern> [remote_path]"));
        };
        let remote = rest.get(1).map_or(".", String::as_str);
        let started = Instant::now();

        if has_glob_meta(local) {
            let opts = TransferOptions {
                recursive,
                ..TransferOptions::default()
            };
            let count = self.block_on(self.client.upload_glob(local, remote, &opts))?;
            println!("✓ Uploaded {count} file(s) in {:.2?}", started.elapsed());
            return Ok(());
        }

        let local_path = self.client.resolve_local(local);
        let meta = std::fs::metadata(&local_path)
            .map_err(|e| Error::local(format!("stat local {}", local_path.display()), e))?;

        if meta.is_dir() {
            if !recursive {
                return Err(Error::IsADirectory {
                    path: local.clone(),
                    hint: "put -r".to_string(),
                });
            }
            let opts = TransferOptions::default();
            let count = self.block_on(self.client.upload_dir(local, remote, &opts))?;
            println!("✓ Uploaded {count} file(s) in {:.2?}", started.elapsed());
            return Ok(());
        }

        self.block_on(self.client.upload(local, remote))?;
        println!(
            "✓ Uploaded successfully ({}) in {:.2?}",
            format_size(meta.len()),
            started.elapsed()
        );
        Ok(())
    }

    // ── Remote mutations ─────────────────────────────────────────────

    fn cmd_rm(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(usage("rm <path>..."));
        }
        for path in args {
            println!("Removing {path} ...");
            self.block_on(self.client.remove(path))?;
        }
        println!("Removed successfully");
        Ok(())
    }

    fn cmd_mkdir(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(usage("mkdir <directory>..."));
        }
        for dir in args {
            self.block_on(self.client.mkdir(dir))?;
            println!("Created: {dir}");
        }
        Ok(())
    }

    fn cmd_rename(&self, args: &[String]) -> Result<()> {
        let [old, new] = args else {
            return Err(usage("rename <old_path> <new_path>"));
        };
        self.block_on(self.client.rename(old, new))?;
        println!("Renamed: {old} -> {new}");
        Ok(())
    }

    fn cmd_stat(&self, args: &[String]) -> Result<()> {
        let Some(path) = args.first() else {
            return Err(usage("stat <path>"));
        };
        let stat = self.block_on(self.client.stat(path))?;
        println!("Path:     {path}");
        println!(
            "Type:     {}",
            if stat.is_dir() { "Directory" } else { "Regular File" }
        );
        println!("Size:     {} ({} bytes)", format_size(stat.size), stat.size);
        println!("Modified: {}", format_timestamp(stat.modified));
        if let Some(perm) = stat.permissions {
            println!("Mode:     {:o}", perm & 0o7777);
        }
        Ok(())
    }

    fn cmd_exec(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(usage("exec <command>"));
        }
        let command = args.join(" ");
        let status = self.block_on(async {
            let mut stdout = tokio::io::stdout();
            let mut stderr = tokio::io::stderr();
            self.client
                .execute_remote(&command, None, &mut stdout, &mut stderr)
                .await
        })?;
        if status != 0 {
            eprintln!("(exit status {status})");
        }
        Ok(())
    }

    // ── Local mutations ──────────────────────────────────────────────

    fn cmd_lmkdir(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(usage("lmkdir <directory>..."));
        }
        for dir in args {
            self.block_on(self.client.local_mkdir(dir))?;
            println!("Created local: {dir}");
        }
        Ok(())
    }
}

fn usage(text: &str) -> Error {
    Error::Usage(format!("usage: {text}"))
}

fn split_recursive_flag(args: &[String]) -> (bool, &[String]) {
    match args.first() {
        Some(flag) if flag == "-r" => (true, &args[1..]),
        _ => (false, args),
    }
}

fn print_entries(entries: &[RemoteEntry]) {
    for entry in entries {
        let type_char = if entry.stat.is_dir() { "d" } else { "-" };
        println!(
            "{} {:>10}  {}  {}",
            type_char,
            format_size(entry.stat.size),
            format_timestamp(entry.stat.modified),
            entry.name
        );
    }
}

/// Split a command line into fields, honoring single/double quotes and
/// backslash escapes of quotes and backslashes.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => match quote {
                None => quote = Some(c),
                Some(q) if q == c => quote = None,
                Some(_) => current.push(c),
            },
            ' ' | '\t' if quote.is_none() => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            '\\' => match chars.peek() {
                Some(&next) if next == '"' || next == '\'' || next == '\\' => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

fn print_help() {
    println!(
        r#"
Available commands:
  Remote Navigation:
    pwd                    Print remote working directory
    cd <dir>               Change remote directory
    ls [dir]               List remote directory contents
    ll [dir]               List with details (alias of ls)

  Local Navigation:
    lpwd                   Print local working directory
    lcd <dir>              Change local directory
    lls [dir]              List local directory contents
    lmkdir <dir>           Create local directory

  File Transfer:
    get [-r] <remote> [local]          Download file or directory
    put [-r] <local|pattern> [remote]  Upload file(s) or directory

    Options:
      -r                   Recursive mode for directories

    Examples:
      put file.txt                   Upload single file
      put *.log logs/                Upload all .log files
      put **/*.go code/              Upload all .go files recursively
      put -r mydir remotedir/        Upload entire directory
      get -r remotedir localdir/     Download entire directory

  Remote File Operations:
    rm <path>              Remove file or directory
    mkdir <dir>            Create directory
    rmdir <dir>            Remove directory
    rename <old> <new>     Rename file or directory
    stat <path>            Show file information
    exec <command>         Run a command on the server

  Other:
    help                   Show this help
    exit/quit/q            Exit program

Tips:
  - Use TAB for auto-completion; directories end with /
  - Paths can be absolute (/path), relative (./path) or ~-prefixed
  - Use quotes for paths with spaces: "my folder/file.txt"
  - Use glob patterns for batch operations: *.txt, **/*.go
  - Batch transfers run up to 4 files in parallel
"#
    );
}
