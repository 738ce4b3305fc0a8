//! Tab completion for the shell: command names, then remote or local
//! paths depending on the command being typed.

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::client::Client;

const COMMANDS: &[&str] = &[
    "help", "exit", "quit", "q", "ls", "ll", "dir", "cd", "pwd", "get", "download", "put",
    "upload", "rm", "del", "delete", "mkdir", "md", "rmdir", "rd", "rename", "mv", "stat", "info",
    "exec", "lpwd", "lcd", "lls", "ldir", "lmkdir",
];

/// Commands whose argument is a local path; everything else path-like
/// completes against the remote tree.
const LOCAL_ARG_COMMANDS: &[&str] = &["put", "upload", "lcd", "lls", "ldir", "lmkdir"];

pub struct ShellHelper {
    client: Arc<Client>,
    runtime: tokio::runtime::Handle,
}

impl ShellHelper {
    pub fn new(client: Arc<Client>, runtime: tokio::runtime::Handle) -> Self {
        ShellHelper { client, runtime }
    }

    fn complete_command(&self, prefix: &str) -> Vec<Pair> {
        COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: format!("{cmd} "),
            })
            .collect()
    }

    fn complete_remote(&self, token: &str) -> Vec<Pair> {
        let candidates = self
            .runtime
            .block_on(self.client.list_completion(token));
        candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect()
    }

    /// Local names match case-insensitively, the way most interactive
    /// shells behave on desktop filesystems.
    fn complete_local(&self, token: &str) -> Vec<Pair> {
        let (user_dir, partial) = match token.rfind('/') {
            Some(i) => (&token[..=i], &token[i + 1..]),
            None => ("", token),
        };
        let search_dir = self.client.resolve_local(user_dir);
        let Ok(read_dir) = std::fs::read_dir(&search_dir) else {
            return Vec::new();
        };

        let partial_lower = partial.to_lowercase();
        let mut out = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().starts_with(&partial_lower) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let mut candidate = format!("{user_dir}{name}");
            if is_dir {
                candidate.push('/');
            }
            out.push(Pair {
                display: candidate.clone(),
                replacement: candidate,
            });
        }
        out.sort_by(|a, b| a.display.cmp(&b.display));
        out
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let text = &line[..pos];
        let start = text.rfind([' ', '\t']).map_or(0, |i| i + 1);
        let token = &text[start..];

        if start == 0 {
            return Ok((0, self.complete_command(token)));
        }

        let command = text.split_whitespace().next().unwrap_or("");
        let candidates = if LOCAL_ARG_COMMANDS.contains(&command) {
            self.complete_local(token)
        } else {
            self.complete_remote(token)
        };
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}
