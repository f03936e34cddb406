//! The narrow interface the engine uses to talk to git.
//!
//! [`Gateway`] is the seam: every component above it (range resolution,
//! duplicate detection, execution) only ever sees this trait, which keeps
//! them testable against an in-memory stub. [`GitCli`] is the production
//! implementation and shells out to the `git` binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::Commit;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    /// Return stdout, or an error carrying stderr if the command failed.
    pub fn into_checked(self, args: &[&str]) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(Error::git_msg(format!(
                "git {} failed: {}",
                args.join(" "),
                self.stderr.trim()
            )))
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        }
    }
}

/// Version-control primitives consumed by the engine.
///
/// Only [`run`](Gateway::run) and [`pipe`](Gateway::pipe) are required; the
/// remaining methods have default implementations built on them.
pub trait Gateway {
    /// Run `git <args>`. A nonzero exit is reported through
    /// [`GitOutput::success`], not as an error; only a failure to spawn is.
    fn run(&self, args: &[&str]) -> Result<GitOutput>;

    /// Run `git <args>` with `input` written to its stdin.
    fn pipe(&self, args: &[&str], input: &str) -> Result<GitOutput>;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String> {
        let args = ["rev-parse", "--abbrev-ref", "HEAD"];
        Ok(self.run(&args)?.into_checked(&args)?.trim().to_string())
    }

    /// `true` when there are no staged, unstaged, or untracked changes.
    fn is_clean(&self) -> Result<bool> {
        let args = ["status", "--porcelain"];
        Ok(self.run(&args)?.into_checked(&args)?.trim().is_empty())
    }

    fn fetch(&self, prune: bool, tags: bool) -> Result<()> {
        let mut args = vec!["fetch"];
        if prune {
            args.push("--prune");
        }
        if tags {
            args.push("--tags");
        }
        self.run(&args)?.into_checked(&args)?;
        Ok(())
    }

    /// Local branch names.
    fn list_branches(&self) -> Result<Vec<String>> {
        let args = ["for-each-ref", "--format=%(refname:short)", "refs/heads"];
        let out = self.run(&args)?.into_checked(&args)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Commits in `base..head`, oldest first, with metadata.
    fn commits_between(&self, base: &str, head: &str) -> Result<Vec<Commit>> {
        let range = format!("{}..{}", base, head);
        // %x1e / %x1f match RECORD_SEP / FIELD_SEP
        let args = [
            "log",
            "--reverse",
            "--name-only",
            "--pretty=format:%x1e%H%x1f%an%x1f%ct%x1f%s",
            range.as_str(),
        ];
        let out = self.run(&args)?.into_checked(&args)?;
        parse_commit_log(&out)
    }

    /// Stable patch fingerprint of a commit (`git patch-id --stable`).
    ///
    /// The default round-trips the patch through [`pipe`](Self::pipe) as
    /// text; gateways that can hand raw bytes to patch-id should override it.
    fn fingerprint(&self, id: &str) -> Result<String> {
        let show = ["show", "--no-color", "--no-ext-diff", id];
        let patch = self.run(&show)?.into_checked(&show)?;

        let args = ["patch-id", "--stable"];
        let out = self.pipe(&args, &patch)?.into_checked(&args)?;
        out.split_whitespace()
            .next()
            .map(String::from)
            .ok_or_else(|| Error::git_msg(format!("commit {} has no patch content", id)))
    }

    /// Resolve a reference to a full commit identifier.
    fn rev_parse(&self, reference: &str) -> Result<String> {
        let spec = format!("{}^{{commit}}", reference);
        let args = ["rev-parse", "--verify", spec.as_str()];
        Ok(self.run(&args)?.into_checked(&args)?.trim().to_string())
    }

    /// Identifiers selected by a revision range, oldest first.
    fn rev_list(&self, spec: &str) -> Result<Vec<String>> {
        let args = ["rev-list", "--reverse", spec];
        let out = self.run(&args)?.into_checked(&args)?;
        Ok(out.split_whitespace().map(String::from).collect())
    }

    /// Every commit reachable from `branch`.
    fn reachable(&self, branch: &str) -> Result<Vec<String>> {
        let args = ["rev-list", branch];
        let out = self.run(&args)?.into_checked(&args)?;
        Ok(out.split_whitespace().map(String::from).collect())
    }
}

/// Parse the record/field separated output of [`Gateway::commits_between`].
pub(crate) fn parse_commit_log(out: &str) -> Result<Vec<Commit>> {
    let mut commits = Vec::new();
    for record in out.split(RECORD_SEP) {
        if record.trim().is_empty() {
            continue;
        }
        let mut lines = record.lines();
        let header = lines.next().unwrap_or_default();
        let fields: Vec<&str> = header.splitn(4, FIELD_SEP).collect();
        if fields.len() != 4 {
            return Err(Error::git_msg(format!(
                "unexpected log record: {:?}",
                header
            )));
        }
        let secs: i64 = fields[2]
            .trim()
            .parse()
            .map_err(|_| Error::git_msg(format!("bad commit timestamp: {}", fields[2])))?;
        let time = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| Error::git_msg(format!("commit timestamp out of range: {}", secs)))?;
        commits.push(Commit {
            id: fields[0].trim().to_string(),
            author: fields[1].to_string(),
            time,
            subject: fields[3].to_string(),
            files: lines
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        });
    }
    Ok(commits)
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`Gateway`] backed by the `git` executable.
///
/// No timeout is applied; a hung git process blocks the caller.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    dir: Option<PathBuf>,
}

impl GitCli {
    /// Run git in the process working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Gateway for GitCli {
    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        log::debug!("git {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .map_err(|e| Error::git_msg(format!("git exec error: {}", e)))?;
        Ok(output.into())
    }

    fn pipe(&self, args: &[&str], input: &str) -> Result<GitOutput> {
        log::debug!("git {} (stdin: {} bytes)", args.join(" "), input.len());
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::git_msg(format!("git exec error: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
            // stdin drops here so git sees EOF
        }

        let output = child.wait_with_output()?;
        Ok(output.into())
    }

    /// Streams `git show` straight into `git patch-id --stable`, so the
    /// patch bytes reach patch-id unmodified even when they are not UTF-8.
    fn fingerprint(&self, id: &str) -> Result<String> {
        let show_args = ["show", "--no-color", "--no-ext-diff", id];
        let id_args = ["patch-id", "--stable"];
        log::debug!("git {} | git {}", show_args.join(" "), id_args.join(" "));

        let mut show = self
            .command(&show_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::git_msg(format!("git exec error: {}", e)))?;
        let patch = show
            .stdout
            .take()
            .ok_or_else(|| Error::git_msg("git show: stdout not captured"))?;

        let patch_id = self
            .command(&id_args)
            .stdin(Stdio::from(patch))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let patch_id = match patch_id {
            Ok(child) => child,
            Err(e) => {
                let _ = show.kill();
                let _ = show.wait();
                return Err(Error::git_msg(format!("git exec error: {}", e)));
            }
        };

        let id_out = patch_id.wait_with_output()?;
        let show_out = show.wait_with_output()?;

        GitOutput::from(show_out).into_checked(&show_args)?;
        let out = GitOutput::from(id_out).into_checked(&id_args)?;

        out.split_whitespace()
            .next()
            .map(String::from)
            .ok_or_else(|| Error::git_msg(format!("commit {} has no patch content", id)))
    }
}
