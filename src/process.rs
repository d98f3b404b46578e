//! External command execution.
//!
//! [`Cmd`] is a small builder around [`std::process::Command`]. Output is
//! either captured and returned once the child exits, or streamed line by
//! line to the reporter as the child produces it. A non-zero exit becomes
//! [`Error::ExternalCommand`].

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::Error;
use crate::report::{Category, Reporter};

/// A command line plus the directory and environment it runs with.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Program name as shown in error messages.
    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Printable command line with arguments quoted where needed.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| autoquote(&part.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and return everything the child wrote to stdout.
    pub fn capture(&self, reporter: &dyn Reporter) -> Result<Vec<u8>> {
        reporter.report(Category::Command, &self.command_line());
        let output = self
            .command()
            .stdout(Stdio::piped())
            .output()
            .with_context(|| format!("spawning '{}'", self.program()))?;
        self.check(output.status)?;
        Ok(output.stdout)
    }

    /// Run to completion, forwarding each stdout line to the reporter as it
    /// arrives.
    pub fn stream(&self, reporter: &dyn Reporter) -> Result<()> {
        reporter.report(Category::Command, &self.command_line());
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning '{}'", self.program()))?;
        let stdout = child
            .stdout
            .take()
            .context("child process has no stdout pipe")?;

        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();
        let read_result = loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    reporter.report(Category::Output, text.trim_end());
                }
                Err(err) => break Err(err),
            }
        };
        drop(reader);

        // Reap the child even when reading failed.
        let status = child
            .wait()
            .with_context(|| format!("waiting for '{}'", self.program()))?;
        read_result.with_context(|| format!("reading output of '{}'", self.program()))?;
        self.check(status)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        tracing::debug!(command = %self.command_line(), cwd = ?self.cwd, "spawning");
        cmd
    }

    fn check(&self, status: ExitStatus) -> Result<()> {
        if status.success() {
            return Ok(());
        }
        Err(Error::ExternalCommand {
            command: self.program(),
            code: status.code(),
        }
        .into())
    }
}

/// Quote an argument for display if it contains whitespace or quotes.
pub fn autoquote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}
