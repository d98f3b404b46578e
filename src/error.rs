//! Failure taxonomy for a pipeline run.
//!
//! Stages return `anyhow::Result` and attach context as they go. The
//! failures a caller may want to tell apart are raised as [`Error`] values
//! and can be recovered with `err.downcast_ref::<Error>()`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad path, undiscoverable project root, conflicting flags.
    #[error("{0}")]
    UserInput(String),

    /// An invoked process exited non-zero or was killed by a signal.
    #[error("failed to execute command \"{command}\" ({})", describe_code(*code))]
    ExternalCommand { command: String, code: Option<i32> },

    #[error("no bootstrap distribution found for '{requirement}'")]
    BootstrapUnavailable { requirement: String },

    #[error("checksum mismatch for '{}': expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The project's `setup.py` did not answer with name, version and fullname.
    #[error("malformed package description: expected 3 lines, got {lines}:\n{output}")]
    MalformedDescriptor { lines: usize, output: String },

    #[error("postbuild script '{}' failed ({})", script.display(), describe_code(*code))]
    PostbuildHook { script: PathBuf, code: Option<i32> },

    /// Offline build could not be satisfied from local sources alone.
    #[error("offline build could not be satisfied from the wheel cache")]
    OfflineResolution {
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    /// Exit code the command-line front end should use for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserInput(_) => 2,
            _ => 1,
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
