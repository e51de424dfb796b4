use crate::ExitCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving or running the commands of a line.
///
/// None of these end the prompt loop; they are reported on the error stream.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// `type` found neither a builtin nor an executable.
    #[error("{0}: not found")]
    NotFound(String),

    #[error("cd: {0}: No such file or directory")]
    NoSuchDirectory(String),

    #[error("cd: HOME not set")]
    HomeNotSet,

    /// Builtin arguments rejected by the argument parser.
    #[error("{name}: {message}")]
    Usage { name: &'static str, message: String },

    /// An external process exited unsuccessfully; `detail` is its trimmed stderr.
    #[error("{detail}")]
    ExecutionFailed {
        name: String,
        status: ExitCode,
        detail: String,
    },

    #[error("{name}: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("{}: {source}", .path.display())]
    Redirect { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Whether there is anything worth printing for this error.
    pub fn is_silent(&self) -> bool {
        matches!(self, ShellError::ExecutionFailed { detail, .. } if detail.is_empty())
    }

    /// Status a line ends with when this error stopped it.
    pub fn status(&self) -> ExitCode {
        match self {
            ShellError::ExecutionFailed { status, .. } => *status,
            ShellError::CommandNotFound(_) => 127,
            ShellError::Spawn { .. } => 126,
            _ => 1,
        }
    }
}
