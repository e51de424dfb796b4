use crate::env::Environment;
use crate::error::ShellError;
use std::fs::{File, OpenOptions};

/// Stream a redirection rebinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A single `op target` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub stream: Stream,
    /// `>>` style operators append instead of truncating.
    pub append: bool,
    pub target: String,
}

impl Redirection {
    /// Builds a redirection from an operator as produced by the lexer.
    pub fn from_operator(op: &str, target: &str) -> Option<Self> {
        let (stream, append) = match op {
            ">" | "1>" => (Stream::Stdout, false),
            ">>" | "1>>" => (Stream::Stdout, true),
            "2>" => (Stream::Stderr, false),
            "2>>" => (Stream::Stderr, true),
            _ => return None,
        };
        Some(Self {
            stream,
            append,
            target: target.to_string(),
        })
    }

    /// Opens (creating if needed) the target relative to the shell's working directory.
    pub fn open(&self, env: &Environment) -> Result<File, ShellError> {
        let path = env.resolve(&self.target);
        log::debug!("redirecting {:?} to {}", self.stream, path.display());
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&path)
            .map_err(|source| ShellError::Redirect { path, source })
    }
}

/// Files substituted for the shell's own streams while one line runs.
#[derive(Debug, Default)]
pub struct RedirectTargets {
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

impl RedirectTargets {
    /// Opens every target in order; a later redirection of the same stream wins.
    pub fn open(redirections: &[Redirection], env: &Environment) -> Result<Self, ShellError> {
        let mut targets = Self::default();
        for redirection in redirections {
            let file = redirection.open(env)?;
            match redirection.stream {
                Stream::Stdout => targets.stdout = Some(file),
                Stream::Stderr => targets.stderr = Some(file),
            }
        }
        Ok(targets)
    }
}
