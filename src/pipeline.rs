//! Runs the commands of a pipeline concurrently, connected by OS pipes.
//!
//! Every stage is started before anything is waited on. Builtins write their
//! output from a short-lived thread, external commands are child processes.
//! The reader of the last pipe is drained by the caller's thread, which is what
//! keeps the whole chain moving.

use crate::builtin::Builtin;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::{ExternalCommand, exit_code};
use crate::parser::ParsedCommand;
use std::io::{self, PipeReader, PipeWriter, Read, Write};
use std::process::{Child, Stdio};
use std::thread::{self, JoinHandle};

/// A command after dispatch, not yet started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Builtin { builtin: Builtin, args: Vec<String> },
    External(ExternalCommand),
    /// Neither a builtin nor found on the search path.
    Missing(String),
}

impl Stage {
    pub fn resolve(command: &ParsedCommand, env: &Environment) -> Self {
        if let Some(builtin) = Builtin::lookup(&command.name) {
            let args = if builtin.takes_raw_args() {
                command.arguments.clone()
            } else {
                command.words()
            };
            return Stage::Builtin { builtin, args };
        }
        match ExternalCommand::resolve(env, &command.name, command.words()) {
            Some(external) => Stage::External(external),
            None => Stage::Missing(command.name.clone()),
        }
    }

    /// Starts the stage. `stdin` is `None` for the first stage of a pipeline.
    ///
    /// Both pipe ends are consumed: they are either moved into the stage or dropped
    /// here, so the caller keeps no copy that could hold a peer open.
    pub fn start(
        self,
        stdin: Option<PipeReader>,
        stdout: PipeWriter,
        env: &mut Environment,
    ) -> Running {
        match self {
            Stage::Builtin { builtin, args } => {
                // Builtins never read their input.
                drop(stdin);
                match builtin.run(&args, env) {
                    Ok(output) => Running::Task(thread::spawn(move || write_output(stdout, output))),
                    Err(err) => Running::Failed(err),
                }
            }
            Stage::External(command) => {
                let stdin = stdin.map_or_else(Stdio::null, Stdio::from);
                match command.spawn(stdin, Stdio::from(stdout), env) {
                    Ok(mut child) => {
                        let stderr = child.stderr.take().map(|mut pipe| {
                            thread::spawn(move || {
                                let mut buf = Vec::new();
                                pipe.read_to_end(&mut buf)
                                    .map(|_| String::from_utf8_lossy(&buf).into_owned())
                            })
                        });
                        Running::Process {
                            name: command.name,
                            child,
                            stderr,
                        }
                    }
                    Err(source) => Running::Failed(ShellError::Spawn {
                        name: command.name,
                        source,
                    }),
                }
            }
            Stage::Missing(name) => {
                log::debug!("{name}: not a builtin and not on the search path");
                Running::Failed(ShellError::CommandNotFound(name))
            }
        }
    }
}

fn write_output(mut pipe: PipeWriter, output: String) -> Result<(), ShellError> {
    if output.is_empty() {
        return Ok(());
    }
    let result = pipe
        .write_all(output.as_bytes())
        .and_then(|()| pipe.write_all(b"\n"));
    match result {
        // The reader went away early, e.g. `echo text | true`.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.map_err(ShellError::from),
    }
}

/// A started stage.
pub enum Running {
    Task(JoinHandle<Result<(), ShellError>>),
    Process {
        name: String,
        child: Child,
        stderr: Option<JoinHandle<io::Result<String>>>,
    },
    /// The stage could not start; nothing to wait for.
    Failed(ShellError),
}

impl Running {
    /// Blocks until the stage is done.
    ///
    /// Standard error of a process that exited successfully is forwarded to `stderr`;
    /// for a failed process it becomes the error detail instead.
    pub fn wait(self, stderr: &mut dyn Write) -> Result<(), ShellError> {
        match self {
            Running::Task(handle) => match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            Running::Process {
                name,
                mut child,
                stderr: captured,
            } => {
                let status = child.wait()?;
                let text = match captured.map(JoinHandle::join) {
                    Some(Ok(text)) => text?,
                    Some(Err(panic)) => std::panic::resume_unwind(panic),
                    None => String::new(),
                };
                let status = exit_code(status);
                log::debug!("{name} exited with status {status}");
                if status == 0 {
                    stderr.write_all(text.as_bytes())?;
                    Ok(())
                } else {
                    Err(ShellError::ExecutionFailed {
                        name,
                        status,
                        detail: text.trim_end().to_string(),
                    })
                }
            }
            Running::Failed(err) => Err(err),
        }
    }
}

/// Executes `commands` as one pipeline and returns once every stage has finished.
///
/// The final output is trimmed of trailing newlines and written to `stdout` with a
/// single newline, even when a stage failed. The first error in pipeline order is
/// returned; later ones are only logged.
pub fn execute(
    commands: &[ParsedCommand],
    env: &mut Environment,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), ShellError> {
    let stages: Vec<Stage> = commands
        .iter()
        .map(|command| Stage::resolve(command, env))
        .collect();
    log::trace!("stages: {stages:?}");

    // All pipes exist before the first stage starts, so a failure here leaks nothing.
    let pipes = stages
        .iter()
        .map(|_| io::pipe())
        .collect::<io::Result<Vec<_>>>()?;

    let mut running = Vec::with_capacity(stages.len());
    let mut upstream: Option<PipeReader> = None;
    for (stage, (reader, writer)) in stages.into_iter().zip(pipes) {
        running.push(stage.start(upstream.take(), writer, env));
        upstream = Some(reader);
    }

    let mut output = Vec::new();
    let drained = match upstream {
        Some(mut reader) => reader.read_to_end(&mut output).map(drop),
        None => Ok(()),
    };

    let mut first_error = None;
    for stage in running {
        if let Err(err) = stage.wait(stderr) {
            if first_error.is_none() {
                first_error = Some(err);
            } else {
                log::warn!("pipeline stage failed: {err}");
            }
        }
    }

    let end = output
        .iter()
        .rposition(|&byte| byte != b'\n')
        .map_or(0, |last| last + 1);
    if end > 0 {
        stdout.write_all(&output[..end])?;
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    drained?;
    first_error.map_or(Ok(()), Err)
}
