//! A small interactive shell.
//!
//! A line goes through three steps: the [`lexer`] turns it into tokens, the
//! [`parser`] builds a [`parser::Pipeline`] out of them and the [`pipeline`]
//! executor runs every stage concurrently, connecting them with OS pipes.
//! Builtins (`echo`, `exit`, `type`, `pwd`, `cd`) run inside the shell; any other
//! name is looked up on the search path and started as a child process.
//!
//! State that commands depend on (variables, search path, working directory) lives
//! in an explicit [`env::Environment`] owned by the [`Interpreter`], never in the
//! process itself. The [`completion`] module provides command-name completion for
//! the interactive prompt.

pub mod builtin;
pub mod completion;
pub mod env;
pub mod error;
pub mod external;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod redirect;

/// Status of a finished command, as reported by a shell.
pub type ExitCode = i32;

/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
