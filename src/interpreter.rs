use crate::ExitCode;
use crate::completion::{AutoComplete, ShellHelper};
use crate::env::Environment;
use crate::error::ShellError;
use crate::parser::{self, ParsingError};
use crate::pipeline;
use crate::redirect::RedirectTargets;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::io::{self, BufRead, Write};

pub const PROMPT: &str = "$ ";

/// What the prompt loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(ExitCode),
}

/// Where the prompt loop gets its lines from.
pub trait LineSource {
    /// Next line without its terminator, or `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>>;

    /// Called before every prompt with the environment the next line will run in.
    fn follow(&mut self, _env: &Environment) {}
}

/// Lines read from any buffered reader.
///
/// The prompt goes to `prompt_out`, which discards it unless built with
/// [`Script::prompting`].
pub struct Script<R, W = io::Sink> {
    reader: R,
    prompt_out: W,
}

impl<R: BufRead> Script<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            prompt_out: io::sink(),
        }
    }
}

impl<R: BufRead, W: Write> Script<R, W> {
    pub fn prompting(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for Script<R, W> {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}

/// Terminal input through the line editor, with command-name completion.
pub struct Interactive {
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl Interactive {
    pub fn new(env: &Environment) -> anyhow::Result<Self> {
        let mut editor = Editor::new()?;
        let engine = AutoComplete::new(env.search_path(), &env.current_dir);
        editor.set_helper(Some(ShellHelper::new(engine)));
        Ok(Self { editor })
    }
}

impl LineSource for Interactive {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn follow(&mut self, env: &Environment) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.engine_mut().follow(env);
        }
    }
}

/// A minimal shell: builtins, external commands, pipes and redirections.
///
/// Example
/// ```
/// use pipeshell::Interpreter;
/// use pipeshell::interpreter::Flow;
///
/// let mut sh = Interpreter::default();
/// let mut out: Vec<u8> = Vec::new();
/// let mut err: Vec<u8> = Vec::new();
/// let flow = sh.execute_line("echo hello   world", &mut out, &mut err).unwrap();
/// assert_eq!(flow, Flow::Continue);
/// assert_eq!(out, b"hello world\n".to_vec());
/// ```
pub struct Interpreter {
    env: Environment,
    last_status: ExitCode,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            last_status: 0,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Status of the most recently executed line.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Parses and runs one line.
    ///
    /// Redirections replace `stdout`/`stderr` for this line only. Errors from running
    /// the pipeline are written to the (possibly redirected) error stream; only parse
    /// errors are returned.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow, ParsingError> {
        let pipeline = parser::parse_line(line)?;
        if let Some(code) = pipeline.exit_request() {
            return Ok(Flow::Exit(code));
        }

        let mut targets = match RedirectTargets::open(&pipeline.redirects(), &self.env) {
            Ok(targets) => targets,
            Err(err) => {
                self.fail(stderr, err);
                return Ok(Flow::Continue);
            }
        };
        let stdout: &mut dyn Write = match targets.stdout.as_mut() {
            Some(file) => file,
            None => stdout,
        };
        let stderr: &mut dyn Write = match targets.stderr.as_mut() {
            Some(file) => file,
            None => stderr,
        };

        match pipeline::execute(&pipeline.commands, &mut self.env, stdout, stderr) {
            Ok(()) => self.last_status = 0,
            Err(err) => self.fail(stderr, err),
        }
        Ok(Flow::Continue)
    }

    fn fail(&mut self, stderr: &mut dyn Write, err: ShellError) {
        self.last_status = err.status();
        if err.is_silent() {
            return;
        }
        if let Err(write_err) = writeln!(stderr, "{err}").and_then(|()| stderr.flush()) {
            log::warn!("could not report `{err}`: {write_err}");
        }
    }

    /// Runs lines from `source` until it is exhausted or `exit` is entered.
    ///
    /// A parse error, including a blank line, is reported and ends the session with
    /// status 1.
    pub fn run_session(
        &mut self,
        source: &mut dyn LineSource,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        loop {
            source.follow(&self.env);
            let Some(line) = source.read_line(PROMPT)? else {
                return Ok(0);
            };
            match self.execute_line(&line, stdout, stderr) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit(code)) => return Ok(code),
                Err(err) => {
                    writeln!(stderr, "{err}")?;
                    return Ok(1);
                }
            }
        }
    }

    /// Runs a single line, as for `-c`, and returns its status.
    pub fn run_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        match self.execute_line(line, &mut stdout, &mut stderr) {
            Ok(Flow::Continue) => Ok(self.last_status),
            Ok(Flow::Exit(code)) => Ok(code),
            Err(err) => {
                writeln!(stderr, "{err}")?;
                Ok(1)
            }
        }
    }

    /// Interactive prompt loop on the terminal.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut source = Interactive::new(&self.env)?;
        self.run_session(&mut source, &mut io::stdout(), &mut io::stderr())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Environment::new())
    }
}
