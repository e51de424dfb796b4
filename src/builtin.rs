use crate::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::find_command_path;
use argh::{EarlyExit, FromArgs};
use std::fs;

/// The closed set of commands implemented inside the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Exit,
    Type,
    Pwd,
    Cd,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Echo,
        Builtin::Exit,
        Builtin::Type,
        Builtin::Pwd,
        Builtin::Cd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Echo => "echo",
            Builtin::Exit => Exit::NAME,
            Builtin::Type => Type::NAME,
            Builtin::Pwd => Pwd::NAME,
            Builtin::Cd => Cd::NAME,
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    /// Raw builtins see space placeholders; the others get fused words.
    pub fn takes_raw_args(self) -> bool {
        matches!(self, Builtin::Echo)
    }

    /// Runs the builtin and returns its single-line output.
    pub fn run(self, args: &[String], env: &mut Environment) -> Result<String, ShellError> {
        match self {
            Builtin::Echo => Ok(echo(args)),
            Builtin::Exit => run_parsed::<Exit>(args, env),
            Builtin::Type => run_parsed::<Type>(args, env),
            Builtin::Pwd => run_parsed::<Pwd>(args, env),
            Builtin::Cd => run_parsed::<Cd>(args, env),
        }
    }
}

/// Status requested by `exit [code]`: 0 by default, 1 when the code is not a number.
pub fn exit_status(words: &[String]) -> ExitCode {
    words.first().map_or(0, |code| code.parse().unwrap_or(1))
}

/// Joins the raw arguments with no separator so placeholders reproduce the spacing.
///
/// A placeholder before a redirection or pipe is kept: `echo hi > f` writes `hi `.
fn echo(args: &[String]) -> String {
    args.concat()
}

/// Builtins whose (filtered) arguments are parsed using the [`argh`] crate.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "type" or "cd".
    const NAME: &'static str;

    fn execute(self, env: &mut Environment) -> Result<String, ShellError>;
}

fn run_parsed<T: BuiltinCommand>(args: &[String], env: &mut Environment) -> Result<String, ShellError> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::NAME], &args) {
        Ok(cmd) => cmd.execute(env),
        // --help
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => Ok(output.trim_end().to_string()),
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => Err(ShellError::Usage {
            name: T::NAME,
            message: output.trim_end().to_string(),
        }),
    }
}

#[derive(FromArgs)]
/// Leave the shell.
struct Exit {
    #[argh(positional, greedy, arg_name = "code")]
    /// exit status; a non-numeric value exits with 1.
    _code: Vec<String>,
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";

    /// Only a lone `exit` ends the prompt loop; inside a pipeline it does nothing.
    fn execute(self, _env: &mut Environment) -> Result<String, ShellError> {
        Ok(String::new())
    }
}

#[derive(FromArgs)]
/// Tell how a command name would be interpreted.
struct Type {
    #[argh(positional)]
    /// command name to look up.
    name: String,
}

impl BuiltinCommand for Type {
    const NAME: &'static str = "type";

    fn execute(self, env: &mut Environment) -> Result<String, ShellError> {
        if Builtin::lookup(&self.name).is_some() {
            return Ok(format!("{} is a shell builtin", self.name));
        }
        match find_command_path(&env.search_path(), &env.current_dir, &self.name) {
            Some(path) => Ok(format!("{} is {}", self.name, path.display())),
            None => Err(ShellError::NotFound(self.name)),
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory.
struct Pwd {
    #[argh(positional, greedy, arg_name = "args")]
    /// ignored.
    _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    const NAME: &'static str = "pwd";

    fn execute(self, env: &mut Environment) -> Result<String, ShellError> {
        Ok(env.current_dir.display().to_string())
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
struct Cd {
    #[argh(positional)]
    /// directory to switch to; `~` stands for the home directory.
    target: Option<String>,
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";

    fn execute(self, env: &mut Environment) -> Result<String, ShellError> {
        let shown = self.target.unwrap_or_else(|| "~".to_string());
        let target = match shown.as_str() {
            "" | "~" => env.home_dir().ok_or(ShellError::HomeNotSet)?,
            other => match other.strip_prefix("~/") {
                Some(rest) => env.home_dir().ok_or(ShellError::HomeNotSet)?.join(rest),
                None => env.resolve(other),
            },
        };

        match fs::canonicalize(&target) {
            Ok(dir) if dir.is_dir() => {
                log::debug!("cd {}", dir.display());
                env.current_dir = dir;
                Ok(String::new())
            }
            _ => Err(ShellError::NoSuchDirectory(shown)),
        }
    }
}
