use argh::FromArgs;
use log::LevelFilter;
use pipeshell::Interpreter;
use pipeshell::env::Environment;
use pipeshell::interpreter::Script;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::io::{self, IsTerminal};

#[derive(FromArgs)]
/// A small shell with pipes, redirections and command completion.
struct Options {
    #[argh(option)]
    /// colon-separated directories searched for commands, instead of $PATH.
    path: Option<String>,

    #[argh(option, default = "LevelFilter::Off")]
    /// log verbosity written to stderr: off, error, warn, info, debug or trace.
    log_level: LevelFilter,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    command: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();

    TermLogger::init(
        options.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let mut env = Environment::new();
    if let Some(path) = options.path {
        env.set_var("PATH", path);
    }
    let mut sh = Interpreter::new(env);

    let code = if let Some(line) = options.command {
        sh.run_line(&line)?
    } else if io::stdin().is_terminal() {
        sh.repl()?
    } else {
        let mut script = Script::prompting(io::stdin().lock(), io::stdout());
        sh.run_session(&mut script, &mut io::stdout(), &mut io::stderr())?
    };
    log::debug!("leaving with status {code}");
    std::process::exit(code)
}
