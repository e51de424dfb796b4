//! Grammar for a command line.
//!
//! ```text
//! command          -> WORD spaces argument_list redirection_list
//! argument_list    -> WORD spaces argument_list | ε
//! redirection_list -> REDIRECT spaces WORD spaces redirection_list | ε
//! spaces           -> SPACE | ε
//! ```
//!
//! The recursive rules are unrolled into loops. A line is first split on top-level
//! `|` and every stage is parsed as one `command`.

use crate::ExitCode;
use crate::builtin::{self, Builtin};
use crate::lexer::{self, Lexer, Token};
use crate::redirect::Redirection;
use thiserror::Error;

/// Argument entry standing for a whitespace run between two word fragments.
pub const SPACE_PLACEHOLDER: &str = " ";

/// Errors that can occur while parsing a line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// The line holds nothing but whitespace.
    #[error("empty command line")]
    EmptyLine,
    /// Expected a command name but found something else.
    #[error("expected command, got {0}")]
    ExpectedCommand(String),
    /// A redirection operator was not followed by a file name.
    #[error("expected file name after `{0}`")]
    MissingRedirectTarget(String),
    /// A word appeared after the redirection list.
    #[error("unexpected word `{0}` after redirection")]
    UnexpectedWord(String),
    /// Only the last command of a pipeline may redirect its streams.
    #[error("redirection is only supported on the last command of a pipeline")]
    RedirectInsidePipeline,
}

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub name: String,
    /// Word fragments in order, with [`SPACE_PLACEHOLDER`] entries where whitespace separated them.
    pub arguments: Vec<String>,
    /// Flat operator/target pairs, e.g. `[">", "out.txt"]`.
    pub redirections: Vec<String>,
}

impl ParsedCommand {
    /// Arguments with placeholders removed and adjacent fragments fused into words.
    pub fn words(&self) -> Vec<String> {
        fuse_words(&self.arguments)
    }

    /// Typed view over the flat redirection list.
    pub fn redirects(&self) -> Vec<Redirection> {
        self.redirections
            .chunks_exact(2)
            .filter_map(|pair| Redirection::from_operator(&pair[0], &pair[1]))
            .collect()
    }
}

/// Drops space placeholders and concatenates the fragments between them.
pub fn fuse_words(arguments: &[String]) -> Vec<String> {
    let mut words = Vec::new();
    let mut current: Option<String> = None;
    for arg in arguments {
        if arg == SPACE_PLACEHOLDER {
            words.extend(current.take());
        } else {
            current.get_or_insert_with(String::new).push_str(arg);
        }
    }
    words.extend(current);
    words
}

/// Commands connected by pipes, in execution order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<ParsedCommand>,
}

impl Pipeline {
    /// Redirections applying to the outer edges of the pipeline.
    pub fn redirects(&self) -> Vec<Redirection> {
        self.commands
            .last()
            .map(ParsedCommand::redirects)
            .unwrap_or_default()
    }

    /// Status requested by a lone `exit [code]` command.
    pub fn exit_request(&self) -> Option<ExitCode> {
        match self.commands.as_slice() {
            [command] if Builtin::lookup(&command.name) == Some(Builtin::Exit) => {
                Some(builtin::exit_status(&command.words()))
            }
            _ => None,
        }
    }
}

/// LL(1) parser over a single pipeline stage.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    peek: Token,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            current,
            peek,
        }
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        let peek = std::mem::replace(&mut self.peek, next);
        std::mem::replace(&mut self.current, peek)
    }

    fn skip_space(&mut self) {
        if self.current == Token::Space {
            self.advance();
        }
    }

    /// Fuses consecutive string fragments into one word.
    fn read_word(&mut self) -> Option<String> {
        let mut word: Option<String> = None;
        while let Token::Str(fragment) = &self.current {
            word.get_or_insert_with(String::new).push_str(fragment);
            self.advance();
        }
        word
    }

    /// Parses `command -> WORD spaces argument_list redirection_list`.
    pub fn parse_command(&mut self) -> Result<ParsedCommand, ParsingError> {
        self.skip_space();
        let name = match self.read_word() {
            Some(name) if !name.is_empty() => name,
            Some(_) => return Err(ParsingError::ExpectedCommand("empty word".to_string())),
            None => return Err(ParsingError::ExpectedCommand(describe(&self.current))),
        };
        self.skip_space();

        let mut arguments = Vec::new();
        loop {
            match &self.current {
                Token::Str(fragment) => arguments.push(fragment.clone()),
                Token::Space => arguments.push(SPACE_PLACEHOLDER.to_string()),
                _ => break,
            }
            self.advance();
        }

        let mut redirections = Vec::new();
        while let Token::Redirect(op) = &self.current {
            let op = op.clone();
            self.advance();
            self.skip_space();
            let target = self
                .read_word()
                .ok_or_else(|| ParsingError::MissingRedirectTarget(op.clone()))?;
            redirections.push(op);
            redirections.push(target);
            self.skip_space();
        }

        match &self.current {
            Token::Eof => Ok(ParsedCommand {
                name,
                arguments,
                redirections,
            }),
            other => Err(ParsingError::UnexpectedWord(other.literal().to_string())),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Eof => "end of input".to_string(),
        other => format!("`{}`", other.literal()),
    }
}

/// Parses a full line into a pipeline.
pub fn parse_line(line: &str) -> Result<Pipeline, ParsingError> {
    if line.trim().is_empty() {
        return Err(ParsingError::EmptyLine);
    }

    let commands = lexer::split_pipeline(line)
        .into_iter()
        .map(|stage| Parser::new(stage).parse_command())
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((_, leading)) = commands.split_last() {
        if leading.iter().any(|command| !command.redirections.is_empty()) {
            return Err(ParsingError::RedirectInsidePipeline);
        }
    }

    log::debug!("parsed pipeline: {commands:?}");
    Ok(Pipeline { commands })
}
