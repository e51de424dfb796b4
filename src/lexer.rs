//! Lexical analysis for the shell command line.
//!
//! The lexer is pull-based: every call to [`Lexer::next_token`] scans exactly one
//! token and advances an internal cursor. It never backtracks and keeps returning
//! [`Token::Eof`] once the input is exhausted.

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// One fragment of a word: a literal run, a quoted section or an escaped character.
    /// Adjacent fragments with no space between them belong to the same word.
    Str(String),
    /// A run of one or more spaces.
    Space,
    /// A redirection operator: `>`, `>>`, `1>`, `1>>`, `2>` or `2>>`.
    Redirect(String),
    /// End of input.
    Eof,
}

impl Token {
    /// Text carried by the token. A space run is always reported as a single space.
    pub fn literal(&self) -> &str {
        match self {
            Token::Str(s) | Token::Redirect(s) => s,
            Token::Space => " ",
            Token::Eof => "",
        }
    }
}

/// Characters that keep an unquoted literal run going.
fn is_literal(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '/' | '_' | '-' | '.')
}

/// Characters escapable by a backslash inside double quotes.
fn is_double_quote_escape(ch: char) -> bool {
    matches!(ch, '"' | '\\' | '$' | '`' | '\n')
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(line: &str) -> Self {
        Lexer {
            input: line.chars().collect(),
            pos: 0,
        }
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        let Some(ch) = self.peek_char() else {
            return Token::Eof;
        };

        match ch {
            ' ' => {
                while self.peek_char() == Some(' ') {
                    self.pos += 1;
                }
                Token::Space
            }
            '\\' => {
                self.pos += 1;
                match self.read_char() {
                    Some(escaped) => Token::Str(escaped.to_string()),
                    None => Token::Str("\\".to_string()),
                }
            }
            '\'' => Token::Str(self.read_single_quoted()),
            '"' => Token::Str(self.read_double_quoted()),
            _ if self.at_redirect() => self.read_redirect(),
            _ => Token::Str(self.read_literal()),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_n(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    /// `>` anywhere, or a `1`/`2` immediately followed by `>`.
    fn at_redirect(&self) -> bool {
        match self.peek_char() {
            Some('>') => true,
            Some('1' | '2') => self.peek_n(1) == Some('>'),
            _ => false,
        }
    }

    fn read_redirect(&mut self) -> Token {
        let mut op = String::new();
        if let Some(fd @ ('1' | '2')) = self.peek_char() {
            op.push(fd);
            self.pos += 1;
        }
        // at_redirect guarantees the '>'
        self.pos += 1;
        op.push('>');
        if self.peek_char() == Some('>') {
            self.pos += 1;
            op.push('>');
        }
        Token::Redirect(op)
    }

    /// The first character is always taken; the run then continues over literal characters.
    fn read_literal(&mut self) -> String {
        let mut s = String::new();
        if let Some(first) = self.read_char() {
            s.push(first);
        }
        while let Some(ch) = self.peek_char() {
            if !is_literal(ch) || self.at_redirect() {
                break;
            }
            s.push(ch);
            self.pos += 1;
        }
        s
    }

    /// Reads up to the closing quote (or end of input) with no escape processing.
    fn read_single_quoted(&mut self) -> String {
        self.pos += 1;
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            if ch == '\'' {
                break;
            }
            s.push(ch);
        }
        s
    }

    fn read_double_quoted(&mut self) -> String {
        self.pos += 1;
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '"' => break,
                '\\' => match self.peek_char() {
                    Some(next) if is_double_quote_escape(next) => {
                        s.push(next);
                        self.pos += 1;
                    }
                    _ => s.push('\\'),
                },
                c => s.push(c),
            }
        }
        s
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::Eof => None,
            token => Some(token),
        }
    }
}

/// Splits a line on every `|` that is not quoted or escaped.
///
/// Each returned slice is the raw text of one pipeline stage.
pub fn split_pipeline(line: &str) -> Vec<&str> {
    let mut stages = Vec::new();
    let mut start = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = line.char_indices();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' if !in_single => {
                chars.next();
            }
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '|' if !in_single && !in_double => {
                stages.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    stages.push(&line[start..]);
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<Token> {
        Lexer::new(line).collect()
    }

    fn s(text: &str) -> Token {
        Token::Str(text.to_string())
    }

    #[test]
    fn space_runs_collapse_to_one_token() {
        assert_eq!(
            tokens("echo hello   world"),
            vec![s("echo"), Token::Space, s("hello"), Token::Space, s("world")]
        );
    }

    #[test]
    fn eof_repeats_after_end() {
        let mut lexer = Lexer::new("ls");
        assert_eq!(lexer.next_token(), s("ls"));
        assert_eq!(lexer.next_token(), Token::Eof);
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn single_quotes_are_verbatim() {
        assert_eq!(
            tokens(r"echo 'a \n  b'"),
            vec![s("echo"), Token::Space, s(r"a \n  b")]
        );
    }

    #[test]
    fn adjacent_fragments_are_separate_tokens() {
        assert_eq!(
            tokens("'hello''script' test''shell"),
            vec![
                s("hello"),
                s("script"),
                Token::Space,
                s("test"),
                s(""),
                s("shell")
            ]
        );
    }

    #[test]
    fn double_quote_escapes_only_special_characters() {
        assert_eq!(tokens(r#""a\"b\\c\$d""#), vec![s(r#"a"b\c$d"#)]);
        assert_eq!(tokens(r#""keep\n\x""#), vec![s(r"keep\n\x")]);
    }

    #[test]
    fn backslash_escapes_one_character() {
        assert_eq!(
            tokens(r"a\ \ b"),
            vec![s("a"), s(" "), s(" "), s("b")]
        );
        assert_eq!(tokens(r"\'x"), vec![s("'"), s("x")]);
    }

    #[test]
    fn unterminated_quotes_read_to_end() {
        assert_eq!(tokens("'abc def"), vec![s("abc def")]);
        assert_eq!(tokens("\"abc"), vec![s("abc")]);
    }

    #[test]
    fn redirect_operators() {
        let ops: Vec<Token> = tokens("> >> 1> 1>> 2> 2>>")
            .into_iter()
            .filter(|t| *t != Token::Space)
            .collect();
        let expected: Vec<Token> = [">", ">>", "1>", "1>>", "2>", "2>>"]
            .iter()
            .map(|op| Token::Redirect(op.to_string()))
            .collect();
        assert_eq!(ops, expected);
    }

    #[test]
    fn digits_are_literal_unless_followed_by_redirect() {
        assert_eq!(tokens("head -n 12"), vec![
            s("head"),
            Token::Space,
            s("-n"),
            Token::Space,
            s("12")
        ]);
        assert_eq!(
            tokens("file2>out"),
            vec![s("file"), Token::Redirect("2>".to_string()), s("out")]
        );
    }

    #[test]
    fn quoted_redirect_is_a_string() {
        assert_eq!(tokens("'>'"), vec![s(">")]);
    }

    #[test]
    fn token_literals() {
        assert_eq!(Token::Space.literal(), " ");
        assert_eq!(Token::Redirect("2>>".into()).literal(), "2>>");
        assert_eq!(Token::Eof.literal(), "");
    }

    #[test]
    fn split_pipeline_respects_quotes() {
        assert_eq!(split_pipeline("cat f | wc"), vec!["cat f ", " wc"]);
        assert_eq!(split_pipeline("echo 'a|b' \"c|d\" e\\|f"), vec![
            "echo 'a|b' \"c|d\" e\\|f"
        ]);
        assert_eq!(split_pipeline("a|b|c"), vec!["a", "b", "c"]);
    }
}
