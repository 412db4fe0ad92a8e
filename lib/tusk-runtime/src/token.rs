use std::fmt;

use crate::atn::TOKEN_EOF;

/// Channel the parser listens on.
pub const DEFAULT_CHANNEL: i32 = 0;

/// A token produced by a lexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub token_type: i32,
    pub text: String,
    pub channel: i32,

    /// Offset of the first character, in characters.
    pub start: usize,

    /// Offset one past the last character, in characters.
    pub end: usize,

    /// Line of the first character, starting at 1.
    pub line: usize,

    /// Column of the first character, starting at 0.
    pub column: usize,

    /// Position in the token stream, assigned as tokens are buffered.
    pub index: usize,
}

impl Token {
    /// Creates the end-of-file token at the given position.
    pub fn eof(offset: usize, line: usize, column: usize) -> Self {
        Self {
            token_type: TOKEN_EOF,
            text: "<EOF>".to_string(),
            channel: DEFAULT_CHANNEL,
            start: offset,
            end: offset,
            line,
            column,
            index: 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.token_type == TOKEN_EOF
    }

    /// Returns the token text escaped and quoted the way error messages show it.
    pub fn error_display(&self) -> String {
        format!("'{}'", escape_whitespace(&self.text))
    }
}

/// Replaces newlines, carriage returns, and tabs with their escaped spellings.
pub fn escape_whitespace(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A syntax error reported while lexing or parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{} {}", self.line, self.column, self.message)
    }
}

/// A source of tokens, typically a lexer.
pub trait TokenSource: Send {
    /// Returns the next token.
    ///
    /// Once the input is exhausted, every call returns an end-of-file token.
    fn next_token(&mut self) -> Token;

    /// Drains the errors reported so far.
    fn take_errors(&mut self) -> Vec<SyntaxError>;
}

/// Names of a grammar's token types.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    literal_names: Vec<Option<String>>,
    symbolic_names: Vec<Option<String>>,
}

impl Vocabulary {
    pub fn new(literal_names: Vec<Option<String>>, symbolic_names: Vec<Option<String>>) -> Self {
        Self {
            literal_names,
            symbolic_names,
        }
    }

    /// Returns the name used for `token_type` in error messages: its literal if it has one, otherwise its symbolic
    /// name, otherwise the number itself.
    pub fn display_name(&self, token_type: i32) -> String {
        if token_type == TOKEN_EOF {
            return "<EOF>".to_string();
        }

        let lookup = |names: &[Option<String>]| {
            usize::try_from(token_type)
                .ok()
                .and_then(|i| names.get(i))
                .and_then(|name| name.clone())
        };
        lookup(&self.literal_names)
            .or_else(|| lookup(&self.symbolic_names))
            .unwrap_or_else(|| token_type.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_literals() {
        let vocabulary = Vocabulary::new(
            vec![None, Some("'+'".to_string()), None],
            vec![None, Some("PLUS".to_string()), Some("INT".to_string())],
        );

        assert_eq!(vocabulary.display_name(1), "'+'");
        assert_eq!(vocabulary.display_name(2), "INT");
        assert_eq!(vocabulary.display_name(7), "7");
        assert_eq!(vocabulary.display_name(TOKEN_EOF), "<EOF>");
    }

    #[test]
    fn error_display_escapes_whitespace() {
        let mut token = Token::eof(0, 1, 0);
        token.text = "a\tb\n".to_string();
        assert_eq!(token.error_display(), "'a\\tb\\n'");
        assert_eq!(Token::eof(3, 2, 1).error_display(), "'<EOF>'");
    }

    #[test]
    fn syntax_error_formatting() {
        let error = SyntaxError {
            line: 3,
            column: 14,
            message: "extraneous input".to_string(),
        };
        assert_eq!(error.to_string(), "line 3:14 extraneous input");
    }
}
