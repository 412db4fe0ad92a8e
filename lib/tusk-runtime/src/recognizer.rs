//! Capabilities the parse pipeline needs from generated recognizers.
//!
//! The pipeline never cares how a lexer or parser is implemented: it creates a lexer over the source text, feeds its
//! tokens to a parser, lists the parser's rules, and invokes one of them by name.

use snafu::Snafu;

use crate::{
    atn::{AtnError, AtnKind},
    stream::CommonTokenStream,
    token::{SyntaxError, TokenSource},
    tree::ParseTree,
};

/// An error encountered while turning interpreter data into a recognizer definition.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum DefinitionError {
    #[snafu(display("Recognizer {} has an invalid ATN: {}", name, source))]
    InvalidAtn { name: String, source: AtnError },

    #[snafu(display("Recognizer {} is not a {:?} grammar.", name, expected))]
    WrongKind { name: String, expected: AtnKind },

    #[snafu(display(
        "Recognizer {} names {} rules but its ATN defines {}.",
        name,
        named,
        defined
    ))]
    RuleCountMismatch { name: String, named: usize, defined: usize },
}

/// An error raised while constructing a lexer or parser.
#[derive(Debug, Snafu)]
#[snafu(display("{}", message))]
pub struct ConstructionError {
    message: String,
}

impl ConstructionError {
    pub fn new(message: impl Into<String>) -> Self {
        ConstructionSnafu { message: message.into() }.build()
    }
}

/// An error raised while invoking a parser rule.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum RuleExecutionError {
    /// The parser has no rule with the requested name.
    #[snafu(display("Unknown rule '{}'", rule))]
    UnknownRule { rule: String },

    /// The input does not conform to the grammar.
    #[snafu(display("{}", errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")))]
    Syntax { errors: Vec<SyntaxError> },

    /// The recognizer failed for a reason unrelated to the input.
    #[snafu(display("{}", reason))]
    Internal { reason: String },
}

impl RuleExecutionError {
    /// Returns the error as a list of human-readable lines.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Syntax { errors } => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Creates lexers over source text.
pub trait LexerFactory: Send + Sync {
    /// Creates a lexer that tokenizes `source`.
    ///
    /// # Errors
    ///
    /// If the lexer cannot be constructed, an error is returned.
    fn create_lexer(&self, source: &str) -> Result<Box<dyn TokenSource>, ConstructionError>;
}

/// Creates parsers over token streams.
pub trait ParserFactory: Send + Sync {
    /// Creates a parser that consumes `tokens`.
    ///
    /// # Errors
    ///
    /// If the parser cannot be constructed, an error is returned.
    fn create_parser(&self, tokens: CommonTokenStream) -> Result<Box<dyn Recognizer>, ConstructionError>;
}

/// A parser ready to recognize its token stream.
pub trait Recognizer: Send {
    /// Returns the parser's rule names, in declaration order.
    fn rule_names(&self) -> &[String];

    /// Invokes the named rule as the entry point and returns the resulting tree.
    ///
    /// # Errors
    ///
    /// If the rule does not exist, or the input does not conform to the grammar, an error is returned.
    fn invoke_rule(&mut self, rule_name: &str) -> Result<ParseTree, RuleExecutionError>;

    /// Renders `tree` using this parser's rule names.
    fn render_tree(&self, tree: &ParseTree) -> String {
        tree.to_string_tree(self.rule_names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_display_their_message() {
        let err = ConstructionError::new("parser Expr defines no rules");
        assert_eq!(err.to_string(), "parser Expr defines no rules");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn syntax_errors_are_reported_one_per_line() {
        let err = RuleExecutionError::Syntax {
            errors: vec![
                SyntaxError {
                    line: 1,
                    column: 2,
                    message: "token recognition error at: '$'".to_string(),
                },
                SyntaxError {
                    line: 1,
                    column: 4,
                    message: "extraneous input '2' expecting <EOF>".to_string(),
                },
            ],
        };

        assert_eq!(
            err.messages(),
            vec![
                "line 1:2 token recognition error at: '$'",
                "line 1:4 extraneous input '2' expecting <EOF>"
            ]
        );
    }
}
