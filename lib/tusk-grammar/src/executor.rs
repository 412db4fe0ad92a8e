//! Parse execution.

use snafu::{ensure, ResultExt as _, Snafu};
use tracing::debug;
use tusk_runtime::{CommonTokenStream, ConstructionError, LexerFactory, ParserFactory, RuleExecutionError};

/// Parse execution error.
///
/// Every variant raised after the parser was constructed carries the parser's rule names.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ExecutionError {
    /// The lexer or the parser could not be constructed.
    #[snafu(display("{}", source))]
    Construction { source: ConstructionError },

    /// The request named no rule to start from.
    #[snafu(display("No rule specified"))]
    NoRuleSpecified { rules: Vec<String> },

    /// The requested rule does not exist.
    #[snafu(display("Unknown rule '{}'", rule))]
    UnknownRule { rule: String, rules: Vec<String> },

    /// The rule ran, but did not accept the input.
    #[snafu(display("{}", source))]
    RuleExecution {
        rules: Vec<String>,
        source: RuleExecutionError,
    },
}

impl ExecutionError {
    /// Returns the parser's rule names, if the parser was constructed.
    pub fn rules(&self) -> &[String] {
        match self {
            Self::Construction { .. } => &[],
            Self::NoRuleSpecified { rules } | Self::UnknownRule { rules, .. } | Self::RuleExecution { rules, .. } => {
                rules
            }
        }
    }
}

/// The outcome of a successful parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOutput {
    /// The parser's rule names, in declaration order.
    pub rules: Vec<String>,

    /// The parse tree rendered in LISP-style notation.
    pub string_tree: String,
}

/// Parses `source` with the given lexer and parser, starting at the rule named `rule`.
///
/// # Errors
///
/// If the lexer or parser cannot be constructed, if `rule` is empty or not a rule of the parser, or if the input
/// does not match the rule, an error is returned.
pub fn execute(
    parser_factory: &dyn ParserFactory, lexer_factory: &dyn LexerFactory, source: &str, rule: &str,
) -> Result<ParseOutput, ExecutionError> {
    let lexer = lexer_factory.create_lexer(source).context(Construction)?;
    let tokens = CommonTokenStream::new(lexer);
    let mut recognizer = parser_factory.create_parser(tokens).context(Construction)?;
    let rules = recognizer.rule_names().to_vec();

    ensure!(!rule.is_empty(), NoRuleSpecified { rules });
    ensure!(rules.iter().any(|name| name == rule), UnknownRule { rule, rules });

    debug!(rule, "Invoking parser rule.");
    let tree = match recognizer.invoke_rule(rule) {
        Ok(tree) => tree,
        Err(e) => return Err(e).context(RuleExecution { rules }),
    };
    let string_tree = recognizer.render_tree(&tree);

    Ok(ParseOutput { rules, string_tree })
}
