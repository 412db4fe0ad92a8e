//! Grammar name extraction.

use std::sync::LazyLock;

use regex::Regex;
use snafu::{OptionExt as _, Snafu};

static GRAMMAR_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:lexer|parser)?\s*grammar\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("grammar header pattern should be valid")
});

/// Name extraction error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum NameError {
    /// No line of the grammar declares its name.
    #[snafu(display("Could not determine grammar name"))]
    NotFound,
}

/// Extracts the declared name of a grammar from its header.
///
/// The header is the first line that reads `grammar <Name>`, optionally qualified as a `lexer` or `parser` grammar.
/// Leading whitespace is tolerated.
///
/// # Errors
///
/// If no line of `grammar` holds a header, an error is returned.
pub fn extract_grammar_name(grammar: &str) -> Result<&str, NameError> {
    GRAMMAR_HEADER
        .captures(grammar)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
        .context(NotFound)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn unified_header() {
        assert_eq!(extract_grammar_name("grammar Expr;").unwrap(), "Expr");
    }

    #[test]
    fn qualified_headers() {
        assert_eq!(extract_grammar_name(" parser grammar Y;").unwrap(), "Y");
        assert_eq!(extract_grammar_name("lexer grammar ExprLexer;").unwrap(), "ExprLexer");
    }

    #[test]
    fn header_after_leading_comments() {
        let grammar = "// An arithmetic grammar.\n\n\tgrammar Calc_2;\nprog : EOF ;\n";
        assert_eq!(extract_grammar_name(grammar).unwrap(), "Calc_2");
    }

    #[test]
    fn missing_header() {
        let err = extract_grammar_name("prog : EOF ;").unwrap_err();
        assert_eq!(err.to_string(), "Could not determine grammar name");
    }

    #[test]
    fn identifier_cannot_start_with_a_digit() {
        assert!(extract_grammar_name("grammar 9Lives;").is_err());
    }

    proptest! {
        #[test]
        fn any_identifier_is_recovered(
            name in "[A-Za-z_][A-Za-z0-9_]{0,20}",
            qualifier in prop::sample::select(vec!["", "lexer ", "parser "]),
            indent in "[ \t]{0,4}",
        ) {
            let grammar = format!("{}{}grammar {};\nrule : 'x' ;\n", indent, qualifier, name);
            prop_assert_eq!(extract_grammar_name(&grammar).unwrap(), name.as_str());
        }

        #[test]
        fn text_without_the_keyword_never_yields_a_name(text in "[^gG]*") {
            prop_assert!(extract_grammar_name(&text).is_err());
        }
    }
}
