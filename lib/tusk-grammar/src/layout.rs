//! Grammar layouts.

/// How a request's grammar is split across files.
///
/// The layout decides which grammar files get written and compiled, and which generated units hold the lexer and
/// the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarLayout {
    /// A single combined grammar declaring both lexer and parser rules.
    Unified { name: String },

    /// Separate lexer and parser grammars.
    Split { lexer: String, parser: String },
}

impl GrammarLayout {
    /// Returns the name reported for the grammar as a whole.
    pub fn grammar_name(&self) -> &str {
        match self {
            Self::Unified { name } => name,
            Self::Split { parser, .. } => parser,
        }
    }

    /// Returns the declared names of the grammars to compile, in compilation order.
    pub fn compilation_order(&self) -> Vec<&str> {
        match self {
            Self::Unified { name } => vec![name],
            Self::Split { lexer, parser } => vec![lexer, parser],
        }
    }

    /// Returns the name of the generated lexer unit.
    pub fn lexer_unit(&self) -> String {
        match self {
            Self::Unified { name } => format!("{}Lexer", name),
            Self::Split { lexer, .. } => lexer.clone(),
        }
    }

    /// Returns the name of the generated parser unit.
    pub fn parser_unit(&self) -> String {
        match self {
            Self::Unified { name } => name.clone(),
            Self::Split { parser, .. } => parser.clone(),
        }
    }

    /// Returns the name of the lexer's entry point.
    pub fn lexer_entry_point(&self) -> String {
        self.lexer_unit()
    }

    /// Returns the name of the parser's entry point.
    pub fn parser_entry_point(&self) -> String {
        match self {
            Self::Unified { name } => format!("{}Parser", name),
            Self::Split { parser, .. } => parser.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_units() {
        let layout = GrammarLayout::Unified { name: "Expr".into() };
        assert_eq!(layout.grammar_name(), "Expr");
        assert_eq!(layout.compilation_order(), vec!["Expr"]);
        assert_eq!(layout.lexer_unit(), "ExprLexer");
        assert_eq!(layout.parser_unit(), "Expr");
        assert_eq!(layout.parser_entry_point(), "ExprParser");
    }

    #[test]
    fn split_units() {
        let layout = GrammarLayout::Split {
            lexer: "CalcLexer".into(),
            parser: "CalcParser".into(),
        };
        assert_eq!(layout.grammar_name(), "CalcParser");
        assert_eq!(layout.compilation_order(), vec!["CalcLexer", "CalcParser"]);
        assert_eq!(layout.lexer_unit(), "CalcLexer");
        assert_eq!(layout.parser_unit(), "CalcParser");
        assert_eq!(layout.lexer_entry_point(), "CalcLexer");
    }
}
