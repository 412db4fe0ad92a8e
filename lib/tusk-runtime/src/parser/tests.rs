use super::*;
use crate::{
    lexer::LexerDefinition,
    recognizer::LexerFactory as _,
    test::{expression_lexer, expression_parser},
};

fn parse(rule: &str, input: &str) -> Result<String, Vec<String>> {
    let lexer = LexerDefinition::from_interpreter_data("ExprLexer", &expression_lexer()).unwrap();
    let parser = ParserDefinition::from_interpreter_data("ExprParser", &expression_parser()).unwrap();

    let tokens = CommonTokenStream::new(lexer.create_lexer(input).unwrap());
    let mut recognizer = parser.create_parser(tokens).unwrap();
    match recognizer.invoke_rule(rule) {
        Ok(tree) => Ok(recognizer.render_tree(&tree)),
        Err(e) => Err(e.messages()),
    }
}

#[test]
fn binary_operators_follow_precedence() {
    assert_eq!(
        parse("prog", "1+2*3").unwrap(),
        "(prog (expr (expr (atom 1)) + (expr (expr (atom 2)) * (expr (atom 3)))) <EOF>)"
    );
}

#[test]
fn higher_precedence_operator_binds_first() {
    assert_eq!(
        parse("prog", "1*2+3").unwrap(),
        "(prog (expr (expr (expr (atom 1)) * (expr (atom 2))) + (expr (atom 3))) <EOF>)"
    );
}

#[test]
fn left_recursive_rule_as_entry_point() {
    assert_eq!(parse("expr", "1+2").unwrap(), "(expr (expr (atom 1)) + (expr (atom 2)))");
}

#[test]
fn nested_rule_invocation() {
    assert_eq!(parse("atom", "(1)").unwrap(), "(atom ( (expr (atom 1)) ))");
}

#[test]
fn hidden_tokens_stay_out_of_the_tree() {
    assert_eq!(
        parse("prog", "1 # one\n+ 2").unwrap(),
        "(prog (expr (expr (atom 1)) + (expr (atom 2))) <EOF>)"
    );
}

#[test]
fn deeply_nested_input() {
    let depth = 400;
    let input = format!("{}7{}", "(".repeat(depth), ")".repeat(depth));
    let tree = parse("prog", &input).unwrap();
    assert!(tree.starts_with("(prog (expr (atom ( (expr (atom ( "));
    assert!(tree.ends_with(" ))) <EOF>)"));
    assert_eq!(tree.matches("(atom ( ").count(), depth);
}

#[test]
fn repeated_predictions_come_from_the_cache() {
    let lexer = LexerDefinition::from_interpreter_data("ExprLexer", &expression_lexer()).unwrap();
    let parser = ParserDefinition::from_interpreter_data("ExprParser", &expression_parser()).unwrap();
    let mut interpreter = parser.parser(CommonTokenStream::new(lexer.create_lexer("1+2*3").unwrap()));
    let dfa_states = |interpreter: &ParserInterpreter| {
        interpreter.cache.dfas.iter().map(|dfa| dfa.state_count()).sum::<usize>()
    };

    let first = interpreter.invoke_rule("prog").unwrap();
    let computed = dfa_states(&interpreter);
    assert!(computed > 0);

    let second = interpreter.invoke_rule("prog").unwrap();
    assert_eq!(dfa_states(&interpreter), computed);
    assert_eq!(interpreter.render_tree(&first), interpreter.render_tree(&second));
}

#[test]
fn entry_rule_need_not_consume_all_input() {
    assert_eq!(parse("expr", "1 2").unwrap(), "(expr (atom 1))");
}

#[test]
fn lexer_errors_precede_parser_errors() {
    assert_eq!(
        parse("prog", "1 $ 2").unwrap_err(),
        vec![
            "line 1:2 token recognition error at: '$'",
            "line 1:4 extraneous input '2' expecting <EOF>",
        ]
    );
}

#[test]
fn lexer_errors_alone_fail_the_parse() {
    assert_eq!(
        parse("prog", "1$").unwrap_err(),
        vec!["line 1:1 token recognition error at: '$'"]
    );
}

#[test]
fn truncated_input_reports_expected_tokens() {
    assert_eq!(
        parse("prog", "1+").unwrap_err(),
        vec!["line 1:2 mismatched input '<EOF>' expecting {'(', INT}"]
    );
}

#[test]
fn missing_token_is_reported() {
    assert_eq!(parse("atom", "(1").unwrap_err(), vec!["line 1:2 missing ')' at '<EOF>'"]);
}

#[test]
fn unexpected_token_is_reported() {
    assert_eq!(
        parse("prog", "+").unwrap_err(),
        vec!["line 1:0 mismatched input '+' expecting {'(', INT}"]
    );
}

#[test]
fn unknown_rule() {
    assert_eq!(parse("statement", "1").unwrap_err(), vec!["Unknown rule 'statement'"]);
}

#[test]
fn lexer_data_is_rejected() {
    let err = ParserDefinition::from_interpreter_data("ExprLexer", &expression_lexer())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        DefinitionError::WrongKind {
            expected: AtnKind::Parser,
            ..
        }
    ));
}

#[test]
fn rule_names_must_match_the_network() {
    let mut data = expression_parser();
    data.rule_names.pop();

    let err = ParserDefinition::from_interpreter_data("ExprParser", &data).err().unwrap();
    assert!(matches!(
        err,
        DefinitionError::RuleCountMismatch {
            named: 2,
            defined: 3,
            ..
        }
    ));
}
