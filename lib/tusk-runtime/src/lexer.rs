//! Lexer interpretation.

use std::{collections::HashSet, sync::Arc};

use snafu::{ensure, ResultExt as _};
use tracing::trace;

use crate::{
    atn::{Atn, AtnKind, LexerAction, StateKind, Transition, MAX_CHAR_VALUE, TOKEN_EOF},
    interp::InterpreterData,
    recognizer::{ConstructionError, DefinitionError, InvalidAtn, LexerFactory, WrongKind},
    token::{escape_whitespace, SyntaxError, Token, TokenSource, DEFAULT_CHANNEL},
};

/// Token type used by the `skip` command.
const SKIP: i32 = -3;

/// Token type used by the `more` command.
const MORE: i32 = -2;

/// Token type of an accepted match whose type no command overrode yet.
const INVALID_TYPE: i32 = 0;

struct LexerDefinitionInner {
    name: String,
    atn: Atn,
    rule_names: Vec<String>,
}

/// A lexer grammar ready to tokenize input.
///
/// Cloning is cheap: clones share the deserialized ATN.
#[derive(Clone)]
pub struct LexerDefinition {
    inner: Arc<LexerDefinitionInner>,
}

impl LexerDefinition {
    /// Builds a lexer definition from interpreter data.
    ///
    /// # Errors
    ///
    /// If the serialized ATN cannot be deserialized, or describes a parser rather than a lexer, an error is returned.
    pub fn from_interpreter_data(name: impl Into<String>, data: &InterpreterData) -> Result<Self, DefinitionError> {
        let name = name.into();
        let atn = crate::atn::deserialize(&data.serialized_atn).context(InvalidAtn { name: &name })?;
        ensure!(
            atn.kind == AtnKind::Lexer,
            WrongKind {
                name: &name,
                expected: AtnKind::Lexer
            }
        );

        Ok(Self {
            inner: Arc::new(LexerDefinitionInner {
                name,
                atn,
                rule_names: data.rule_names.clone(),
            }),
        })
    }

    /// Returns the name of the lexer grammar.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the names of the lexer rules.
    pub fn rule_names(&self) -> &[String] {
        &self.inner.rule_names
    }

    /// Creates a lexer over `source`.
    pub fn lexer(&self, source: &str) -> LexerInterpreter {
        LexerInterpreter {
            definition: self.clone(),
            input: source.chars().collect(),
            position: 0,
            line: 1,
            column: 0,
            mode: 0,
            mode_stack: Vec::new(),
            hit_eof: false,
            errors: Vec::new(),
        }
    }
}

impl LexerFactory for LexerDefinition {
    fn create_lexer(&self, source: &str) -> Result<Box<dyn TokenSource>, ConstructionError> {
        if self.inner.atn.mode_to_start_state.is_empty() {
            return Err(ConstructionError::new(format!("lexer {} defines no modes", self.inner.name)));
        }
        Ok(Box::new(self.lexer(source)))
    }
}

/// A lexer configuration: a position in the ATN together with the rule invocations that led there.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Config {
    state: usize,
    alt: usize,
    stack: Vec<usize>,
    actions: Vec<usize>,
    passed_non_greedy: bool,
}

impl Config {
    fn derive(&self, atn: &Atn, target: usize) -> Self {
        let target_state = atn.state(target);
        Self {
            state: target,
            alt: self.alt,
            stack: self.stack.clone(),
            actions: self.actions.clone(),
            passed_non_greedy: self.passed_non_greedy || (target_state.kind.is_decision() && target_state.non_greedy),
        }
    }
}

/// An insertion-ordered set of configurations.
#[derive(Default)]
struct ConfigSet {
    configs: Vec<Config>,
    seen: HashSet<Config>,
}

impl ConfigSet {
    fn add(&mut self, config: Config) {
        if self.seen.insert(config.clone()) {
            self.configs.push(config);
        }
    }

    fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

struct Accept {
    end: usize,
    rule_index: usize,
    actions: Vec<usize>,
}

enum Match {
    Accept(Accept),
    Eof,
    Error { dead_end: usize },
}

/// A lexer that tokenizes input by simulating a lexer ATN directly.
///
/// Matching follows the usual rules: the longest match wins, and among matches of equal length the rule defined first
/// wins. Characters no rule can match are reported as token recognition errors and skipped.
pub struct LexerInterpreter {
    definition: LexerDefinition,
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    mode: usize,
    mode_stack: Vec<usize>,
    hit_eof: bool,
    errors: Vec<SyntaxError>,
}

impl LexerInterpreter {
    fn atn(&self) -> &Atn {
        &self.definition.inner.atn
    }

    fn advance_to(&mut self, end: usize) {
        while self.position < end && self.position < self.input.len() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn symbol_at(&self, position: usize) -> i32 {
        self.input.get(position).map_or(TOKEN_EOF, |&c| c as i32)
    }

    fn match_token(&self, start: usize) -> Match {
        let atn = self.atn();
        let Some(&mode_start) = atn.mode_to_start_state.get(self.mode) else {
            return Match::Eof;
        };

        let mut closure = ConfigSet::default();
        for (i, transition) in atn.state(mode_start).transitions.iter().enumerate() {
            let config = Config {
                state: transition.target(),
                alt: i + 1,
                stack: Vec::new(),
                actions: Vec::new(),
                passed_non_greedy: false,
            };
            self.closure(config, &mut closure, false, false, &mut HashSet::new());
        }

        let mut accepted = self.accept_from(&closure, start);
        let mut position = start;
        loop {
            let symbol = self.symbol_at(position);
            let reach = self.reachable(&closure, symbol);
            if reach.is_empty() {
                break;
            }

            if symbol != TOKEN_EOF {
                position += 1;
            }
            if let Some(accept) = self.accept_from(&reach, position) {
                accepted = Some(accept);
            }
            if symbol == TOKEN_EOF {
                break;
            }
            closure = reach;
        }

        match accepted {
            Some(accept) => Match::Accept(accept),
            None if start >= self.input.len() => Match::Eof,
            None => Match::Error { dead_end: position },
        }
    }

    fn accept_from(&self, configs: &ConfigSet, end: usize) -> Option<Accept> {
        let atn = self.atn();
        configs
            .configs
            .iter()
            .find(|c| atn.state(c.state).kind == StateKind::RuleStop)
            .map(|c| Accept {
                end,
                rule_index: atn.state(c.state).rule_index,
                actions: c.actions.clone(),
            })
    }

    fn reachable(&self, closure: &ConfigSet, symbol: i32) -> ConfigSet {
        let atn = self.atn();
        let mut reach = ConfigSet::default();
        let mut skip_alt = None;

        for config in &closure.configs {
            let current_alt_reached_accept = skip_alt == Some(config.alt);
            if current_alt_reached_accept && config.passed_non_greedy {
                continue;
            }

            for transition in &atn.state(config.state).transitions {
                if !transition.matches(symbol, 0, MAX_CHAR_VALUE) {
                    continue;
                }

                let next = config.derive(atn, transition.target());
                let treat_eof_as_epsilon = symbol == TOKEN_EOF;
                if self.closure(
                    next,
                    &mut reach,
                    current_alt_reached_accept,
                    treat_eof_as_epsilon,
                    &mut HashSet::new(),
                ) {
                    // This alternative reached an accept state; lower-priority paths of it are pointless.
                    skip_alt = Some(config.alt);
                    break;
                }
            }
        }

        reach
    }

    /// Adds the epsilon closure of `config` to `configs`, returning whether an accept state was reached.
    fn closure(
        &self, config: Config, configs: &mut ConfigSet, mut current_alt_reached_accept: bool,
        treat_eof_as_epsilon: bool, busy: &mut HashSet<Config>,
    ) -> bool {
        if !busy.insert(config.clone()) {
            return current_alt_reached_accept;
        }

        let atn = self.atn();
        let state = atn.state(config.state);
        if state.kind == StateKind::RuleStop {
            let mut config = config;
            return match config.stack.pop() {
                None => {
                    configs.add(config);
                    true
                }
                Some(follow_state) => {
                    config.state = follow_state;
                    self.closure(config, configs, current_alt_reached_accept, treat_eof_as_epsilon, busy)
                }
            };
        }

        if !state.epsilon_only && (!current_alt_reached_accept || !config.passed_non_greedy) {
            configs.add(config.clone());
        }

        for transition in &state.transitions {
            let next = match transition {
                Transition::Rule {
                    target, follow_state, ..
                } => {
                    let mut next = config.derive(atn, *target);
                    next.stack.push(*follow_state);
                    Some(next)
                }
                Transition::Epsilon { target, .. } | Transition::Predicate { target, .. } => {
                    Some(config.derive(atn, *target))
                }
                Transition::Action {
                    target, action_index, ..
                } => {
                    let mut next = config.derive(atn, *target);
                    // Actions only run for the outermost token rule, not for fragments it invokes.
                    if config.stack.is_empty() {
                        if let Ok(index) = usize::try_from(*action_index) {
                            if index < atn.lexer_actions.len() {
                                next.actions.push(index);
                            }
                        }
                    }
                    Some(next)
                }
                Transition::Atom { target, .. } | Transition::Range { target, .. } | Transition::Set { target, .. }
                    if treat_eof_as_epsilon && transition.matches(TOKEN_EOF, 0, MAX_CHAR_VALUE) =>
                {
                    Some(config.derive(atn, *target))
                }
                _ => None,
            };

            if let Some(next) = next {
                current_alt_reached_accept =
                    self.closure(next, configs, current_alt_reached_accept, treat_eof_as_epsilon, busy);
            }
        }

        current_alt_reached_accept
    }

    fn report_unrecognized(&mut self, start: usize, dead_end: usize, line: usize, column: usize) {
        let end = dead_end.min(self.input.len().saturating_sub(1));
        let text: String = self.input[start..=end].iter().collect();
        self.errors.push(SyntaxError {
            line,
            column,
            message: format!("token recognition error at: '{}'", escape_whitespace(&text)),
        });
    }
}

impl TokenSource for LexerInterpreter {
    fn next_token(&mut self) -> Token {
        'token: loop {
            if self.hit_eof {
                return Token::eof(self.position, self.line, self.column);
            }

            let start = self.position;
            let line = self.line;
            let column = self.column;
            let mut channel = DEFAULT_CHANNEL;
            let mut token_type;

            loop {
                let match_start = self.position;
                token_type = INVALID_TYPE;

                let accept = match self.match_token(match_start) {
                    Match::Eof => {
                        self.hit_eof = true;
                        return Token::eof(self.position, self.line, self.column);
                    }
                    Match::Error { dead_end } => {
                        self.report_unrecognized(start, dead_end, line, column);
                        self.advance_to(dead_end + 1);
                        continue 'token;
                    }
                    Match::Accept(accept) if accept.end == match_start => {
                        // An empty match would never make progress.
                        self.report_unrecognized(start, match_start, line, column);
                        self.advance_to(match_start + 1);
                        continue 'token;
                    }
                    Match::Accept(accept) => accept,
                };

                self.advance_to(accept.end);
                for &action in &accept.actions {
                    match self.definition.inner.atn.lexer_actions[action] {
                        LexerAction::Channel(value) => channel = value,
                        LexerAction::Custom { .. } => {}
                        LexerAction::Mode(mode) => self.mode = mode,
                        LexerAction::More => token_type = MORE,
                        LexerAction::PopMode => {
                            if let Some(mode) = self.mode_stack.pop() {
                                self.mode = mode;
                            }
                        }
                        LexerAction::PushMode(mode) => {
                            self.mode_stack.push(self.mode);
                            self.mode = mode;
                        }
                        LexerAction::Skip => token_type = SKIP,
                        LexerAction::Type(value) => token_type = value,
                    }
                }

                if token_type == INVALID_TYPE {
                    token_type = self
                        .definition
                        .inner
                        .atn
                        .rule_to_token_type
                        .get(accept.rule_index)
                        .copied()
                        .unwrap_or(INVALID_TYPE);
                }
                if self.position >= self.input.len() {
                    self.hit_eof = true;
                }

                match token_type {
                    SKIP => continue 'token,
                    MORE if !self.hit_eof => continue,
                    _ => break,
                }
            }

            if token_type == MORE {
                return Token::eof(self.position, self.line, self.column);
            }

            let token = Token {
                token_type,
                text: self.input[start..self.position].iter().collect(),
                channel,
                start,
                end: self.position,
                line,
                column,
                index: 0,
            };
            trace!(token_type, text = %token.text, line, column, "Lexed token.");
            return token;
        }
    }

    fn take_errors(&mut self) -> Vec<SyntaxError> {
        std::mem::take(&mut self.errors)
    }
}
