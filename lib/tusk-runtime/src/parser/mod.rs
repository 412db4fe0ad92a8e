//! Parser interpretation.

use std::{collections::BTreeSet, sync::Arc};

use snafu::{ensure, OptionExt as _, ResultExt as _};
use tracing::debug;

use crate::{
    atn::{Atn, AtnKind, StateKind, Transition, MIN_USER_TOKEN_TYPE, TOKEN_EOF},
    interp::InterpreterData,
    recognizer::{
        ConstructionError, DefinitionError, Internal, InvalidAtn, ParserFactory, Recognizer, RuleCountMismatch,
        RuleExecutionError, Syntax, UnknownRule, WrongKind,
    },
    stream::CommonTokenStream,
    token::{SyntaxError, Token, Vocabulary},
    tree::{Child, ParseTree, RuleNode},
};

mod config;
mod context;
mod dfa;
mod prediction;
mod semantic;

use self::dfa::PredictionCache;

/// Largest token type a set or wildcard transition will match.
const MAX_TOKEN_TYPE: i32 = 0xFFFF;

struct ParserDefinitionInner {
    name: String,
    atn: Atn,
    rule_names: Vec<String>,
    vocabulary: Vocabulary,
}

/// A parser grammar ready to recognize token streams.
///
/// Cloning is cheap: clones share the deserialized ATN.
#[derive(Clone)]
pub struct ParserDefinition {
    inner: Arc<ParserDefinitionInner>,
}

impl ParserDefinition {
    /// Builds a parser definition from interpreter data.
    ///
    /// # Errors
    ///
    /// If the serialized ATN cannot be deserialized, describes a lexer rather than a parser, or does not match the
    /// listed rule names, an error is returned.
    pub fn from_interpreter_data(name: impl Into<String>, data: &InterpreterData) -> Result<Self, DefinitionError> {
        let name = name.into();
        let atn = crate::atn::deserialize(&data.serialized_atn).context(InvalidAtn { name: &name })?;
        ensure!(
            atn.kind == AtnKind::Parser,
            WrongKind {
                name: &name,
                expected: AtnKind::Parser
            }
        );
        ensure!(
            atn.rule_count() == data.rule_names.len(),
            RuleCountMismatch {
                name: &name,
                named: data.rule_names.len(),
                defined: atn.rule_count(),
            }
        );

        Ok(Self {
            inner: Arc::new(ParserDefinitionInner {
                name,
                atn,
                rule_names: data.rule_names.clone(),
                vocabulary: Vocabulary::new(data.literal_names.clone(), data.symbolic_names.clone()),
            }),
        })
    }

    /// Returns the name of the parser grammar.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the names of the parser rules.
    pub fn rule_names(&self) -> &[String] {
        &self.inner.rule_names
    }

    /// Creates a parser over `tokens`.
    pub fn parser(&self, tokens: CommonTokenStream) -> ParserInterpreter {
        ParserInterpreter {
            cache: PredictionCache::new(&self.inner.atn),
            definition: self.clone(),
            tokens,
        }
    }
}

impl ParserFactory for ParserDefinition {
    fn create_parser(&self, tokens: CommonTokenStream) -> Result<Box<dyn Recognizer>, ConstructionError> {
        if self.inner.atn.rule_count() == 0 {
            return Err(ConstructionError::new(format!("parser {} defines no rules", self.inner.name)));
        }
        Ok(Box::new(self.parser(tokens)))
    }
}

/// A parser that recognizes a token stream by walking a parser ATN directly.
///
/// Decisions are predicted from a per-parser cache first, falling back to the full rule invocation stack when the
/// cached view is ambiguous. Parsing stops at the first syntax error.
pub struct ParserInterpreter {
    definition: ParserDefinition,
    tokens: CommonTokenStream,
    cache: PredictionCache,
}

impl Recognizer for ParserInterpreter {
    fn rule_names(&self) -> &[String] {
        &self.definition.inner.rule_names
    }

    fn invoke_rule(&mut self, rule_name: &str) -> Result<ParseTree, RuleExecutionError> {
        let definition = self.definition.clone();
        let inner = &definition.inner;
        let rule_index = inner
            .rule_names
            .iter()
            .position(|name| name == rule_name)
            .context(UnknownRule { rule: rule_name })?;

        let outcome = Interpretation::new(
            &inner.atn,
            &inner.vocabulary,
            &inner.rule_names,
            &mut self.tokens,
            &mut self.cache,
        )
        .run(rule_index);
        let mut errors = self.tokens.take_errors();
        match outcome {
            Ok(tree) if errors.is_empty() => Ok(tree),
            Ok(_) => Syntax { errors }.fail(),
            Err(Failure::Syntax(error)) => {
                debug!(rule = rule_name, error = %error, "Input rejected by parser.");
                errors.push(error);
                Syntax { errors }.fail()
            }
            Err(Failure::Internal(reason)) => Internal { reason }.fail(),
        }
    }
}

enum Failure {
    Syntax(SyntaxError),
    Internal(String),
}

fn internal(reason: &str) -> Failure {
    Failure::Internal(reason.to_string())
}

/// Where a rule context hangs in the invocation chain.
#[derive(Clone, Copy)]
struct Link {
    parent: Option<usize>,
    invoking_state: Option<usize>,
}

/// The state of one rule invocation in progress.
///
/// Rule contexts double as parse tree nodes: `nodes` and `links` are indexed by the same context id.
struct Interpretation<'a> {
    atn: &'a Atn,
    vocabulary: &'a Vocabulary,
    rule_names: &'a [String],
    tokens: &'a mut CommonTokenStream,
    cache: &'a mut PredictionCache,
    nodes: Vec<RuleNode>,
    links: Vec<Link>,
    ctx: usize,
    state: usize,
    position: usize,
    precedence_stack: Vec<i32>,
    parent_context_stack: Vec<(Option<usize>, Option<usize>)>,
    idle_steps: usize,
}

impl<'a> Interpretation<'a> {
    fn new(
        atn: &'a Atn, vocabulary: &'a Vocabulary, rule_names: &'a [String], tokens: &'a mut CommonTokenStream,
        cache: &'a mut PredictionCache,
    ) -> Self {
        let position = tokens.next_visible(0);
        Self {
            atn,
            vocabulary,
            rule_names,
            tokens,
            cache,
            nodes: Vec::new(),
            links: Vec::new(),
            ctx: 0,
            state: 0,
            position,
            precedence_stack: vec![0],
            parent_context_stack: Vec::new(),
            idle_steps: 0,
        }
    }

    fn run(mut self, start_rule: usize) -> Result<ParseTree, Failure> {
        let atn = self.atn;
        let start_state = atn.rule_to_start_state[start_rule];
        let start_is_left_recursive = atn.state(start_state).left_recursive_rule;
        let idle_limit = atn.states.len().saturating_mul(64).max(100_000);

        let root = self.new_context(None, None, start_rule);
        if start_is_left_recursive {
            self.enter_recursion_rule(root, start_state, 0);
        } else {
            self.enter_rule(root, start_state);
        }

        loop {
            self.idle_steps += 1;
            if self.idle_steps > idle_limit {
                return Err(internal("parser stopped making progress"));
            }

            if atn.state(self.state).kind != StateKind::RuleStop {
                self.visit_state()?;
                continue;
            }

            if self.links[self.ctx].invoking_state.is_some() {
                self.visit_rule_stop_state()?;
                continue;
            }

            let result = if start_is_left_recursive {
                let (parent, _) = self
                    .parent_context_stack
                    .pop()
                    .ok_or_else(|| internal("recursion context stack underflow"))?;
                self.unroll_recursion_contexts(parent)
            } else {
                self.ctx
            };
            return Ok(ParseTree {
                nodes: self.nodes,
                root: result,
            });
        }
    }

    fn new_context(&mut self, parent: Option<usize>, invoking_state: Option<usize>, rule_index: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(RuleNode {
            rule_index,
            children: Vec::new(),
        });
        self.links.push(Link {
            parent,
            invoking_state,
        });
        id
    }

    fn enter_rule(&mut self, ctx: usize, state: usize) {
        self.state = state;
        self.ctx = ctx;
        if let Some(parent) = self.links[ctx].parent {
            self.nodes[parent].children.push(Child::Rule(ctx));
        }
    }

    /// Enters a left-recursive rule. Its context joins the tree only once the recursion unrolls.
    fn enter_recursion_rule(&mut self, ctx: usize, state: usize, precedence: i32) {
        let link = self.links[ctx];
        self.parent_context_stack.push((link.parent, link.invoking_state));
        self.precedence_stack.push(precedence);
        self.state = state;
        self.ctx = ctx;
    }

    /// Wraps the current context in a fresh context of the same rule, making it the new context's first child.
    fn push_new_recursion_context(&mut self, ctx: usize, rule_start_state: usize) {
        let previous = self.ctx;
        self.links[previous] = Link {
            parent: Some(ctx),
            invoking_state: Some(rule_start_state),
        };
        self.ctx = ctx;
        self.nodes[ctx].children.push(Child::Rule(previous));
    }

    /// Leaves a left-recursive rule, attaching the outermost recursion context to `parent`.
    fn unroll_recursion_contexts(&mut self, parent: Option<usize>) -> usize {
        self.precedence_stack.pop();
        let result = self.ctx;
        self.links[result].parent = parent;
        if let Some(parent) = parent {
            self.nodes[parent].children.push(Child::Rule(result));
            self.ctx = parent;
        }
        result
    }

    fn visit_rule_stop_state(&mut self) -> Result<(), Failure> {
        let atn = self.atn;
        let rule_index = atn.state(self.state).rule_index;
        let rule_start = atn.rule_to_start_state[rule_index];

        let invoking_state = if atn.state(rule_start).left_recursive_rule {
            let (parent, invoking_state) = self
                .parent_context_stack
                .pop()
                .ok_or_else(|| internal("recursion context stack underflow"))?;
            self.unroll_recursion_contexts(parent);
            invoking_state
        } else {
            let link = self.links[self.ctx];
            self.ctx = link.parent.ok_or_else(|| internal("returned from the outermost rule"))?;
            link.invoking_state
        };

        self.state = invoking_state
            .and_then(|state| atn.follow_state_of(state))
            .ok_or_else(|| internal("rule returned to a state that did not invoke it"))?;
        Ok(())
    }

    fn visit_state(&mut self) -> Result<(), Failure> {
        let atn = self.atn;
        let state = atn.state(self.state);

        let alt = if state.transitions.len() > 1 {
            self.sync()?;
            self.adaptive_predict(state.number)?
        } else {
            1
        };
        let transition = state
            .transitions
            .get(alt - 1)
            .ok_or_else(|| internal("state has no transition to follow"))?;

        match transition {
            Transition::Epsilon { target, .. } => {
                if state.kind == StateKind::StarLoopEntry
                    && state.precedence_decision
                    && atn.state(*target).kind != StateKind::LoopEnd
                {
                    let (parent, invoking_state) = *self
                        .parent_context_stack
                        .last()
                        .ok_or_else(|| internal("precedence loop outside a recursive rule"))?;
                    let rule_index = self.nodes[self.ctx].rule_index;
                    let ctx = self.new_context(parent, invoking_state, rule_index);
                    self.push_new_recursion_context(ctx, atn.rule_to_start_state[state.rule_index]);
                }
            }
            Transition::Atom { label, .. } => {
                if self.current().token_type != *label {
                    return Err(self.mismatched_transition());
                }
                self.consume();
            }
            Transition::Range { .. } | Transition::Set { .. } | Transition::NotSet { .. } => {
                if !transition.matches(self.current().token_type, MIN_USER_TOKEN_TYPE, MAX_TOKEN_TYPE) {
                    return Err(self.mismatched_transition());
                }
                self.consume_any()?;
            }
            Transition::Wildcard { .. } => self.consume_any()?,
            Transition::Rule {
                target,
                rule_index,
                precedence,
                ..
            } => {
                let ctx = self.new_context(Some(self.ctx), Some(state.number), *rule_index);
                if atn.state(*target).left_recursive_rule {
                    self.enter_recursion_rule(ctx, *target, *precedence);
                } else {
                    self.enter_rule(ctx, *target);
                }
            }
            Transition::Predicate { .. } | Transition::Action { .. } => {}
            Transition::Precedence { precedence, .. } => {
                if *precedence < self.current_precedence() {
                    let token = self.current();
                    let rule_name = self
                        .rule_names
                        .get(self.nodes[self.ctx].rule_index)
                        .map(String::as_str)
                        .unwrap_or("<unknown>");
                    return Err(Failure::Syntax(SyntaxError {
                        line: token.line,
                        column: token.column,
                        message: format!(
                            "rule {} failed predicate: {{precpred(_ctx, {})}}?",
                            rule_name, precedence
                        ),
                    }));
                }
            }
        }

        self.state = transition.target();
        Ok(())
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position)
    }

    fn current_precedence(&self) -> i32 {
        self.precedence_stack.last().copied().unwrap_or(0)
    }

    fn consume(&mut self) {
        let token = self.current().clone();
        let at_eof = token.is_eof();
        self.nodes[self.ctx].children.push(Child::Token(token));
        if !at_eof {
            self.position = self.tokens.next_visible(self.position + 1);
        }
        self.idle_steps = 0;
    }

    /// Consumes the current token whatever its type, as long as it is not end-of-file.
    fn consume_any(&mut self) -> Result<(), Failure> {
        if self.current().token_type < MIN_USER_TOKEN_TYPE {
            return Err(self.mismatched_transition());
        }
        self.consume();
        Ok(())
    }

    /// Describes why the current token cannot leave the current state.
    ///
    /// A stray token followed by an expected one is reported as extraneous, and a token that would match right after
    /// the state's first edge is reported as a missing token. Anything else is a plain mismatch.
    fn mismatched_transition(&mut self) -> Failure {
        let current = self.current().token_type;
        if current != TOKEN_EOF {
            let after = self.tokens.next_visible(self.position + 1);
            if self.expected_tokens().contains(&self.tokens.get(after).token_type) {
                return self.unwanted_token();
            }
        }

        let after_first_edge = self.atn.state(self.state).transitions.first().map(Transition::target);
        if after_first_edge.is_some_and(|next| self.expected_tokens_at(next).contains(&current)) {
            let expected = self.expected_tokens();
            let token = self.current();
            return Failure::Syntax(SyntaxError {
                line: token.line,
                column: token.column,
                message: format!(
                    "missing {} at {}",
                    self.describe_token_set(&expected),
                    token.error_display()
                ),
            });
        }

        self.mismatched_input()
    }

    fn mismatched_input(&self) -> Failure {
        let expected = self.expected_tokens();
        let token = self.current();
        Failure::Syntax(SyntaxError {
            line: token.line,
            column: token.column,
            message: format!(
                "mismatched input {} expecting {}",
                token.error_display(),
                self.describe_token_set(&expected)
            ),
        })
    }

    fn unwanted_token(&self) -> Failure {
        let expected = self.expected_tokens();
        let token = self.current();
        Failure::Syntax(SyntaxError {
            line: token.line,
            column: token.column,
            message: format!(
                "extraneous input {} expecting {}",
                token.error_display(),
                self.describe_token_set(&expected)
            ),
        })
    }

    fn describe_token_set(&self, set: &BTreeSet<i32>) -> String {
        let names = set.iter().map(|&t| self.vocabulary.display_name(t)).collect::<Vec<_>>();
        match names.as_slice() {
            [single] => single.clone(),
            names => format!("{{{}}}", names.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests;
