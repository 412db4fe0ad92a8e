//! Adaptive prediction.
//!
//! A decision is first predicted without the real rule invocation stack: returning from the decision's rule is
//! simulated as returning to every place that rule is invoked from. Those predictions depend only on the decision and
//! the lookahead, so each decision caches them in a [`Dfa`] that later predictions walk instead of the ATN. When that
//! view leaves alternatives in conflict, prediction is repeated with the actual invocation stack.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::trace;

use super::{
    config::{single_viable_alt, Config, ConfigKey, ConfigSet},
    context::{ContextId, PredictionContexts, EMPTY_RETURN_STATE},
    dfa::{Dfa, DfaState, Edge, PredictionCache},
    internal,
    semantic::SemanticContext,
    Failure, Interpretation,
};
use crate::{
    atn::{Atn, StateKind, Transition, TOKEN_EOF},
    stream::CommonTokenStream,
    token::{escape_whitespace, SyntaxError},
};

/// Marker for "the end of the rule was reached" in follow sets.
const EPSILON: i32 = -2;

enum Outcome {
    Predicted(usize),
    /// No alternative matches the lookahead. `offending` is the index of the token where the last one failed.
    NoViableAlt { offending: usize },
    /// The cached view cannot separate the alternatives, so the invocation stack has to.
    NeedsFullContext,
}

/// A unit of closure work.
enum Step {
    /// Visits a configuration, first returning from its rule if it sits at the rule's stop state.
    Visit {
        config: Config,
        collect_predicates: bool,
        depth: i32,
        check_busy: bool,
    },
    /// Follows the edges leaving a configuration's state.
    Expand {
        config: Config,
        collect_predicates: bool,
        depth: i32,
    },
    Add(Config),
}

/// Simulates the ATN for one decision.
struct Simulator<'a> {
    atn: &'a Atn,
    contexts: &'a mut PredictionContexts,
    /// Rule of a decision that picks between continuing and leaving a precedence loop.
    precedence_rule: Option<usize>,
    /// Precedence of the rule invocation the decision is made in.
    precedence: i32,
}

impl Simulator<'_> {
    fn predict_sll(&mut self, dfa: &mut Dfa, tokens: &mut CommonTokenStream, start: usize) -> Outcome {
        let s0 = match dfa.start_state(self.precedence) {
            Some(s0) => s0,
            None => {
                let mut configs = self.compute_start_state(dfa.decision_state, ContextId::EMPTY, false);
                if dfa.is_precedence_dfa {
                    configs = self.apply_precedence_filter(&configs);
                }
                let s0 = dfa.add_state(DfaState::new(configs));
                dfa.set_start_state(self.precedence, s0);
                s0
            }
        };

        let mut previous = s0;
        let mut index = start;
        loop {
            let symbol = tokens.get(index).token_type;
            let edge = match dfa.edge(previous, symbol) {
                Some(edge) => edge,
                None => self.compute_target_state(dfa, previous, symbol),
            };
            let Edge::To(next) = edge else {
                return match self.alt_that_finished_decision_entry_rule(&dfa.state(previous).configs) {
                    Some(alt) => Outcome::Predicted(alt),
                    None => Outcome::NoViableAlt { offending: index },
                };
            };

            let state = dfa.state(next);
            if state.requires_full_context {
                if let Some(predicates) = &state.predicates {
                    let alts = self.evaluate_predicates(predicates);
                    if let (1, Some(&alt)) = (alts.len(), alts.first()) {
                        return Outcome::Predicted(alt);
                    }
                }
                return Outcome::NeedsFullContext;
            }
            if state.is_accept {
                return match &state.predicates {
                    None => Outcome::Predicted(state.prediction),
                    Some(predicates) => match self.evaluate_predicates(predicates).first() {
                        Some(&alt) => Outcome::Predicted(alt),
                        None => Outcome::NoViableAlt { offending: start },
                    },
                };
            }

            previous = next;
            if symbol != TOKEN_EOF {
                index = tokens.next_visible(index + 1);
            }
        }
    }

    fn compute_target_state(&mut self, dfa: &mut Dfa, previous: usize, symbol: i32) -> Edge {
        let Some(reach) = self.compute_reach_set(&dfa.state(previous).configs, symbol, false) else {
            dfa.add_edge(previous, symbol, Edge::Error);
            return Edge::Error;
        };

        let alt_count = self.atn.state(dfa.decision_state).transitions.len();
        let mut state = DfaState::new(reach);
        if let Some(alt) = state.configs.unique_alt() {
            state.accept(&BTreeSet::from([alt]), alt_count);
        } else if self.has_sll_conflict_terminating_prediction(&state.configs) {
            let conflicting = state
                .configs
                .conflicting_alt_subsets()
                .into_iter()
                .flatten()
                .collect::<BTreeSet<_>>();
            state.requires_full_context = true;
            state.accept(&conflicting, alt_count);
        }

        let next = dfa.add_state(state);
        dfa.add_edge(previous, symbol, Edge::To(next));
        Edge::To(next)
    }

    fn predict_ll(
        &mut self, decision_state: usize, outer_context: ContextId, tokens: &mut CommonTokenStream, start: usize,
    ) -> Outcome {
        let mut previous = self.compute_start_state(decision_state, outer_context, true);
        let mut index = start;
        loop {
            let symbol = tokens.get(index).token_type;
            let Some(reach) = self.compute_reach_set(&previous, symbol, true) else {
                return match self.alt_that_finished_decision_entry_rule(&previous) {
                    Some(alt) => Outcome::Predicted(alt),
                    None => Outcome::NoViableAlt { offending: index },
                };
            };

            let resolved = reach
                .unique_alt()
                .or_else(|| single_viable_alt(&reach.conflicting_alt_subsets()));
            if let Some(alt) = resolved {
                return Outcome::Predicted(alt);
            }

            previous = reach;
            if symbol != TOKEN_EOF {
                index = tokens.next_visible(index + 1);
            }
        }
    }

    /// Returns the alternatives whose guarding predicates hold, lowest first.
    fn evaluate_predicates(&self, predicates: &[(SemanticContext, usize)]) -> BTreeSet<usize> {
        predicates
            .iter()
            .filter_map(|(predicate, alt)| {
                let holds = predicate.eval(self.precedence);
                if !holds {
                    trace!(%predicate, alt, precedence = self.precedence, "Predicate rules out alternative.");
                }
                holds.then_some(*alt)
            })
            .collect()
    }

    /// Picks the alternative to fall back on when no alternative matches: the lowest one that made it out of the
    /// decision's rule, preferring configurations whose predicates hold.
    fn alt_that_finished_decision_entry_rule(&self, configs: &ConfigSet) -> Option<usize> {
        let finished = |valid: bool| {
            configs
                .iter()
                .filter(|c| c.semantic.eval(self.precedence) == valid)
                .filter(|c| {
                    c.reaches_into_outer_context > 0
                        || (self.atn.state(c.state).kind == StateKind::RuleStop
                            && self.contexts.has_empty_path(c.context))
                })
                .map(|c| c.alt)
                .min()
        };
        finished(true).or_else(|| finished(false))
    }

    fn has_sll_conflict_terminating_prediction(&self, configs: &ConfigSet) -> bool {
        if configs.all_in_rule_stop_states(self.atn) {
            return true;
        }
        let conflicting = configs
            .conflicting_alt_subsets()
            .iter()
            .any(|alts| alts.len() > 1);
        conflicting && !configs.has_state_associated_with_one_alt()
    }

    fn compute_start_state(&mut self, decision_state: usize, context: ContextId, full_context: bool) -> ConfigSet {
        let atn = self.atn;
        let mut configs = ConfigSet::new(full_context);
        for (i, transition) in atn.state(decision_state).transitions.iter().enumerate() {
            let config = Config::new(transition.target(), i + 1, context);
            self.closure(config, &mut configs, &mut HashSet::new(), true, false);
        }
        configs
    }

    /// Drops the configurations a precedence loop cannot reach at the current precedence.
    ///
    /// Alternative 1 of a precedence decision continues the loop. Its precedence predicates are settled here, and any
    /// other alternative that reached the same state with the same stack is dropped in its favour.
    fn apply_precedence_filter(&mut self, configs: &ConfigSet) -> ConfigSet {
        let mut states_from_alt1 = HashMap::new();
        let mut filtered = ConfigSet::new(configs.is_full_context());
        for config in configs.iter().filter(|c| c.alt == 1) {
            let Some(semantic) = config.semantic.eval_precedence(self.precedence) else {
                continue;
            };
            states_from_alt1.insert(config.state, config.context);
            filtered.add(
                Config {
                    semantic,
                    ..config.clone()
                },
                self.contexts,
            );
        }

        for config in configs.iter().filter(|c| c.alt != 1) {
            if !config.precedence_filter_suppressed && states_from_alt1.get(&config.state) == Some(&config.context) {
                continue;
            }
            filtered.add(config.clone(), self.contexts);
        }
        filtered
    }

    fn compute_reach_set(&mut self, closure: &ConfigSet, symbol: i32, full_context: bool) -> Option<ConfigSet> {
        let atn = self.atn;
        let mut intermediate = ConfigSet::new(full_context);
        let mut skipped_stop_states = Vec::new();
        for config in closure.iter() {
            let state = atn.state(config.state);
            if state.kind == StateKind::RuleStop {
                if full_context || symbol == TOKEN_EOF {
                    skipped_stop_states.push(config.clone());
                }
                continue;
            }

            for transition in &state.transitions {
                if transition.matches(symbol, 0, atn.max_token_type) {
                    intermediate.add(config.moved_to(transition.target()), self.contexts);
                }
            }
        }

        let shortcut = skipped_stop_states.is_empty()
            && symbol != TOKEN_EOF
            && (intermediate.len() == 1 || intermediate.unique_alt().is_some());
        let mut reach = if shortcut {
            intermediate
        } else {
            let mut reach = ConfigSet::new(full_context);
            let mut busy = HashSet::new();
            for config in intermediate.iter() {
                self.closure(config.clone(), &mut reach, &mut busy, false, symbol == TOKEN_EOF);
            }
            reach
        };

        if symbol == TOKEN_EOF {
            reach.retain(|c| atn.state(c.state).kind == StateKind::RuleStop);
        }

        // Configurations that already finished the entry rule still match, unless full-context prediction found
        // others that finished along with this token.
        if !skipped_stop_states.is_empty() && (!full_context || !reach.has_config_in_rule_stop_state(atn)) {
            for config in skipped_stop_states {
                reach.add(config, self.contexts);
            }
        }

        (!reach.is_empty()).then_some(reach)
    }

    /// Adds every configuration reachable from `config` without consuming input.
    fn closure(
        &mut self, config: Config, configs: &mut ConfigSet, busy: &mut HashSet<ConfigKey>, collect_predicates: bool,
        treat_eof_as_epsilon: bool,
    ) {
        let full_context = configs.is_full_context();
        let mut pending = vec![Step::Visit {
            config,
            collect_predicates,
            depth: 0,
            check_busy: false,
        }];

        while let Some(step) = pending.pop() {
            match step {
                Step::Add(config) => configs.add(config, self.contexts),
                Step::Expand {
                    config,
                    collect_predicates,
                    depth,
                } => {
                    let children = self.expand(config, configs, collect_predicates, depth, treat_eof_as_epsilon);
                    pending.extend(children.into_iter().rev());
                }
                Step::Visit {
                    config,
                    collect_predicates,
                    depth,
                    check_busy,
                } => {
                    if check_busy && !busy.insert(config.key()) {
                        continue;
                    }

                    let at_rule_stop = self.atn.state(config.state).kind == StateKind::RuleStop;
                    if !at_rule_stop || (config.context.is_empty() && !full_context) {
                        pending.push(Step::Expand {
                            config,
                            collect_predicates,
                            depth,
                        });
                        continue;
                    }
                    if config.context.is_empty() {
                        configs.add(config, self.contexts);
                        continue;
                    }

                    let mut returns = Vec::new();
                    for &(return_state, parent) in self.contexts.entries(config.context) {
                        returns.push(if return_state != EMPTY_RETURN_STATE {
                            Step::Visit {
                                config: Config {
                                    state: return_state,
                                    context: parent,
                                    precedence_filter_suppressed: false,
                                    ..config.clone()
                                },
                                collect_predicates,
                                depth: depth - 1,
                                check_busy: false,
                            }
                        } else if full_context {
                            Step::Add(Config {
                                context: ContextId::EMPTY,
                                ..config.clone()
                            })
                        } else {
                            Step::Expand {
                                config: config.clone(),
                                collect_predicates,
                                depth,
                            }
                        });
                    }
                    pending.extend(returns.into_iter().rev());
                }
            }
        }
    }

    /// Adds `config` if its state consumes input, and returns the steps for the configurations its epsilon edges lead
    /// to, in edge order.
    fn expand(
        &mut self, config: Config, configs: &mut ConfigSet, collect_predicates: bool, depth: i32,
        treat_eof_as_epsilon: bool,
    ) -> Vec<Step> {
        let atn = self.atn;
        let state = atn.state(config.state);
        if !state.epsilon_only {
            configs.add(config.clone(), self.contexts);
        }

        let full_context = configs.is_full_context();
        let mut children = Vec::with_capacity(state.transitions.len());
        for (i, transition) in state.transitions.iter().enumerate() {
            if i == 0 && self.can_drop_loop_entry_edge(&config) {
                continue;
            }

            let continue_collecting = collect_predicates && !matches!(transition, Transition::Action { .. });
            let target = self.epsilon_target(
                &config,
                transition,
                continue_collecting,
                depth == 0,
                full_context,
                treat_eof_as_epsilon,
            );
            let Some(mut child) = target else {
                continue;
            };

            let mut child_depth = depth;
            let check_busy = if state.kind == StateKind::RuleStop {
                // Falling off the rule with nothing to return to: follow it to every caller.
                if let (
                    Some(rule),
                    Transition::Epsilon {
                        outermost_precedence_return: Some(returning),
                        ..
                    },
                ) = (self.precedence_rule, transition)
                {
                    child.precedence_filter_suppressed |= rule == *returning;
                }
                child.reaches_into_outer_context += 1;
                child_depth -= 1;
                true
            } else {
                if matches!(transition, Transition::Rule { .. }) && child_depth >= 0 {
                    child_depth += 1;
                }
                !transition.is_epsilon()
            };

            children.push(Step::Visit {
                config: child,
                collect_predicates: continue_collecting,
                depth: child_depth,
                check_busy,
            });
        }
        children
    }

    fn epsilon_target(
        &mut self, config: &Config, transition: &Transition, collect_predicates: bool, in_context: bool,
        full_context: bool, treat_eof_as_epsilon: bool,
    ) -> Option<Config> {
        match transition {
            Transition::Rule {
                target, follow_state, ..
            } => {
                let context = self.contexts.push(config.context, *follow_state);
                Some(Config {
                    state: *target,
                    context,
                    ..config.clone()
                })
            }
            Transition::Precedence { target, precedence } if collect_predicates && in_context => {
                self.predicate_target(config, *target, SemanticContext::Precedence(*precedence), full_context)
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ctx_dependent,
            } if collect_predicates && (!*ctx_dependent || in_context) => {
                let predicate = SemanticContext::Predicate {
                    rule_index: *rule_index,
                    pred_index: *pred_index,
                    ctx_dependent: *ctx_dependent,
                };
                self.predicate_target(config, *target, predicate, full_context)
            }
            Transition::Epsilon { target, .. }
            | Transition::Action { target, .. }
            | Transition::Precedence { target, .. }
            | Transition::Predicate { target, .. } => Some(config.moved_to(*target)),
            Transition::Atom { target, .. } | Transition::Range { target, .. } | Transition::Set { target, .. }
                if treat_eof_as_epsilon && transition.matches(TOKEN_EOF, 0, 1) =>
            {
                Some(config.moved_to(*target))
            }
            _ => None,
        }
    }

    /// Crosses a predicate edge. Full-context prediction checks the predicate right away, while the cached view
    /// records it on the configuration.
    fn predicate_target(
        &self, config: &Config, target: usize, predicate: SemanticContext, full_context: bool,
    ) -> Option<Config> {
        if full_context {
            return predicate.eval(self.precedence).then(|| config.moved_to(target));
        }
        Some(Config {
            state: target,
            semantic: SemanticContext::and(config.semantic.clone(), predicate),
            ..config.clone()
        })
    }

    /// Returns `true` if entering another iteration of a precedence loop cannot matter for `config`.
    ///
    /// That holds when every rule `config` can return to is the same left-recursive rule, right at the end of the
    /// loop: the outer invocation will make the same choice.
    fn can_drop_loop_entry_edge(&self, config: &Config) -> bool {
        let atn = self.atn;
        let state = atn.state(config.state);
        if state.kind != StateKind::StarLoopEntry
            || !state.precedence_decision
            || config.context.is_empty()
            || self.contexts.has_empty_path(config.context)
        {
            return false;
        }

        let returns = self.contexts.entries(config.context);
        if returns
            .iter()
            .any(|&(return_state, _)| atn.state(return_state).rule_index != state.rule_index)
        {
            return false;
        }

        let Some(block_end) = state
            .transitions
            .first()
            .and_then(|transition| atn.state(transition.target()).end_state)
        else {
            return false;
        };

        returns.iter().all(|&(return_state, _)| {
            let returning = atn.state(return_state);
            let [only] = returning.transitions.as_slice() else {
                return false;
            };
            if !only.is_epsilon() {
                return false;
            }

            let target = atn.state(only.target());
            let loops_back = |t: &Transition| t.is_epsilon() && t.target() == state.number;
            (returning.kind == StateKind::BlockEnd && target.number == state.number)
                || return_state == block_end
                || target.number == block_end
                || (target.kind == StateKind::BlockEnd
                    && matches!(target.transitions.as_slice(), [back] if loops_back(back)))
        })
    }
}

impl Interpretation<'_> {
    /// Returns the follow states of the current rule invocations, outermost first.
    fn invocation_stack(&self) -> Vec<usize> {
        let mut stack = Vec::new();
        let mut ctx = self.ctx;
        while let Some(link) = self.links.get(ctx) {
            let (Some(parent), Some(invoking_state)) = (link.parent, link.invoking_state) else {
                break;
            };
            if let Some(follow_state) = self.atn.follow_state_of(invoking_state) {
                stack.push(follow_state);
            }
            ctx = parent;
        }
        stack.reverse();
        stack
    }

    /// Predicts which alternative of `decision_state` matches the upcoming input, returning its 1-based number.
    pub(super) fn adaptive_predict(&mut self, decision_state: usize) -> Result<usize, Failure> {
        let decision = self
            .atn
            .state(decision_state)
            .decision
            .ok_or_else(|| internal("decision state has no decision number"))?;
        let start = self.position;

        let mut outcome = self.simulate(decision, start, None)?;
        if let Outcome::NeedsFullContext = outcome {
            trace!(decision, "Cached prediction is ambiguous. Predicting with the invocation stack.");
            let stack = self.invocation_stack();
            outcome = self.simulate(decision, start, Some(&stack))?;
        }

        match outcome {
            Outcome::Predicted(alt) => {
                trace!(decision, alt, "Predicted alternative.");
                Ok(alt)
            }
            Outcome::NoViableAlt { offending } => Err(self.no_viable_alternative(start, offending)),
            Outcome::NeedsFullContext => Err(internal("full-context prediction did not settle")),
        }
    }

    /// Runs one prediction for `decision`: from the cache when `invocation_stack` is `None`, and in full context
    /// otherwise.
    fn simulate(
        &mut self, decision: usize, start: usize, invocation_stack: Option<&[usize]>,
    ) -> Result<Outcome, Failure> {
        let atn = self.atn;
        let precedence = self.current_precedence();
        let PredictionCache { contexts, dfas } = &mut *self.cache;
        let dfa = dfas
            .get_mut(decision)
            .ok_or_else(|| internal("decision has no prediction cache"))?;

        let mut simulator = Simulator {
            atn,
            contexts,
            precedence_rule: dfa
                .is_precedence_dfa
                .then(|| atn.state(dfa.decision_state).rule_index),
            precedence,
        };
        Ok(match invocation_stack {
            None => simulator.predict_sll(dfa, self.tokens, start),
            Some(stack) => {
                let outer_context = simulator.contexts.from_follow_states(stack);
                simulator.predict_ll(dfa.decision_state, outer_context, self.tokens, start)
            }
        })
    }

    /// Checks the current token against what the decision at the current state can match, before predicting.
    ///
    /// A token that can neither start an alternative nor follow the rule is reported here, where the set of expected
    /// tokens is still known, rather than as a failed prediction.
    pub(super) fn sync(&mut self) -> Result<(), Failure> {
        let next = self.next_tokens(self.state);
        let current = self.current();
        if next.contains(&current.token_type) || next.contains(&EPSILON) {
            return Ok(());
        }

        match self.atn.state(self.state).kind {
            kind if kind.is_block_start() || kind == StateKind::StarLoopEntry => {
                if !current.is_eof() {
                    let after = self.tokens.next_visible(self.position + 1);
                    if next.contains(&self.tokens.get(after).token_type) {
                        return Err(self.unwanted_token());
                    }
                }
                Err(self.mismatched_input())
            }
            StateKind::PlusLoopBack | StateKind::StarLoopBack => Err(self.unwanted_token()),
            _ => Ok(()),
        }
    }

    fn no_viable_alternative(&mut self, start: usize, offending: usize) -> Failure {
        let text = if self.tokens.get(start).is_eof() {
            "<EOF>".to_string()
        } else {
            self.tokens.text(start, offending)
        };
        let token = self.tokens.get(offending);
        Failure::Syntax(SyntaxError {
            line: token.line,
            column: token.column,
            message: format!("no viable alternative at input '{}'", escape_whitespace(&text)),
        })
    }

    /// Returns the token types that could appear next at the current state and invocation stack.
    pub(super) fn expected_tokens(&self) -> BTreeSet<i32> {
        self.expected_tokens_at(self.state)
    }

    /// Returns the token types that could appear next at `state`, given the current invocation stack.
    pub(super) fn expected_tokens_at(&self, state: usize) -> BTreeSet<i32> {
        let mut following = self.next_tokens(state);
        if !following.contains(&EPSILON) {
            return following;
        }

        let mut expected = following.iter().copied().filter(|&t| t != EPSILON).collect::<BTreeSet<_>>();
        let mut ctx = Some(self.ctx);
        while let Some(id) = ctx {
            let link = self.links[id];
            let Some(follow_state) = link.invoking_state.and_then(|s| self.atn.follow_state_of(s)) else {
                break;
            };
            if !following.contains(&EPSILON) {
                break;
            }

            following = self.next_tokens(follow_state);
            expected.extend(following.iter().copied().filter(|&t| t != EPSILON));
            ctx = link.parent;
        }

        if following.contains(&EPSILON) {
            expected.insert(TOKEN_EOF);
        }
        expected
    }

    /// Returns the token types that can follow `state` within its rule, with [`EPSILON`] standing for the rule's end.
    fn next_tokens(&self, state: usize) -> BTreeSet<i32> {
        let mut look = BTreeSet::new();
        self.look(
            state,
            &mut Vec::new(),
            &mut look,
            &mut HashSet::new(),
            &mut HashSet::new(),
        );
        look
    }

    fn look(
        &self, state: usize, stack: &mut Vec<usize>, look: &mut BTreeSet<i32>, busy: &mut HashSet<(usize, Vec<usize>)>,
        called_rules: &mut HashSet<usize>,
    ) {
        if !busy.insert((state, stack.clone())) {
            return;
        }

        let atn = self.atn;
        let atn_state = atn.state(state);
        if atn_state.kind == StateKind::RuleStop {
            match stack.pop() {
                None => {
                    look.insert(EPSILON);
                }
                Some(follow_state) => {
                    let was_called = called_rules.remove(&atn_state.rule_index);
                    self.look(follow_state, stack, look, busy, called_rules);
                    if was_called {
                        called_rules.insert(atn_state.rule_index);
                    }
                    stack.push(follow_state);
                }
            }
            return;
        }

        for transition in &atn_state.transitions {
            match transition {
                Transition::Rule {
                    target, follow_state, ..
                } => {
                    let rule_index = atn.state(*target).rule_index;
                    if !called_rules.insert(rule_index) {
                        continue;
                    }
                    stack.push(*follow_state);
                    self.look(*target, stack, look, busy, called_rules);
                    stack.pop();
                    called_rules.remove(&rule_index);
                }
                Transition::Wildcard { .. } => look.extend(1..=atn.max_token_type),
                Transition::NotSet { set, .. } => look.extend((1..=atn.max_token_type).filter(|&t| !set.contains(t))),
                Transition::Atom { label, .. } => {
                    look.insert(*label);
                }
                Transition::Range { from, to, .. } => look.extend(*from..=*to),
                Transition::Set { set, .. } => look.extend(set.iter()),
                epsilon => self.look(epsilon.target(), stack, look, busy, called_rules),
            }
        }
    }
}
