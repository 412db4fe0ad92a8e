//! Cached prediction results.
//!
//! Each decision gets a DFA whose states are the configuration sets prediction has already computed, and whose edges
//! are the tokens that led from one to the next. Once a path through the DFA has been computed, later predictions
//! over the same lookahead follow the edges instead of simulating the ATN again.

use std::collections::{BTreeSet, HashMap};

use super::{
    config::{ConfigKey, ConfigSet},
    context::PredictionContexts,
    semantic::SemanticContext,
};
use crate::atn::{Atn, StateKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Edge {
    To(usize),
    /// No alternative survives the token.
    Error,
}

#[derive(Debug)]
pub(super) struct DfaState {
    pub configs: ConfigSet,
    pub edges: HashMap<i32, Edge>,
    pub is_accept: bool,
    /// The alternative an accept state predicts, when no predicates need checking.
    pub prediction: usize,
    /// Set on accept states where the alternatives conflict without the real invocation stack.
    pub requires_full_context: bool,
    /// Conditions to check, with the alternative each one selects, before trusting the prediction.
    pub predicates: Option<Vec<(SemanticContext, usize)>>,
}

impl DfaState {
    pub(super) fn new(configs: ConfigSet) -> Self {
        Self {
            configs,
            edges: HashMap::new(),
            is_accept: false,
            prediction: 0,
            requires_full_context: false,
            predicates: None,
        }
    }

    /// Marks the state as predicting among `alts`, attaching the predicates that guard them, if any.
    pub(super) fn accept(&mut self, alts: &BTreeSet<usize>, alt_count: usize) {
        self.is_accept = true;
        self.prediction = alts.first().copied().unwrap_or(0);
        if !self.configs.has_semantic_context() {
            return;
        }

        let mut guards: Vec<Option<SemanticContext>> = vec![None; alt_count + 1];
        for config in self.configs.iter().filter(|c| alts.contains(&c.alt)) {
            let guard = &mut guards[config.alt];
            *guard = Some(match guard.take() {
                None => config.semantic.clone(),
                Some(existing) => SemanticContext::or(existing, config.semantic.clone()),
            });
        }

        let guarded = guards.iter().flatten().any(|guard| *guard != SemanticContext::Empty);
        if guarded {
            self.predicates = Some(
                alts.iter()
                    .map(|&alt| (guards[alt].clone().unwrap_or(SemanticContext::Empty), alt))
                    .collect(),
            );
        }
    }
}

/// The prediction cache of a single decision.
#[derive(Debug)]
pub(super) struct Dfa {
    pub decision_state: usize,
    /// Set for decisions that choose between continuing and leaving a precedence loop. Their start state depends on
    /// the precedence of the rule invocation.
    pub is_precedence_dfa: bool,
    states: Vec<DfaState>,
    index: HashMap<Vec<ConfigKey>, usize>,
    start: Option<usize>,
    precedence_starts: HashMap<i32, usize>,
}

impl Dfa {
    fn new(atn: &Atn, decision_state: usize) -> Self {
        let state = atn.state(decision_state);
        Self {
            decision_state,
            is_precedence_dfa: state.kind == StateKind::StarLoopEntry && state.precedence_decision,
            states: Vec::new(),
            index: HashMap::new(),
            start: None,
            precedence_starts: HashMap::new(),
        }
    }

    pub(super) fn start_state(&self, precedence: i32) -> Option<usize> {
        if self.is_precedence_dfa {
            self.precedence_starts.get(&precedence).copied()
        } else {
            self.start
        }
    }

    pub(super) fn set_start_state(&mut self, precedence: i32, state: usize) {
        if self.is_precedence_dfa {
            self.precedence_starts.insert(precedence, state);
        } else {
            self.start = Some(state);
        }
    }

    pub(super) fn state(&self, id: usize) -> &DfaState {
        &self.states[id]
    }

    /// Adds `state`, or returns the existing state holding the same configurations.
    pub(super) fn add_state(&mut self, state: DfaState) -> usize {
        let key = state.configs.keys();
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let id = self.states.len();
        self.states.push(state);
        self.index.insert(key, id);
        id
    }

    pub(super) fn edge(&self, from: usize, symbol: i32) -> Option<Edge> {
        self.states[from].edges.get(&symbol).copied()
    }

    pub(super) fn add_edge(&mut self, from: usize, symbol: i32, to: Edge) {
        self.states[from].edges.insert(symbol, to);
    }

    #[cfg(test)]
    pub(super) fn state_count(&self) -> usize {
        self.states.len()
    }
}

/// Everything prediction remembers between decisions: one DFA per decision, and the stacks their states refer to.
pub(crate) struct PredictionCache {
    pub(super) contexts: PredictionContexts,
    pub(super) dfas: Vec<Dfa>,
}

impl PredictionCache {
    pub(crate) fn new(atn: &Atn) -> Self {
        Self {
            contexts: PredictionContexts::default(),
            dfas: atn
                .decision_to_state
                .iter()
                .map(|&state| Dfa::new(atn, state))
                .collect(),
        }
    }
}
