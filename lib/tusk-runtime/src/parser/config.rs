//! Prediction configurations.

use std::collections::{BTreeSet, HashMap};

use super::{
    context::{ContextId, PredictionContexts},
    semantic::SemanticContext,
};
use crate::atn::{Atn, StateKind};

/// A position in the ATN reached while simulating one alternative of a decision.
#[derive(Clone, Debug)]
pub(super) struct Config {
    pub state: usize,
    /// The alternative, numbered from 1, this configuration started in.
    pub alt: usize,
    pub context: ContextId,
    pub semantic: SemanticContext,
    /// How many times the simulation returned out of the decision's rule without a stack to return along.
    pub reaches_into_outer_context: usize,
    /// Set when leaving a precedence loop was reached by returning from the rule itself.
    pub precedence_filter_suppressed: bool,
}

/// What tells two configurations apart.
pub(super) type ConfigKey = (usize, usize, ContextId, SemanticContext, bool);

impl Config {
    pub(super) fn new(state: usize, alt: usize, context: ContextId) -> Self {
        Self {
            state,
            alt,
            context,
            semantic: SemanticContext::Empty,
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
        }
    }

    pub(super) fn moved_to(&self, state: usize) -> Self {
        Self { state, ..self.clone() }
    }

    pub(super) fn key(&self) -> ConfigKey {
        (
            self.state,
            self.alt,
            self.context,
            self.semantic.clone(),
            self.precedence_filter_suppressed,
        )
    }
}

/// An insertion-ordered set of configurations.
///
/// Configurations sharing a state, alternative, and semantic context are stored once, with their stacks merged.
#[derive(Clone, Debug)]
pub(super) struct ConfigSet {
    configs: Vec<Config>,
    index: HashMap<(usize, usize, SemanticContext), usize>,
    full_context: bool,
    has_semantic_context: bool,
}

impl ConfigSet {
    pub(super) fn new(full_context: bool) -> Self {
        Self {
            configs: Vec::new(),
            index: HashMap::new(),
            full_context,
            has_semantic_context: false,
        }
    }

    pub(super) fn add(&mut self, config: Config, contexts: &mut PredictionContexts) {
        self.has_semantic_context |= config.semantic != SemanticContext::Empty;

        let key = (config.state, config.alt, config.semantic.clone());
        match self.index.get(&key) {
            Some(&existing) => {
                let existing = &mut self.configs[existing];
                existing.context = contexts.merge(existing.context, config.context, !self.full_context);
                existing.reaches_into_outer_context =
                    existing.reaches_into_outer_context.max(config.reaches_into_outer_context);
                existing.precedence_filter_suppressed |= config.precedence_filter_suppressed;
            }
            None => {
                self.index.insert(key, self.configs.len());
                self.configs.push(config);
            }
        }
    }

    /// Keeps only the configurations for which `keep` returns `true`.
    pub(super) fn retain(&mut self, mut keep: impl FnMut(&Config) -> bool) {
        self.configs.retain(|config| keep(config));
        self.index = self
            .configs
            .iter()
            .enumerate()
            .map(|(i, config)| ((config.state, config.alt, config.semantic.clone()), i))
            .collect();
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &Config> {
        self.configs.iter()
    }

    pub(super) fn len(&self) -> usize {
        self.configs.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub(super) fn is_full_context(&self) -> bool {
        self.full_context
    }

    pub(super) fn has_semantic_context(&self) -> bool {
        self.has_semantic_context
    }

    pub(super) fn keys(&self) -> Vec<ConfigKey> {
        self.configs.iter().map(Config::key).collect()
    }

    /// Returns the alternative shared by every configuration, if there is one.
    pub(super) fn unique_alt(&self) -> Option<usize> {
        let first = self.configs.first()?.alt;
        self.configs.iter().all(|c| c.alt == first).then_some(first)
    }

    /// Groups alternatives by the state and stack their configurations reached.
    ///
    /// A group with several alternatives means those alternatives cannot be told apart by what follows.
    pub(super) fn conflicting_alt_subsets(&self) -> Vec<BTreeSet<usize>> {
        let mut order = Vec::new();
        let mut groups: HashMap<(usize, ContextId), BTreeSet<usize>> = HashMap::new();
        for config in &self.configs {
            let key = (config.state, config.context);
            groups
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    BTreeSet::new()
                })
                .insert(config.alt);
        }
        order.into_iter().filter_map(|key| groups.remove(&key)).collect()
    }

    /// Returns `true` if some state was reached by exactly one alternative.
    pub(super) fn has_state_associated_with_one_alt(&self) -> bool {
        let mut alts_by_state: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for config in &self.configs {
            alts_by_state.entry(config.state).or_default().insert(config.alt);
        }
        alts_by_state.values().any(|alts| alts.len() == 1)
    }

    pub(super) fn all_in_rule_stop_states(&self, atn: &Atn) -> bool {
        self.configs
            .iter()
            .all(|c| atn.state(c.state).kind == StateKind::RuleStop)
    }

    pub(super) fn has_config_in_rule_stop_state(&self, atn: &Atn) -> bool {
        self.configs
            .iter()
            .any(|c| atn.state(c.state).kind == StateKind::RuleStop)
    }
}

/// Returns the alternative every conflicting group would pick as its lowest, if they agree.
pub(super) fn single_viable_alt(subsets: &[BTreeSet<usize>]) -> Option<usize> {
    let mut viable = subsets.iter().filter_map(|alts| alts.first().copied());
    let first = viable.next()?;
    viable.all(|alt| alt == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_merge_their_stacks() {
        let mut contexts = PredictionContexts::default();
        let outer = contexts.from_follow_states(&[4]);
        let other = contexts.from_follow_states(&[6]);

        let mut configs = ConfigSet::new(false);
        configs.add(Config::new(10, 1, outer), &mut contexts);
        configs.add(
            Config {
                reaches_into_outer_context: 2,
                ..Config::new(10, 1, other)
            },
            &mut contexts,
        );
        configs.add(Config::new(10, 2, other), &mut contexts);

        assert_eq!(configs.len(), 2);
        let merged = configs.iter().next().unwrap();
        assert_eq!(merged.reaches_into_outer_context, 2);
        let returns = contexts.entries(merged.context).iter().map(|&(s, _)| s).collect::<Vec<_>>();
        assert_eq!(returns, [4, 6]);
    }

    #[test]
    fn alternatives_conflict_per_state_and_stack() {
        let mut contexts = PredictionContexts::default();
        let mut configs = ConfigSet::new(true);
        for (state, alt) in [(10, 1), (10, 2), (11, 3)] {
            configs.add(Config::new(state, alt, ContextId::EMPTY), &mut contexts);
        }

        let subsets = configs.conflicting_alt_subsets();
        assert_eq!(subsets, [BTreeSet::from([1, 2]), BTreeSet::from([3])]);
        assert!(configs.has_state_associated_with_one_alt());
        assert_eq!(configs.unique_alt(), None);
        assert_eq!(single_viable_alt(&subsets), None);
        assert_eq!(single_viable_alt(&subsets[..1]), Some(1));
    }
}
