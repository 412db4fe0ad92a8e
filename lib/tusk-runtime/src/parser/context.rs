//! Graph-structured rule invocation stacks.
//!
//! Prediction tracks, for every configuration, which rules it would return to. Configurations that differ only in
//! their stacks are merged, so a stack is really a graph: each node lists the follow states it may return to, paired
//! with the stack below each of them. Nodes are hash-consed into an arena, which makes equality an id comparison and
//! lets merges be cached for the life of the parser.

use std::collections::HashMap;

/// Return state marking the bottom of a stack, below the rule prediction started in.
pub(super) const EMPTY_RETURN_STATE: usize = usize::MAX;

/// Handle to an interned stack node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct ContextId(usize);

impl ContextId {
    /// The empty stack.
    pub(super) const EMPTY: Self = Self(0);

    pub(super) fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

type Entry = (usize, ContextId);

/// Interned stack nodes and the merges computed between them.
pub(super) struct PredictionContexts {
    /// Entries of each node, sorted by return state. The empty stack has none.
    nodes: Vec<Box<[Entry]>>,
    interned: HashMap<Box<[Entry]>, ContextId>,
    merged: HashMap<(ContextId, ContextId, bool), ContextId>,
}

impl Default for PredictionContexts {
    fn default() -> Self {
        Self {
            nodes: vec![Box::default()],
            interned: HashMap::new(),
            merged: HashMap::new(),
        }
    }
}

impl PredictionContexts {
    /// Returns the return states of `id` paired with the stack below each, or nothing for the empty stack.
    pub(super) fn entries(&self, id: ContextId) -> &[Entry] {
        &self.nodes[id.0]
    }

    /// Returns `true` if one of the paths through `id` ends at the bottom of the stack.
    pub(super) fn has_empty_path(&self, id: ContextId) -> bool {
        id.is_empty() || self.entries(id).last().is_some_and(|&(state, _)| state == EMPTY_RETURN_STATE)
    }

    /// Pushes `return_state` onto `parent`.
    pub(super) fn push(&mut self, parent: ContextId, return_state: usize) -> ContextId {
        self.intern(vec![(return_state, parent)])
    }

    /// Builds a stack from follow states, outermost first.
    pub(super) fn from_follow_states(&mut self, follow_states: &[usize]) -> ContextId {
        follow_states
            .iter()
            .fold(ContextId::EMPTY, |parent, &state| self.push(parent, state))
    }

    fn intern(&mut self, entries: Vec<Entry>) -> ContextId {
        if entries.is_empty() || entries == [(EMPTY_RETURN_STATE, ContextId::EMPTY)] {
            return ContextId::EMPTY;
        }

        let entries = entries.into_boxed_slice();
        if let Some(&id) = self.interned.get(&entries) {
            return id;
        }
        let id = ContextId(self.nodes.len());
        self.nodes.push(entries.clone());
        self.interned.insert(entries, id);
        id
    }

    /// Returns the entries of `id`, spelling the empty stack as a single bottom entry.
    fn as_entries(&self, id: ContextId) -> Vec<Entry> {
        if id.is_empty() {
            vec![(EMPTY_RETURN_STATE, ContextId::EMPTY)]
        } else {
            self.entries(id).to_vec()
        }
    }

    fn is_single(&self, id: ContextId) -> bool {
        id.is_empty() || self.entries(id).len() == 1
    }

    /// Merges two stacks into one that can return along the paths of both.
    ///
    /// When `root_is_wildcard` is set, the empty stack stands for "any stack" and absorbs everything it is merged
    /// with. Otherwise it is kept as one more path, so full-context prediction can still tell that a configuration
    /// reached the bottom.
    pub(super) fn merge(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        if a == b {
            return a;
        }

        let key = (a.min(b), a.max(b), root_is_wildcard);
        if let Some(&merged) = self.merged.get(&key) {
            return merged;
        }

        let merged = if self.is_single(a) && self.is_single(b) {
            self.merge_singletons(a, b, root_is_wildcard)
        } else if root_is_wildcard && (a.is_empty() || b.is_empty()) {
            ContextId::EMPTY
        } else {
            self.merge_entries(a, b, root_is_wildcard)
        };
        self.merged.insert(key, merged);
        merged
    }

    fn merge_singletons(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        if root_is_wildcard {
            if a.is_empty() || b.is_empty() {
                return ContextId::EMPTY;
            }
        } else if a.is_empty() || b.is_empty() {
            let other = if a.is_empty() { b } else { a };
            let mut entries = self.as_entries(other);
            entries.push((EMPTY_RETURN_STATE, ContextId::EMPTY));
            return self.intern(entries);
        }

        let (a_state, a_parent) = self.entries(a)[0];
        let (b_state, b_parent) = self.entries(b)[0];
        if a_state == b_state {
            let parent = self.merge(a_parent, b_parent, root_is_wildcard);
            return self.push(parent, a_state);
        }

        let mut entries = vec![(a_state, a_parent), (b_state, b_parent)];
        entries.sort_unstable_by_key(|&(state, _)| state);
        self.intern(entries)
    }

    fn merge_entries(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        let a = self.as_entries(a);
        let b = self.as_entries(b);
        let mut merged = Vec::with_capacity(a.len() + b.len());

        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let (a_state, a_parent) = a[i];
            let (b_state, b_parent) = b[j];
            if a_state == b_state {
                let parent = if a_parent == b_parent {
                    a_parent
                } else {
                    self.merge(a_parent, b_parent, root_is_wildcard)
                };
                merged.push((a_state, parent));
                i += 1;
                j += 1;
            } else if a_state < b_state {
                merged.push(a[i]);
                i += 1;
            } else {
                merged.push(b[j]);
                j += 1;
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);

        self.intern(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_stacks_share_an_id() {
        let mut contexts = PredictionContexts::default();
        let a = contexts.from_follow_states(&[3, 7]);
        let b = contexts.from_follow_states(&[3, 7]);
        assert_eq!(a, b);
        assert_ne!(a, contexts.from_follow_states(&[7, 3]));
        assert!(contexts.from_follow_states(&[]).is_empty());
    }

    #[test]
    fn wildcard_root_absorbs_other_stacks() {
        let mut contexts = PredictionContexts::default();
        let a = contexts.from_follow_states(&[5]);
        assert!(contexts.merge(a, ContextId::EMPTY, true).is_empty());
        assert!(contexts.merge(ContextId::EMPTY, a, true).is_empty());
    }

    #[test]
    fn full_context_merge_keeps_the_bottom_as_a_path() {
        let mut contexts = PredictionContexts::default();
        let a = contexts.from_follow_states(&[5]);
        let merged = contexts.merge(a, ContextId::EMPTY, false);

        assert_eq!(
            contexts.entries(merged),
            [(5, ContextId::EMPTY), (EMPTY_RETURN_STATE, ContextId::EMPTY)]
        );
        assert!(contexts.has_empty_path(merged));
        assert!(!contexts.has_empty_path(a));
    }

    #[test]
    fn same_return_state_merges_parents() {
        let mut contexts = PredictionContexts::default();
        let a = contexts.from_follow_states(&[1, 9]);
        let b = contexts.from_follow_states(&[2, 9]);
        let merged = contexts.merge(a, b, true);

        let &[(9, parent)] = contexts.entries(merged) else {
            panic!("expected a single return state");
        };
        let returns = contexts.entries(parent).iter().map(|&(state, _)| state).collect::<Vec<_>>();
        assert_eq!(returns, [1, 2]);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut contexts = PredictionContexts::default();
        let stacks = [
            contexts.from_follow_states(&[4]),
            contexts.from_follow_states(&[2, 4]),
            contexts.from_follow_states(&[8]),
            ContextId::EMPTY,
        ];

        let forward = stacks.iter().fold(stacks[0], |acc, &s| contexts.merge(acc, s, false));
        let backward = stacks.iter().rev().fold(stacks[3], |acc, &s| contexts.merge(acc, s, false));
        assert_eq!(forward, backward);

        let returns = contexts.entries(forward).iter().map(|&(state, _)| state).collect::<Vec<_>>();
        assert_eq!(returns, [4, 8, EMPTY_RETURN_STATE]);
    }
}
