//! Augmented transition networks.
//!
//! An ATN is the state machine a grammar compiles down to. Both the lexer and the parser interpreters walk the same
//! structure: lexers consume characters along its edges, parsers consume token types.

mod deserializer;
pub use self::deserializer::{deserialize, AtnError};

mod interval;
pub use self::interval::IntervalSet;

/// Token type of the end-of-file token.
pub const TOKEN_EOF: i32 = -1;

/// Smallest token type a grammar can define.
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

/// Largest code point a lexer will match.
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;

/// Rule index recorded for states that belong to no rule, such as the lexer's mode start states.
pub const NO_RULE: usize = usize::MAX;

/// Which kind of recognizer an ATN drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtnKind {
    /// Matches characters and produces tokens.
    Lexer,

    /// Matches tokens and produces parse trees.
    Parser,
}

/// The role a state plays in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKind {
    /// Placeholder for a state number that was serialized as absent.
    Invalid,
    Basic,
    RuleStart,
    BlockStart,
    PlusBlockStart,
    StarBlockStart,
    TokenStart,
    RuleStop,
    BlockEnd,
    StarLoopBack,
    StarLoopEntry,
    PlusLoopBack,
    LoopEnd,
}

impl StateKind {
    fn from_serialized(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::Basic,
            2 => Self::RuleStart,
            3 => Self::BlockStart,
            4 => Self::PlusBlockStart,
            5 => Self::StarBlockStart,
            6 => Self::TokenStart,
            7 => Self::RuleStop,
            8 => Self::BlockEnd,
            9 => Self::StarLoopBack,
            10 => Self::StarLoopEntry,
            11 => Self::PlusLoopBack,
            12 => Self::LoopEnd,
            _ => return None,
        })
    }

    /// Returns the number identifying this kind in serialized ATNs.
    pub fn to_serialized(self) -> i32 {
        match self {
            Self::Invalid => 0,
            Self::Basic => 1,
            Self::RuleStart => 2,
            Self::BlockStart => 3,
            Self::PlusBlockStart => 4,
            Self::StarBlockStart => 5,
            Self::TokenStart => 6,
            Self::RuleStop => 7,
            Self::BlockEnd => 8,
            Self::StarLoopBack => 9,
            Self::StarLoopEntry => 10,
            Self::PlusLoopBack => 11,
            Self::LoopEnd => 12,
        }
    }

    /// Returns `true` if states of this kind may need to choose between several outgoing transitions.
    pub fn is_decision(self) -> bool {
        matches!(
            self,
            Self::BlockStart
                | Self::PlusBlockStart
                | Self::StarBlockStart
                | Self::TokenStart
                | Self::StarLoopEntry
                | Self::PlusLoopBack
        )
    }

    pub fn is_block_start(self) -> bool {
        matches!(self, Self::BlockStart | Self::PlusBlockStart | Self::StarBlockStart)
    }
}

/// An edge between two states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Epsilon {
        target: usize,
        /// Set on rule-return edges that leave a left-recursive rule invoked at precedence zero.
        outermost_precedence_return: Option<usize>,
    },
    Range {
        target: usize,
        from: i32,
        to: i32,
    },
    Rule {
        /// Start state of the invoked rule.
        target: usize,
        rule_index: usize,
        precedence: i32,
        /// State to resume at once the invoked rule returns.
        follow_state: usize,
    },
    Predicate {
        target: usize,
        rule_index: usize,
        pred_index: i32,
        ctx_dependent: bool,
    },
    Atom {
        target: usize,
        label: i32,
    },
    Action {
        target: usize,
        rule_index: usize,
        action_index: i32,
        ctx_dependent: bool,
    },
    Set {
        target: usize,
        set: IntervalSet,
    },
    NotSet {
        target: usize,
        set: IntervalSet,
    },
    Wildcard {
        target: usize,
    },
    Precedence {
        target: usize,
        precedence: i32,
    },
}

impl Transition {
    /// Returns the state this edge leads to.
    pub fn target(&self) -> usize {
        match self {
            Self::Epsilon { target, .. }
            | Self::Range { target, .. }
            | Self::Rule { target, .. }
            | Self::Predicate { target, .. }
            | Self::Atom { target, .. }
            | Self::Action { target, .. }
            | Self::Set { target, .. }
            | Self::NotSet { target, .. }
            | Self::Wildcard { target }
            | Self::Precedence { target, .. } => *target,
        }
    }

    /// Returns `true` if following this edge consumes no input.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Self::Epsilon { .. }
                | Self::Rule { .. }
                | Self::Predicate { .. }
                | Self::Action { .. }
                | Self::Precedence { .. }
        )
    }

    /// Returns `true` if this edge consumes `symbol`.
    ///
    /// `min` and `max` bound the symbol vocabulary, and only matter for negated sets and wildcards.
    pub fn matches(&self, symbol: i32, min: i32, max: i32) -> bool {
        match self {
            Self::Atom { label, .. } => *label == symbol,
            Self::Range { from, to, .. } => *from <= symbol && symbol <= *to,
            Self::Set { set, .. } => set.contains(symbol),
            Self::NotSet { set, .. } => symbol >= min && symbol <= max && !set.contains(symbol),
            Self::Wildcard { .. } => symbol >= min && symbol <= max,
            _ => false,
        }
    }

    /// Returns the symbols this edge consumes, or `None` for epsilon edges, negated sets, and wildcards.
    fn label(&self) -> Option<IntervalSet> {
        let mut set = IntervalSet::new();
        match self {
            Self::Atom { label, .. } => set.add(*label),
            Self::Range { from, to, .. } => set.add_range(*from, *to),
            Self::Set { set: labels, .. } => return Some(labels.clone()),
            _ => return None,
        }
        Some(set)
    }
}

/// An action a lexer runs when a token is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexerAction {
    Channel(i32),
    /// Embedded target-language code. The interpreter cannot run it, so it has no effect.
    Custom {
        rule_index: i32,
        action_index: i32,
    },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
}

/// A single ATN state and its outgoing edges.
#[derive(Clone, Debug)]
pub struct AtnState {
    pub number: usize,
    pub kind: StateKind,
    pub rule_index: usize,
    pub transitions: Vec<Transition>,

    /// `true` when every outgoing edge is an epsilon edge.
    pub epsilon_only: bool,

    pub non_greedy: bool,

    /// On rule start states: whether the rule was rewritten from direct left recursion.
    pub left_recursive_rule: bool,

    /// On star-loop entry states: whether the decision picks between continuing and leaving a precedence loop.
    pub precedence_decision: bool,

    /// On block start states: the matching block end.
    pub end_state: Option<usize>,

    /// On block end states: the matching block start.
    pub start_state: Option<usize>,

    /// On loop end, plus block start, and star loop entry states: the state that loops back.
    pub loop_back_state: Option<usize>,

    pub decision: Option<usize>,
}

impl AtnState {
    fn new(number: usize, kind: StateKind, rule_index: usize) -> Self {
        Self {
            number,
            kind,
            rule_index,
            transitions: Vec::new(),
            epsilon_only: false,
            non_greedy: false,
            left_recursive_rule: false,
            precedence_decision: false,
            end_state: None,
            start_state: None,
            loop_back_state: None,
            decision: None,
        }
    }

    fn add_transition(&mut self, transition: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only = transition.is_epsilon();
        } else if self.epsilon_only != transition.is_epsilon() {
            self.epsilon_only = false;
        }

        let already_present = self.transitions.iter().any(|existing| {
            existing.target() == transition.target()
                && ((existing.is_epsilon() && transition.is_epsilon())
                    || matches!((existing.label(), transition.label()), (Some(a), Some(b)) if a == b))
        });
        if !already_present {
            self.transitions.push(transition);
        }
    }
}

/// A deserialized ATN.
#[derive(Clone, Debug)]
pub struct Atn {
    pub kind: AtnKind,
    pub max_token_type: i32,
    pub states: Vec<AtnState>,
    pub rule_to_start_state: Vec<usize>,
    pub rule_to_stop_state: Vec<usize>,

    /// Lexers only: the token type each rule produces.
    pub rule_to_token_type: Vec<i32>,

    /// Lexers only: the token start state of each mode.
    pub mode_to_start_state: Vec<usize>,

    pub decision_to_state: Vec<usize>,
    pub lexer_actions: Vec<LexerAction>,
}

impl Atn {
    /// Returns the state with the given number.
    ///
    /// State numbers taken from the network itself are always valid, since deserialization rejects dangling
    /// references.
    pub fn state(&self, number: usize) -> &AtnState {
        &self.states[number]
    }

    /// Returns the number of rules in the network.
    pub fn rule_count(&self) -> usize {
        self.rule_to_start_state.len()
    }

    /// Returns the follow state of the rule invocation made from `invoking_state`.
    pub fn follow_state_of(&self, invoking_state: usize) -> Option<usize> {
        match self.states.get(invoking_state)?.transitions.first()? {
            Transition::Rule { follow_state, .. } => Some(*follow_state),
            _ => None,
        }
    }
}
