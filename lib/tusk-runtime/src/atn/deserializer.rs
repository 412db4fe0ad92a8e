use snafu::{ensure, OptionExt as _, Snafu};

use super::{Atn, AtnKind, AtnState, IntervalSet, LexerAction, StateKind, Transition, NO_RULE, TOKEN_EOF};

const SERIALIZED_VERSION: i32 = 4;

/// An error encountered while deserializing an ATN.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum AtnError {
    #[snafu(display("Unsupported serialized ATN version {} (expected {}).", found, expected))]
    UnsupportedVersion { found: i32, expected: i32 },

    #[snafu(display("Unknown grammar type {}.", value))]
    UnknownGrammarType { value: i32 },

    #[snafu(display("Serialized ATN ended unexpectedly at offset {}.", offset))]
    Truncated { offset: usize },

    #[snafu(display("Unknown state type {} for state {}.", value, state))]
    UnknownStateType { state: usize, value: i32 },

    #[snafu(display("Unknown transition type {}.", value))]
    UnknownTransitionType { value: i32 },

    #[snafu(display("Unknown lexer action type {}.", value))]
    UnknownLexerActionType { value: i32 },

    #[snafu(display("Malformed ATN: {}.", reason))]
    Malformed { reason: String },
}

struct Reader<'a> {
    data: &'a [i32],
    offset: usize,
}

impl Reader<'_> {
    fn next(&mut self) -> Result<i32, AtnError> {
        let value = *self.data.get(self.offset).context(Truncated { offset: self.offset })?;
        self.offset += 1;
        Ok(value)
    }

    fn next_count(&mut self) -> Result<usize, AtnError> {
        let value = self.next()?;
        usize::try_from(value).ok().context(Malformed {
            reason: format!("negative count {} at offset {}", value, self.offset - 1),
        })
    }

    fn next_rule_index(&mut self) -> Result<usize, AtnError> {
        let value = self.next()?;
        Ok(usize::try_from(value).unwrap_or(NO_RULE))
    }
}

fn state_ref(states: &[AtnState], value: i32) -> Result<usize, AtnError> {
    usize::try_from(value)
        .ok()
        .filter(|&n| n < states.len() && states[n].kind != StateKind::Invalid)
        .context(Malformed {
            reason: format!("reference to missing state {}", value),
        })
}

fn expect_kind(states: &[AtnState], number: usize, kind: StateKind) -> Result<(), AtnError> {
    ensure!(
        states[number].kind == kind,
        Malformed {
            reason: format!("state {} is {:?}, expected {:?}", number, states[number].kind, kind),
        }
    );
    Ok(())
}

fn rule_ref(nrules: usize, value: i32) -> Result<usize, AtnError> {
    usize::try_from(value).ok().filter(|&r| r < nrules).context(Malformed {
        reason: format!("reference to missing rule {}", value),
    })
}

/// Deserializes an ATN from its integer serialization, as found in the `atn:` section of interpreter data.
///
/// # Errors
///
/// If the data uses an unsupported serialization version, is truncated, or references states, rules, or sets that do
/// not exist, an error is returned.
pub fn deserialize(data: &[i32]) -> Result<Atn, AtnError> {
    let mut reader = Reader { data, offset: 0 };

    let version = reader.next()?;
    ensure!(
        version == SERIALIZED_VERSION,
        UnsupportedVersion {
            found: version,
            expected: SERIALIZED_VERSION
        }
    );

    let kind = match reader.next()? {
        0 => AtnKind::Lexer,
        1 => AtnKind::Parser,
        value => return UnknownGrammarType { value }.fail(),
    };
    let max_token_type = reader.next()?;

    // States.
    let nstates = reader.next_count()?;
    let mut states = Vec::with_capacity(nstates);
    let mut loop_back_refs = Vec::new();
    let mut end_state_refs = Vec::new();
    for number in 0..nstates {
        let raw_kind = reader.next()?;
        if raw_kind == 0 {
            states.push(AtnState::new(number, StateKind::Invalid, NO_RULE));
            continue;
        }

        let kind = StateKind::from_serialized(raw_kind).context(UnknownStateType {
            state: number,
            value: raw_kind,
        })?;
        let rule_index = reader.next_rule_index()?;
        if kind == StateKind::LoopEnd {
            loop_back_refs.push((number, reader.next()?));
        } else if kind.is_block_start() {
            end_state_refs.push((number, reader.next()?));
        }
        states.push(AtnState::new(number, kind, rule_index));
    }

    for (number, raw) in loop_back_refs {
        states[number].loop_back_state = Some(state_ref(&states, raw)?);
    }
    for (number, raw) in end_state_refs {
        let end = state_ref(&states, raw)?;
        expect_kind(&states, end, StateKind::BlockEnd)?;
        states[number].end_state = Some(end);
    }

    let non_greedy = reader.next_count()?;
    for _ in 0..non_greedy {
        let number = state_ref(&states, reader.next()?)?;
        states[number].non_greedy = true;
    }

    let precedence_states = reader.next_count()?;
    for _ in 0..precedence_states {
        let number = state_ref(&states, reader.next()?)?;
        expect_kind(&states, number, StateKind::RuleStart)?;
        states[number].left_recursive_rule = true;
    }

    // Rules.
    let nrules = reader.next_count()?;
    let mut rule_to_start_state = Vec::with_capacity(nrules);
    let mut rule_to_token_type = Vec::new();
    for _ in 0..nrules {
        let start = state_ref(&states, reader.next()?)?;
        expect_kind(&states, start, StateKind::RuleStart)?;
        rule_to_start_state.push(start);
        if kind == AtnKind::Lexer {
            rule_to_token_type.push(reader.next()?);
        }
    }

    let mut rule_to_stop_state = vec![None; nrules];
    for state in states.iter().filter(|s| s.kind == StateKind::RuleStop) {
        if let Some(slot) = rule_to_stop_state.get_mut(state.rule_index) {
            *slot = Some(state.number);
        }
    }
    let rule_to_stop_state = rule_to_stop_state
        .into_iter()
        .enumerate()
        .map(|(rule, stop)| {
            stop.context(Malformed {
                reason: format!("rule {} has no stop state", rule),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Modes.
    let nmodes = reader.next_count()?;
    let mut mode_to_start_state = Vec::with_capacity(nmodes);
    for _ in 0..nmodes {
        let start = state_ref(&states, reader.next()?)?;
        expect_kind(&states, start, StateKind::TokenStart)?;
        mode_to_start_state.push(start);
    }

    // Sets.
    let nsets = reader.next_count()?;
    let mut sets = Vec::with_capacity(nsets);
    for _ in 0..nsets {
        let nintervals = reader.next_count()?;
        let mut set = IntervalSet::new();
        if reader.next()? != 0 {
            set.add(TOKEN_EOF);
        }
        for _ in 0..nintervals {
            let from = reader.next()?;
            let to = reader.next()?;
            set.add_range(from, to);
        }
        sets.push(set);
    }

    // Edges.
    let nedges = reader.next_count()?;
    for _ in 0..nedges {
        let src = state_ref(&states, reader.next()?)?;
        let trg = state_ref(&states, reader.next()?)?;
        let ttype = reader.next()?;
        let arg1 = reader.next()?;
        let arg2 = reader.next()?;
        let arg3 = reader.next()?;
        let transition = edge(&states, &sets, nrules, ttype, trg, arg1, arg2, arg3)?;
        states[src].add_transition(transition);
    }

    // Rule stop states return to the follow state of every invocation.
    let mut returns = Vec::new();
    for state in &states {
        for transition in &state.transitions {
            if let Transition::Rule {
                rule_index,
                precedence,
                follow_state,
                ..
            } = transition
            {
                let left_recursive = states[rule_to_start_state[*rule_index]].left_recursive_rule;
                let outermost_precedence_return = (left_recursive && *precedence == 0).then_some(*rule_index);
                returns.push((
                    rule_to_stop_state[*rule_index],
                    Transition::Epsilon {
                        target: *follow_state,
                        outermost_precedence_return,
                    },
                ));
            }
        }
    }
    for (stop, transition) in returns {
        states[stop].add_transition(transition);
    }

    for number in 0..states.len() {
        let state_kind = states[number].kind;
        if state_kind.is_block_start() {
            let end = states[number].end_state.context(Malformed {
                reason: format!("block start {} has no end state", number),
            })?;
            ensure!(
                states[end].start_state.is_none(),
                Malformed {
                    reason: format!("block end {} is shared by several blocks", end),
                }
            );
            states[end].start_state = Some(number);
        }

        let loop_target = match state_kind {
            StateKind::PlusLoopBack => Some(StateKind::PlusBlockStart),
            StateKind::StarLoopBack => Some(StateKind::StarLoopEntry),
            _ => None,
        };
        if let Some(loop_target) = loop_target {
            let targets = states[number].transitions.iter().map(Transition::target).collect::<Vec<_>>();
            for target in targets {
                if states[target].kind == loop_target {
                    states[target].loop_back_state = Some(number);
                }
            }
        }
    }

    // Decisions.
    let ndecisions = reader.next_count()?;
    let mut decision_to_state = Vec::with_capacity(ndecisions);
    for decision in 0..ndecisions {
        let number = state_ref(&states, reader.next()?)?;
        ensure!(
            states[number].kind.is_decision(),
            Malformed {
                reason: format!("decision {} refers to non-decision state {}", decision, number),
            }
        );
        states[number].decision = Some(decision);
        decision_to_state.push(number);
    }

    let mut lexer_actions = Vec::new();
    if kind == AtnKind::Lexer {
        let nactions = reader.next_count()?;
        for _ in 0..nactions {
            let action_type = reader.next()?;
            let data1 = reader.next()?;
            let data2 = reader.next()?;
            let mode = |value: i32| {
                usize::try_from(value).ok().filter(|&m| m < nmodes).context(Malformed {
                    reason: format!("lexer action refers to missing mode {}", value),
                })
            };
            lexer_actions.push(match action_type {
                0 => LexerAction::Channel(data1),
                1 => LexerAction::Custom {
                    rule_index: data1,
                    action_index: data2,
                },
                2 => LexerAction::Mode(mode(data1)?),
                3 => LexerAction::More,
                4 => LexerAction::PopMode,
                5 => LexerAction::PushMode(mode(data1)?),
                6 => LexerAction::Skip,
                7 => LexerAction::Type(data1),
                value => return UnknownLexerActionType { value }.fail(),
            });
        }
    }

    mark_precedence_decisions(&mut states, &rule_to_start_state);

    Ok(Atn {
        kind,
        max_token_type,
        states,
        rule_to_start_state,
        rule_to_stop_state,
        rule_to_token_type,
        mode_to_start_state,
        decision_to_state,
        lexer_actions,
    })
}

#[allow(clippy::too_many_arguments)]
fn edge(
    states: &[AtnState], sets: &[IntervalSet], nrules: usize, ttype: i32, target: usize, arg1: i32, arg2: i32,
    arg3: i32,
) -> Result<Transition, AtnError> {
    let set_ref = |value: i32| {
        usize::try_from(value)
            .ok()
            .and_then(|i| sets.get(i))
            .cloned()
            .context(Malformed {
                reason: format!("reference to missing set {}", value),
            })
    };

    Ok(match ttype {
        1 => Transition::Epsilon {
            target,
            outermost_precedence_return: None,
        },
        2 => Transition::Range {
            target,
            from: if arg3 != 0 { TOKEN_EOF } else { arg1 },
            to: arg2,
        },
        3 => {
            let rule_start = state_ref(states, arg1)?;
            expect_kind(states, rule_start, StateKind::RuleStart)?;
            Transition::Rule {
                target: rule_start,
                rule_index: rule_ref(nrules, arg2)?,
                precedence: arg3,
                follow_state: target,
            }
        }
        4 => Transition::Predicate {
            target,
            rule_index: rule_ref(nrules, arg1)?,
            pred_index: arg2,
            ctx_dependent: arg3 != 0,
        },
        5 => Transition::Atom {
            target,
            label: if arg3 != 0 { TOKEN_EOF } else { arg1 },
        },
        6 => Transition::Action {
            target,
            rule_index: usize::try_from(arg1).unwrap_or(NO_RULE),
            action_index: arg2,
            ctx_dependent: arg3 != 0,
        },
        7 => Transition::Set {
            target,
            set: set_ref(arg1)?,
        },
        8 => Transition::NotSet {
            target,
            set: set_ref(arg1)?,
        },
        9 => Transition::Wildcard { target },
        10 => Transition::Precedence {
            target,
            precedence: arg1,
        },
        value => return UnknownTransitionType { value }.fail(),
    })
}

/// Flags the star-loop entry states of left-recursive rules whose exit branch leads straight to the rule's end.
///
/// Those decisions choose between extending the current precedence climb and returning, and the parser opens a new
/// recursion context each time it chooses to extend.
fn mark_precedence_decisions(states: &mut [AtnState], rule_to_start_state: &[usize]) {
    for number in 0..states.len() {
        let state = &states[number];
        if state.kind != StateKind::StarLoopEntry {
            continue;
        }

        let left_recursive = rule_to_start_state
            .get(state.rule_index)
            .is_some_and(|&start| states[start].left_recursive_rule);
        if !left_recursive {
            continue;
        }

        let Some(loop_end) = state.transitions.last().map(Transition::target) else {
            continue;
        };
        let loop_end = &states[loop_end];
        let exits_rule = loop_end.kind == StateKind::LoopEnd
            && loop_end.epsilon_only
            && loop_end
                .transitions
                .first()
                .is_some_and(|t| states[t.target()].kind == StateKind::RuleStop);
        if exits_rule {
            states[number].precedence_decision = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_version() {
        let err = deserialize(&[3, 1, 1]).unwrap_err();
        assert!(matches!(err, AtnError::UnsupportedVersion { found: 3, expected: 4 }));
    }

    #[test]
    fn rejects_truncated_data() {
        let err = deserialize(&[4, 1, 2, 5, 2, 0]).unwrap_err();
        assert!(matches!(err, AtnError::Truncated { .. }));
    }

    #[test]
    fn rejects_dangling_state_references() {
        // Two states, one rule whose start state number points past the end of the state table.
        let err = deserialize(&[4, 1, 1, 2, 2, 0, 7, 0, 0, 0, 1, 9]).unwrap_err();
        assert!(matches!(err, AtnError::Malformed { .. }));
    }

    #[test]
    fn minimal_parser_network() {
        // rule r : A ;
        //
        // 0: RULE_START(r) -> 2, 1: RULE_STOP(r), 2: BASIC -A-> 1
        let data = [
            4, 1, 1, // version, parser, max token type
            3, 2, 0, 7, 0, 1, 0, // states
            0, // non-greedy states
            0, // precedence states
            1, 0, // rules
            0, // modes
            0, // sets
            2, 0, 2, 1, 0, 0, 0, 2, 1, 5, 1, 0, 0, // edges
            0, // decisions
        ];
        let atn = deserialize(&data).unwrap();

        assert_eq!(atn.kind, AtnKind::Parser);
        assert_eq!(atn.rule_to_start_state, vec![0]);
        assert_eq!(atn.rule_to_stop_state, vec![1]);
        assert!(atn.state(0).epsilon_only);
        assert!(!atn.state(2).epsilon_only);
        assert_eq!(atn.state(2).transitions, vec![Transition::Atom { target: 1, label: 1 }]);
    }
}
