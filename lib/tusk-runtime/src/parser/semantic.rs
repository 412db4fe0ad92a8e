//! Semantic predicates gathered during prediction.

use std::{collections::BTreeSet, fmt};

/// A condition an alternative is guarded by.
///
/// Grammar predicates are embedded target-language code, so the interpreter treats them as satisfied. Precedence
/// predicates are checked against the precedence of the left-recursive rule invocation in progress.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum SemanticContext {
    /// No condition.
    Empty,
    Predicate {
        rule_index: usize,
        pred_index: i32,
        ctx_dependent: bool,
    },
    /// Holds while the invocation precedence is at most this value.
    Precedence(i32),
    And(BTreeSet<SemanticContext>),
    Or(BTreeSet<SemanticContext>),
}

impl SemanticContext {
    /// Combines two conditions that must both hold.
    pub(super) fn and(a: Self, b: Self) -> Self {
        match (a, b) {
            (Self::Empty, other) | (other, Self::Empty) => other,
            (a, b) => {
                let mut operands = BTreeSet::new();
                for operand in [a, b] {
                    match operand {
                        Self::And(nested) => operands.extend(nested),
                        operand => {
                            operands.insert(operand);
                        }
                    }
                }
                Self::combine(operands, false, Self::And)
            }
        }
    }

    /// Combines two conditions of which either may hold.
    pub(super) fn or(a: Self, b: Self) -> Self {
        match (a, b) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (a, b) => {
                let mut operands = BTreeSet::new();
                for operand in [a, b] {
                    match operand {
                        Self::Or(nested) => operands.extend(nested),
                        operand => {
                            operands.insert(operand);
                        }
                    }
                }
                Self::combine(operands, true, Self::Or)
            }
        }
    }

    /// Reduces the precedence predicates among `operands` to the weakest (for `or`) or strongest (for `and`) one.
    fn combine(mut operands: BTreeSet<Self>, keep_highest: bool, wrap: fn(BTreeSet<Self>) -> Self) -> Self {
        let precedences = operands
            .iter()
            .filter_map(|operand| match operand {
                Self::Precedence(precedence) => Some(*precedence),
                _ => None,
            })
            .collect::<Vec<_>>();
        let reduced = if keep_highest {
            precedences.iter().max()
        } else {
            precedences.iter().min()
        };
        if let Some(&reduced) = reduced {
            operands.retain(|operand| !matches!(operand, Self::Precedence(_)));
            operands.insert(Self::Precedence(reduced));
        }

        if operands.len() == 1 {
            if let Some(single) = operands.pop_first() {
                return single;
            }
        }
        wrap(operands)
    }

    /// Returns whether the condition holds at `precedence`.
    pub(super) fn eval(&self, precedence: i32) -> bool {
        match self {
            Self::Empty | Self::Predicate { .. } => true,
            Self::Precedence(required) => *required >= precedence,
            Self::And(operands) => operands.iter().all(|operand| operand.eval(precedence)),
            Self::Or(operands) => operands.iter().any(|operand| operand.eval(precedence)),
        }
    }

    /// Settles the precedence predicates in this condition at `precedence`, keeping the rest.
    ///
    /// Returns `None` when the condition can no longer hold.
    pub(super) fn eval_precedence(&self, precedence: i32) -> Option<Self> {
        match self {
            Self::Empty | Self::Predicate { .. } => Some(self.clone()),
            Self::Precedence(required) => (*required >= precedence).then_some(Self::Empty),
            Self::And(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands {
                    let evaluated = operand.eval_precedence(precedence)?;
                    differs |= evaluated != *operand;
                    if evaluated != Self::Empty {
                        remaining.push(evaluated);
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                Some(remaining.into_iter().fold(Self::Empty, Self::and))
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands {
                    match operand.eval_precedence(precedence) {
                        Some(Self::Empty) => return Some(Self::Empty),
                        Some(evaluated) => {
                            differs |= evaluated != *operand;
                            remaining.push(evaluated);
                        }
                        None => differs = true,
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                remaining.into_iter().reduce(Self::or)
            }
        }
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, operands: &BTreeSet<Self>, separator: &str| -> fmt::Result {
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(separator)?;
                }
                write!(f, "{}", operand)?;
            }
            Ok(())
        };
        match self {
            Self::Empty => f.write_str("{true}?"),
            Self::Predicate {
                rule_index,
                pred_index,
                ctx_dependent,
            } => write!(
                f,
                "{{{}:{}}}?{}",
                rule_index,
                pred_index,
                if *ctx_dependent { "@" } else { "" }
            ),
            Self::Precedence(precedence) => write!(f, "{{{}>=prec}}?", precedence),
            Self::And(operands) => join(f, operands, "&&"),
            Self::Or(operands) => join(f, operands, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicate(pred_index: i32) -> SemanticContext {
        SemanticContext::Predicate {
            rule_index: 0,
            pred_index,
            ctx_dependent: false,
        }
    }

    #[test]
    fn empty_is_neutral_for_and_absorbing_for_or() {
        let p = predicate(1);
        assert_eq!(SemanticContext::and(SemanticContext::Empty, p.clone()), p);
        assert_eq!(SemanticContext::or(p, SemanticContext::Empty), SemanticContext::Empty);
    }

    #[test]
    fn precedence_predicates_collapse() {
        use SemanticContext::Precedence;

        assert_eq!(SemanticContext::and(Precedence(3), Precedence(5)), Precedence(3));
        assert_eq!(SemanticContext::or(Precedence(3), Precedence(5)), Precedence(5));

        let nested = SemanticContext::and(SemanticContext::and(predicate(1), Precedence(4)), Precedence(2));
        assert_eq!(
            nested,
            SemanticContext::And(BTreeSet::from([predicate(1), Precedence(2)]))
        );
    }

    #[test]
    fn precedence_decides_evaluation() {
        let guarded = SemanticContext::and(predicate(1), SemanticContext::Precedence(4));
        assert!(guarded.eval(4));
        assert!(!guarded.eval(5));

        assert_eq!(guarded.eval_precedence(2), Some(predicate(1)));
        assert_eq!(guarded.eval_precedence(6), None);
        assert_eq!(predicate(2).eval_precedence(9), Some(predicate(2)));
    }

    #[test]
    fn either_side_of_or_may_hold() {
        let either = SemanticContext::or(predicate(1), SemanticContext::Precedence(2));
        assert_eq!(either.eval_precedence(1), Some(SemanticContext::Empty));
        assert_eq!(either.eval_precedence(3), Some(predicate(1)));
    }

    #[test]
    fn conditions_display_their_operands() {
        let guarded = SemanticContext::and(predicate(1), SemanticContext::Precedence(4));
        assert_eq!(guarded.to_string(), "{0:1}?&&{4>=prec}?");
        assert_eq!(SemanticContext::Empty.to_string(), "{true}?");
    }
}
