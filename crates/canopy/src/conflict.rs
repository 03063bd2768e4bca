//! Resolution of conflicting parse actions.

use crate::{
    rule::Assoc,
    symbol::{Symbol, SymbolTable},
    tables::{Action, ParseStateId, ReduceAction},
    types::display_fn,
};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConflictReason {
    /// The state has multiple reductions even though it has no shift action
    /// on the target lookahead symbol.
    MultipleReductionWithoutShift,

    /// Neither precedence nor associativity separates the competing actions.
    MissingPrecedence,

    /// At least one of shift/reduce conflict resolution result is
    /// inconsistent with the others.
    InconsistentShiftResolution,

    /// The competing productions carry dynamic precedence, so the choice is
    /// left to the runtime.
    DynamicPrecedence,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// An unresolved conflict recorded against a parse state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: ParseStateId,
    pub lookahead: Symbol,
    pub kind: ConflictKind,
    pub reason: ConflictReason,
    /// The left-hand sides of the productions involved.
    pub symbols: Vec<Symbol>,
    /// Whether a declared conflict group covers `symbols`.
    pub expected: bool,
}

impl Conflict {
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            let kind = match self.kind {
                ConflictKind::ShiftReduce => "shift/reduce",
                ConflictKind::ReduceReduce => "reduce/reduce",
            };
            write!(
                f,
                "{} conflict in state {} on {} ({:?}) between",
                kind,
                self.state,
                symbols.display(self.lookahead),
                self.reason
            )?;
            for symbol in &self.symbols {
                write!(f, " {}", symbols.display(*symbol))?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConflictResolutionError {
    #[error("there is no actions")]
    EmptyActions,

    #[error("detected shift/accept conflict(s)")]
    ShiftAcceptConflict,

    #[error("detected reduce/accept conflict(s)")]
    ReduceAcceptConflict,
}

/// Attempts to resolve conflicts based on precedence/associativity.
///
/// `shift_prec` is the precedence of the shift on the lookahead symbol; an
/// absent precedence counts as `0`.
pub(crate) fn resolve_conflict(
    shift: Option<ParseStateId>,
    shift_prec: Option<i32>,
    reduces: &[ReduceAction],
) -> Result<Action, ConflictResolutionError> {
    use Action::*;

    match (shift, reduces) {
        (Some(next), []) => Ok(Shift(next)),
        (None, [reduce]) if reduce.is_accept() => Ok(Accept),
        (None, [reduce]) => Ok(Reduce(reduce.clone())),
        (None, []) => Err(ConflictResolutionError::EmptyActions),

        (Some(_), reduces) if reduces.iter().any(ReduceAction::is_accept) => {
            Err(ConflictResolutionError::ShiftAcceptConflict)
        }
        (None, reduces) if reduces.iter().any(ReduceAction::is_accept) => {
            Err(ConflictResolutionError::ReduceAcceptConflict)
        }

        (shift, reduces) => {
            // only the reductions with the highest precedence survive.
            let highest = reduces.iter().map(reduce_prec).max().unwrap_or(0);
            let survivors: Vec<ReduceAction> = reduces
                .iter()
                .filter(|reduce| reduce_prec(reduce) == highest)
                .cloned()
                .collect();

            let next = match shift {
                Some(next) => next,
                None if survivors.len() == 1 => return Ok(Reduce(survivors[0].clone())),
                None => {
                    return Ok(inconsistent(
                        None,
                        survivors,
                        ConflictReason::MultipleReductionWithoutShift,
                    ))
                }
            };

            let shift_prec = shift_prec.unwrap_or(0);
            let mut resolved = None;
            for reduce in &survivors {
                let new_resolved = match compare_precs(shift_prec, reduce) {
                    Some(diff) => diff,
                    None => {
                        return Ok(inconsistent(
                            Some(next),
                            survivors,
                            ConflictReason::MissingPrecedence,
                        ))
                    }
                };
                match (resolved, new_resolved) {
                    (None, diff) => resolved = Some(diff),
                    (Some(prev), diff) if prev == diff => (),
                    _ => {
                        return Ok(inconsistent(
                            Some(next),
                            survivors,
                            ConflictReason::InconsistentShiftResolution,
                        ))
                    }
                }
            }

            match resolved {
                Some(PrecDiff::Left) => Ok(Shift(next)),
                Some(PrecDiff::Neither) => Ok(Fail),
                Some(PrecDiff::Right) if survivors.len() == 1 => Ok(Reduce(survivors[0].clone())),
                Some(PrecDiff::Right) | None => Ok(inconsistent(
                    None,
                    survivors,
                    ConflictReason::MultipleReductionWithoutShift,
                )),
            }
        }
    }
}

/// Build an unresolved action, deferring it to the runtime when any of the
/// reductions carries dynamic precedence.
fn inconsistent(
    shift: Option<ParseStateId>,
    reduces: Vec<ReduceAction>,
    reason: ConflictReason,
) -> Action {
    let reason = if reduces.iter().any(|reduce| reduce.dynamic_precedence != 0) {
        ConflictReason::DynamicPrecedence
    } else {
        reason
    };
    Action::Inconsistent {
        shift,
        reduces,
        reason,
    }
}

fn reduce_prec(reduce: &ReduceAction) -> i32 {
    reduce.precedence.unwrap_or(0)
}

/// Which side of a shift/reduce comparison wins: `Left` is the shift, `Right`
/// the reduction, and `Neither` rejects the lookahead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PrecDiff {
    Left,
    Right,
    Neither,
}

fn compare_precs(shift_prec: i32, reduce: &ReduceAction) -> Option<PrecDiff> {
    match Ord::cmp(&shift_prec, &reduce_prec(reduce)) {
        Ordering::Greater => Some(PrecDiff::Left),
        Ordering::Less => Some(PrecDiff::Right),
        Ordering::Equal => match reduce.associativity? {
            Assoc::Left => Some(PrecDiff::Right),
            Assoc::Right => Some(PrecDiff::Left),
            Assoc::Nonassoc => Some(PrecDiff::Neither),
        },
    }
}
