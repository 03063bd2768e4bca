//! Parse and lex tables produced by the builder.

use crate::{
    char_set::CharacterSet,
    conflict::{Conflict, ConflictReason},
    item::ParseItemSet,
    rule::Assoc,
    symbol::{Symbol, SymbolTable},
    types::{display_fn, Map},
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ParseStateId {
    raw: u32,
}

impl ParseStateId {
    pub const START: Self = Self::new(0);

    pub(crate) const fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for ParseStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.raw)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LexStateId {
    raw: u32,
}

impl LexStateId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for LexStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.raw)
    }
}

/// A reduction of a production, identified by its left-hand side and the
/// number of symbols it pops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReduceAction {
    pub symbol: Symbol,
    pub consumed_symbol_count: usize,
    pub precedence: Option<i32>,
    pub associativity: Option<Assoc>,
    pub dynamic_precedence: i32,
}

impl ReduceAction {
    pub(crate) fn is_accept(&self) -> bool {
        self.symbol == Symbol::START
    }
}

/// The action that the automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(ParseStateId),

    /// Read an extra token and stay in the current state.
    ShiftExtra,

    /// Reduce to the specified production.
    Reduce(ReduceAction),

    Accept,

    /// Reject the specified lookahead symbol.
    ///
    /// The behavior of this action is the same as if no action exists
    /// for the given lookahead symbol, but is explicitly inserted by
    /// resolving a conflict against a non-associative production.
    Fail,

    /// There are multiple conflicting actions for the lookahead symbol.
    Inconsistent {
        shift: Option<ParseStateId>,
        reduces: Vec<ReduceAction>,
        reason: ConflictReason,
    },
}

impl Action {
    pub fn is_consistent(&self) -> bool {
        !matches!(self, Self::Inconsistent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseState {
    pub(crate) item_set: ParseItemSet,
    pub actions: Map<Symbol, Action>,
    pub gotos: Map<Symbol, ParseStateId>,
    pub lex_state: LexStateId,
}

impl ParseState {
    /// The item set this state was built from.
    pub fn item_set(&self) -> &ParseItemSet {
        &self.item_set
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTable {
    pub states: Vec<ParseState>,
}

impl ParseTable {
    pub fn state(&self, id: ParseStateId) -> &ParseState {
        &self.states[id.index()]
    }

    pub fn states(&self) -> impl Iterator<Item = (ParseStateId, &ParseState)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (ParseStateId::new(i as u32), state))
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (id, state) in self.states() {
                if id != ParseStateId::START {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {}", id)?;
                writeln!(f, "## item_set")?;
                write!(f, "{}", state.item_set.display(symbols))?;

                writeln!(f, "## actions")?;
                for (token, action) in &state.actions {
                    let token = symbols.display(*token);
                    match action {
                        Action::Shift(n) => writeln!(f, "- {} => shift({})", token, n)?,
                        Action::ShiftExtra => writeln!(f, "- {} => shift_extra", token)?,
                        Action::Reduce(reduce) => {
                            writeln!(f, "- {} => reduce({})", token, display_reduce(reduce, symbols))?
                        }
                        Action::Accept => writeln!(f, "- {} => accept", token)?,
                        Action::Fail => writeln!(f, "- {} => fail", token)?,
                        Action::Inconsistent {
                            shift,
                            reduces,
                            reason,
                        } => {
                            writeln!(f, "- {} => inconsistent(reason = {:?})", token, reason)?;
                            if let Some(n) = shift {
                                writeln!(f, "  - shift({})", n)?;
                            }
                            for reduce in reduces {
                                writeln!(f, "  - reduce({})", display_reduce(reduce, symbols))?;
                            }
                        }
                    }
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &state.gotos {
                    writeln!(f, "- {} => goto({})", symbols.display(*symbol), goto)?;
                }

                writeln!(f, "## lex_state: {}", state.lex_state)?;
            }
            Ok(())
        })
    }
}

fn display_reduce<'a>(reduce: &'a ReduceAction, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
    display_fn(move |f| {
        write!(
            f,
            "{}, {}",
            symbols.display(reduce.symbol),
            reduce.consumed_symbol_count
        )
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexState {
    /// Disjoint character sets and the state reached on them.
    pub advances: Vec<(CharacterSet, LexStateId)>,
    /// The token recognized if the lexer stops in this state.
    pub accept: Option<Symbol>,
}

impl LexState {
    /// The state reached on `c`, if any.
    pub fn advance(&self, c: char) -> Option<LexStateId> {
        self.advances
            .iter()
            .find(|(chars, _)| chars.contains(c))
            .map(|(_, next)| *next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexTable {
    pub states: Vec<LexState>,
}

impl LexTable {
    pub fn state(&self, id: LexStateId) -> &LexState {
        &self.states[id.index()]
    }

    /// Run the lexer from `start` over `input` with maximal munch, returning
    /// the recognized token and the length in bytes of its match.
    pub fn longest_match(&self, start: LexStateId, input: &str) -> Option<(Symbol, usize)> {
        let mut state = self.state(start);
        let mut matched = state.accept.map(|token| (token, 0));
        for (offset, c) in input.char_indices() {
            match state.advance(c) {
                Some(next) => state = self.state(next),
                None => break,
            }
            if let Some(token) = state.accept {
                matched = Some((token, offset + c.len_utf8()));
            }
        }
        matched
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (i, state) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### Lex State {:02}", i)?;
                if let Some(token) = state.accept {
                    writeln!(f, "- accept {}", symbols.display(token))?;
                }
                for (chars, next) in &state.advances {
                    writeln!(f, "- {} => advance({})", chars, next)?;
                }
            }
            Ok(())
        })
    }
}

/// The output of the table builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub parse_table: ParseTable,
    pub lex_table: LexTable,
    pub conflicts: Vec<Conflict>,
}

impl Tables {
    /// Conflicts to be reported to the grammar author: neither declared as
    /// expected nor deferred to runtime by dynamic precedence.
    pub fn unexpected_conflicts(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts
            .iter()
            .filter(|conflict| !conflict.expected && conflict.reason != ConflictReason::DynamicPrecedence)
    }
}
