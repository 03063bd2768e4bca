//! Items and item sets.

use crate::{
    rule::Rule,
    symbol::{Symbol, SymbolTable},
    types::display_fn,
};
use std::{collections::BTreeSet, fmt};

pub use crate::rule::ItemPrecedence;

/// A cursor into the lexical rule of a token.
///
/// The cursor is represented by the residual rule that remains to be matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LexItem {
    lhs: Symbol,
    rule: Rule,
    precedence: ItemPrecedence,
}

impl LexItem {
    pub fn new(lhs: Symbol, rule: Rule) -> Self {
        let precedence = rule.cursor_precedence();
        Self {
            lhs,
            rule,
            precedence,
        }
    }

    pub fn lhs(&self) -> Symbol {
        self.lhs
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn precedence(&self) -> ItemPrecedence {
        self.precedence
    }

    /// Whether the token may end at this cursor.
    pub fn is_done(&self) -> bool {
        self.rule.can_be_blank()
    }

    /// The precedence of the token when it ends at this cursor.
    pub fn completion_precedence(&self) -> ItemPrecedence {
        self.rule.completion_precedence()
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            write!(
                f,
                "{} → • {}",
                symbols.display(self.lhs),
                self.rule.display(symbols)
            )?;
            if self.is_done() {
                f.write_str("  (done)")?;
            }
            Ok(())
        })
    }
}

/// A cursor into a syntactic rule, with the number of symbols consumed along
/// this derivation and the terminal expected after its reduction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParseItem {
    lhs: Symbol,
    rule: Rule,
    consumed_symbol_count: usize,
    lookahead: Symbol,
    precedence: ItemPrecedence,
}

impl ParseItem {
    pub fn new(lhs: Symbol, rule: Rule, consumed_symbol_count: usize, lookahead: Symbol) -> Self {
        let precedence = rule.cursor_precedence();
        Self {
            lhs,
            rule,
            consumed_symbol_count,
            lookahead,
            precedence,
        }
    }

    pub fn lhs(&self) -> Symbol {
        self.lhs
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn consumed_symbol_count(&self) -> usize {
        self.consumed_symbol_count
    }

    pub fn lookahead(&self) -> Symbol {
        self.lookahead
    }

    pub fn precedence(&self) -> ItemPrecedence {
        self.precedence
    }

    /// Whether the production may be reduced at this cursor.
    pub fn is_done(&self) -> bool {
        self.rule.can_be_blank()
    }

    /// The precedence of the reduction at this cursor, which unlike
    /// [`precedence`](Self::precedence) ignores the alternatives that would
    /// still consume input.
    pub fn completion_precedence(&self) -> ItemPrecedence {
        self.rule.completion_precedence()
    }

    /// The item obtained by consuming one symbol, leaving `residual`.
    pub(crate) fn advance(&self, residual: Rule) -> Self {
        Self::new(
            self.lhs,
            residual,
            self.consumed_symbol_count + 1,
            self.lookahead,
        )
    }

    // `"[E → • (E + E)*, 2, $end]"`
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            write!(
                f,
                "[{} → • {}, {}, {}]",
                symbols.display(self.lhs),
                self.rule.display(symbols),
                self.consumed_symbol_count,
                symbols.display(self.lookahead)
            )?;
            if let Some(prec) = self.precedence.precedence {
                write!(f, " (prec={})", prec)?;
            }
            Ok(())
        })
    }
}

/// A set of items, compared and hashed by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemSet<T: Ord> {
    items: BTreeSet<T>,
}

pub type LexItemSet = ItemSet<LexItem>;
pub type ParseItemSet = ItemSet<ParseItem>;

impl<T: Ord> Default for ItemSet<T> {
    fn default() -> Self {
        Self {
            items: BTreeSet::new(),
        }
    }
}

impl<T: Ord> ItemSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn is_superset(&self, other: &Self) -> bool {
        self.items.is_superset(&other.items)
    }

    /// Move every item of `other` into this set.
    pub fn union_with(&mut self, other: Self) {
        let mut other = other.items;
        self.items.append(&mut other);
    }
}

impl<T: Ord> FromIterator<T> for ItemSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Ord> Extend<T> for ItemSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter)
    }
}

impl<T: Ord> IntoIterator for ItemSet<T> {
    type Item = T;
    type IntoIter = std::collections::btree_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T: Ord> IntoIterator for &'a ItemSet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::btree_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl ParseItemSet {
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for item in self {
                writeln!(f, "- {}", item.display(symbols))?;
            }
            Ok(())
        })
    }
}

impl LexItemSet {
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for item in self {
                writeln!(f, "- {}", item.display(symbols))?;
            }
            Ok(())
        })
    }
}
