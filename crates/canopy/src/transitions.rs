//! Transition derivation for items and item sets.

use crate::{
    char_set::{merge_char_transitions, CharacterSet},
    closure::ClosureComputer,
    item::{ItemSet, LexItem, LexItemSet, ParseItem, ParseItemSet},
    rule_transitions::{char_transitions, sym_transitions},
    symbol::Symbol,
    types::Map,
};

/// The transitions of a single lexical item, each destination closed.
pub fn lex_item_transitions(
    closure: &ClosureComputer<'_>,
    item: &LexItem,
) -> Vec<(CharacterSet, LexItemSet)> {
    char_transitions(item.rule())
        .into_iter()
        .map(|(chars, residual)| {
            let successor = LexItem::new(item.lhs(), residual);
            (chars, closure.lex_closure(Some(successor).into_iter().collect()))
        })
        .collect()
}

/// The transitions of a lexical item set.
///
/// Character sets in the result are pairwise disjoint, and a character leads to
/// the union of the successors of every item that can consume it.
pub fn lex_item_set_transitions(
    closure: &ClosureComputer<'_>,
    items: &LexItemSet,
) -> Vec<(CharacterSet, LexItemSet)> {
    items.iter().fold(vec![], |acc, item| {
        merge_char_transitions(acc, lex_item_transitions(closure, item), union_items)
    })
}

/// The transitions of a single parse item, each destination closed.
pub fn parse_item_transitions(
    closure: &ClosureComputer<'_>,
    item: &ParseItem,
) -> Map<Symbol, ParseItemSet> {
    sym_transitions(item.rule())
        .into_iter()
        .map(|(symbol, residual)| {
            let successor = item.advance(residual);
            (symbol, closure.parse_closure(Some(successor).into_iter().collect()))
        })
        .collect()
}

/// The transitions of a parse item set, keyed by the consumed symbol.
pub fn parse_item_set_transitions(
    closure: &ClosureComputer<'_>,
    items: &ParseItemSet,
) -> Map<Symbol, ParseItemSet> {
    items.iter().fold(Map::default(), |acc, item| {
        merge_sym_transitions(acc, parse_item_transitions(closure, item), union_items)
    })
}

/// Merge two transition maps keyed by symbols, combining the destinations of
/// equal keys with `merge`.
pub fn merge_sym_transitions<T, F>(
    left: Map<Symbol, T>,
    mut right: Map<Symbol, T>,
    mut merge: F,
) -> Map<Symbol, T>
where
    F: FnMut(T, T) -> T,
{
    if left.is_empty() {
        return right;
    }
    let mut merged = Map::default();
    for (symbol, value) in left {
        let value = match right.shift_remove(&symbol) {
            Some(other) => merge(value, other),
            None => value,
        };
        merged.insert(symbol, value);
    }
    merged.extend(right);
    merged
}

fn union_items<T: Ord>(mut left: ItemSet<T>, right: ItemSet<T>) -> ItemSet<T> {
    left.union_with(right);
    left
}
