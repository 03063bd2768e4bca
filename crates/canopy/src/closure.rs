//! Closure of item sets.

use crate::{
    first_sets::FirstSets,
    grammar::PreparedGrammar,
    item::{LexItem, LexItemSet, ParseItem, ParseItemSet},
    rule::Rule,
    rule_transitions::sym_transitions,
    symbol::Symbol,
    types::Map,
};

/// Expands item sets with the items reachable through zero-width steps.
#[derive(Debug)]
pub struct ClosureComputer<'g> {
    grammar: &'g PreparedGrammar,
    first_sets: FirstSets,
    alternatives: Map<Symbol, Vec<Rule>>,
}

impl<'g> ClosureComputer<'g> {
    pub fn new(grammar: &'g PreparedGrammar) -> Self {
        let alternatives = grammar
            .syntax_rules
            .iter()
            .map(|(symbol, rule)| (*symbol, rule.alternatives()))
            .collect();
        Self {
            grammar,
            first_sets: FirstSets::new(grammar),
            alternatives,
        }
    }

    pub fn grammar(&self) -> &'g PreparedGrammar {
        self.grammar
    }

    pub fn first_sets(&self) -> &FirstSets {
        &self.first_sets
    }

    /// The item set holding the augmented start production with the
    /// end-of-input lookahead, closed.
    pub fn start_items(&self) -> ParseItemSet {
        let seed = self.alternatives[&Symbol::START]
            .iter()
            .map(|rule| ParseItem::new(Symbol::START, rule.clone(), 0, Symbol::END))
            .collect();
        self.parse_closure(seed)
    }

    /// The LR(1) closure of a parse item set.
    ///
    /// Whenever a cursor sits before a nonterminal, the nonterminal's
    /// alternatives are added from their start, once for each terminal in
    /// `First` of what follows the nonterminal in the producing item. If what
    /// follows is nullable, the producing item's lookahead is used as well.
    pub fn parse_closure(&self, items: ParseItemSet) -> ParseItemSet {
        let mut items = items;
        let mut pending: Vec<ParseItem> = items.iter().cloned().collect();

        while let Some(item) = pending.pop() {
            for (symbol, after) in sym_transitions(item.rule()) {
                if !symbol.is_non_terminal() {
                    continue;
                }

                let first = self.first_sets.first_of(&after);
                let mut lookaheads: Vec<Symbol> = self.first_sets.symbols(&first).collect();
                if self.first_sets.is_nullable(&after) && !first.contains(item.lookahead()) {
                    lookaheads.push(item.lookahead());
                }

                for alternative in &self.alternatives[&symbol] {
                    for &lookahead in &lookaheads {
                        let new_item = ParseItem::new(symbol, alternative.clone(), 0, lookahead);
                        if !items.contains(&new_item) {
                            items.insert(new_item.clone());
                            pending.push(new_item);
                        }
                    }
                }
            }
        }

        items
    }

    /// The closure of a lexical item set.
    ///
    /// A cursor sitting before a reference to another token is expanded by
    /// splicing that token's rule in at the cursor. The owning token of the
    /// new item stays the same.
    pub fn lex_closure(&self, items: LexItemSet) -> LexItemSet {
        let mut items = items;
        let mut pending: Vec<LexItem> = items.iter().cloned().collect();

        while let Some(item) = pending.pop() {
            for (token, after) in sym_transitions(item.rule()) {
                let body = match self.grammar.lexical_rules.get(&token) {
                    Some(body) => body.clone(),
                    None => continue,
                };
                let new_item = LexItem::new(item.lhs(), Rule::seq([body, after]));
                if !items.contains(&new_item) {
                    items.insert(new_item.clone());
                    pending.push(new_item);
                }
            }
        }

        items
    }

    /// The closed lexical item set recognizing any of `tokens` from their start.
    pub fn lex_items_for<I>(&self, tokens: I) -> LexItemSet
    where
        I: IntoIterator<Item = Symbol>,
    {
        let seed = tokens
            .into_iter()
            .filter_map(|token| {
                let rule = self.grammar.lexical_rules.get(&token)?;
                Some(LexItem::new(token, rule.clone()))
            })
            .collect();
        self.lex_closure(seed)
    }
}
