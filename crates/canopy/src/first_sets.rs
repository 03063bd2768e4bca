//! Nullability and FIRST sets of the syntactic grammar.

use crate::{
    grammar::PreparedGrammar,
    rule::Rule,
    symbol::{Symbol, SymbolTable},
    types::{Map, Set},
};

/// A set of terminal symbols, stored as a bitset over the dense terminal
/// index space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, terminal: Symbol) -> bool {
        self.inner.contains(terminal.index().into())
    }

    pub fn insert(&mut self, terminal: Symbol) -> bool {
        debug_assert!(terminal.is_terminal());
        self.inner.insert(terminal.index().into())
    }

    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.inner.iter()
    }
}

#[derive(Debug)]
pub struct FirstSets {
    nulls: Set<Symbol>,
    map: Map<Symbol, TerminalSet>,
    terminals: Vec<Symbol>,
}

impl FirstSets {
    pub fn new(grammar: &PreparedGrammar) -> Self {
        let nulls = nulls_set(grammar);

        // First(N) = {} と初期化し、値が更新されなくなるまで繰り返す
        let mut map: Map<Symbol, TerminalSet> = grammar
            .syntax_rules
            .keys()
            .map(|symbol| (*symbol, TerminalSet::default()))
            .collect();
        let mut changed = true;
        while changed {
            changed = false;
            for (symbol, rule) in &grammar.syntax_rules {
                let mut first = TerminalSet::default();
                collect_first(rule, &nulls, &map, &mut first);
                let current = &mut map[symbol];
                if !first.inner.is_subset(&current.inner) {
                    current.union_with(&first);
                    changed = true;
                }
            }
        }

        Self {
            nulls,
            map,
            terminals: terminal_index(&grammar.symbols),
        }
    }

    pub fn is_nullable_symbol(&self, symbol: Symbol) -> bool {
        self.nulls.contains(&symbol)
    }

    /// Whether `rule` derives the empty string.
    pub fn is_nullable(&self, rule: &Rule) -> bool {
        rule_is_nullable(rule, &self.nulls)
    }

    /// `First(rule)`
    pub fn first_of(&self, rule: &Rule) -> TerminalSet {
        let mut first = TerminalSet::default();
        collect_first(rule, &self.nulls, &self.map, &mut first);
        first
    }

    pub fn first_of_symbol(&self, symbol: Symbol) -> Option<&TerminalSet> {
        self.map.get(&symbol)
    }

    /// Resolve the members of a terminal set into symbols, ordered by index.
    pub fn symbols<'s>(&'s self, set: &'s TerminalSet) -> impl Iterator<Item = Symbol> + 's {
        set.indices().filter_map(|i| self.terminals.get(i).copied())
    }
}

fn terminal_index(symbols: &SymbolTable) -> Vec<Symbol> {
    let mut terminals = vec![Symbol::END; symbols.terminal_count()];
    for symbol in symbols.symbols().filter(Symbol::is_terminal) {
        terminals[usize::from(symbol.index())] = symbol;
    }
    terminals
}

fn collect_first(
    rule: &Rule,
    nulls: &Set<Symbol>,
    map: &Map<Symbol, TerminalSet>,
    first: &mut TerminalSet,
) {
    match rule {
        Rule::Blank | Rule::CharacterSet(..) => (),
        Rule::Symbol(symbol) if symbol.is_non_terminal() => {
            if let Some(set) = map.get(symbol) {
                first.union_with(set);
            }
        }
        Rule::Symbol(symbol) => {
            first.insert(*symbol);
        }
        Rule::Choice(alternatives) => {
            for alternative in alternatives {
                collect_first(alternative, nulls, map, first);
            }
        }
        Rule::Seq(elements) => {
            for element in elements {
                collect_first(element, nulls, map, first);
                if !rule_is_nullable(element, nulls) {
                    break;
                }
            }
        }
        Rule::Repeat(rule) | Rule::Metadata { rule, .. } => collect_first(rule, nulls, map, first),
    }
}

fn rule_is_nullable(rule: &Rule, nulls: &Set<Symbol>) -> bool {
    match rule {
        Rule::Blank | Rule::Repeat(..) => true,
        Rule::CharacterSet(..) => false,
        Rule::Symbol(symbol) => nulls.contains(symbol),
        Rule::Choice(rules) => rules.iter().any(|rule| rule_is_nullable(rule, nulls)),
        Rule::Seq(rules) => rules.iter().all(|rule| rule_is_nullable(rule, nulls)),
        Rule::Metadata { rule, .. } => rule_is_nullable(rule, nulls),
    }
}

/// Calculate the set of nullable symbols in this grammar.
fn nulls_set(grammar: &PreparedGrammar) -> Set<Symbol> {
    let mut nulls = Set::default();

    // 値が更新されなくなるまで繰り返す
    let mut changed = true;
    while changed {
        changed = false;
        for (symbol, rule) in &grammar.syntax_rules {
            if nulls.contains(symbol) {
                continue;
            }
            if rule_is_nullable(rule, &nulls) {
                nulls.insert(*symbol);
                changed = true;
            }
        }
    }

    nulls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Choice;

    #[test]
    fn nullable_and_first() {
        let grammar = PreparedGrammar::define(|g| {
            let a = g.literal("a")?;
            let b = g.literal("b")?;
            let c = g.literal("c")?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("X")?;
            let y = g.nonterminal("Y")?;
            g.rule(s, (x, y, c))?;
            g.rule(x, Choice((a, ())))?;
            g.rule(y, Choice((b, (x, x))))?;
            Ok(())
        })
        .unwrap();

        let first_sets = FirstSets::new(&grammar);
        let sym = |name: &str| {
            grammar
                .symbols
                .get(name)
                .or_else(|| grammar.symbols.get_anonymous(name))
                .unwrap()
        };
        let names = |set: &TerminalSet| -> Vec<Symbol> { first_sets.symbols(set).collect() };

        assert!(first_sets.is_nullable_symbol(sym("X")));
        assert!(first_sets.is_nullable_symbol(sym("Y")));
        assert!(!first_sets.is_nullable_symbol(sym("S")));

        let first_s = first_sets.first_of_symbol(sym("S")).unwrap();
        assert_eq!(names(first_s), vec![sym("a"), sym("b"), sym("c")]);
        let first_y = first_sets.first_of_symbol(sym("Y")).unwrap();
        assert_eq!(names(first_y), vec![sym("a"), sym("b")]);

        let tail = Rule::seq([Rule::Symbol(sym("Y")), Rule::Symbol(sym("X"))]);
        assert!(first_sets.is_nullable(&tail));
        assert_eq!(first_sets.first_of(&tail).len(), 2);
        assert!(first_sets.first_of(&Rule::Blank).is_empty());
    }
}
