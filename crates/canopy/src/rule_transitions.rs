//! One-step derivatives of rule expressions.
//!
//! The residual rule left after consuming a symbol (or a character) is what an
//! item uses as its cursor.

use crate::{
    char_set::{merge_char_transitions, CharacterSet},
    rule::Rule,
    symbol::Symbol,
    types::Map,
};

/// The residual rules reachable by consuming one symbol.
pub fn sym_transitions(rule: &Rule) -> Map<Symbol, Rule> {
    match rule {
        Rule::Blank | Rule::CharacterSet(..) => Map::default(),
        Rule::Symbol(symbol) => Some((*symbol, Rule::Blank)).into_iter().collect(),
        Rule::Choice(alternatives) => {
            let mut result = Map::default();
            for alternative in alternatives {
                merge_sym_residuals(&mut result, sym_transitions(alternative));
            }
            result
        }
        Rule::Seq(elements) => {
            let (first, rest) = match elements.split_first() {
                Some(split) => split,
                None => return Map::default(),
            };
            let mut result: Map<Symbol, Rule> = sym_transitions(first)
                .into_iter()
                .map(|(symbol, residual)| (symbol, continue_seq(residual, rest)))
                .collect();
            if first.can_be_blank() {
                merge_sym_residuals(&mut result, sym_transitions(&Rule::seq(rest.to_vec())));
            }
            result
        }
        Rule::Repeat(inner) => sym_transitions(inner)
            .into_iter()
            .map(|(symbol, residual)| (symbol, Rule::seq([residual, rule.clone()])))
            .collect(),
        Rule::Metadata { rule, params } => sym_transitions(rule)
            .into_iter()
            .map(|(symbol, residual)| {
                let residual = Rule::Metadata {
                    rule: Box::new(residual),
                    params: params.clone(),
                };
                (symbol, residual)
            })
            .collect(),
    }
}

/// The residual rules reachable by consuming one character, keyed by pairwise
/// disjoint character sets.
pub fn char_transitions(rule: &Rule) -> Vec<(CharacterSet, Rule)> {
    match rule {
        Rule::Blank | Rule::Symbol(..) => vec![],
        Rule::CharacterSet(chars) if chars.is_empty() => vec![],
        Rule::CharacterSet(chars) => vec![(chars.clone(), Rule::Blank)],
        Rule::Choice(alternatives) => alternatives.iter().fold(vec![], |acc, alternative| {
            merge_char_residuals(acc, char_transitions(alternative))
        }),
        Rule::Seq(elements) => {
            let (first, rest) = match elements.split_first() {
                Some(split) => split,
                None => return vec![],
            };
            let result = char_transitions(first)
                .into_iter()
                .map(|(chars, residual)| (chars, continue_seq(residual, rest)))
                .collect();
            if first.can_be_blank() {
                merge_char_residuals(result, char_transitions(&Rule::seq(rest.to_vec())))
            } else {
                result
            }
        }
        Rule::Repeat(inner) => char_transitions(inner)
            .into_iter()
            .map(|(chars, residual)| (chars, Rule::seq([residual, rule.clone()])))
            .collect(),
        Rule::Metadata { rule, params } => char_transitions(rule)
            .into_iter()
            .map(|(chars, residual)| {
                let residual = Rule::Metadata {
                    rule: Box::new(residual),
                    params: params.clone(),
                };
                (chars, residual)
            })
            .collect(),
    }
}

/// The remainder of a sequence once its first element has advanced to
/// `residual`. A fully consumed element is dropped along with its metadata,
/// since the cursor has left its scope.
fn continue_seq(residual: Rule, rest: &[Rule]) -> Rule {
    if is_exhausted(&residual) {
        Rule::seq(rest.to_vec())
    } else {
        Rule::seq(Some(residual).into_iter().chain(rest.iter().cloned()))
    }
}

fn is_exhausted(rule: &Rule) -> bool {
    match rule {
        Rule::Blank => true,
        Rule::Metadata { rule, .. } => is_exhausted(rule),
        _ => false,
    }
}

fn merge_sym_residuals(target: &mut Map<Symbol, Rule>, other: Map<Symbol, Rule>) {
    for (symbol, residual) in other {
        match target.get_mut(&symbol) {
            Some(existing) => {
                let prev = std::mem::replace(existing, Rule::Blank);
                *existing = Rule::choice([prev, residual]);
            }
            None => {
                target.insert(symbol, residual);
            }
        }
    }
}

fn merge_char_residuals(
    left: Vec<(CharacterSet, Rule)>,
    right: Vec<(CharacterSet, Rule)>,
) -> Vec<(CharacterSet, Rule)> {
    merge_char_transitions(left, right, |l, r| Rule::choice([l, r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rule::{Choice, IntoRule},
        symbol::{SymbolKind, SymbolTable},
    };

    fn symbols() -> (Symbol, Symbol, Symbol) {
        let mut table = SymbolTable::new();
        let a = table.intern("a", SymbolKind::Terminal).unwrap();
        let b = table.intern("b", SymbolKind::Terminal).unwrap();
        let c = table.intern("c", SymbolKind::Terminal).unwrap();
        (a, b, c)
    }

    #[test]
    fn seq_advances_past_first_element() {
        let (a, b, c) = symbols();
        let transitions = sym_transitions(&(a, b, c).into_rule());
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[&a], (b, c).into_rule());
    }

    #[test]
    fn nullable_prefix_exposes_following_symbols() {
        let (a, b, c) = symbols();
        let rule = (Rule::optional(Rule::Symbol(a)), b, c).into_rule();
        let transitions = sym_transitions(&rule);
        assert_eq!(transitions[&a], (b, c).into_rule());
        assert_eq!(transitions[&b], Rule::Symbol(c));
    }

    #[test]
    fn choice_merges_residuals_on_the_same_symbol() {
        let (a, b, c) = symbols();
        let rule = Choice(((a, b), (a, c))).into_rule();
        let transitions = sym_transitions(&rule);
        assert_eq!(
            transitions[&a],
            Rule::choice([Rule::Symbol(b), Rule::Symbol(c)])
        );
    }

    #[test]
    fn repeat_loops_back() {
        let (a, ..) = symbols();
        let rule = Rule::repeat(Rule::Symbol(a));
        let transitions = sym_transitions(&rule);
        assert_eq!(transitions[&a], rule);
        assert!(transitions[&a].can_be_blank());
    }

    #[test]
    fn metadata_survives_to_the_completed_residual() {
        let (a, b, _) = symbols();
        let rule = Rule::prec_left(3, (a, b).into_rule());
        let after_a = sym_transitions(&rule)[&a].clone();
        assert_eq!(after_a.cursor_precedence().precedence, Some(3));
        let after_b = sym_transitions(&after_a)[&b].clone();
        assert!(after_b.can_be_blank());
        assert_eq!(after_b.cursor_precedence().precedence, Some(3));
    }

    #[test]
    fn exhausted_inner_metadata_is_dropped() {
        let (a, b, _) = symbols();
        let rule = (Rule::prec(5, Rule::Symbol(a)), b).into_rule();
        let after_a = sym_transitions(&rule)[&a].clone();
        assert_eq!(after_a, Rule::Symbol(b));
        assert_eq!(after_a.cursor_precedence().precedence, None);
    }

    #[test]
    fn char_transitions_split_overlapping_alternatives() {
        let word = CharacterSet::from_range('a'..='z');
        let keyword = Rule::string("if");
        let ident = Rule::repeat1(Rule::CharacterSet(word));
        let transitions = char_transitions(&Rule::choice([keyword, ident.clone()]));

        let (chars, residual) = transitions
            .iter()
            .find(|(chars, _)| chars.contains('i'))
            .unwrap();
        assert_eq!(chars, &CharacterSet::from_char('i'));
        assert_eq!(residual.alternatives().len(), 2);

        let covered = transitions
            .iter()
            .fold(CharacterSet::empty(), |acc, (chars, _)| acc.union(chars));
        assert_eq!(covered, CharacterSet::from_range('a'..='z'));
        for (i, (left, _)) in transitions.iter().enumerate() {
            for (right, _) in &transitions[i + 1..] {
                assert!(left.is_disjoint(right));
            }
        }
    }

    #[test]
    fn char_transitions_of_string() {
        let transitions = char_transitions(&Rule::string("ab"));
        assert_eq!(
            transitions,
            vec![(CharacterSet::from_char('a'), 'b'.into_rule())]
        );
    }
}
