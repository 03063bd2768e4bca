use canopy::{
    char_set::{merge_char_transitions, CharacterSet},
    closure::ClosureComputer,
    conflict::{ConflictKind, ConflictReason},
    grammar::{GrammarDef, GrammarError, PreparedGrammar},
    item::{ItemSet, LexItemSet, ParseItemSet},
    symbol::Symbol,
    tables::Action,
    types::Set,
    transitions::{
        lex_item_set_transitions, lex_item_transitions, merge_sym_transitions,
        parse_item_set_transitions, parse_item_transitions,
    },
    BuildError,
};
use canopy_tests::grammars;

type Fixture = fn(&mut GrammarDef<'_>) -> Result<(), GrammarError>;

const FIXTURES: &[(&str, Fixture)] = &[
    ("layered_arithmetic", grammars::layered_arithmetic),
    ("arithmetic", grammars::arithmetic),
    ("ambiguous_arithmetic", grammars::ambiguous_arithmetic),
    ("reduce_reduce", grammars::reduce_reduce),
    ("nullable", grammars::nullable),
    ("dangling_else", grammars::dangling_else),
    ("keywords", grammars::keywords),
    ("indented_blocks", grammars::indented_blocks),
    ("json", grammars::json),
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn union_items<T: Ord>(mut left: ItemSet<T>, right: ItemSet<T>) -> ItemSet<T> {
    left.union_with(right);
    left
}

/// The item sets of every parse state, together with the seeds of every lex
/// state derived from them.
fn reachable_item_sets(
    closure: &ClosureComputer<'_>,
) -> anyhow::Result<(Vec<ParseItemSet>, Vec<LexItemSet>)> {
    let tables = canopy::build_tables(closure.grammar())?;
    let grammar = closure.grammar();
    let parse_item_sets = tables
        .parse_table
        .states
        .iter()
        .map(|state| state.item_set().clone())
        .collect();
    let lex_item_sets = tables
        .parse_table
        .states
        .iter()
        .map(|state| {
            let tokens = state
                .actions
                .keys()
                .copied()
                .chain(grammar.extra_symbols.iter().copied())
                .filter(Symbol::is_token);
            closure.lex_items_for(tokens)
        })
        .collect();
    Ok((parse_item_sets, lex_item_sets))
}

#[test]
fn closure_is_idempotent() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let closure = ClosureComputer::new(&grammar);
        let (parse_item_sets, lex_item_sets) = reachable_item_sets(&closure)?;

        for item_set in parse_item_sets {
            let closed = closure.parse_closure(item_set.clone());
            assert_eq!(closed, item_set, "parse closure of {} is not idempotent", name);
        }
        for item_set in lex_item_sets {
            let closed = closure.lex_closure(item_set.clone());
            assert_eq!(closed, item_set, "lex closure of {} is not idempotent", name);
        }
    }
    Ok(())
}

#[test]
fn closure_is_monotone() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let closure = ClosureComputer::new(&grammar);
        let (parse_item_sets, _) = reachable_item_sets(&closure)?;

        for item_set in parse_item_sets {
            // the kernel and each single item of the state.
            let kernel: ParseItemSet = item_set
                .iter()
                .filter(|item| item.consumed_symbol_count() > 0)
                .cloned()
                .collect();
            let closed = closure.parse_closure(kernel.clone());
            assert!(closed.is_superset(&kernel), "closure of {} shrinks", name);
            assert!(item_set.is_superset(&closed), "closure of {} escapes its state", name);

            for item in &item_set {
                let seed: ParseItemSet = Some(item.clone()).into_iter().collect();
                assert!(closure.parse_closure(seed.clone()).is_superset(&seed));
            }
        }
    }
    Ok(())
}

#[test]
fn lex_transitions_partition_exactly() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let closure = ClosureComputer::new(&grammar);
        let (_, lex_item_sets) = reachable_item_sets(&closure)?;

        for item_set in lex_item_sets {
            let merged = lex_item_set_transitions(&closure, &item_set);

            let mut expected = CharacterSet::empty();
            for item in &item_set {
                for (chars, _) in lex_item_transitions(&closure, item) {
                    expected = expected.union(&chars);
                }
            }
            let covered = merged
                .iter()
                .fold(CharacterSet::empty(), |acc, (chars, _)| acc.union(chars));
            assert_eq!(covered, expected, "lex transitions of {} lose characters", name);

            for (i, (left, _)) in merged.iter().enumerate() {
                assert!(!left.is_empty());
                for (right, _) in &merged[i + 1..] {
                    assert!(left.is_disjoint(right), "lex transitions of {} overlap", name);
                }
            }

            // every character leads to the successors of every item accepting it.
            for (chars, successors) in &merged {
                for item in &item_set {
                    for (item_chars, item_successors) in lex_item_transitions(&closure, item) {
                        if !item_chars.is_disjoint(chars) {
                            assert!(successors.is_superset(&item_successors));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[test]
fn lex_tables_have_disjoint_advances() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let tables = canopy::build_tables(&grammar)?;
        for state in &tables.lex_table.states {
            for (i, (left, _)) in state.advances.iter().enumerate() {
                for (right, _) in &state.advances[i + 1..] {
                    assert!(left.is_disjoint(right), "lex table of {} overlaps", name);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn transition_merge_is_commutative() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let closure = ClosureComputer::new(&grammar);
        let (parse_item_sets, lex_item_sets) = reachable_item_sets(&closure)?;

        for item_set in lex_item_sets {
            let items: Vec<_> = item_set.iter().collect();
            for pair in items.windows(2) {
                let a = lex_item_transitions(&closure, pair[0]);
                let b = lex_item_transitions(&closure, pair[1]);
                let mut ab = merge_char_transitions(a.clone(), b.clone(), union_items);
                let mut ba = merge_char_transitions(b, a, union_items);
                ab.sort();
                ba.sort();
                assert_eq!(ab, ba, "lex merge of {} depends on order", name);
            }
        }

        for item_set in parse_item_sets {
            let items: Vec<_> = item_set.iter().collect();
            for pair in items.windows(2) {
                let a = parse_item_transitions(&closure, pair[0]);
                let b = parse_item_transitions(&closure, pair[1]);
                let ab = merge_sym_transitions(a.clone(), b.clone(), union_items);
                let ba = merge_sym_transitions(b, a, union_items);
                // map equality ignores the insertion order.
                assert_eq!(ab, ba, "symbol merge of {} depends on order", name);
            }
            assert_eq!(
                parse_item_set_transitions(&closure, &item_set).len(),
                item_set
                    .iter()
                    .flat_map(|item| parse_item_transitions(&closure, item).into_keys())
                    .collect::<Set<_>>()
                    .len()
            );
        }
    }
    Ok(())
}

#[test]
fn construction_is_deterministic() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let first = PreparedGrammar::define(fixture)?;
        let second = PreparedGrammar::define(fixture)?;
        let a = canopy::build_tables(&first)?;
        let b = canopy::build_tables(&second)?;
        assert_eq!(
            a.parse_table.states.len(),
            b.parse_table.states.len(),
            "state count of {} is unstable",
            name
        );
        assert_eq!(a, b, "tables of {} are unstable", name);
    }
    Ok(())
}

#[test]
fn states_are_distinct_and_closed_under_transitions() -> anyhow::Result<()> {
    init_tracing();
    for &(name, fixture) in FIXTURES {
        let grammar = PreparedGrammar::define(fixture)?;
        let closure = ClosureComputer::new(&grammar);
        let tables = canopy::build_tables(&grammar)?;
        let states = &tables.parse_table.states;

        let item_sets: Set<&ParseItemSet> = states.iter().map(|s| s.item_set()).collect();
        assert_eq!(item_sets.len(), states.len(), "{} has duplicate states", name);

        for state in states {
            for (symbol, next) in parse_item_set_transitions(&closure, state.item_set()) {
                assert!(
                    item_sets.contains(&next),
                    "{} misses the successor of a state on {}",
                    name,
                    grammar.symbols.display(symbol)
                );
            }
        }
    }
    Ok(())
}

#[test]
fn reduce_reduce_conflict_is_recorded() -> anyhow::Result<()> {
    init_tracing();
    let grammar = PreparedGrammar::define(grammars::reduce_reduce)?;
    let tables = canopy::build_tables(&grammar)?;

    let a = grammar.symbols.get("a").unwrap();
    let b = grammar.symbols.get("b").unwrap();

    assert_eq!(tables.conflicts.len(), 1);
    let conflict = &tables.conflicts[0];
    assert_eq!(conflict.kind, ConflictKind::ReduceReduce);
    assert_eq!(conflict.reason, ConflictReason::MultipleReductionWithoutShift);
    assert_eq!(conflict.lookahead, Symbol::END);
    assert!(conflict.symbols.contains(&a));
    assert!(conflict.symbols.contains(&b));
    assert!(!conflict.expected);

    let action = &tables.parse_table.state(conflict.state).actions[&Symbol::END];
    assert!(matches!(
        action,
        Action::Inconsistent { shift: None, reduces, .. } if reduces.len() == 2
    ));
    assert_eq!(tables.unexpected_conflicts().count(), 1);
    Ok(())
}

#[test]
fn dangling_else_is_a_shift_reduce_conflict() -> anyhow::Result<()> {
    init_tracing();
    let grammar = PreparedGrammar::define(grammars::dangling_else)?;
    let tables = canopy::build_tables(&grammar)?;
    let kw_else = grammar.symbols.get_anonymous("else").unwrap();

    assert!(!tables.conflicts.is_empty());
    for conflict in &tables.conflicts {
        assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
        assert_eq!(conflict.reason, ConflictReason::MissingPrecedence);
        assert_eq!(conflict.lookahead, kw_else);
    }
    Ok(())
}

// Declared conflict groups silence the diagnostic; the state still carries
// every competing action.
#[test]
fn expected_conflicts_suppress_only_the_diagnostic() -> anyhow::Result<()> {
    init_tracing();
    let unexpected = canopy::build_tables(&PreparedGrammar::define(grammars::dangling_else)?)?;
    let grammar = PreparedGrammar::define(grammars::dangling_else_expected)?;
    let expected = canopy::build_tables(&grammar)?;

    assert_eq!(expected.conflicts.len(), unexpected.conflicts.len());
    assert!(expected.conflicts.iter().all(|conflict| conflict.expected));
    assert_eq!(expected.unexpected_conflicts().count(), 0);
    assert_eq!(expected.parse_table, unexpected.parse_table);
    Ok(())
}

#[test]
fn structural_errors_abort_before_construction() {
    init_tracing();

    let err = PreparedGrammar::define(|g| {
        let x = g.literal("x")?;
        let s = g.nonterminal("s")?;
        let t = g.nonterminal("t")?;
        g.rule(s, x)?;
        g.rule(t, x)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, GrammarError::UnreachableRule { ref name } if name == "t"));

    let err = PreparedGrammar::define(|g| {
        let s = g.nonterminal("s")?;
        let t = g.nonterminal("t")?;
        g.rule(s, t)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, GrammarError::MissingRule { ref name } if name == "t"));

    let err = PreparedGrammar::define(|g| {
        let x = g.literal("x")?;
        let s = g.nonterminal("s")?;
        g.rule(s, (x, CharacterSet::from_char('y')))?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, GrammarError::CharacterSetInSyntax { .. }));

    let err = PreparedGrammar::define(|_| Ok(())).unwrap_err();
    assert!(matches!(err, GrammarError::EmptyGrammar));
}

#[test]
fn state_ceiling_is_fatal() -> anyhow::Result<()> {
    init_tracing();
    let grammar = PreparedGrammar::define(grammars::json)?;
    let err = canopy::Config::new()
        .max_parse_states(4)
        .build(&grammar)
        .unwrap_err();
    assert!(matches!(err, BuildError::StateLimitExceeded { limit: 4, .. }));
    Ok(())
}
