//! Breadth-first construction of the parse and lex tables.

use crate::{
    closure::ClosureComputer,
    conflict::{resolve_conflict, Conflict, ConflictKind, ConflictReason, ConflictResolutionError},
    grammar::PreparedGrammar,
    item::{LexItemSet, ParseItemSet},
    rule_transitions::sym_transitions,
    symbol::{Symbol, SymbolKind},
    tables::{
        Action, LexState, LexStateId, LexTable, ParseState, ParseStateId, ParseTable,
        ReduceAction, Tables,
    },
    transitions::{lex_item_set_transitions, parse_item_set_transitions},
    types::{Map, Set},
};
use std::{collections::VecDeque, fmt};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(
        "the {} table exceeds the limit of {} states; the grammar likely expands without bound",
        kind,
        limit
    )]
    StateLimitExceeded { kind: TableKind, limit: usize },

    #[error("error during resolving conflicts")]
    ConflictResolution(
        #[from]
        #[source]
        ConflictResolutionError,
    ),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableKind {
    Parse,
    Lex,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => f.write_str("parse"),
            Self::Lex => f.write_str("lex"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    max_parse_states: usize,
    max_lex_states: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const DEFAULT_MAX_STATES: usize = u16::MAX as usize;

    pub const fn new() -> Self {
        Self {
            max_parse_states: Self::DEFAULT_MAX_STATES,
            max_lex_states: Self::DEFAULT_MAX_STATES,
        }
    }

    /// Set the ceiling on the number of parse states.
    pub fn max_parse_states(&mut self, limit: usize) -> &mut Self {
        self.max_parse_states = limit;
        self
    }

    /// Set the ceiling on the number of lex states.
    pub fn max_lex_states(&mut self, limit: usize) -> &mut Self {
        self.max_lex_states = limit;
        self
    }

    pub fn build(&self, grammar: &PreparedGrammar) -> Result<Tables, BuildError> {
        let _span = tracing::debug_span!("build_tables").entered();

        let closure = ClosureComputer::new(grammar);

        let mut builder = ParseTableBuilder::new(&closure, self.max_parse_states);
        builder.populate_states()?;
        let (mut parse_table, conflicts) = builder.finalize()?;

        let lex_table = build_lex_table(&closure, &mut parse_table, self.max_lex_states)?;

        tracing::debug!(
            parse_states = parse_table.states.len(),
            lex_states = lex_table.states.len(),
            conflicts = conflicts.len(),
            "tables built"
        );

        Ok(Tables {
            parse_table,
            lex_table,
            conflicts,
        })
    }
}

/// Build the tables with the default configuration.
pub fn build_tables(grammar: &PreparedGrammar) -> Result<Tables, BuildError> {
    Config::new().build(grammar)
}

// === ParseTableBuilder ===

struct ParseTableBuilder<'c, 'g> {
    closure: &'c ClosureComputer<'g>,
    limit: usize,
    // 登録順が状態IDになる
    item_sets: Set<ParseItemSet>,
    edges: Vec<Map<Symbol, ParseStateId>>,
    pending: VecDeque<ParseStateId>,
}

impl<'c, 'g> ParseTableBuilder<'c, 'g> {
    fn new(closure: &'c ClosureComputer<'g>, limit: usize) -> Self {
        Self {
            closure,
            limit,
            item_sets: Set::default(),
            edges: vec![],
            pending: VecDeque::new(),
        }
    }

    /// Register an item set, returning the id of the equal item set if one
    /// was registered before.
    fn enqueue(&mut self, item_set: ParseItemSet) -> Result<ParseStateId, BuildError> {
        if let Some(index) = self.item_sets.get_index_of(&item_set) {
            return Ok(ParseStateId::new(index as u32));
        }
        if self.item_sets.len() >= self.limit {
            return Err(BuildError::StateLimitExceeded {
                kind: TableKind::Parse,
                limit: self.limit,
            });
        }
        let (index, _) = self.item_sets.insert_full(item_set);
        let id = ParseStateId::new(index as u32);
        self.pending.push_back(id);
        Ok(id)
    }

    fn populate_states(&mut self) -> Result<(), BuildError> {
        let _span = tracing::trace_span!("populate_parse_states").entered();

        let start = self.closure.start_items();
        self.enqueue(start)?;

        while let Some(id) = self.pending.pop_front() {
            let item_set = &self.item_sets[id.index()];
            let transitions = parse_item_set_transitions(self.closure, item_set);

            let mut edges = Map::default();
            for (symbol, next_item_set) in transitions {
                let next = self.enqueue(next_item_set)?;
                edges.insert(symbol, next);
            }
            tracing::trace!(state = %id, edges = edges.len(), "parse state populated");

            debug_assert_eq!(self.edges.len(), id.index());
            self.edges.push(edges);
        }

        tracing::debug!(states = self.item_sets.len(), "parse states populated");
        Ok(())
    }

    fn finalize(self) -> Result<(ParseTable, Vec<Conflict>), BuildError> {
        let grammar = self.closure.grammar();
        let mut states = Vec::with_capacity(self.item_sets.len());
        let mut conflicts = vec![];

        for (index, (item_set, edges)) in self.item_sets.into_iter().zip(self.edges).enumerate() {
            let id = ParseStateId::new(index as u32);

            #[derive(Default)]
            struct PendingAction {
                shift: Option<ParseStateId>,
                shift_prec: Option<i32>,
                shift_symbols: Vec<Symbol>,
                reduces: Vec<ReduceAction>,
            }
            let mut pending_actions: Map<Symbol, PendingAction> = Map::default();
            let mut gotos = Map::default();

            for (symbol, target) in edges {
                // shift, goto
                if symbol.is_non_terminal() {
                    gotos.insert(symbol, target);
                } else {
                    pending_actions.entry(symbol).or_default().shift = Some(target);
                }
            }

            for item in &item_set {
                // shift precedence and the productions in progress
                for symbol in sym_transitions(item.rule()).into_keys() {
                    if symbol.is_non_terminal() {
                        continue;
                    }
                    if let Some(action) = pending_actions.get_mut(&symbol) {
                        if let Some(prec) = item.precedence().precedence {
                            action.shift_prec = Some(action.shift_prec.map_or(prec, |p| p.max(prec)));
                        }
                        if !action.shift_symbols.contains(&item.lhs()) {
                            action.shift_symbols.push(item.lhs());
                        }
                    }
                }

                // reduce, accept
                if !item.is_done() {
                    continue;
                }
                let precedence = item.completion_precedence();
                let reduce = ReduceAction {
                    symbol: item.lhs(),
                    consumed_symbol_count: item.consumed_symbol_count(),
                    precedence: precedence.precedence,
                    associativity: precedence.associativity,
                    dynamic_precedence: precedence.dynamic_precedence,
                };
                let action = pending_actions.entry(item.lookahead()).or_default();
                let existing = action.reduces.iter_mut().find(|r| {
                    r.symbol == reduce.symbol
                        && r.consumed_symbol_count == reduce.consumed_symbol_count
                });
                match existing {
                    Some(r) if r.precedence < reduce.precedence => *r = reduce,
                    Some(..) => (),
                    None => action.reduces.push(reduce),
                }
            }

            let mut actions: Map<Symbol, Action> = Map::default();
            for (symbol, action) in pending_actions {
                let shift_prec = action.shift_prec.or_else(|| {
                    grammar
                        .token_precedence(symbol)
                        .map(|prec| prec.priority)
                });
                let resolved = resolve_conflict(action.shift, shift_prec, &action.reduces)?;

                if let Action::Inconsistent {
                    shift,
                    reduces,
                    reason,
                } = &resolved
                {
                    let mut symbols: Vec<Symbol> = vec![];
                    let reduce_symbols = reduces.iter().map(|r| r.symbol);
                    let shift_symbols = shift.iter().flat_map(|_| action.shift_symbols.iter().copied());
                    for involved in reduce_symbols.chain(shift_symbols) {
                        if !symbols.contains(&involved) {
                            symbols.push(involved);
                        }
                    }
                    let conflict = Conflict {
                        state: id,
                        lookahead: symbol,
                        kind: if shift.is_some() {
                            ConflictKind::ShiftReduce
                        } else {
                            ConflictKind::ReduceReduce
                        },
                        reason: *reason,
                        expected: grammar.is_expected_conflict(&symbols),
                        symbols,
                    };
                    if !conflict.expected && conflict.reason != ConflictReason::DynamicPrecedence {
                        tracing::warn!("{}", conflict.display(&grammar.symbols));
                    }
                    conflicts.push(conflict);
                }

                actions.insert(symbol, resolved);
            }

            for &extra in &grammar.extra_symbols {
                actions.entry(extra).or_insert(Action::ShiftExtra);
            }
            actions.sort_keys();

            states.push(ParseState {
                item_set,
                actions,
                gotos,
                lex_state: LexStateId::new(0),
            });
        }

        Ok((ParseTable { states }, conflicts))
    }
}

// === lex table ===

/// Build the lex table from the tokens valid in each parse state, and record
/// the lex state of every parse state.
fn build_lex_table(
    closure: &ClosureComputer<'_>,
    parse_table: &mut ParseTable,
    limit: usize,
) -> Result<LexTable, BuildError> {
    let _span = tracing::trace_span!("build_lex_table").entered();
    let grammar = closure.grammar();

    let mut lex_states = PendingLexStates {
        item_sets: Set::default(),
        pending: VecDeque::new(),
        limit,
    };

    for state in &mut parse_table.states {
        let tokens = state
            .actions
            .keys()
            .copied()
            .chain(grammar.extra_symbols.iter().copied())
            .filter(Symbol::is_token);
        let seed = closure.lex_items_for(tokens);
        state.lex_state = lex_states.enqueue(seed)?;
    }

    let mut advances = vec![];
    while let Some(index) = lex_states.pending.pop_front() {
        let transitions = lex_item_set_transitions(closure, &lex_states.item_sets[index]);
        let mut state_advances = Vec::with_capacity(transitions.len());
        for (chars, next_item_set) in transitions {
            state_advances.push((chars, lex_states.enqueue(next_item_set)?));
        }
        debug_assert_eq!(advances.len(), index);
        advances.push(state_advances);
    }
    tracing::debug!(states = lex_states.item_sets.len(), "lex states populated");

    let states = lex_states
        .item_sets
        .iter()
        .zip(advances)
        .map(|(item_set, advances)| LexState {
            advances,
            accept: accepted_token(grammar, item_set),
        })
        .collect();

    Ok(LexTable { states })
}

struct PendingLexStates {
    // 登録順が状態IDになる
    item_sets: Set<LexItemSet>,
    pending: VecDeque<usize>,
    limit: usize,
}

impl PendingLexStates {
    fn enqueue(&mut self, item_set: LexItemSet) -> Result<LexStateId, BuildError> {
        if let Some(index) = self.item_sets.get_index_of(&item_set) {
            return Ok(LexStateId::new(index as u32));
        }
        if self.item_sets.len() >= self.limit {
            return Err(BuildError::StateLimitExceeded {
                kind: TableKind::Lex,
                limit: self.limit,
            });
        }
        let (index, _) = self.item_sets.insert_full(item_set);
        self.pending.push_back(index);
        Ok(LexStateId::new(index as u32))
    }
}

/// The token accepted when the lexer stops in a state: the highest token
/// precedence wins, then literal tokens over named ones, then the token
/// declared first.
fn accepted_token(grammar: &PreparedGrammar, item_set: &LexItemSet) -> Option<Symbol> {
    item_set
        .iter()
        .filter(|item| item.is_done())
        .map(|item| {
            let token = item.lhs();
            let precedence = item
                .completion_precedence()
                .precedence
                .or_else(|| grammar.token_precedence(token).map(|prec| prec.priority))
                .unwrap_or(0);
            let is_literal = token.kind() == SymbolKind::Anonymous;
            let order = grammar
                .lexical_rules
                .get_index_of(&token)
                .unwrap_or(usize::MAX);
            (precedence, is_literal, std::cmp::Reverse(order), token)
        })
        .max()
        .map(|(.., token)| token)
}
