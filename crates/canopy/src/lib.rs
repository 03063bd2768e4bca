//! Compiles grammars into parse and lex tables.

pub mod build_tables;
pub mod char_set;
pub mod closure;
pub mod conflict;
pub mod first_sets;
pub mod grammar;
pub mod item;
pub mod rule;
pub mod rule_transitions;
pub mod symbol;
pub mod tables;
pub mod transitions;
pub mod types;

pub use crate::{
    build_tables::{build_tables, BuildError, Config},
    grammar::{GrammarDef, GrammarError, PreparedGrammar},
    tables::Tables,
};
