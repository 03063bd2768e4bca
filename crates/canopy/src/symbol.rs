//! Symbol handles and the interning table.

use crate::types::Map;
use std::fmt;

/// The category of a grammar symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    /// A named token defined by a lexical rule.
    Terminal,
    /// A symbol defined by a syntactic rule.
    NonTerminal,
    /// A token produced by an external scanner.
    External,
    /// An unnamed literal token, such as `"+"`.
    Anonymous,
    /// The reserved terminal that marks the end of input.
    EndOfInput,
}

/// A small, comparable handle for an interned grammar symbol.
///
/// Terminal-like symbols share one dense index space, with the end of input
/// at index `0`. Non-terminals have their own index space, where index `0` is
/// the augmented start symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    kind: SymbolKind,
    index: u16,
}

impl Symbol {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const END: Self = Self::new(SymbolKind::EndOfInput, 0);

    /// Reserved non-terminal on the left-hand side of the augmented start rule.
    pub const START: Self = Self::new(SymbolKind::NonTerminal, 0);

    #[inline]
    pub(crate) const fn new(kind: SymbolKind, index: u16) -> Self {
        Self { kind, index }
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn is_non_terminal(&self) -> bool {
        self.kind == SymbolKind::NonTerminal
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_non_terminal()
    }

    /// Whether this symbol is recognized by the generated lexer, i.e. it owns
    /// a lexical rule.
    pub fn is_token(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal | SymbolKind::Anonymous)
    }

    pub fn is_external(&self) -> bool {
        self.kind == SymbolKind::External
    }
}

/// Interns symbol names into [`Symbol`] handles.
///
/// Named symbols (terminals, non-terminals and externals) share one namespace.
/// Anonymous literal tokens live in a namespace of their own.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: Map<Symbol, String>,
    named: Map<String, Symbol>,
    anonymous: Map<String, Symbol>,
    next_terminal: u16,
    next_nonterminal: u16,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    const TERMINAL_OFFSET: u16 = 1;
    const NONTERMINAL_OFFSET: u16 = 1;

    pub fn new() -> Self {
        let mut names = Map::default();
        names.insert(Symbol::END, "$end".to_owned());
        names.insert(Symbol::START, "$start".to_owned());
        Self {
            names,
            named: Map::default(),
            anonymous: Map::default(),
            next_terminal: Self::TERMINAL_OFFSET,
            next_nonterminal: Self::NONTERMINAL_OFFSET,
        }
    }

    /// Intern `name` as a symbol of the given kind.
    ///
    /// Returns the existing handle if the name was interned before with the
    /// same kind, and `None` if it is taken by a symbol of another kind or the
    /// index space is exhausted.
    pub fn intern(&mut self, name: &str, kind: SymbolKind) -> Option<Symbol> {
        if kind == SymbolKind::EndOfInput {
            return None;
        }

        let namespace = match kind {
            SymbolKind::Anonymous => &self.anonymous,
            _ => &self.named,
        };
        if let Some(&symbol) = namespace.get(name) {
            return (symbol.kind() == kind).then_some(symbol);
        }

        let symbol = match kind {
            SymbolKind::NonTerminal => {
                let index = self.next_nonterminal;
                self.next_nonterminal = index.checked_add(1)?;
                Symbol::new(kind, index)
            }
            _ => {
                let index = self.next_terminal;
                self.next_terminal = index.checked_add(1)?;
                Symbol::new(kind, index)
            }
        };

        match kind {
            SymbolKind::Anonymous => self.anonymous.insert(name.to_owned(), symbol),
            _ => self.named.insert(name.to_owned(), symbol),
        };
        self.names.insert(symbol, name.to_owned());

        Some(symbol)
    }

    /// Look up a named (non-anonymous) symbol.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.named.get(name).copied()
    }

    /// Look up an anonymous literal token.
    pub fn get_anonymous(&self, text: &str) -> Option<Symbol> {
        self.anonymous.get(text).copied()
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.names.contains_key(&symbol)
    }

    pub fn name(&self, symbol: Symbol) -> &str {
        self.names
            .get(&symbol)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    /// Iterate over all interned symbols, reserved ones included, in the
    /// order of interning.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.names.keys().copied()
    }

    /// The size of the dense terminal index space.
    pub fn terminal_count(&self) -> usize {
        self.next_terminal.into()
    }

    pub fn display(&self, symbol: Symbol) -> impl fmt::Display + '_ {
        crate::types::display_fn(move |f| match symbol.kind() {
            SymbolKind::Anonymous => write!(f, "'{}'", self.name(symbol)),
            _ => f.write_str(self.name(symbol)),
        })
    }
}
