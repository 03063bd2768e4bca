//! Grammar types.

use crate::{
    rule::{Assoc, IntoRule, Rule},
    symbol::{Symbol, SymbolKind, SymbolTable},
    types::{display_fn, Map, Set},
};
use std::{fmt, marker::PhantomData};

/// A yacc-style precedence declared for a terminal symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct Precedence {
    pub priority: i32,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: i32, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

/// The normalized grammar consumed by the table builder.
///
/// Every symbol referenced from a rule is guaranteed to resolve: non-terminals
/// have an entry in `syntax_rules`, tokens in `lexical_rules`, and the rest are
/// external tokens.
#[derive(Debug)]
#[non_exhaustive]
pub struct PreparedGrammar {
    pub symbols: SymbolTable,
    /// Syntactic rules, starting with the augmented rule `$start -> <start>`.
    pub syntax_rules: Map<Symbol, Rule>,
    /// Lexical rules, in declaration order.
    pub lexical_rules: Map<Symbol, Rule>,
    pub start_symbol: Symbol,
    /// Non-terminals generated for repetitions, defined as `aux -> aux x | x`.
    pub auxiliary_symbols: Set<Symbol>,
    pub extra_symbols: Set<Symbol>,
    pub external_tokens: Set<Symbol>,
    pub precedences: Map<Symbol, Precedence>,
    pub expected_conflicts: Vec<Set<Symbol>>,
}

impl PreparedGrammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let _span = tracing::debug_span!("define_grammar").entered();

        let mut def = GrammarDef {
            symbols: SymbolTable::new(),
            syntax_rules: Map::default(),
            lexical_rules: Map::default(),
            nonterminals: vec![],
            start: None,
            extras: Set::default(),
            external_tokens: Set::default(),
            precedences: Map::default(),
            expected_conflicts: vec![],
            _marker: PhantomData,
        };

        f(&mut def)?;

        def.end()
    }

    pub fn syntax_rule(&self, symbol: Symbol) -> Option<&Rule> {
        self.syntax_rules.get(&symbol)
    }

    pub fn lexical_rule(&self, symbol: Symbol) -> Option<&Rule> {
        self.lexical_rules.get(&symbol)
    }

    pub fn is_auxiliary(&self, symbol: Symbol) -> bool {
        self.auxiliary_symbols.contains(&symbol)
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.extra_symbols.contains(&symbol)
    }

    pub fn token_precedence(&self, symbol: Symbol) -> Option<Precedence> {
        self.precedences.get(&symbol).copied()
    }

    /// Whether a declared conflict group contains all of `symbols`.
    pub fn is_expected_conflict<'a, I>(&self, symbols: I) -> bool
    where
        I: IntoIterator<Item = &'a Symbol> + Clone,
    {
        self.expected_conflicts.iter().any(|group| {
            let mut symbols = symbols.clone().into_iter().peekable();
            symbols.peek().is_some() && symbols.all(|symbol| group.contains(symbol))
        })
    }
}

impl fmt::Display for PreparedGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols = &self.symbols;

        writeln!(f, "## tokens:")?;
        for (token, rule) in &self.lexical_rules {
            write!(f, "{} := {}", symbols.display(*token), rule.display(symbols))?;
            if let Some(prec) = self.precedences.get(token) {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            if self.extra_symbols.contains(token) {
                f.write_str(" (extra)")?;
            }
            writeln!(f)?;
        }

        if !self.external_tokens.is_empty() {
            writeln!(f, "\n## externals:")?;
            for external in &self.external_tokens {
                writeln!(f, "{}", symbols.display(*external))?;
            }
        }

        writeln!(f, "\n## rules:")?;
        for (symbol, rule) in &self.syntax_rules {
            write!(f, "{} := {}", symbols.display(*symbol), rule.display(symbols))?;
            if *symbol == self.start_symbol {
                f.write_str(" (start)")?;
            }
            if self.auxiliary_symbols.contains(symbol) {
                f.write_str(" (auxiliary)")?;
            }
            writeln!(f)?;
        }

        if !self.expected_conflicts.is_empty() {
            writeln!(f, "\n## expected conflicts:")?;
            for group in &self.expected_conflicts {
                let group = display_fn(|f| {
                    for (i, symbol) in group.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", symbols.display(*symbol))?;
                    }
                    Ok(())
                });
                writeln!(f, "[{}]", group)?;
            }
        }

        Ok(())
    }
}

/// The contextural values for building a `PreparedGrammar`.
#[derive(Debug)]
pub struct GrammarDef<'def> {
    symbols: SymbolTable,
    syntax_rules: Map<Symbol, Vec<Rule>>,
    lexical_rules: Map<Symbol, Rule>,
    nonterminals: Vec<Symbol>,
    start: Option<Symbol>,
    extras: Set<Symbol>,
    external_tokens: Set<Symbol>,
    precedences: Map<Symbol, Precedence>,
    expected_conflicts: Vec<Set<Symbol>>,
    _marker: PhantomData<&'def mut ()>,
}

impl<'def> GrammarDef<'def> {
    /// Declare a named token recognized by the given lexical rule.
    pub fn token(&mut self, name: &str, rule: impl IntoRule) -> Result<Symbol, GrammarError> {
        let symbol = self.declare(name, SymbolKind::Terminal)?;
        self.lexical_rules.insert(symbol, rule.into_rule());
        Ok(symbol)
    }

    /// Replace the lexical rule of a named token, which allows tokens to refer
    /// to tokens declared after them.
    pub fn token_rule(&mut self, token: Symbol, rule: impl IntoRule) -> Result<(), GrammarError> {
        if token.kind() != SymbolKind::Terminal || !self.lexical_rules.contains_key(&token) {
            return Err(GrammarError::Other {
                msg: format!("`{}' is not a declared token", self.symbols.display(token)),
            });
        }
        self.lexical_rules.insert(token, rule.into_rule());
        Ok(())
    }

    /// Declare (or look up) the anonymous token matching `text` literally.
    pub fn literal(&mut self, text: &str) -> Result<Symbol, GrammarError> {
        if text.is_empty() {
            return Err(GrammarError::EmptyToken {
                name: "''".to_owned(),
            });
        }
        let symbol = self
            .symbols
            .intern(text, SymbolKind::Anonymous)
            .ok_or_else(|| GrammarError::from("too many symbols"))?;
        self.lexical_rules
            .entry(symbol)
            .or_insert_with(|| Rule::string(text));
        Ok(symbol)
    }

    /// Declare a token produced by an external scanner.
    pub fn external(&mut self, name: &str) -> Result<Symbol, GrammarError> {
        let symbol = self.declare(name, SymbolKind::External)?;
        self.external_tokens.insert(symbol);
        Ok(symbol)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<Symbol, GrammarError> {
        let symbol = self.declare(name, SymbolKind::NonTerminal)?;
        self.nonterminals.push(symbol);
        Ok(symbol)
    }

    fn declare(&mut self, name: &str, kind: SymbolKind) -> Result<Symbol, GrammarError> {
        if !verify_ident(name) {
            return Err(GrammarError::InvalidName {
                name: name.to_owned(),
            });
        }
        if self.symbols.get(name).is_some() {
            return Err(GrammarError::DuplicateSymbol {
                name: name.to_owned(),
            });
        }
        self.symbols
            .intern(name, kind)
            .ok_or_else(|| GrammarError::from("too many symbols"))
    }

    /// Add alternatives to the production of `left`.
    ///
    /// Each call contributes the top-level alternatives of `right`, so a
    /// nonterminal may be defined by several calls.
    pub fn rule(&mut self, left: Symbol, right: impl IntoRule) -> Result<(), GrammarError> {
        if !left.is_non_terminal() || left == Symbol::START || !self.symbols.contains(left) {
            return Err(GrammarError::Other {
                msg: format!(
                    "`{}' is not a declared nonterminal",
                    self.symbols.display(left)
                ),
            });
        }

        let alternatives = self.syntax_rules.entry(left).or_default();
        for alternative in right.into_rule().alternatives() {
            if alternatives.contains(&alternative) {
                return Err(GrammarError::DuplicateAlternative {
                    name: self.symbols.name(left).to_owned(),
                });
            }
            alternatives.push(alternative);
        }

        Ok(())
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: Symbol) -> Result<(), GrammarError> {
        if !symbol.is_non_terminal() || symbol == Symbol::START {
            return Err("the start symbol must be a nonterminal".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    /// Mark a token as allowed anywhere between other tokens.
    pub fn extra(&mut self, symbol: Symbol) -> Result<(), GrammarError> {
        self.extras.insert(symbol);
        Ok(())
    }

    /// Assign a precedence to a terminal symbol.
    pub fn precedence(&mut self, symbol: Symbol, prec: Precedence) -> Result<(), GrammarError> {
        if symbol.is_non_terminal() {
            return Err(GrammarError::Other {
                msg: format!(
                    "precedence of `{}' must be declared on its rules",
                    self.symbols.display(symbol)
                ),
            });
        }
        self.precedences.insert(symbol, prec);
        Ok(())
    }

    /// Declare that the given symbols are expected to conflict with each other.
    pub fn expected_conflict<I>(&mut self, symbols: I) -> Result<(), GrammarError>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let group: Set<Symbol> = symbols.into_iter().collect();
        if group.is_empty() {
            return Err("empty conflict group".into());
        }
        self.expected_conflicts.push(group);
        Ok(())
    }

    fn end(self) -> Result<PreparedGrammar, GrammarError> {
        // 指定されていない場合は最初に登録されたnonterminal symbolを用いる
        let start = match self.start {
            Some(start) => start,
            None => *self
                .nonterminals
                .first()
                .ok_or(GrammarError::EmptyGrammar)?,
        };

        let mut symbols = self.symbols;
        let name = |symbol: Symbol| symbols.name(symbol).to_owned();

        let mut syntax_rules: Map<Symbol, Rule> = Map::default();
        for &symbol in &self.nonterminals {
            let alternatives = match self.syntax_rules.get(&symbol) {
                Some(alternatives) => alternatives,
                None if symbol == start => {
                    return Err(GrammarError::MissingRule { name: name(symbol) })
                }
                None => continue,
            };
            let alternatives = alternatives
                .iter()
                .map(|alternative| apply_token_precedence(alternative.clone(), &self.precedences));
            syntax_rules.insert(symbol, Rule::choice(alternatives));
        }

        // references from syntactic rules
        for (&symbol, rule) in &syntax_rules {
            if rule.contains_character_set() {
                return Err(GrammarError::CharacterSetInSyntax { name: name(symbol) });
            }
            let mut error = None;
            rule.for_each_symbol(&mut |referenced| {
                if error.is_some() {
                    return;
                }
                if !symbols.contains(referenced) || referenced.kind() == SymbolKind::EndOfInput {
                    error = Some(GrammarError::UndefinedSymbol {
                        name: name(referenced),
                    });
                } else if referenced == Symbol::START {
                    error = Some(GrammarError::UndefinedSymbol {
                        name: name(referenced),
                    });
                } else if referenced.is_non_terminal() && !syntax_rules.contains_key(&referenced) {
                    error = Some(GrammarError::MissingRule {
                        name: name(referenced),
                    });
                }
            });
            if let Some(error) = error {
                return Err(error);
            }
        }

        // references from lexical rules
        for (&token, rule) in &self.lexical_rules {
            let mut error = None;
            rule.for_each_symbol(&mut |referenced| {
                if error.is_none() && !self.lexical_rules.contains_key(&referenced) {
                    error = Some(GrammarError::NonTokenInLexicalRule {
                        name: name(token),
                        referenced: name(referenced),
                    });
                }
            });
            if let Some(error) = error {
                return Err(error);
            }
        }
        check_token_recursion(&self.lexical_rules, &symbols)?;
        for (&token, rule) in &self.lexical_rules {
            if token_can_be_blank(rule, &self.lexical_rules) {
                return Err(GrammarError::EmptyToken { name: name(token) });
            }
        }

        for &extra in &self.extras {
            if !(extra.is_token() || extra.is_external()) || !symbols.contains(extra) {
                return Err(GrammarError::InvalidExtra { name: name(extra) });
            }
        }
        for group in &self.expected_conflicts {
            if let Some(&symbol) = group.iter().find(|s| !symbols.contains(**s)) {
                return Err(GrammarError::UndefinedSymbol { name: name(symbol) });
            }
        }

        // reachability
        let mut reachable: Set<Symbol> = Set::default();
        let mut stack: Vec<Symbol> = Some(start)
            .into_iter()
            .chain(self.extras.iter().copied())
            .collect();
        while let Some(symbol) = stack.pop() {
            if !reachable.insert(symbol) {
                continue;
            }
            let rule = match symbol.kind() {
                SymbolKind::NonTerminal => syntax_rules.get(&symbol),
                SymbolKind::Terminal | SymbolKind::Anonymous => self.lexical_rules.get(&symbol),
                _ => None,
            };
            if let Some(rule) = rule {
                rule.for_each_symbol(&mut |referenced| {
                    if !reachable.contains(&referenced) {
                        stack.push(referenced);
                    }
                });
            }
        }
        let unreachable = self
            .nonterminals
            .iter()
            .chain(self.lexical_rules.keys())
            .find(|symbol| !reachable.contains(*symbol));
        if let Some(&symbol) = unreachable {
            return Err(GrammarError::UnreachableRule { name: name(symbol) });
        }

        let mut expander = RepeatExpander {
            symbols: &mut symbols,
            rule_name: String::new(),
            repeat_count: 0,
            existing: Map::default(),
            auxiliary_rules: Map::default(),
        };
        for (&symbol, rule) in &mut syntax_rules {
            *rule = expander.expand_rule(symbol, rule)?;
        }
        let auxiliary_rules = expander.auxiliary_rules;
        let auxiliary_symbols: Set<Symbol> = auxiliary_rules.keys().copied().collect();

        let mut rules = Map::default();
        rules.insert(Symbol::START, Rule::Symbol(start));
        rules.extend(syntax_rules);
        rules.extend(auxiliary_rules);

        tracing::debug!(
            nonterminals = rules.len(),
            auxiliaries = auxiliary_symbols.len(),
            tokens = self.lexical_rules.len(),
            externals = self.external_tokens.len(),
            "grammar prepared"
        );

        Ok(PreparedGrammar {
            symbols,
            syntax_rules: rules,
            lexical_rules: self.lexical_rules,
            start_symbol: start,
            auxiliary_symbols,
            extra_symbols: self.extras,
            external_tokens: self.external_tokens,
            precedences: self.precedences,
            expected_conflicts: self.expected_conflicts,
        })
    }
}

/// Rewrites the repetitions of syntactic rules into auxiliary left-recursive
/// non-terminals.
///
/// A cursor looping inside a repetition would revisit the same residual with
/// an ever growing count of consumed symbols, so the table would never close.
/// `x*` becomes `(aux | ε)` and `x x*` becomes `aux`, where `aux -> aux x | x`.
/// Identical repetitions share one auxiliary rule.
struct RepeatExpander<'s> {
    symbols: &'s mut SymbolTable,
    rule_name: String,
    repeat_count: usize,
    existing: Map<Rule, Symbol>,
    auxiliary_rules: Map<Symbol, Rule>,
}

impl RepeatExpander<'_> {
    fn expand_rule(&mut self, lhs: Symbol, rule: &Rule) -> Result<Rule, GrammarError> {
        self.rule_name = self.symbols.name(lhs).to_owned();
        self.repeat_count = 0;
        self.expand(rule)
    }

    fn expand(&mut self, rule: &Rule) -> Result<Rule, GrammarError> {
        match rule {
            Rule::Repeat(inner) => {
                let inner = self.expand(inner)?;
                let auxiliary = self.auxiliary(inner)?;
                Ok(Rule::optional(Rule::Symbol(auxiliary)))
            }
            Rule::Seq(elements) => {
                let mut expanded = Vec::with_capacity(elements.len());
                let mut i = 0;
                while i < elements.len() {
                    let element = &elements[i];
                    match elements.get(i + 1) {
                        Some(Rule::Repeat(inner)) if **inner == *element => {
                            let inner = self.expand(element)?;
                            expanded.push(Rule::Symbol(self.auxiliary(inner)?));
                            i += 2;
                        }
                        _ => {
                            expanded.push(self.expand(element)?);
                            i += 1;
                        }
                    }
                }
                Ok(Rule::seq(expanded))
            }
            Rule::Choice(alternatives) => {
                let alternatives = alternatives
                    .iter()
                    .map(|alternative| self.expand(alternative))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rule::choice(alternatives))
            }
            Rule::Metadata { rule, params } => Ok(Rule::Metadata {
                rule: Box::new(self.expand(rule)?),
                params: params.clone(),
            }),
            Rule::Blank | Rule::Symbol(..) | Rule::CharacterSet(..) => Ok(rule.clone()),
        }
    }

    /// The auxiliary non-terminal matching one or more `inner`.
    fn auxiliary(&mut self, inner: Rule) -> Result<Symbol, GrammarError> {
        if let Some(&auxiliary) = self.existing.get(&inner) {
            return Ok(auxiliary);
        }
        let name = loop {
            self.repeat_count += 1;
            let name = format!("{}_repeat{}", self.rule_name, self.repeat_count);
            if self.symbols.get(&name).is_none() {
                break name;
            }
        };
        let auxiliary = self
            .symbols
            .intern(&name, SymbolKind::NonTerminal)
            .ok_or_else(|| GrammarError::from("too many symbols"))?;
        let rule = Rule::choice([
            Rule::seq([Rule::Symbol(auxiliary), inner.clone()]),
            inner.clone(),
        ]);
        self.existing.insert(inner, auxiliary);
        self.auxiliary_rules.insert(auxiliary, rule);
        Ok(auxiliary)
    }
}

/// Wrap an alternative without explicit precedence in the precedence of the
/// last terminal it mentions that has one declared.
fn apply_token_precedence(rule: Rule, precedences: &Map<Symbol, Precedence>) -> Rule {
    if rule.cursor_precedence().precedence.is_some() {
        return rule;
    }
    let mut last = None;
    rule.for_each_symbol(&mut |symbol| {
        if let Some(prec) = precedences.get(&symbol) {
            last = Some(*prec);
        }
    });
    match last {
        Some(prec) => match prec.assoc {
            Assoc::Left => Rule::prec_left(prec.priority, rule),
            Assoc::Right => Rule::prec_right(prec.priority, rule),
            Assoc::Nonassoc => Rule::prec_nonassoc(prec.priority, rule),
        },
        None => rule,
    }
}

fn check_token_recursion(
    lexical_rules: &Map<Symbol, Rule>,
    symbols: &SymbolTable,
) -> Result<(), GrammarError> {
    #[derive(Copy, Clone, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        token: Symbol,
        lexical_rules: &Map<Symbol, Rule>,
        marks: &mut Map<Symbol, Mark>,
    ) -> Result<(), Symbol> {
        match marks.get(&token) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(token),
            None => (),
        }
        marks.insert(token, Mark::Visiting);
        let mut referenced = vec![];
        if let Some(rule) = lexical_rules.get(&token) {
            rule.for_each_symbol(&mut |symbol| referenced.push(symbol));
        }
        for symbol in referenced {
            visit(symbol, lexical_rules, marks)?;
        }
        marks.insert(token, Mark::Done);
        Ok(())
    }

    let mut marks = Map::default();
    for &token in lexical_rules.keys() {
        visit(token, lexical_rules, &mut marks).map_err(|token| GrammarError::RecursiveToken {
            name: symbols.name(token).to_owned(),
        })?;
    }
    Ok(())
}

/// Nullability of a lexical rule with token references substituted.
/// Token references must be acyclic.
fn token_can_be_blank(rule: &Rule, lexical_rules: &Map<Symbol, Rule>) -> bool {
    match rule {
        Rule::Blank | Rule::Repeat(..) => true,
        Rule::CharacterSet(..) => false,
        Rule::Symbol(symbol) => lexical_rules
            .get(symbol)
            .map_or(false, |rule| token_can_be_blank(rule, lexical_rules)),
        Rule::Choice(rules) => rules.iter().any(|r| token_can_be_blank(r, lexical_rules)),
        Rule::Seq(rules) => rules.iter().all(|r| token_can_be_blank(r, lexical_rules)),
        Rule::Metadata { rule, .. } => token_can_be_blank(rule, lexical_rules),
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GrammarError {
    #[error("invalid symbol name: `{}'", name)]
    InvalidName { name: String },

    #[error("the symbol `{}' has already been declared", name)]
    DuplicateSymbol { name: String },

    #[error("duplicate alternative in the production of `{}'", name)]
    DuplicateAlternative { name: String },

    #[error("reference to an undefined symbol `{}'", name)]
    UndefinedSymbol { name: String },

    #[error("the nonterminal `{}' has no production rule", name)]
    MissingRule { name: String },

    #[error("the rule `{}' is unreachable from the start symbol", name)]
    UnreachableRule { name: String },

    #[error("the syntactic rule `{}' contains a character set", name)]
    CharacterSetInSyntax { name: String },

    #[error("the token `{}' refers to `{}', which is not a token", name, referenced)]
    NonTokenInLexicalRule { name: String, referenced: String },

    #[error("the token `{}' refers to itself", name)]
    RecursiveToken { name: String },

    #[error("the token `{}' matches the empty string", name)]
    EmptyToken { name: String },

    #[error("the extra `{}' is neither a token nor an external token", name)]
    InvalidExtra { name: String },

    #[error("the grammar has no nonterminal symbols")]
    EmptyGrammar,

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        // The identifier must not be empty.
        None => return false,
    };

    if s.bytes().all(|b| b.is_ascii_digit()) {
        // The number must not be identifer.
        return false;
    }

    // The identifier must be started with XID-Start and continued with XID-Continue.
    is_ident_start(first) && chars.all(unicode_ident::is_xid_continue)
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || unicode_ident::is_xid_start(ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        char_set::CharacterSet,
        rule::{Choice, Rule},
    };

    fn digits() -> Rule {
        Rule::repeat1(Rule::CharacterSet(CharacterSet::from_range('0'..='9')))
    }

    #[test]
    fn define_simple_grammar() {
        let grammar = PreparedGrammar::define(|g| {
            let num = g.token("NUM", digits())?;
            let plus = g.literal("+")?;
            let expr = g.nonterminal("expr")?;
            g.rule(expr, (expr, plus, num))?;
            g.rule(expr, num)?;
            Ok(())
        })
        .unwrap();
        eprintln!("{}", grammar);

        let expr = grammar.symbols.get("expr").unwrap();
        assert_eq!(grammar.start_symbol, expr);
        assert_eq!(
            grammar.syntax_rules.get_index(0),
            Some((&Symbol::START, &Rule::Symbol(expr)))
        );
        assert_eq!(grammar.syntax_rules[&expr].alternatives().len(), 2);
        assert_eq!(grammar.lexical_rules.len(), 2);
        assert_eq!(grammar.lexical_rules[&grammar.symbols.get_anonymous("+").unwrap()], Rule::string("+"));
    }

    #[test]
    fn token_precedence_wraps_alternatives() {
        let grammar = PreparedGrammar::define(|g| {
            let num = g.token("NUM", digits())?;
            let star = g.literal("*")?;
            let expr = g.nonterminal("expr")?;
            g.precedence(star, Precedence::new(2, Assoc::Left))?;
            g.rule(expr, Choice(((expr, star, expr), num)))?;
            Ok(())
        })
        .unwrap();

        let expr = grammar.symbols.get("expr").unwrap();
        let alternatives = grammar.syntax_rules[&expr].alternatives();
        let prec = alternatives[0].cursor_precedence();
        assert_eq!(prec.precedence, Some(2));
        assert_eq!(prec.associativity, Some(Assoc::Left));
        assert_eq!(alternatives[1].cursor_precedence().precedence, None);
    }

    #[test]
    fn structural_errors() {
        let err = PreparedGrammar::define(|g| {
            let a = g.nonterminal("a")?;
            let b = g.nonterminal("b")?;
            g.rule(a, b)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::MissingRule { name } if name == "b"));

        let err = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let a = g.nonterminal("a")?;
            let b = g.nonterminal("b")?;
            g.rule(a, x)?;
            g.rule(b, x)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::UnreachableRule { name } if name == "b"));

        let err = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let _unused = g.literal("y")?;
            let a = g.nonterminal("a")?;
            g.rule(a, x)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::UnreachableRule { name } if name == "y"));

        let err = PreparedGrammar::define(|g| {
            let a = g.nonterminal("a")?;
            g.rule(a, 'x')?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::CharacterSetInSyntax { .. }));

        let err = PreparedGrammar::define(|g| {
            let ws = g.token("WS", Rule::repeat(' '.into_rule()))?;
            let a = g.nonterminal("a")?;
            g.rule(a, ws)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::EmptyToken { name } if name == "WS"));

        let err = PreparedGrammar::define(|_| Ok(())).unwrap_err();
        assert!(matches!(err, GrammarError::EmptyGrammar));
    }

    #[test]
    fn declaration_errors() {
        let err = PreparedGrammar::define(|g| {
            g.nonterminal("a")?;
            g.token("a", 'a')?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateSymbol { .. }));

        let err = PreparedGrammar::define(|g| {
            g.nonterminal("1234")?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::InvalidName { .. }));

        let err = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let a = g.nonterminal("a")?;
            g.rule(a, x)?;
            g.rule(a, Choice((x, (x, x))))?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateAlternative { .. }));
    }

    #[test]
    fn lexical_reference_errors() {
        let err = PreparedGrammar::define(|g| {
            let a = g.nonterminal("a")?;
            let t = g.token("T", a)?;
            g.rule(a, t)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::NonTokenInLexicalRule { .. }));

        let err = PreparedGrammar::define(|g| {
            let a = g.token("A", 'a')?;
            let b = g.token("B", (a, 'b'))?;
            g.token_rule(a, Choice(('a', (b, 'a'))))?;
            let s = g.nonterminal("s")?;
            g.rule(s, b)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::RecursiveToken { .. }));
    }

    #[test]
    fn token_helpers_are_reachable_through_tokens() {
        let grammar = PreparedGrammar::define(|g| {
            let digit = g.token("DIGIT", CharacterSet::from_range('0'..='9'))?;
            let num = g.token("NUM", Rule::repeat1(Rule::Symbol(digit)))?;
            let a = g.nonterminal("a")?;
            g.rule(a, num)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(grammar.lexical_rules.len(), 2);
    }

    #[test]
    fn expected_conflict_lookup() {
        let grammar = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let a = g.nonterminal("a")?;
            let b = g.nonterminal("b")?;
            let c = g.nonterminal("c")?;
            g.start_symbol(c)?;
            g.rule(c, Choice((a, b)))?;
            g.rule(a, x)?;
            g.rule(b, x)?;
            g.expected_conflict([a, b])?;
            Ok(())
        })
        .unwrap();
        let a = grammar.symbols.get("a").unwrap();
        let b = grammar.symbols.get("b").unwrap();
        let c = grammar.symbols.get("c").unwrap();
        assert_eq!(grammar.start_symbol, c);
        assert!(grammar.is_expected_conflict(&[a, b]));
        assert!(grammar.is_expected_conflict(&[b]));
        assert!(!grammar.is_expected_conflict(&[a, c]));
        assert!(!grammar.is_expected_conflict(&[]));
    }

    #[test]
    fn repetitions_become_auxiliary_rules() {
        let grammar = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let comma = g.literal(",")?;
            let list = g.nonterminal("list")?;
            let items = g.nonterminal("items")?;
            g.rule(list, (x, Rule::repeat((comma, x).into_rule())))?;
            g.rule(list, (items, Rule::repeat((comma, x).into_rule())))?;
            g.rule(items, Rule::repeat1(x.into_rule()))?;
            Ok(())
        })
        .unwrap();
        eprintln!("{}", grammar);

        let x = Rule::Symbol(grammar.symbols.get_anonymous("x").unwrap());
        let comma = Rule::Symbol(grammar.symbols.get_anonymous(",").unwrap());
        let list = grammar.symbols.get("list").unwrap();
        let items = grammar.symbols.get("items").unwrap();
        let list_repeat = grammar.symbols.get("list_repeat1").unwrap();
        let items_repeat = grammar.symbols.get("items_repeat1").unwrap();

        // the same repetition in two alternatives shares one rule.
        assert_eq!(grammar.auxiliary_symbols.len(), 2);
        assert!(grammar.is_auxiliary(list_repeat));
        assert!(!grammar.is_auxiliary(list));
        assert_eq!(
            grammar.syntax_rules[&list_repeat],
            Rule::choice([
                Rule::seq([Rule::Symbol(list_repeat), comma.clone(), x.clone()]),
                Rule::seq([comma, x.clone()]),
            ])
        );
        assert_eq!(grammar.syntax_rules[&items], Rule::Symbol(items_repeat));
        assert_eq!(
            grammar.syntax_rules[&items_repeat],
            Rule::choice([Rule::seq([Rule::Symbol(items_repeat), x.clone()]), x])
        );

        let mut has_repeat = false;
        for rule in grammar.syntax_rules.values() {
            has_repeat |= contains_repeat(rule);
        }
        assert!(!has_repeat);
    }

    fn contains_repeat(rule: &Rule) -> bool {
        match rule {
            Rule::Repeat(..) => true,
            Rule::Choice(rules) | Rule::Seq(rules) => rules.iter().any(contains_repeat),
            Rule::Metadata { rule, .. } => contains_repeat(rule),
            Rule::Blank | Rule::Symbol(..) | Rule::CharacterSet(..) => false,
        }
    }

    #[test]
    fn auxiliary_names_avoid_declared_symbols() {
        let grammar = PreparedGrammar::define(|g| {
            let x = g.literal("x")?;
            let s = g.nonterminal("s")?;
            let taken = g.nonterminal("s_repeat1")?;
            g.rule(s, (taken, Rule::repeat(x.into_rule())))?;
            g.rule(taken, x)?;
            Ok(())
        })
        .unwrap();
        let auxiliary = grammar.symbols.get("s_repeat2").unwrap();
        assert!(grammar.is_auxiliary(auxiliary));
        assert!(!grammar.is_auxiliary(grammar.symbols.get("s_repeat1").unwrap()));
    }

    #[test]
    fn verify_ident_cases() {
        assert!(verify_ident("expr"));
        assert!(verify_ident("_x1"));
        assert!(verify_ident("式"));
        assert!(!verify_ident(""));
        assert!(!verify_ident("42"));
        assert!(!verify_ident("a-b"));
    }
}
