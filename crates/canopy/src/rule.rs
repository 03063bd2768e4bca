//! Rule expressions.

use crate::{
    char_set::CharacterSet,
    symbol::{Symbol, SymbolTable},
    types::display_fn,
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

/// An alternative name under which a rule appears in the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alias {
    pub value: String,
    pub is_named: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataParams {
    pub precedence: Option<i32>,
    pub associativity: Option<Assoc>,
    pub dynamic_precedence: i32,
    pub is_token: bool,
    pub alias: Option<Alias>,
}

/// The precedence in effect at the cursor of a rule fragment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemPrecedence {
    pub precedence: Option<i32>,
    pub associativity: Option<Assoc>,
    pub dynamic_precedence: i32,
}

impl ItemPrecedence {
    /// The numeric precedence, where an absent annotation counts as `0`.
    pub fn value(&self) -> i32 {
        self.precedence.unwrap_or(0)
    }

    /// Fall back to the annotations of an enclosing metadata node wherever
    /// this precedence has none of its own.
    fn within(self, params: &MetadataParams) -> Self {
        let (precedence, associativity) =
            if self.precedence.is_some() || self.associativity.is_some() {
                (self.precedence, self.associativity)
            } else {
                (params.precedence, params.associativity)
            };
        let dynamic_precedence = match self.dynamic_precedence {
            0 => params.dynamic_precedence,
            n => n,
        };
        Self {
            precedence,
            associativity,
            dynamic_precedence,
        }
    }
}

/// A rule expression over symbols and character sets.
///
/// Rules compare and hash structurally, which is what lets items embedding
/// rule fragments be deduplicated by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    Blank,
    Symbol(Symbol),
    CharacterSet(CharacterSet),
    Choice(Vec<Rule>),
    Seq(Vec<Rule>),
    /// Zero or more repetitions.
    Repeat(Box<Rule>),
    Metadata {
        rule: Box<Rule>,
        params: MetadataParams,
    },
}

impl Rule {
    pub fn blank() -> Self {
        Self::Blank
    }

    pub fn symbol(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }

    /// A sequence of rules. Nested sequences are flattened and blanks dropped.
    pub fn seq<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        let mut elements = vec![];
        for rule in rules {
            match rule {
                Self::Blank => (),
                Self::Seq(inner) => elements.extend(inner),
                rule => elements.push(rule),
            }
        }
        match elements.len() {
            0 => Self::Blank,
            1 => elements.pop().unwrap_or(Self::Blank),
            _ => Self::Seq(elements),
        }
    }

    /// An ordered choice between rules. Nested choices are flattened and
    /// duplicate alternatives removed, keeping the first occurrence.
    pub fn choice<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        let mut alternatives: Vec<Rule> = vec![];
        let mut push = |rule: Rule| {
            if !alternatives.contains(&rule) {
                alternatives.push(rule);
            }
        };
        for rule in rules {
            match rule {
                Self::Choice(inner) => inner.into_iter().for_each(&mut push),
                rule => push(rule),
            }
        }
        match alternatives.len() {
            0 => Self::Blank,
            1 => alternatives.pop().unwrap_or(Self::Blank),
            _ => Self::Choice(alternatives),
        }
    }

    pub fn repeat(rule: Rule) -> Self {
        match rule {
            Self::Blank => Self::Blank,
            rule @ Self::Repeat(..) => rule,
            rule => Self::Repeat(Box::new(rule)),
        }
    }

    /// One or more repetitions.
    pub fn repeat1(rule: Rule) -> Self {
        Self::seq([rule.clone(), Self::repeat(rule)])
    }

    pub fn optional(rule: Rule) -> Self {
        Self::choice([rule, Self::Blank])
    }

    /// The sequence of the characters in `text`.
    pub fn string(text: &str) -> Self {
        Self::seq(
            text.chars()
                .map(|c| Self::CharacterSet(CharacterSet::from_char(c))),
        )
    }

    pub fn prec(value: i32, rule: Rule) -> Self {
        rule.with_metadata(|params| params.precedence = Some(value))
    }

    pub fn prec_left(value: i32, rule: Rule) -> Self {
        rule.with_metadata(|params| {
            params.precedence = Some(value);
            params.associativity = Some(Assoc::Left);
        })
    }

    pub fn prec_right(value: i32, rule: Rule) -> Self {
        rule.with_metadata(|params| {
            params.precedence = Some(value);
            params.associativity = Some(Assoc::Right);
        })
    }

    pub fn prec_nonassoc(value: i32, rule: Rule) -> Self {
        rule.with_metadata(|params| {
            params.precedence = Some(value);
            params.associativity = Some(Assoc::Nonassoc);
        })
    }

    pub fn prec_dynamic(value: i32, rule: Rule) -> Self {
        rule.with_metadata(|params| params.dynamic_precedence = value)
    }

    pub fn token(rule: Rule) -> Self {
        rule.with_metadata(|params| params.is_token = true)
    }

    pub fn alias(rule: Rule, value: &str, is_named: bool) -> Self {
        rule.with_metadata(|params| {
            params.alias = Some(Alias {
                value: value.to_owned(),
                is_named,
            })
        })
    }

    fn with_metadata(self, f: impl FnOnce(&mut MetadataParams)) -> Self {
        match self {
            Self::Metadata { rule, mut params } => {
                f(&mut params);
                Self::Metadata { rule, params }
            }
            rule => {
                let mut params = MetadataParams::default();
                f(&mut params);
                Self::Metadata {
                    rule: Box::new(rule),
                    params,
                }
            }
        }
    }

    /// Whether the rule matches the empty input without expanding any
    /// symbol reference.
    pub fn can_be_blank(&self) -> bool {
        match self {
            Self::Blank | Self::Repeat(..) => true,
            Self::Symbol(..) | Self::CharacterSet(..) => false,
            Self::Choice(alternatives) => alternatives.iter().any(Self::can_be_blank),
            Self::Seq(elements) => elements.iter().all(Self::can_be_blank),
            Self::Metadata { rule, .. } => rule.can_be_blank(),
        }
    }

    /// Split the rule into its top-level alternatives, distributing enclosing
    /// metadata over each of them.
    pub fn alternatives(&self) -> Vec<Rule> {
        match self {
            Self::Choice(alternatives) => alternatives.iter().flat_map(Self::alternatives).collect(),
            Self::Metadata { rule, params } => rule
                .alternatives()
                .into_iter()
                .map(|rule| Self::Metadata {
                    rule: Box::new(rule),
                    params: params.clone(),
                })
                .collect(),
            rule => vec![rule.clone()],
        }
    }

    /// The precedence of the innermost metadata enclosing the cursor, which
    /// sits at the start of this fragment.
    pub fn cursor_precedence(&self) -> ItemPrecedence {
        match self {
            Self::Metadata { rule, params } => rule.cursor_precedence().within(params),
            Self::Seq(elements) => elements
                .first()
                .map(Self::cursor_precedence)
                .unwrap_or_default(),
            Self::Choice(alternatives) => alternatives
                .iter()
                .map(Self::cursor_precedence)
                .max_by_key(|p| (p.value(), p.dynamic_precedence))
                .unwrap_or_default(),
            Self::Repeat(rule) => rule.cursor_precedence(),
            Self::Blank | Self::Symbol(..) | Self::CharacterSet(..) => ItemPrecedence::default(),
        }
    }

    /// The precedence in effect when the fragment is finished without
    /// consuming anything more.
    ///
    /// Only the paths matching the empty input are followed, so alternatives
    /// the cursor never entered do not contribute.
    pub fn completion_precedence(&self) -> ItemPrecedence {
        match self {
            Self::Metadata { rule, params } => rule.completion_precedence().within(params),
            Self::Seq(rules) | Self::Choice(rules) => rules
                .iter()
                .filter(|rule| rule.can_be_blank())
                .map(Self::completion_precedence)
                .max_by_key(|p| (p.value(), p.dynamic_precedence))
                .unwrap_or_default(),
            Self::Blank | Self::Repeat(..) | Self::Symbol(..) | Self::CharacterSet(..) => {
                ItemPrecedence::default()
            }
        }
    }

    /// Visit every symbol referenced by this rule.
    pub fn for_each_symbol(&self, f: &mut impl FnMut(Symbol)) {
        match self {
            Self::Symbol(symbol) => f(*symbol),
            Self::Choice(rules) | Self::Seq(rules) => {
                for rule in rules {
                    rule.for_each_symbol(f);
                }
            }
            Self::Repeat(rule) | Self::Metadata { rule, .. } => rule.for_each_symbol(f),
            Self::Blank | Self::CharacterSet(..) => (),
        }
    }

    pub fn contains_character_set(&self) -> bool {
        match self {
            Self::CharacterSet(..) => true,
            Self::Choice(rules) | Self::Seq(rules) => {
                rules.iter().any(Self::contains_character_set)
            }
            Self::Repeat(rule) | Self::Metadata { rule, .. } => rule.contains_character_set(),
            Self::Blank | Self::Symbol(..) => false,
        }
    }

    pub fn display<'r>(&'r self, symbols: &'r SymbolTable) -> impl fmt::Display + 'r {
        display_fn(move |f| match self {
            Self::Blank => f.write_str("ε"),
            Self::Symbol(symbol) => write!(f, "{}", symbols.display(*symbol)),
            Self::CharacterSet(chars) => write!(f, "{}", chars),
            Self::Choice(alternatives) => {
                f.write_str("(")?;
                for (i, rule) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", rule.display(symbols))?;
                }
                f.write_str(")")
            }
            Self::Seq(elements) => {
                f.write_str("(")?;
                for (i, rule) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", rule.display(symbols))?;
                }
                f.write_str(")")
            }
            Self::Repeat(rule) => write!(f, "{}*", rule.display(symbols)),
            Self::Metadata { rule, params } => {
                if let Some(prec) = params.precedence {
                    match params.associativity {
                        Some(assoc) => write!(f, "prec.{}[{}] ", assoc, prec)?,
                        None => write!(f, "prec[{}] ", prec)?,
                    }
                }
                if params.dynamic_precedence != 0 {
                    write!(f, "prec.dynamic[{}] ", params.dynamic_precedence)?;
                }
                if params.is_token {
                    f.write_str("token ")?;
                }
                if let Some(alias) = &params.alias {
                    write!(f, "alias[{}] ", alias.value)?;
                }
                write!(f, "{}", rule.display(symbols))
            }
        })
    }
}

/// Conversion into a [`Rule`], accepted wherever the grammar definition takes
/// a rule. Tuples and arrays become sequences.
pub trait IntoRule {
    fn into_rule(self) -> Rule;
}

/// Conversion into a list of rules, used by sequences and [`Choice`].
pub trait IntoRules {
    fn into_rules(self) -> Vec<Rule>;
}

/// Wraps a tuple (or array) of alternatives into a choice.
///
/// ```
/// # use canopy::rule::{Choice, IntoRule, Rule};
/// let rule = Choice(("a", ("b", "c"))).into_rule();
/// assert_eq!(rule, Rule::choice([Rule::string("a"), Rule::string("bc")]));
/// ```
#[derive(Debug, Clone)]
pub struct Choice<T>(pub T);

impl IntoRule for Rule {
    fn into_rule(self) -> Rule {
        self
    }
}

impl IntoRule for Symbol {
    fn into_rule(self) -> Rule {
        Rule::Symbol(self)
    }
}

impl IntoRule for CharacterSet {
    fn into_rule(self) -> Rule {
        Rule::CharacterSet(self)
    }
}

impl IntoRule for char {
    fn into_rule(self) -> Rule {
        Rule::CharacterSet(CharacterSet::from_char(self))
    }
}

impl IntoRule for &str {
    fn into_rule(self) -> Rule {
        Rule::string(self)
    }
}

impl IntoRule for () {
    fn into_rule(self) -> Rule {
        Rule::Blank
    }
}

impl<T: IntoRules> IntoRule for Choice<T> {
    fn into_rule(self) -> Rule {
        Rule::choice(self.0.into_rules())
    }
}

impl<T: IntoRule, const N: usize> IntoRules for [T; N] {
    fn into_rules(self) -> Vec<Rule> {
        self.into_iter().map(IntoRule::into_rule).collect()
    }
}

impl<T: IntoRule, const N: usize> IntoRule for [T; N] {
    fn into_rule(self) -> Rule {
        Rule::seq(self.into_rules())
    }
}

impl<T: IntoRule> IntoRules for Vec<T> {
    fn into_rules(self) -> Vec<Rule> {
        self.into_iter().map(IntoRule::into_rule).collect()
    }
}

impl<T: IntoRule> IntoRule for Vec<T> {
    fn into_rule(self) -> Rule {
        Rule::seq(self.into_rules())
    }
}

macro_rules! impl_tuples {
    ($($T:ident),+) => {
        impl<$($T: IntoRule),+> IntoRules for ($($T,)+) {
            #[allow(non_snake_case)]
            fn into_rules(self) -> Vec<Rule> {
                let ($($T,)+) = self;
                vec![$($T.into_rule()),+]
            }
        }

        impl<$($T: IntoRule),+> IntoRule for ($($T,)+) {
            fn into_rule(self) -> Rule {
                Rule::seq(self.into_rules())
            }
        }
    };
}

impl_tuples!(T1);
impl_tuples!(T1, T2);
impl_tuples!(T1, T2, T3);
impl_tuples!(T1, T2, T3, T4);
impl_tuples!(T1, T2, T3, T4, T5);
impl_tuples!(T1, T2, T3, T4, T5, T6);
impl_tuples!(T1, T2, T3, T4, T5, T6, T7);
impl_tuples!(T1, T2, T3, T4, T5, T6, T7, T8);
