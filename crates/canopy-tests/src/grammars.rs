//! Grammar definitions for integration tests.

use canopy::{
    char_set::CharacterSet,
    grammar::{GrammarDef, GrammarError, Precedence},
    rule::{Assoc, Choice, IntoRule, Rule},
};

fn digits() -> Rule {
    Rule::repeat1(Rule::CharacterSet(CharacterSet::from_range('0'..='9')))
}

fn lowercase_word() -> Rule {
    Rule::repeat1(Rule::CharacterSet(CharacterSet::from_range('a'..='z')))
}

fn whitespace() -> Rule {
    Rule::repeat1(Rule::CharacterSet(
        CharacterSet::from_char(' ')
            .add_char('\t')
            .add_char('\n')
            .add_char('\r'),
    ))
}

/// The classic expression grammar, layered by nonterminals.
pub fn layered_arithmetic(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let lparen = g.literal("(")?;
    let rparen = g.literal(")")?;
    let plus = g.literal("+")?;
    let minus = g.literal("-")?;
    let star = g.literal("*")?;
    let slash = g.literal("/")?;
    let num = g.token("NUM", digits())?;

    let expr = g.nonterminal("expr")?;
    let factor = g.nonterminal("factor")?;
    let term = g.nonterminal("term")?;

    g.rule(
        expr,
        Choice((
            (expr, plus, factor),  // expr '+' factor
            (expr, minus, factor), // expr '-' factor
            factor,                // factor
        )),
    )?;
    g.rule(
        factor,
        Choice((
            (factor, star, term),  // factor '*' term
            (factor, slash, term), // factor '/' term
            term,                  // term
        )),
    )?;
    g.rule(
        term,
        Choice((
            num,                    // num
            (lparen, expr, rparen), // '(' expr ')'
        )),
    )?;

    Ok(())
}

/// An ambiguous expression grammar disambiguated by rule precedence.
pub fn arithmetic(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let plus = g.literal("+")?;
    let minus = g.literal("-")?;
    let star = g.literal("*")?;
    let caret = g.literal("^")?;
    let lparen = g.literal("(")?;
    let rparen = g.literal(")")?;
    let num = g.token("NUM", digits())?;
    let ws = g.token("WS", whitespace())?;

    let expr = g.nonterminal("expr")?;

    g.extra(ws)?;

    g.rule(expr, Rule::prec_left(1, (expr, plus, expr).into_rule()))?;
    g.rule(expr, Rule::prec_left(1, (expr, minus, expr).into_rule()))?;
    g.rule(expr, Rule::prec_left(2, (expr, star, expr).into_rule()))?;
    g.rule(expr, Rule::prec_right(3, (expr, caret, expr).into_rule()))?;
    g.rule(expr, Rule::prec(4, (minus, expr).into_rule()))?;
    g.rule(expr, Choice((num, (lparen, expr, rparen))))?;

    Ok(())
}

/// The same operators, disambiguated by the terminal precedence table.
pub fn arithmetic_with_token_precedence(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let plus = g.literal("+")?;
    let star = g.literal("*")?;
    let caret = g.literal("^")?;
    let num = g.token("NUM", digits())?;

    let expr = g.nonterminal("expr")?;

    g.precedence(plus, Precedence::new(1, Assoc::Left))?;
    g.precedence(star, Precedence::new(2, Assoc::Left))?;
    g.precedence(caret, Precedence::new(3, Assoc::Right))?;

    g.rule(
        expr,
        Choice((
            (expr, plus, expr),
            (expr, star, expr),
            (expr, caret, expr),
            num,
        )),
    )?;

    Ok(())
}

/// `expr -> expr '+' expr` without any precedence.
pub fn ambiguous_arithmetic(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let plus = g.literal("+")?;
    let num = g.token("NUM", digits())?;
    let expr = g.nonterminal("expr")?;
    g.rule(expr, Choice(((expr, plus, expr), num)))?;
    Ok(())
}

/// Two nonterminals deriving the same terminal in the same context.
pub fn reduce_reduce(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let x = g.literal("x")?;
    let s = g.nonterminal("s")?;
    let a = g.nonterminal("a")?;
    let b = g.nonterminal("b")?;
    g.rule(s, Choice((a, b)))?;
    g.rule(a, x)?;
    g.rule(b, x)?;
    Ok(())
}

/// Rules deriving the empty string, directly and through repetition.
pub fn nullable(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let a = g.literal("a")?;
    let b = g.literal("b")?;
    let c = g.literal("c")?;
    let comma = g.literal(",")?;

    let s = g.nonterminal("s")?;
    let opt_a = g.nonterminal("opt_a")?;
    let list = g.nonterminal("list")?;

    g.rule(s, (opt_a, b, list))?;
    g.rule(opt_a, Choice((a, ())))?;
    g.rule(
        list,
        Rule::optional((c, Rule::repeat((comma, c).into_rule())).into_rule()),
    )?;

    Ok(())
}

fn if_statement(g: &mut GrammarDef<'_>) -> Result<canopy::symbol::Symbol, GrammarError> {
    let kw_if = g.literal("if")?;
    let kw_then = g.literal("then")?;
    let kw_else = g.literal("else")?;
    let other = g.literal("other")?;
    let cond = g.literal("cond")?;

    let stmt = g.nonterminal("stmt")?;

    g.rule(
        stmt,
        Choice((
            (kw_if, cond, kw_then, stmt),
            (kw_if, cond, kw_then, stmt, kw_else, stmt),
            other,
        )),
    )?;

    Ok(stmt)
}

/// The dangling-else ambiguity, left unresolved.
pub fn dangling_else(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    if_statement(g)?;
    Ok(())
}

/// The dangling-else ambiguity, declared as expected.
pub fn dangling_else_expected(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let stmt = if_statement(g)?;
    g.expected_conflict([stmt])?;
    Ok(())
}

/// Keywords sharing prefixes with the identifier token.
pub fn keywords(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let ident = g.token("IDENT", lowercase_word())?;
    let ws = g.token("WS", whitespace())?;
    let kw_let = g.literal("let")?;
    let kw_in = g.literal("in")?;
    let kw_if = g.literal("if")?;
    let equal = g.literal("=")?;

    let expr = g.nonterminal("expr")?;
    let binding = g.nonterminal("binding")?;

    g.extra(ws)?;

    g.rule(expr, Choice(((kw_let, binding, kw_in, expr), (kw_if, expr), ident)))?;
    g.rule(binding, (ident, equal, expr))?;

    Ok(())
}

/// Blocks delimited by indentation tokens from an external scanner.
pub fn indented_blocks(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let indent = g.external("INDENT")?;
    let dedent = g.external("DEDENT")?;
    let newline = g.literal("\n")?;
    let colon = g.literal(":")?;
    let ident = g.token("IDENT", lowercase_word())?;
    let ws = g.token("WS", Rule::repeat1(' '.into_rule()))?;

    let module = g.nonterminal("module")?;
    let stmt = g.nonterminal("stmt")?;
    let block = g.nonterminal("block")?;

    g.extra(ws)?;

    g.rule(module, Rule::repeat1(stmt.into_rule()))?;
    g.rule(
        stmt,
        Choice(((ident, newline), (ident, colon, newline, block))),
    )?;
    g.rule(block, (indent, Rule::repeat1(stmt.into_rule()), dedent))?;

    Ok(())
}

/// A JSON value grammar.
pub fn json(g: &mut GrammarDef<'_>) -> Result<(), GrammarError> {
    let lbrace = g.literal("{")?;
    let rbrace = g.literal("}")?;
    let lbracket = g.literal("[")?;
    let rbracket = g.literal("]")?;
    let comma = g.literal(",")?;
    let colon = g.literal(":")?;
    let kw_true = g.literal("true")?;
    let kw_false = g.literal("false")?;
    let kw_null = g.literal("null")?;

    let quote = '"'.into_rule();
    let string = g.token(
        "STRING",
        (
            quote.clone(),
            Rule::repeat(Choice((
                Rule::CharacterSet(CharacterSet::from_char('"').add_char('\\').negate()),
                ('\\', Rule::CharacterSet(CharacterSet::full())),
            ))
            .into_rule()),
            quote,
        ),
    )?;
    let number = g.token(
        "NUMBER",
        (
            Rule::optional('-'.into_rule()),
            digits(),
            Rule::optional(('.', digits()).into_rule()),
        ),
    )?;
    let ws = g.token("WS", whitespace())?;

    let value = g.nonterminal("value")?;
    let object = g.nonterminal("object")?;
    let member = g.nonterminal("member")?;
    let array = g.nonterminal("array")?;

    g.extra(ws)?;

    g.rule(
        value,
        Choice((object, array, string, number, kw_true, kw_false, kw_null)),
    )?;
    g.rule(
        object,
        (
            lbrace,
            Rule::optional((member, Rule::repeat((comma, member).into_rule())).into_rule()),
            rbrace,
        ),
    )?;
    g.rule(member, (string, colon, value))?;
    g.rule(
        array,
        (
            lbracket,
            Rule::optional((value, Rule::repeat((comma, value).into_rule())).into_rule()),
            rbracket,
        ),
    )?;

    Ok(())
}
