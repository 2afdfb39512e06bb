use std::cell::Cell;

use super::super::{core::*, prelude::*};
use crate::ast;
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    satisfy(
        |token: &Token| match token {
            Token::Identifier(name) => Some(name.clone()),
            _ => None,
        },
        "identifier",
    )
}

pub fn parse_literal() -> impl Parser<Token, ast::Literal> {
    satisfy(
        |token: &Token| match token {
            Token::Literal(Literal::Integer(i)) => Some(ast::Literal::Integer(*i)),
            Token::Literal(Literal::Float(f)) => Some(ast::Literal::Float(*f)),
            Token::Literal(Literal::String(s)) => Some(ast::Literal::String(s.clone())),
            Token::Literal(Literal::Boolean(b)) => Some(ast::Literal::Boolean(*b)),
            Token::Literal(Literal::None) => Some(ast::Literal::None),
            _ => None,
        },
        "literal",
    )
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(keyword)))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(operator)))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(delimiter)))
}

pub fn parse_newline() -> impl Parser<Token, ()> {
    as_unit(equal(Token::Newline))
}

pub fn parse_indent() -> impl Parser<Token, ()> {
    as_unit(equal(Token::Indent))
}

pub fn parse_dedent() -> impl Parser<Token, ()> {
    as_unit(equal(Token::Dedent))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Colon)
}

/// Deepest nesting of brackets, prefix operators and blocks the grammar
/// accepts. Every level costs native stack in the recursive descent.
pub const MAX_NESTING: usize = 48;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
    // first limit hit in the current parse
    static TOO_DEEP: Cell<Option<(usize, &'static str)>> = const { Cell::new(None) };
}

/// Runs `parser` one nesting level deeper. Past [`MAX_NESTING`] it fails with
/// `message`, and the failure is remembered so that backtracking cannot
/// turn it into a different error.
pub fn nested<O>(parser: impl Parser<Token, O>, message: &'static str) -> impl Parser<Token, O> {
    move |input: &[Token], pos: usize| {
        let depth = NESTING.with(|nesting| nesting.get()) + 1;
        if depth > MAX_NESTING {
            TOO_DEEP.with(|first| {
                if first.get().is_none() {
                    first.set(Some((pos, message)));
                }
            });
            return Err(ParseError::Fail {
                message: message.to_string(),
                position: pos,
            });
        }
        NESTING.with(|nesting| nesting.set(depth));
        let result = parser.parse(input, pos);
        NESTING.with(|nesting| nesting.set(depth - 1));
        result
    }
}

/// Clears the nesting state before a fresh parse.
pub fn reset_nesting() {
    NESTING.with(|nesting| nesting.set(0));
    TOO_DEEP.with(|first| first.set(None));
}

/// The nesting failure of the last parse on this thread, if it hit the limit.
pub fn nesting_failure() -> Option<ParseError> {
    TOO_DEEP.with(|first| first.get()).map(|(position, message)| ParseError::Fail {
        message: message.to_string(),
        position,
    })
}
