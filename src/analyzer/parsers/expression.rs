use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast::{self, Argument, BinaryOperator, CompareOperator, Expression, LogicalOperator};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

/// Every bracketed sub-expression re-enters here, so this is where bracket
/// nesting is counted.
pub fn parse_expression() -> impl Parser<Token, Expression> {
    with_context(
        nested(lazy(parse_logical_or), "too many nested parentheses"),
        "expression",
    )
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn fold_logical(op: LogicalOperator, first: Expression, rest: Vec<Expression>) -> Expression {
    rest.into_iter().fold(first, |left, right| Expression::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn parse_logical_or() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_and(),
                many(preceded(parse_keyword(Keyword::Or), parse_logical_and())),
            ),
            |(first, rest)| fold_logical(LogicalOperator::Or, first, rest),
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_not(),
                many(preceded(parse_keyword(Keyword::And), parse_logical_not())),
            ),
            |(first, rest)| fold_logical(LogicalOperator::And, first, rest),
        ),
        "logical and",
    )
}

const TOO_DEEP: &str = "expression nested too deeply";

// Self-recursive rules re-enter through plain functions.
fn logical_not(input: &[Token], pos: usize) -> ParseResult<Expression> {
    nested(parse_logical_not(), TOO_DEEP).parse(input, pos)
}

fn unary(input: &[Token], pos: usize) -> ParseResult<Expression> {
    nested(parse_unary(), TOO_DEEP).parse(input, pos)
}

fn parse_logical_not() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(parse_keyword(Keyword::Not), logical_not),
                |operand| Expression::UnaryOp {
                    op: ast::UnaryOperator::Not,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_comparison()),
        ]),
        "logical not",
    )
}

fn parse_comparison() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_additive(),
                many(tuple2(parse_operator_comparison(), parse_additive())),
            ),
            |(first, rest)| {
                if rest.is_empty() {
                    first
                } else {
                    Expression::Compare {
                        first: Box::new(first),
                        rest,
                    }
                }
            },
        ),
        "comparison",
    )
}

fn compare_operator(operator: Operator, result: CompareOperator) -> Box<dyn Parser<Token, CompareOperator>> {
    Box::new(map(parse_operator(operator), move |_| result))
}

fn parse_operator_comparison() -> impl Parser<Token, CompareOperator> {
    with_context(
        choice(vec![
            compare_operator(Operator::EqualEqual, CompareOperator::Equal),
            compare_operator(Operator::NotEqual, CompareOperator::NotEqual),
            compare_operator(Operator::LessEqual, CompareOperator::LessEqual),
            compare_operator(Operator::Less, CompareOperator::Less),
            compare_operator(Operator::GreaterEqual, CompareOperator::GreaterEqual),
            compare_operator(Operator::Greater, CompareOperator::Greater),
            Box::new(map(parse_keyword(Keyword::In), |_| CompareOperator::In)),
            Box::new(map(
                tuple2(parse_keyword(Keyword::Not), parse_keyword(Keyword::In)),
                |_| CompareOperator::NotIn,
            )),
            Box::new(map(
                tuple2(parse_keyword(Keyword::Is), parse_keyword(Keyword::Not)),
                |_| CompareOperator::IsNot,
            )),
            Box::new(map(parse_keyword(Keyword::Is), |_| CompareOperator::Is)),
        ]),
        "comparison operator",
    )
}

fn binary_operator(operator: Operator, result: BinaryOperator) -> Box<dyn Parser<Token, BinaryOperator>> {
    Box::new(map(parse_operator(operator), move |_| result))
}

fn parse_additive() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Plus, BinaryOperator::Add),
                        binary_operator(Operator::Minus, BinaryOperator::Subtract),
                    ]),
                    parse_multiplicative(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "additive",
    )
}

// 乗除算 (*, /, //, %)
fn parse_multiplicative() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_unary(),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Multiply, BinaryOperator::Multiply),
                        binary_operator(Operator::Divide, BinaryOperator::Divide),
                        binary_operator(Operator::FloorDivide, BinaryOperator::FloorDivide),
                        binary_operator(Operator::Modulo, BinaryOperator::Modulo),
                    ]),
                    parse_unary(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "multiplicative",
    )
}

fn parse_unary() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(parse_operator(Operator::Minus), unary),
                |operand| Expression::UnaryOp {
                    op: ast::UnaryOperator::Negate,
                    operand: Box::new(operand),
                },
            )),
            Box::new(map(
                preceded(parse_operator(Operator::Plus), unary),
                |operand| Expression::UnaryOp {
                    op: ast::UnaryOperator::Plus,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_power()),
        ]),
        "unary",
    )
}

/// `**` binds tighter than unary minus on its left and is right associative.
fn parse_power() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(
                parse_await(),
                optional(preceded(parse_operator(Operator::Power), unary)),
            ),
            |(base, exponent)| match exponent {
                Some(exponent) => Expression::BinaryOp {
                    op: BinaryOperator::Power,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                None => base,
            },
        ),
        "power",
    )
}

fn parse_await() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(parse_keyword(Keyword::Await), parse_postfix()),
                |expr| Expression::Await(Box::new(expr)),
            )),
            Box::new(parse_postfix()),
        ]),
        "await",
    )
}

enum Trailer {
    Attribute(String),
    Call(Vec<Argument>),
    Index(Expression),
}

fn parse_postfix() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple2(parse_atom(), many(parse_trailer())),
            |(atom, trailers)| {
                trailers
                    .into_iter()
                    .fold(atom, |object, trailer| match trailer {
                        Trailer::Attribute(name) => Expression::Attribute {
                            object: Box::new(object),
                            name,
                        },
                        Trailer::Call(arguments) => Expression::Call {
                            function: Box::new(object),
                            arguments,
                        },
                        Trailer::Index(index) => Expression::Index {
                            object: Box::new(object),
                            index: Box::new(index),
                        },
                    })
            },
        ),
        "postfix",
    )
}

fn parse_trailer() -> impl Parser<Token, Trailer> {
    choice(vec![
        Box::new(map(
            preceded(parse_operator(Operator::Dot), parse_identifier()),
            Trailer::Attribute,
        )),
        Box::new(map(parse_arguments(), Trailer::Call)),
        Box::new(map(
            delimited(
                parse_delimiter(Delimiter::OpenBracket),
                parse_expression(),
                parse_delimiter(Delimiter::CloseBracket),
            ),
            Trailer::Index,
        )),
    ])
}

pub fn parse_arguments() -> impl Parser<Token, Vec<Argument>> {
    with_context(
        delimited(
            parse_delimiter(Delimiter::OpenParen),
            separated_list(
                choice(vec![
                    Box::new(map(
                        tuple3(
                            parse_identifier(),
                            parse_delimiter(Delimiter::Equal),
                            parse_expression(),
                        ),
                        |(name, _, value)| Argument::Named { name, value },
                    )),
                    Box::new(map(parse_expression(), Argument::Positional)),
                ]),
                parse_comma(),
            ),
            parse_delimiter(Delimiter::CloseParen),
        ),
        "arguments",
    )
}

fn parse_atom() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), Expression::Literal)),
            Box::new(map(parse_identifier(), Expression::Variable)),
            Box::new(delimited(
                parse_delimiter(Delimiter::OpenParen),
                parse_expression(),
                parse_delimiter(Delimiter::CloseParen),
            )),
            Box::new(parse_list()),
            Box::new(parse_dict()),
        ]),
        "atom",
    )
}

fn parse_list() -> impl Parser<Token, Expression> {
    with_context(
        map(
            delimited(
                parse_delimiter(Delimiter::OpenBracket),
                separated_list(parse_expression(), parse_comma()),
                parse_delimiter(Delimiter::CloseBracket),
            ),
            Expression::List,
        ),
        "list",
    )
}

fn parse_dict() -> impl Parser<Token, Expression> {
    with_context(
        map(
            delimited(
                parse_delimiter(Delimiter::OpenBrace),
                separated_list(
                    map(
                        tuple3(parse_expression(), parse_colon(), parse_expression()),
                        |(key, _, value)| (key, value),
                    ),
                    parse_comma(),
                ),
                parse_delimiter(Delimiter::CloseBrace),
            ),
            Expression::Dict,
        ),
        "dict",
    )
}
