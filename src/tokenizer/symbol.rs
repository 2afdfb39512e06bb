//! # Symbol Token Handling
//!
//! Operators and delimiters of the snippet language.
//!
//! Symbols are matched longest-first so `**` is never read as two `*`, and
//! `//` is never read as two `/`. A lone `=` is a [`Delimiter`] because it only
//! ever appears in assignments and keyword arguments; `==` is an [`Operator`].

use strum_macros::{AsRefStr, Display, EnumString};

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

/// Operators that take part in expressions or augmented assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    /// Attribute access (`.`)
    #[strum(serialize = ".")]
    Dot,

    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,

    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    /// Floor division (`//`)
    #[strum(serialize = "//")]
    FloorDivide,
    #[strum(serialize = "%")]
    Modulo,
    /// Exponentiation (`**`)
    #[strum(serialize = "**")]
    Power,

    #[strum(serialize = "+=")]
    PlusEqual,
    #[strum(serialize = "-=")]
    MinusEqual,
    #[strum(serialize = "*=")]
    MultiplyEqual,
    #[strum(serialize = "/=")]
    DivideEqual,
}

/// Constant for the close brace character, used because direct serialization in strum causes errors.
const CLOSE_BRACE: &str = "}";

/// Structural punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "{")]
    OpenBrace,
    #[strum(serialize = "CLOSE_BRACE")]
    CloseBrace,
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "[")]
    OpenBracket,
    #[strum(serialize = "]")]
    CloseBracket,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ":")]
    Colon,
    /// Assignment and keyword argument (`=`)
    #[strum(serialize = "=")]
    Equal,
}

impl Delimiter {
    /// Change in bracket nesting caused by this delimiter.
    pub fn nesting(&self) -> isize {
        match self {
            Delimiter::OpenBrace | Delimiter::OpenParen | Delimiter::OpenBracket => 1,
            Delimiter::CloseBrace | Delimiter::CloseParen | Delimiter::CloseBracket => -1,
            _ => 0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Delimiter::OpenBrace => "{",
            Delimiter::CloseBrace => CLOSE_BRACE,
            Delimiter::OpenParen => "(",
            Delimiter::CloseParen => ")",
            Delimiter::OpenBracket => "[",
            Delimiter::CloseBracket => "]",
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Colon => ":",
            Delimiter::Equal => "=",
        }
    }
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                // Multi-character operators (matched first for longest-match)
                value(Operator::Power, tag("**")),
                value(Operator::FloorDivide, tag("//")),
                value(Operator::EqualEqual, tag("==")),
                value(Operator::NotEqual, tag("!=")),
                value(Operator::GreaterEqual, tag(">=")),
                value(Operator::LessEqual, tag("<=")),
                value(Operator::PlusEqual, tag("+=")),
                value(Operator::MinusEqual, tag("-=")),
                value(Operator::MultiplyEqual, tag("*=")),
                value(Operator::DivideEqual, tag("/=")),
                // Single-character operators
                value(Operator::Dot, tag(".")),
                value(Operator::Greater, tag(">")),
                value(Operator::Less, tag("<")),
                value(Operator::Plus, tag("+")),
                value(Operator::Minus, tag("-")),
                value(Operator::Multiply, tag("*")),
                value(Operator::Divide, tag("/")),
                value(Operator::Modulo, tag("%")),
            )),
            Token::Operator,
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenBrace, tag("{")),
                value(Delimiter::CloseBrace, tag(CLOSE_BRACE)),
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::OpenBracket, tag("[")),
                value(Delimiter::CloseBracket, tag("]")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Semicolon, tag(";")),
                value(Delimiter::Colon, tag(":")),
                value(Delimiter::Equal, tag("=")),
            )),
            Token::Delimiter,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        let test_cases = [
            ("**", Token::Operator(Operator::Power)),
            ("//", Token::Operator(Operator::FloorDivide)),
            ("==", Token::Operator(Operator::EqualEqual)),
            ("!=", Token::Operator(Operator::NotEqual)),
            (">=", Token::Operator(Operator::GreaterEqual)),
            ("+=", Token::Operator(Operator::PlusEqual)),
            (".", Token::Operator(Operator::Dot)),
            ("%", Token::Operator(Operator::Modulo)),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_operator(input).unwrap();
            assert_eq!(token, *expected);
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_delimiters() {
        let test_cases = [
            ("{", Token::Delimiter(Delimiter::OpenBrace)),
            ("}", Token::Delimiter(Delimiter::CloseBrace)),
            ("(", Token::Delimiter(Delimiter::OpenParen)),
            (")", Token::Delimiter(Delimiter::CloseParen)),
            (",", Token::Delimiter(Delimiter::Comma)),
            (";", Token::Delimiter(Delimiter::Semicolon)),
            (":", Token::Delimiter(Delimiter::Colon)),
            ("=", Token::Delimiter(Delimiter::Equal)),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_delimiter(input).unwrap();
            assert_eq!(token, *expected);
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_operator_precedence() {
        // "**" must not be read as "*" followed by "*"
        let (rest, token) = parse_operator("**2").unwrap();
        assert_eq!(token, Token::Operator(Operator::Power));
        assert_eq!(rest, "2");
    }

    #[test]
    fn test_lone_bang_is_not_an_operator() {
        assert!(parse_operator("!x").is_err());
    }
}
