//! # Whitespace Handling
//!
//! Intra-line whitespace and explicit line continuations carry no meaning for
//! the parser and are reported as [`Lexeme::Trivia`]. Line breaks are reported
//! separately because the [`super::token::Tokenizer`] decides whether they end a
//! logical line or sit inside brackets.
//!
//! Leading indentation is not handled here; it is measured by the tokenizer at
//! the start of each logical line.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{map, value},
    error::context,
    sequence::pair,
};

use super::token::{Lexeme, ParserResult};

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Lexeme> {
    context(
        "whitespace expected",
        map(
            take_while1(|c| c == ' ' || c == '\t' || c == '\x0c'),
            |_| Lexeme::Trivia,
        ),
    )(input)
}

/// Backslash immediately followed by a line break joins two physical lines.
#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_line_continuation(input: &str) -> ParserResult<Lexeme> {
    context(
        "line continuation",
        value(Lexeme::Trivia, pair(char('\\'), alt((tag("\r\n"), tag("\n"))))),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_newline(input: &str) -> ParserResult<Lexeme> {
    context(
        "newline expected",
        map(alt((tag("\r\n"), tag("\n"))), |_| Lexeme::LineBreak),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        let (rest, lexeme) = parse_whitespace("   hello").unwrap();
        assert_eq!(lexeme, Lexeme::Trivia);
        assert_eq!(rest, "hello");

        let (rest, _) = parse_whitespace("\t\t  hello").unwrap();
        assert_eq!(rest, "hello");
    }

    #[test]
    fn test_newline() {
        let (rest, lexeme) = parse_newline("\nhello").unwrap();
        assert_eq!(lexeme, Lexeme::LineBreak);
        assert_eq!(rest, "hello");

        let (rest, _) = parse_newline("\r\nworld").unwrap();
        assert_eq!(rest, "world");
    }

    #[test]
    fn test_line_continuation() {
        let (rest, lexeme) = parse_line_continuation("\\\n  + 1").unwrap();
        assert_eq!(lexeme, Lexeme::Trivia);
        assert_eq!(rest, "  + 1");
        assert!(parse_line_continuation("\\n").is_err());
    }

    #[test]
    fn test_error() {
        assert!(parse_whitespace("hello").is_err());
        assert!(parse_newline("hello").is_err());
    }
}
