use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    error::context,
    sequence::{delimited, pair, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    None,
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Boolean(true) => write!(f, "True"),
            Literal::Boolean(false) => write!(f, "False"),
            Literal::None => write!(f, "None"),
        }
    }
}

fn parse_escape(input: &str) -> ParserResult<&str> {
    alt((
        value("\\", tag("\\")),
        value("\"", tag("\"")),
        value("'", tag("'")),
        value("\n", tag("n")),
        value("\t", tag("t")),
        value("\r", tag("r")),
        value("\0", tag("0")),
    ))(input)
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_double_quoted(input: &str) -> ParserResult<String> {
    context(
        "double quoted string",
        delimited(
            char('"'),
            map(
                opt(escaped_transform(is_not("\\\"\n"), '\\', parse_escape)),
                Option::unwrap_or_default,
            ),
            char('"'),
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_single_quoted(input: &str) -> ParserResult<String> {
    context(
        "single quoted string",
        delimited(
            char('\''),
            map(
                opt(escaped_transform(is_not("\\'\n"), '\\', parse_escape)),
                Option::unwrap_or_default,
            ),
            char('\''),
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            alt((parse_double_quoted, parse_single_quoted)),
            Literal::String,
        ),
    )(input)
}

fn parse_exponent(input: &str) -> ParserResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

// Numbers carry no sign; unary minus is an operator.
#[tracing::instrument(level = "trace", skip(input))]
fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    context(
        "float literal",
        map_res(
            recognize(pair(
                digit1,
                alt((
                    recognize(tuple((char('.'), digit1, opt(parse_exponent)))),
                    parse_exponent,
                )),
            )),
            |s: &str| s.parse::<f64>().map(Literal::Float),
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        map_res(digit1, |s: &str| s.parse::<i64>().map(Literal::Integer)),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_float_literal,
                parse_integer_literal,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal() {
        let (rest, lit) = parse_string_literal(r#""hello world" tail"#).unwrap();
        assert_eq!(lit, Literal::String("hello world".to_string()));
        assert_eq!(rest, " tail");
    }

    #[test]
    fn test_single_quoted_with_escapes() {
        let (_, lit) = parse_string_literal(r#"'it\'s\n'"#).unwrap();
        assert_eq!(lit, Literal::String("it's\n".to_string()));
    }

    #[test]
    fn test_empty_strings() {
        let (_, lit) = parse_string_literal(r#""""#).unwrap();
        assert_eq!(lit, Literal::String(String::new()));
        let (_, lit) = parse_string_literal("''").unwrap();
        assert_eq!(lit, Literal::String(String::new()));
    }

    #[test]
    fn test_unterminated_string_fails() {
        assert!(parse_string_literal("\"abc\n\"").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            parse_literal("42").unwrap().1,
            Token::Literal(Literal::Integer(42))
        );
        assert_eq!(
            parse_literal("3.25").unwrap().1,
            Token::Literal(Literal::Float(3.25))
        );
        assert_eq!(
            parse_literal("2e3").unwrap().1,
            Token::Literal(Literal::Float(2000.0))
        );
        // a trailing dot belongs to attribute access
        let (rest, token) = parse_literal("1.real").unwrap();
        assert_eq!(token, Token::Literal(Literal::Integer(1)));
        assert_eq!(rest, ".real");
    }

    #[test]
    fn test_integer_out_of_range() {
        assert!(parse_literal("99999999999999999999").is_err());
    }
}
