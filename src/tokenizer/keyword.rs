//! # Keyword Token Handling
//!
//! Keywords are not lexed by a dedicated parser. Every identifier-shaped word is
//! read by [`super::token::parse_identifier`] and then classified through the
//! `strum`-derived `FromStr` of [`Keyword`], so `iffy` stays an identifier while
//! `if` becomes a keyword.
//!
//! `True`, `False` and `None` are reserved words as well but they produce
//! literal tokens, see [`reserved_literal`].

use super::literal::Literal;

/// Reserved words of the snippet language.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    For,
    In,
    Is,
    While,
    Break,
    Continue,
    Pass,
    Return,
    Raise,
    Await,
}

/// Maps the capitalised constant words onto literal values.
pub fn reserved_literal(word: &str) -> Option<Literal> {
    match word {
        "True" => Some(Literal::Boolean(true)),
        "False" => Some(Literal::Boolean(false)),
        "None" => Some(Literal::None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_keyword_round_trip_through_display() {
        for kw in Keyword::iter() {
            assert_eq!(Keyword::from_str(kw.as_ref()).unwrap(), kw);
        }
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert!(Keyword::from_str("If").is_err());
        assert_eq!(Keyword::from_str("elif").unwrap(), Keyword::Elif);
    }

    #[test]
    fn test_reserved_literal() {
        assert_eq!(reserved_literal("None"), Some(Literal::None));
        assert_eq!(reserved_literal("True"), Some(Literal::Boolean(true)));
        assert_eq!(reserved_literal("none"), None);
    }
}
