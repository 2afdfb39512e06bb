use nom::{
    bytes::complete::tag, character::complete::not_line_ending, combinator::value,
    error::context, sequence::preceded,
};

use super::token::{Lexeme, ParserResult};

/// `#` runs to the end of the physical line. The line break itself is left
/// for the tokenizer.
#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Lexeme> {
    context(
        "line comment",
        value(Lexeme::Trivia, preceded(tag("#"), not_line_ending)),
    )(input)
}
