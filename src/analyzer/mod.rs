//! # Snippet analyzer
//!
//! Turns the token stream produced by [`crate::tokenizer`] into the
//! [`ast`] the evaluator walks. Rules are built from the small combinator
//! library in [`combinators`] and [`prelude`]; the grammar lives in
//! [`parsers`].
//!
//! ```text
//! TokenSpan[] -> strip spans -> parse_program -> Statements (token index)
//!                                                  -> resolve_lines -> Statements (source line)
//! ```
pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;

pub use crate::ast;

use crate::ast::Statements;
use crate::tokenizer::{Token, TokenSpan};

/// Parses a tokenized snippet into statements whose `line` fields hold
/// 1-based source lines.
///
/// Input nested deeper than [`parsers::common::MAX_NESTING`] fails with the
/// nesting error, whatever else the grammar made of it.
#[tracing::instrument(level = "debug", skip(spans), fields(tokens = spans.len()))]
pub fn parse_snippet(spans: &[TokenSpan]) -> Result<Statements, ParseError> {
    let tokens: Vec<Token> = spans.iter().map(|span| span.token.clone()).collect();
    parsers::common::reset_nesting();
    let parsed = parsers::parse_program(&tokens, 0);
    if let Some(err) = parsers::common::nesting_failure() {
        return Err(err);
    }
    let (_, mut statements) = parsed?;
    parsers::statement::resolve_lines(&mut statements, &|index| line_at(spans, Some(index)));
    Ok(statements)
}

/// Source line for a token index. Positions past the end (and `None`, used
/// for end of input) map to the last token's line.
pub fn line_at(spans: &[TokenSpan], position: Option<usize>) -> usize {
    match position.and_then(|index| spans.get(index)) {
        Some(span) => span.line,
        None => spans.last().map_or(1, |span| span.line),
    }
}
