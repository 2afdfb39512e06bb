//! # Snippet Tokenizer
//!
//! Turns snippet source text into a stream of [`token::TokenSpan`]s.
//!
//! Each lexer is a small `nom` parser over `&str`; the [`token::Tokenizer`]
//! drives them and layers the line structure on top: logical newlines,
//! indentation levels and implicit joining inside brackets.
//!
//! * [`keyword`]: reserved words
//! * [`symbol`]: operators and delimiters
//! * [`literal`]: strings and numbers
//! * [`whitespace`] / [`comment`]: trivia

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;

pub use token::{Token, TokenSpan, Tokenizer, TokenizerError};
