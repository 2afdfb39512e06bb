pub mod common;
pub mod expression;
pub mod statement;

pub use expression::parse_expression;
pub use statement::{parse_program, parse_statement};
