use thiserror::Error;

// パーサートレイト

pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

/// Plain functions and closures with the right shape are parsers too, which
/// lets hand-written loops sit next to combinator-built rules.
impl<I, O, F> Parser<I, O> for F
where
    F: Fn(&[I], usize) -> ParseResult<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self(input, pos)
    }
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("unexpected end of input")]
    EOF,
    #[error("no alternative matched")]
    NoAlternative,
    #[error("{message}")]
    Fail { message: String, position: usize },
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}

impl ParseError {
    /// Token index the error was raised at; `None` for end of input.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::Unexpected { position, .. } | ParseError::Fail { position, .. } => {
                Some(*position)
            }
            ParseError::WithContext { inner, .. } => inner.position(),
            ParseError::EOF | ParseError::NoAlternative => None,
        }
    }

    /// The innermost error, without the rule names wrapped around it.
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Compares two failures by how far into the input they got.
    pub(crate) fn reach(&self, input_len: usize) -> usize {
        self.position().unwrap_or(input_len)
    }
}
