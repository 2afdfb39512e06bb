use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::{map, recognize},
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    comment::parse_comment,
    keyword::{reserved_literal, Keyword},
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::{parse_line_continuation, parse_newline, parse_whitespace},
};

/// Width a tab advances the indentation column to (next multiple of).
const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Keyword(Keyword),
    // Identifiers
    Identifier(String),
    // Symbols
    Operator(Operator),
    Delimiter(Delimiter),
    // Literals
    Literal(Literal),
    // Layout
    Newline,
    Indent,
    Dedent,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{}", kw),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op.as_ref()),
            Token::Delimiter(d) => write!(f, "{}", d.symbol()),
            Token::Literal(lit) => write!(f, "{}", lit),
            Token::Newline => write!(f, "end of line"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "dedent"),
        }
    }
}

/// What a single lexer step recognized.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    /// Whitespace, comments and line continuations.
    Trivia,
    /// A physical line break.
    LineBreak,
    Token(Token),
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
    indents: Vec<usize>,
    nesting: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
            indents: vec![0],
            nesting: 0,
        }
    }

    /// Produces the logical token stream of `input`.
    ///
    /// Blank and comment-only lines are dropped, line breaks inside brackets
    /// are ignored, and leading indentation becomes [`Token::Indent`] /
    /// [`Token::Dedent`]. A non-empty stream always ends with a
    /// [`Token::Newline`] followed by the dedents that close open blocks.
    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;
        let mut at_line_start = true;

        while !remaining.is_empty() {
            if at_line_start && self.nesting == 0 {
                at_line_start = false;
                let (width, indent_len) = measure_indent(remaining);
                let rest = &remaining[indent_len..];

                if is_blank_line(rest) {
                    let line_len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
                    let consumed = indent_len + line_len;
                    self.update_position(&remaining[..consumed]);
                    remaining = &remaining[consumed..];
                    at_line_start = true;
                    continue;
                }

                self.update_position(&remaining[..indent_len]);
                remaining = rest;
                self.push_indentation(width, &mut tokens)?;
                continue;
            }

            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            let result = alt((
                // Layout
                parse_whitespace,
                parse_line_continuation,
                parse_newline,
                parse_comment,
                // Code elements
                map(parse_literal, Lexeme::Token),
                map(parse_operator, Lexeme::Token),
                map(parse_delimiter, Lexeme::Token),
                map(parse_identifier, Lexeme::Token),
            ))(remaining);

            match result {
                Ok((new_remaining, lexeme)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);
                    remaining = new_remaining;

                    let token = match lexeme {
                        Lexeme::Trivia => continue,
                        Lexeme::LineBreak if self.nesting > 0 => continue,
                        Lexeme::LineBreak => {
                            at_line_start = true;
                            Token::Newline
                        }
                        Lexeme::Token(token) => {
                            if let Token::Delimiter(d) = &token {
                                self.nesting = self.nesting.saturating_add_signed(d.nesting());
                            }
                            token
                        }
                    };

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });
                }
                Err(e) => {
                    let error = self.lex_error(remaining, e);
                    tracing::error!("{}", error);
                    return Err(error);
                }
            }
        }

        self.finish(&mut tokens);
        Ok(tokens)
    }

    fn push_indentation(&mut self, width: usize, tokens: &mut Vec<TokenSpan>) -> TokenizerResult<()> {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if tokens.is_empty() {
                return Err(self.error("unexpected indent", ""));
            }
            self.indents.push(width);
            tokens.push(self.layout_span(Token::Indent));
        } else if width < current {
            while self.indents.last().is_some_and(|&level| width < level) {
                self.indents.pop();
                tokens.push(self.layout_span(Token::Dedent));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error(
                    "unindent does not match any outer indentation level",
                    "",
                ));
            }
        }
        Ok(())
    }

    fn finish(&mut self, tokens: &mut Vec<TokenSpan>) {
        if tokens.is_empty() {
            return;
        }
        if !matches!(tokens.last().map(|t| &t.token), Some(Token::Newline)) {
            let newline = self.layout_span(Token::Newline);
            tokens.push(newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            let dedent = self.layout_span(Token::Dedent);
            tokens.push(dedent);
        }
    }

    fn layout_span(&self, token: Token) -> TokenSpan {
        TokenSpan {
            token,
            start: self.current_position,
            end: self.current_position,
            line: self.current_line,
            column: self.current_column,
        }
    }

    fn lex_error(&self, remaining: &str, e: nom::Err<VerboseError<&str>>) -> TokenizerError {
        let found = remaining.chars().take(20).collect::<String>();
        match e {
            nom::Err::Incomplete(needed) => {
                self.error(&format!("incomplete input, {:?}", needed), &found)
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                tracing::debug!("{}", nom::error::convert_error(remaining, e));
                let message = match remaining.chars().next() {
                    Some('"') | Some('\'') => "unterminated string literal".to_string(),
                    Some(c) => format!("invalid character {:?}", c),
                    None => "unexpected end of input".to_string(),
                };
                self.error(&message, &found)
            }
        }
    }

    fn error(&self, message: &str, found: &str) -> TokenizerError {
        TokenizerError::ParseError {
            message: message.to_string(),
            found: found.to_string(),
            span: Span {
                start: self.current_position,
                end: self.current_position + 1,
                line: self.current_line,
                column: self.current_column,
            },
        }
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

/// Returns the indentation column and the byte length of the indentation.
fn measure_indent(line: &str) -> (usize, usize) {
    let mut width = 0;
    let mut len = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            '\x0c' => width = 0,
            _ => break,
        }
        len += c.len_utf8();
    }
    (width, len)
}

fn is_blank_line(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n") || rest.starts_with('#')
}

#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    // Check if identifier is not a specials
    if let Ok(kw) = id.parse::<Keyword>() {
        return Ok((input, Token::Keyword(kw)));
    }
    if let Some(lit) = reserved_literal(id) {
        return Ok((input, Token::Literal(lit)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("{message} ({span})")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

impl TokenizerError {
    pub fn line(&self) -> usize {
        match self {
            TokenizerError::ParseError { span, .. } => span.line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<Token> {
        Tokenizer::new()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    fn ident(name: &str) -> Token {
        Token::Identifier(name.to_string())
    }

    #[test]
    fn test_identifier_for_keyword() {
        let (rest, token) = parse_identifier("while").unwrap();
        assert_eq!(token, Token::Keyword(Keyword::While));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_identifier() {
        let (rest, token) = parse_identifier("my_var123 other").unwrap();
        assert_eq!(token, ident("my_var123"));
        assert_eq!(rest, " other");
    }

    #[test]
    fn test_identifier_with_keyword_prefix() {
        let (_, token) = parse_identifier("iffy").unwrap();
        assert_eq!(token, ident("iffy"));
    }

    #[test]
    fn test_reserved_literals() {
        let (_, token) = parse_identifier("None").unwrap();
        assert_eq!(token, Token::Literal(Literal::None));
    }

    #[test]
    fn test_tokenizer_with_position() {
        let tokens = Tokenizer::new().tokenize("x\nother").unwrap();

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[0].token, ident("x"));

        let second = &tokens[2];
        assert_eq!(second.token, ident("other"));
        assert_eq!(second.line, 2);
        assert_eq!(second.column, 1);
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            kinds("1 + 1"),
            vec![
                Token::Literal(Literal::Integer(1)),
                Token::Operator(Operator::Plus),
                Token::Literal(Literal::Integer(1)),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_indented_block() {
        let tokens = kinds("if x:\n    y = 1\nz");
        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::If),
                ident("x"),
                Token::Delimiter(Delimiter::Colon),
                Token::Newline,
                Token::Indent,
                ident("y"),
                Token::Delimiter(Delimiter::Equal),
                Token::Literal(Literal::Integer(1)),
                Token::Newline,
                Token::Dedent,
                ident("z"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_dedents_closed_at_end_of_input() {
        let tokens = kinds("while x:\n  if y:\n    pass");
        let tail: Vec<_> = tokens.iter().rev().take(3).cloned().collect();
        assert_eq!(tail, vec![Token::Dedent, Token::Dedent, Token::Newline]);
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        let tokens = kinds("# heading\n\nx = 1\n   # indented comment\ny");
        assert!(!tokens.contains(&Token::Indent));
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 2);
    }

    #[test]
    fn test_comment_only_input_is_empty() {
        assert!(kinds("# nothing here\n   \n").is_empty());
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let tokens = kinds("x = [1,\n     2]\n");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 1);
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn test_line_continuation() {
        let tokens = kinds("x = 1 + \\\n    2");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 1);
    }

    #[test]
    fn test_tab_indentation() {
        let tokens = kinds("if x:\n\ty\n        z");
        // a tab and eight spaces land on the same column
        assert_eq!(tokens.iter().filter(|t| **t == Token::Indent).count(), 1);
        assert_eq!(tokens.iter().filter(|t| **t == Token::Dedent).count(), 1);
    }

    #[test]
    fn test_unexpected_indent() {
        let err = Tokenizer::new().tokenize("  x = 1").unwrap_err();
        assert!(err.to_string().contains("unexpected indent"));
    }

    #[test]
    fn test_inconsistent_dedent() {
        let err = Tokenizer::new()
            .tokenize("if x:\n    y\n  z")
            .unwrap_err();
        assert!(err.to_string().contains("unindent"));
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_invalid_character() {
        let err = Tokenizer::new().tokenize("x = $").unwrap_err();
        match err {
            TokenizerError::ParseError { message, found, span } => {
                assert!(message.contains("invalid character"));
                assert_eq!(found, "$");
                assert_eq!(span.column, 5);
            }
        }
    }

    #[test]
    fn test_unterminated_string() {
        let err = Tokenizer::new().tokenize("print('abc)").unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
    }
}
