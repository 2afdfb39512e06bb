use super::super::{core::*, prelude::*};
use super::common::*;
use super::expression::parse_expression;
use crate::ast::{AssignTarget, BinaryOperator, Expression, Statement, StatementKind, Statements};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

/// Parses the whole token stream as a sequence of statements.
///
/// Statements produced here carry the index of their first token in `line`;
/// [`crate::analyzer::parse_snippet`] rewrites it to the source line.
pub fn parse_program(input: &[Token], pos: usize) -> ParseResult<Statements> {
    let mut statements = Vec::new();
    let mut pos = pos;
    while pos < input.len() {
        reject_indent(input, pos)?;
        let (next, mut parsed) = parse_statement().parse(input, pos)?;
        statements.append(&mut parsed);
        pos = next;
    }
    Ok((pos, statements))
}

/// An indent where a statement should start would otherwise surface as
/// whichever statement rule got furthest.
fn reject_indent(input: &[Token], pos: usize) -> Result<(), ParseError> {
    match input.get(pos) {
        Some(Token::Indent) => Err(ParseError::Fail {
            message: "unexpected indent".to_string(),
            position: pos,
        }),
        _ => Ok(()),
    }
}

/// One compound statement, or one line of `;`-separated simple statements.
pub fn parse_statement() -> impl Parser<Token, Statements> {
    with_context(
        choice(vec![
            Box::new(map(parse_compound_statement(), |statement| vec![statement])),
            Box::new(parse_simple_line()),
        ]),
        "statement",
    )
}

fn parse_simple_line() -> impl Parser<Token, Statements> {
    with_context(
        map(
            tuple3(
                parse_simple_statement,
                many(preceded(
                    parse_delimiter(Delimiter::Semicolon),
                    parse_simple_statement,
                )),
                terminated(
                    optional(parse_delimiter(Delimiter::Semicolon)),
                    parse_newline(),
                ),
            ),
            |(first, rest, _)| {
                let mut statements = vec![first];
                statements.extend(rest);
                statements
            },
        ),
        "simple statement",
    )
}

fn parse_simple_statement(input: &[Token], pos: usize) -> ParseResult<Statement> {
    let (next, kind) = parse_simple_statement_kind().parse(input, pos)?;
    Ok((next, Statement::new(kind, pos)))
}

fn parse_simple_statement_kind() -> impl Parser<Token, StatementKind> {
    choice(vec![
        Box::new(map(parse_keyword(Keyword::Pass), |_| StatementKind::Pass)),
        Box::new(map(parse_keyword(Keyword::Break), |_| StatementKind::Break)),
        Box::new(map(parse_keyword(Keyword::Continue), |_| {
            StatementKind::Continue
        })),
        Box::new(parse_return_statement()),
        Box::new(parse_raise_statement()),
        Box::new(parse_assignment),
        Box::new(parse_aug_assignment),
        Box::new(map(parse_expression(), StatementKind::Expression)),
    ])
}

fn parse_return_statement() -> impl Parser<Token, StatementKind> {
    with_context(
        map(
            preceded(parse_keyword(Keyword::Return), optional(parse_expression())),
            StatementKind::Return,
        ),
        "return statement",
    )
}

fn parse_raise_statement() -> impl Parser<Token, StatementKind> {
    with_context(
        map(
            preceded(parse_keyword(Keyword::Raise), parse_expression()),
            StatementKind::Raise,
        ),
        "raise statement",
    )
}

fn assign_target(expr: Expression) -> Option<AssignTarget> {
    match expr {
        Expression::Variable(name) => Some(AssignTarget::Name(name)),
        Expression::Index { object, index } => Some(AssignTarget::Index {
            object: *object,
            index: *index,
        }),
        _ => None,
    }
}

fn invalid_target(position: usize) -> ParseError {
    ParseError::Fail {
        message: "cannot assign to expression".to_string(),
        position,
    }
}

fn parse_assignment(input: &[Token], pos: usize) -> ParseResult<StatementKind> {
    let (eq_pos, target) = parse_expression().parse(input, pos)?;
    let (value_pos, _) = parse_delimiter(Delimiter::Equal).parse(input, eq_pos)?;
    let (next, value) = parse_expression().parse(input, value_pos)?;
    let target = assign_target(target).ok_or_else(|| invalid_target(value_pos))?;
    Ok((next, StatementKind::Assignment { target, value }))
}

fn aug_operator() -> impl Parser<Token, BinaryOperator> {
    satisfy(
        |token: &Token| match token {
            Token::Operator(Operator::PlusEqual) => Some(BinaryOperator::Add),
            Token::Operator(Operator::MinusEqual) => Some(BinaryOperator::Subtract),
            Token::Operator(Operator::MultiplyEqual) => Some(BinaryOperator::Multiply),
            Token::Operator(Operator::DivideEqual) => Some(BinaryOperator::Divide),
            _ => None,
        },
        "augmented assignment",
    )
}

fn parse_aug_assignment(input: &[Token], pos: usize) -> ParseResult<StatementKind> {
    let (op_pos, target) = parse_expression().parse(input, pos)?;
    let (value_pos, op) = aug_operator().parse(input, op_pos)?;
    let (next, value) = parse_expression().parse(input, value_pos)?;
    let target = assign_target(target).ok_or_else(|| invalid_target(value_pos))?;
    Ok((next, StatementKind::AugAssignment { target, op, value }))
}

fn parse_compound_statement() -> impl Parser<Token, Statement> {
    with_context(
        choice(vec![
            Box::new(parse_if_statement),
            Box::new(parse_while_statement),
            Box::new(parse_for_statement),
        ]),
        "compound statement",
    )
}

/// `: suite` where the suite is either the rest of the line or an indented block.
fn parse_suite() -> impl Parser<Token, Statements> {
    preceded(
        parse_colon(),
        choice(vec![
            Box::new(nested(parse_block, "too many statically nested blocks")),
            Box::new(parse_simple_line()),
        ]),
    )
}

fn parse_block(input: &[Token], pos: usize) -> ParseResult<Statements> {
    let (mut pos, _) = tuple2(parse_newline(), parse_indent()).parse(input, pos)?;
    let mut statements = Vec::new();
    loop {
        if let Ok((next, _)) = parse_dedent().parse(input, pos) {
            return Ok((next, statements));
        }
        if pos >= input.len() {
            return Err(ParseError::EOF);
        }
        reject_indent(input, pos)?;
        let (next, mut parsed) = parse_statement().parse(input, pos)?;
        statements.append(&mut parsed);
        pos = next;
    }
}

fn parse_if_statement(input: &[Token], pos: usize) -> ParseResult<Statement> {
    let (next, (condition, then_block)) = preceded(
        parse_keyword(Keyword::If),
        tuple2(parse_expression(), parse_suite()),
    )
    .parse(input, pos)?;
    let (next, elifs) = many(preceded(
        parse_keyword(Keyword::Elif),
        tuple2(parse_expression(), parse_suite()),
    ))
    .parse(input, next)?;
    let (next, else_block) =
        optional(preceded(parse_keyword(Keyword::Else), parse_suite())).parse(input, next)?;

    let mut branches = vec![(condition, then_block)];
    branches.extend(elifs);
    Ok((
        next,
        Statement::new(StatementKind::If { branches, else_block }, pos),
    ))
}

fn parse_while_statement(input: &[Token], pos: usize) -> ParseResult<Statement> {
    let (next, (condition, body)) = preceded(
        parse_keyword(Keyword::While),
        tuple2(parse_expression(), parse_suite()),
    )
    .parse(input, pos)?;
    Ok((
        next,
        Statement::new(StatementKind::While { condition, body }, pos),
    ))
}

fn parse_for_statement(input: &[Token], pos: usize) -> ParseResult<Statement> {
    let (next, (variable, iterable, body)) = preceded(
        parse_keyword(Keyword::For),
        tuple3(
            terminated(parse_identifier(), parse_keyword(Keyword::In)),
            parse_expression(),
            parse_suite(),
        ),
    )
    .parse(input, pos)?;
    Ok((
        next,
        Statement::new(
            StatementKind::For {
                variable,
                iterable,
                body,
            },
            pos,
        ),
    ))
}

/// Rewrites token indices stored by the parser into 1-based source lines.
pub fn resolve_lines(statements: &mut [Statement], line_of: &dyn Fn(usize) -> usize) {
    for statement in statements {
        statement.line = line_of(statement.line);
        match &mut statement.kind {
            StatementKind::If {
                branches,
                else_block,
            } => {
                for (_, block) in branches.iter_mut() {
                    resolve_lines(block, line_of);
                }
                if let Some(block) = else_block {
                    resolve_lines(block, line_of);
                }
            }
            StatementKind::While { body, .. } | StatementKind::For { body, .. } => {
                resolve_lines(body, line_of)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::tokenizer::Tokenizer;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Result<Statements, ParseError> {
        let tokens: Vec<Token> = Tokenizer::new()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect();
        parse_program(&tokens, 0).map(|(_, statements)| statements)
    }

    fn kinds(input: &str) -> Vec<StatementKind> {
        parse(input).unwrap().into_iter().map(|s| s.kind).collect()
    }

    fn int(i: i64) -> Expression {
        Expression::Literal(Literal::Integer(i))
    }

    #[test]
    fn test_assignment_then_expression() {
        assert_eq!(
            kinds("x = 5\nx * 2"),
            vec![
                StatementKind::Assignment {
                    target: AssignTarget::Name("x".to_string()),
                    value: int(5),
                },
                StatementKind::Expression(Expression::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: Box::new(Expression::name("x")),
                    right: Box::new(int(2)),
                }),
            ]
        );
    }

    #[test]
    fn test_semicolon_separated_line() {
        let parsed = kinds("a = 1; b = 2;");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_index_and_augmented_assignment() {
        let parsed = kinds("d['k'] = 1\nn += 2");
        assert!(matches!(
            parsed[0],
            StatementKind::Assignment {
                target: AssignTarget::Index { .. },
                ..
            }
        ));
        assert!(matches!(
            parsed[1],
            StatementKind::AugAssignment {
                op: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_keywords_statements() {
        assert_eq!(
            kinds("pass\nreturn\nreturn 1\nraise ValueError('x')")[..3],
            [
                StatementKind::Pass,
                StatementKind::Return(None),
                StatementKind::Return(Some(int(1))),
            ]
        );
    }

    #[test]
    fn test_if_elif_else() {
        let parsed = kinds("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\ny");
        assert_eq!(parsed.len(), 2);
        match &parsed[0] {
            StatementKind::If {
                branches,
                else_block,
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(else_block.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_single_line_suite() {
        let parsed = kinds("while x: x -= 1");
        assert!(matches!(&parsed[0], StatementKind::While { body, .. } if body.len() == 1));
    }

    #[test]
    fn test_nested_for() {
        let parsed = kinds("for i in range(3):\n    for j in xs:\n        total += j\n    n += 1");
        match &parsed[0] {
            StatementKind::For { variable, body, .. } => {
                assert_eq!(variable, "i");
                assert_eq!(body.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("f() = 1").unwrap_err();
        assert_eq!(err.root().to_string(), "cannot assign to expression");
    }

    #[test]
    fn test_error_inside_block_propagates() {
        assert!(parse("if x:\n    y = (1 +\n").is_err());
        assert!(parse("while x:\n    y = = 2\n").is_err());
    }

    #[test]
    fn test_unexpected_indent_after_first_line() {
        let err = parse("x = 1\n  y = 2").unwrap_err();
        assert_eq!(err.root().to_string(), "unexpected indent");
        let err = parse("if x:\n    a = 1\n        b = 2").unwrap_err();
        assert_eq!(err.root().to_string(), "unexpected indent");
    }

    #[test]
    fn test_missing_colon() {
        let err = parse("if x\n    pass").unwrap_err();
        assert!(err.position().is_some());
    }

    #[test]
    fn test_resolve_lines() {
        let tokens: Vec<_> = Tokenizer::new().tokenize("a = 1\nif a:\n    b = 2").unwrap();
        let plain: Vec<Token> = tokens.iter().map(|t| t.token.clone()).collect();
        let (_, mut statements) = parse_program(&plain, 0).unwrap();
        resolve_lines(&mut statements, &|index| tokens[index].line);
        assert_eq!(statements[0].line, 1);
        assert_eq!(statements[1].line, 2);
        match &statements[1].kind {
            StatementKind::If { branches, .. } => assert_eq!(branches[0].1[0].line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse("# only a comment").unwrap(), vec![]);
    }
}
