//! Syntax tree of a snippet.
//!
//! The tree is produced by [`crate::analyzer`], rewritten by the
//! [`crate::engine::synthesizer`] and walked by [`crate::eval`].

/// A statement together with the 1-based source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

impl Statement {
    pub fn new(kind: StatementKind, line: usize) -> Self {
        Self { kind, line }
    }
}

pub type Statements = Vec<Statement>;

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Expression(Expression),
    Assignment {
        target: AssignTarget,
        value: Expression,
    },
    AugAssignment {
        target: AssignTarget,
        op: BinaryOperator,
        value: Expression,
    },
    Return(Option<Expression>),
    Raise(Expression),
    If {
        branches: Vec<(Expression, Statements)>,
        else_block: Option<Statements>,
    },
    While {
        condition: Expression,
        body: Statements,
    },
    For {
        variable: String,
        iterable: Expression,
        body: Statements,
    },
    Break,
    Continue,
    Pass,
    /// Publishes the caller identity carried by `binding` into the frame's
    /// global view. Only ever inserted by the synthesizer.
    MergeIdentity {
        binding: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Index {
        object: Expression,
        index: Expression,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    List(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Argument>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// Short-circuiting `and` / `or`; the result is one of the operands.
    Logical {
        op: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Chained comparison `a < b <= c`.
    Compare {
        first: Box<Expression>,
        rest: Vec<(CompareOperator, Expression)>,
    },
    Await(Box<Expression>),
}

impl Expression {
    pub fn name(name: &str) -> Self {
        Expression::Variable(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Named { name: String, value: Expression },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "//")]
    FloorDivide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "**")]
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "not")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LogicalOperator {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CompareOperator {
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
}
