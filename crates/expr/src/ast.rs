//! Defines the raw syntax tree produced by the parser. Names are still lexical
//! QNames here; `compile` resolves them into a [`crate::tree::Tree`].

/// A parsed expression before namespace resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    /// `()`
    Empty,
    /// `(a, b, ...)` with at least two members.
    Sequence(Vec<Expression>),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    Union(Box<Expression>, Box<Expression>),
    LocationPath(LocationPath),
    /// A primary expression followed by predicates, like `$items[2]`.
    Filter {
        primary: Box<Expression>,
        predicates: Vec<Expression>,
    },
    /// An attribute value template: literal text interleaved with `{expr}`.
    Avt(Vec<AvtPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Text(String),
    Expression(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Logical
    Or,
    And,
    // Equality
    Equals,
    NotEquals,
    // Relational
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Additive
    Plus,
    Minus,
    // Multiplicative
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Equals => "=",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "div",
            BinaryOperator::Modulo => "mod",
        }
    }
}

/// A location path like `/doc//item[1]/@id` or `$var/item`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// A starting expression, for paths like `$var/item`.
    pub start_point: Option<Box<Expression>>,
    /// True if the path starts at the document root.
    pub is_absolute: bool,
    pub steps: Vec<Step>,
}

/// One step of a location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The step was introduced by `//` instead of `/`.
    pub descendant: bool,
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

/// Streaming only knows the ancestor chain, so only these axes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Attribute,
    /// `.`
    SelfAxis,
    /// `..`
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A qualified name test (e.g., `item`, `p:item`).
    Name(String),
    /// `*`
    Wildcard,
    /// `p:*`
    PrefixWildcard(String),
    /// `*:local`
    LocalWildcard(String),
    NodeType(NodeTypeTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTypeTest {
    Node,
    Text,
    Cdata,
    Comment,
    ProcessingInstruction(Option<String>),
}
