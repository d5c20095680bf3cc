//! The resolved expression tree. Every name in a `Tree` is already an
//! expanded name; matching and evaluation never look at prefixes.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::functions::Function;
use crate::name::ExpandedName;
use crate::node::PositionKey;
use crate::scope::GroupId;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// `/`
    Root,
    /// `A/B`
    Child(Box<Tree>, Box<Tree>),
    /// `A//B`
    Desc(Box<Tree>, Box<Tree>),
    /// `A | B`
    Union(Box<Tree>, Box<Tree>),
    /// `A[B]`
    Predicate(Box<Tree>, Box<Tree>),
    /// `.`
    Dot,
    /// `..`
    DotDot,

    NameTest(ExpandedName),
    /// `*`
    Wildcard,
    /// `p:*`, holding the namespace URI of `p`
    UriWildcard(String),
    /// `*:local`
    LocalWildcard(String),
    AttrNameTest(ExpandedName),
    AttrWildcard,
    AttrUriWildcard(String),
    AttrLocalWildcard(String),
    NodeTest,
    TextTest,
    CdataTest,
    CommentTest,
    PiTest(Option<String>),

    Number(f64),
    String(String),
    /// `()`
    Empty,
    Unary(UnaryOperator, Box<Tree>),
    Binary(Box<Tree>, BinaryOperator, Box<Tree>),
    /// Separator in a function argument list. Only valid below `Function`.
    List(Box<Tree>, Box<Tree>),
    /// `(A, B, ...)`
    Seq(Vec<Tree>),
    /// Attribute value template parts, concatenated as strings.
    Avt(Vec<Tree>),
    Var(VarRef),
    Function(FunctionCall),
}

/// A variable reference with its lexically enclosing group.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: ExpandedName,
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub function: Rc<Function>,
    /// The arguments as a right-nested `List` chain.
    pub args: Option<Box<Tree>>,
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.function.name() == other.function.name() && self.args == other.args
    }
}

impl FunctionCall {
    pub fn new(function: Rc<Function>, args: Vec<Tree>) -> Self {
        let mut chain: Option<Box<Tree>> = None;
        for arg in args.into_iter().rev() {
            chain = Some(Box::new(match chain {
                None => arg,
                Some(rest) => Tree::List(Box::new(arg), rest),
            }));
        }
        Self {
            function,
            args: chain,
        }
    }

    /// The argument expressions in order.
    pub fn arguments(&self) -> Vec<&Tree> {
        let mut out = Vec::new();
        let mut current = self.args.as_deref();
        while let Some(tree) = current {
            match tree {
                Tree::List(head, rest) => {
                    out.push(head.as_ref());
                    current = Some(rest);
                }
                last => {
                    out.push(last);
                    current = None;
                }
            }
        }
        out
    }
}

impl Tree {
    pub fn child(left: Tree, right: Tree) -> Tree {
        Tree::Child(Box::new(left), Box::new(right))
    }

    pub fn desc(left: Tree, right: Tree) -> Tree {
        Tree::Desc(Box::new(left), Box::new(right))
    }

    pub fn union(left: Tree, right: Tree) -> Tree {
        Tree::Union(Box::new(left), Box::new(right))
    }

    pub fn predicate(left: Tree, right: Tree) -> Tree {
        Tree::Predicate(Box::new(left), Box::new(right))
    }

    pub fn binary(left: Tree, op: BinaryOperator, right: Tree) -> Tree {
        Tree::Binary(Box::new(left), op, Box::new(right))
    }

    /// Default conflict-resolution priority of this tree used as a pattern.
    pub fn priority(&self) -> f64 {
        match self {
            Tree::NameTest(_) | Tree::AttrNameTest(_) | Tree::PiTest(Some(_)) => 0.0,
            Tree::UriWildcard(_)
            | Tree::LocalWildcard(_)
            | Tree::AttrUriWildcard(_)
            | Tree::AttrLocalWildcard(_) => -0.25,
            Tree::Wildcard
            | Tree::AttrWildcard
            | Tree::NodeTest
            | Tree::TextTest
            | Tree::CdataTest
            | Tree::CommentTest
            | Tree::PiTest(None) => -0.5,
            Tree::Union(..) => f64::NAN,
            _ => 0.5,
        }
    }

    /// Whether repeated evaluation always yields the same value.
    pub fn is_constant(&self) -> bool {
        match self {
            Tree::Number(_) | Tree::String(_) | Tree::Empty => true,
            Tree::Unary(_, operand) => operand.is_constant(),
            Tree::Binary(left, _, right) | Tree::List(left, right) => {
                left.is_constant() && right.is_constant()
            }
            Tree::Seq(parts) | Tree::Avt(parts) => parts.iter().all(Tree::is_constant),
            Tree::Function(call) => {
                call.function.is_constant() && call.arguments().iter().all(|a| a.is_constant())
            }
            _ => false,
        }
    }

    /// Whether the tree reads `.` as its own context item. Predicates and
    /// later steps of a path see other nodes, so only path bases count.
    pub fn uses_context_item(&self) -> bool {
        match self {
            Tree::Dot => true,
            Tree::Child(base, _) | Tree::Desc(base, _) | Tree::Predicate(base, _) => {
                base.uses_context_item()
            }
            Tree::Union(left, right) | Tree::Binary(left, _, right) | Tree::List(left, right) => {
                left.uses_context_item() || right.uses_context_item()
            }
            Tree::Unary(_, operand) => operand.uses_context_item(),
            Tree::Seq(parts) | Tree::Avt(parts) => parts.iter().any(Tree::uses_context_item),
            Tree::Function(call) => call.arguments().iter().any(|a| a.uses_context_item()),
            _ => false,
        }
    }

    /// Splits a union pattern into its alternatives.
    pub fn split_union(&self) -> Vec<&Tree> {
        match self {
            Tree::Union(left, right) => {
                let mut parts = left.split_union();
                parts.extend(right.split_union());
                parts
            }
            other => vec![other],
        }
    }

    /// Trees that select nodes from the ancestor stack.
    pub fn is_path(&self) -> bool {
        match self {
            Tree::Root
            | Tree::Child(..)
            | Tree::Desc(..)
            | Tree::Union(..)
            | Tree::Dot
            | Tree::DotDot => true,
            Tree::Predicate(left, _) => left.is_path(),
            other => other.is_node_test(),
        }
    }

    /// A single step test: element, kind or attribute.
    pub fn is_node_test(&self) -> bool {
        self.is_element_test() || self.is_attribute_test()
    }

    pub fn is_attribute_test(&self) -> bool {
        matches!(
            self,
            Tree::AttrNameTest(_)
                | Tree::AttrWildcard
                | Tree::AttrUriWildcard(_)
                | Tree::AttrLocalWildcard(_)
        )
    }

    pub fn is_element_test(&self) -> bool {
        matches!(
            self,
            Tree::NameTest(_)
                | Tree::Wildcard
                | Tree::UriWildcard(_)
                | Tree::LocalWildcard(_)
                | Tree::NodeTest
                | Tree::TextTest
                | Tree::CdataTest
                | Tree::CommentTest
                | Tree::PiTest(_)
        )
    }

    /// The sibling counter a non-attribute step test ranks its matches by.
    pub fn position_key(&self) -> Option<PositionKey> {
        Some(match self {
            Tree::NameTest(name) => PositionKey::ElementName {
                uri: name.uri.clone(),
                local_name: name.local_name.clone(),
            },
            Tree::Wildcard => PositionKey::AnyElement,
            Tree::UriWildcard(uri) => PositionKey::ElementInNamespace(uri.clone()),
            Tree::LocalWildcard(local) => PositionKey::ElementLocalName(local.clone()),
            Tree::NodeTest => PositionKey::AnyNode,
            Tree::TextTest => PositionKey::Text,
            Tree::CdataTest => PositionKey::Cdata,
            Tree::CommentTest => PositionKey::Comment,
            Tree::PiTest(None) => PositionKey::ProcessingInstruction,
            Tree::PiTest(Some(target)) => PositionKey::ProcessingInstructionTarget(target.clone()),
            _ => return None,
        })
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Root => write!(f, "/"),
            Tree::Child(l, r) => match l.as_ref() {
                Tree::Root => write!(f, "/{}", r),
                _ => write!(f, "{}/{}", l, r),
            },
            Tree::Desc(l, r) => match l.as_ref() {
                Tree::Root => write!(f, "//{}", r),
                _ => write!(f, "{}//{}", l, r),
            },
            Tree::Union(l, r) => write!(f, "{} | {}", l, r),
            Tree::Predicate(l, r) => write!(f, "{}[{}]", l, r),
            Tree::Dot => write!(f, "."),
            Tree::DotDot => write!(f, ".."),
            Tree::NameTest(n) => write!(f, "{}", n),
            Tree::Wildcard => write!(f, "*"),
            Tree::UriWildcard(u) => write!(f, "{{{}}}*", u),
            Tree::LocalWildcard(l) => write!(f, "*:{}", l),
            Tree::AttrNameTest(n) => write!(f, "@{}", n),
            Tree::AttrWildcard => write!(f, "@*"),
            Tree::AttrUriWildcard(u) => write!(f, "@{{{}}}*", u),
            Tree::AttrLocalWildcard(l) => write!(f, "@*:{}", l),
            Tree::NodeTest => write!(f, "node()"),
            Tree::TextTest => write!(f, "text()"),
            Tree::CdataTest => write!(f, "cdata()"),
            Tree::CommentTest => write!(f, "comment()"),
            Tree::PiTest(None) => write!(f, "processing-instruction()"),
            Tree::PiTest(Some(t)) => write!(f, "processing-instruction('{}')", t),
            Tree::Number(n) => write!(f, "{}", crate::value::format_number(*n)),
            Tree::String(s) => write!(f, "'{}'", s),
            Tree::Empty => write!(f, "()"),
            Tree::Unary(UnaryOperator::Minus, e) => write!(f, "-{}", e),
            Tree::Unary(UnaryOperator::Plus, e) => write!(f, "+{}", e),
            Tree::Binary(l, op, r) => write!(f, "({} {} {})", l, op.as_str(), r),
            Tree::List(l, r) => write!(f, "{}, {}", l, r),
            Tree::Seq(parts) => {
                write!(f, "(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
            Tree::Avt(parts) => {
                for p in parts {
                    match p {
                        Tree::String(s) => write!(f, "{}", s)?,
                        other => write!(f, "{{{}}}", other)?,
                    }
                }
                Ok(())
            }
            Tree::Var(v) => write!(f, "${}", v.name),
            Tree::Function(call) => {
                write!(f, "{}(", call.function.name())?;
                if let Some(args) = &call.args {
                    write!(f, "{}", args)?;
                }
                write!(f, ")")
            }
        }
    }
}
