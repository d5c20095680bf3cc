//! Turns parsed syntax into resolved `Tree`s: prefixes become namespace
//! URIs, function names are bound to registry entries and variable
//! references are tied to their lexical group.

use crate::ast::{Axis, AvtPart, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
use crate::error::{ExprError, SourceLocation};
use crate::functions::{FunctionRegistry, STX_FUNCTIONS_NS};
use crate::name::{ExpandedName, split_qname};
use crate::parser::{avt_ast, expression_ast, pattern_ast};
use crate::scope::GroupId;
use crate::tree::{FunctionCall, Tree, VarRef};
use std::collections::HashMap;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Everything name resolution needs to know about the place an expression
/// occurs in.
#[derive(Debug, Clone)]
pub struct StaticContext<'r> {
    namespaces: HashMap<String, String>,
    default_element_namespace: String,
    attributes_use_default_namespace: bool,
    registry: &'r FunctionRegistry,
    group: Option<GroupId>,
    location: SourceLocation,
}

impl<'r> StaticContext<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self {
            namespaces: HashMap::new(),
            default_element_namespace: String::new(),
            attributes_use_default_namespace: false,
            registry,
            group: None,
            location: SourceLocation::default(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_namespaces(mut self, namespaces: impl IntoIterator<Item = (String, String)>) -> Self {
        self.namespaces.extend(namespaces);
        self
    }

    pub fn with_default_element_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_element_namespace = uri.into();
        self
    }

    /// Unprefixed attribute names normally are in no namespace.
    pub fn with_attributes_use_default_namespace(mut self, enabled: bool) -> Self {
        self.attributes_use_default_namespace = enabled;
        self
    }

    /// The group variable references are resolved in.
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<String, ExprError> {
        if prefix == "xml" {
            return Ok(XML_NS.to_string());
        }
        self.namespaces
            .get(prefix)
            .cloned()
            .ok_or_else(|| ExprError::UndeclaredPrefix {
                prefix: prefix.to_string(),
                location: self.location.clone(),
            })
    }

    fn qualified(&self, qname: &str, unprefixed_uri: &str) -> Result<ExpandedName, ExprError> {
        match split_qname(qname) {
            (Some(prefix), local) => Ok(ExpandedName::new(self.resolve_prefix(prefix)?, local)),
            (None, local) => Ok(ExpandedName::new(unprefixed_uri, local)),
        }
    }

    fn element_name(&self, qname: &str) -> Result<ExpandedName, ExprError> {
        self.qualified(qname, &self.default_element_namespace)
    }

    fn attribute_name(&self, qname: &str) -> Result<ExpandedName, ExprError> {
        if self.attributes_use_default_namespace {
            self.qualified(qname, &self.default_element_namespace)
        } else {
            self.qualified(qname, "")
        }
    }
}

/// Compiles an expression.
pub fn parse_expression(text: &str, sc: &StaticContext<'_>) -> Result<Tree, ExprError> {
    let ast = expression_ast(text, &sc.location)?;
    let tree = Compiler { sc, text }.expression(&ast)?;
    log::debug!("Compiled expression '{}' as {}", text, tree);
    Ok(tree)
}

/// Compiles a match pattern. Only child and attribute steps are allowed.
pub fn parse_pattern(text: &str, sc: &StaticContext<'_>) -> Result<Tree, ExprError> {
    let ast = pattern_ast(text, &sc.location)?;
    let tree = Compiler { sc, text }.expression(&ast)?;
    log::debug!("Compiled pattern '{}' as {} (priority {})", text, tree, tree.priority());
    Ok(tree)
}

/// Compiles an attribute value template.
pub fn parse_avt(text: &str, sc: &StaticContext<'_>) -> Result<Tree, ExprError> {
    let ast = avt_ast(text, &sc.location)?;
    Compiler { sc, text }.expression(&ast)
}

struct Compiler<'s, 'r> {
    sc: &'s StaticContext<'r>,
    text: &'s str,
}

impl Compiler<'_, '_> {
    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::parse(self.text, message, &self.sc.location)
    }

    fn expression(&self, expr: &Expression) -> Result<Tree, ExprError> {
        Ok(match expr {
            Expression::Literal(s) => Tree::String(s.clone()),
            Expression::Number(n) => Tree::Number(*n),
            Expression::Empty => Tree::Empty,
            Expression::Sequence(items) => Tree::Seq(self.all(items)?),
            Expression::Variable(qname) => Tree::Var(VarRef {
                name: self.sc.qualified(qname, "")?,
                group: self.sc.group,
            }),
            Expression::FunctionCall { name, args } => {
                let name = self.sc.qualified(name, STX_FUNCTIONS_NS)?;
                let args = self.all(args)?;
                let function = self.sc.registry.resolve(&name, args.len(), &self.sc.location)?;
                Tree::Function(FunctionCall::new(function, args))
            }
            Expression::BinaryOp { left, op, right } => {
                Tree::binary(self.expression(left)?, *op, self.expression(right)?)
            }
            Expression::UnaryOp { op, expr } => Tree::Unary(*op, Box::new(self.expression(expr)?)),
            Expression::Union(left, right) => {
                Tree::union(self.expression(left)?, self.expression(right)?)
            }
            Expression::LocationPath(path) => self.location_path(path)?,
            Expression::Filter { primary, predicates } => {
                self.with_predicates(self.expression(primary)?, predicates)?
            }
            Expression::Avt(parts) => Tree::Avt(
                parts
                    .iter()
                    .map(|part| match part {
                        AvtPart::Text(text) => Ok(Tree::String(text.clone())),
                        AvtPart::Expression(e) => self.expression(e),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn all(&self, exprs: &[Expression]) -> Result<Vec<Tree>, ExprError> {
        exprs.iter().map(|e| self.expression(e)).collect()
    }

    fn with_predicates(&self, mut tree: Tree, predicates: &[Expression]) -> Result<Tree, ExprError> {
        for predicate in predicates {
            tree = Tree::predicate(tree, self.expression(predicate)?);
        }
        Ok(tree)
    }

    fn location_path(&self, path: &LocationPath) -> Result<Tree, ExprError> {
        let mut current = match (&path.start_point, path.is_absolute) {
            (Some(start), _) => Some(self.expression(start)?),
            (None, true) => Some(Tree::Root),
            (None, false) => None,
        };
        for step in &path.steps {
            let next = self.step(step)?;
            current = Some(match current {
                None if step.descendant => Tree::desc(Tree::Dot, next),
                None => next,
                Some(left) if step.descendant => Tree::desc(left, next),
                Some(left) => Tree::child(left, next),
            });
        }
        current.ok_or_else(|| self.error("Empty location path"))
    }

    fn step(&self, step: &Step) -> Result<Tree, ExprError> {
        let test = match step.axis {
            Axis::Child => self.element_test(&step.node_test)?,
            Axis::Attribute => self.attribute_test(&step.node_test)?,
            Axis::SelfAxis => self.any_node(&step.node_test, Tree::Dot, "self")?,
            Axis::Parent => self.any_node(&step.node_test, Tree::DotDot, "parent")?,
        };
        self.with_predicates(test, &step.predicates)
    }

    fn element_test(&self, test: &NodeTest) -> Result<Tree, ExprError> {
        Ok(match test {
            NodeTest::Name(qname) => Tree::NameTest(self.sc.element_name(qname)?),
            NodeTest::Wildcard => Tree::Wildcard,
            NodeTest::PrefixWildcard(prefix) => Tree::UriWildcard(self.sc.resolve_prefix(prefix)?),
            NodeTest::LocalWildcard(local) => Tree::LocalWildcard(local.clone()),
            NodeTest::NodeType(NodeTypeTest::Node) => Tree::NodeTest,
            NodeTest::NodeType(NodeTypeTest::Text) => Tree::TextTest,
            NodeTest::NodeType(NodeTypeTest::Cdata) => Tree::CdataTest,
            NodeTest::NodeType(NodeTypeTest::Comment) => Tree::CommentTest,
            NodeTest::NodeType(NodeTypeTest::ProcessingInstruction(target)) => {
                Tree::PiTest(target.clone())
            }
        })
    }

    fn attribute_test(&self, test: &NodeTest) -> Result<Tree, ExprError> {
        match test {
            NodeTest::Name(qname) => Ok(Tree::AttrNameTest(self.sc.attribute_name(qname)?)),
            NodeTest::Wildcard | NodeTest::NodeType(NodeTypeTest::Node) => Ok(Tree::AttrWildcard),
            NodeTest::PrefixWildcard(prefix) => {
                Ok(Tree::AttrUriWildcard(self.sc.resolve_prefix(prefix)?))
            }
            NodeTest::LocalWildcard(local) => Ok(Tree::AttrLocalWildcard(local.clone())),
            NodeTest::NodeType(_) => Err(self.error("Only node() is allowed on the attribute axis")),
        }
    }

    fn any_node(&self, test: &NodeTest, tree: Tree, axis: &str) -> Result<Tree, ExprError> {
        match test {
            NodeTest::NodeType(NodeTypeTest::Node) => Ok(tree),
            _ => Err(self.error(format!("Only node() is allowed on the {} axis", axis))),
        }
    }
}
