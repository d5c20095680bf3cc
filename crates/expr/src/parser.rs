//! A `nom`-based parser for the STX expression, pattern and attribute value
//! template languages. The output is unresolved syntax; see `compile`.

use super::ast::*;
use crate::error::{ExprError, SourceLocation};
use crate::value::parse_number;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parsers ---

pub fn expression_ast(input: &str, location: &SourceLocation) -> Result<Expression, ExprError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(ExprError::parse(
            input,
            format!("Parser did not consume all input. Remainder: '{}'", rem),
            location,
        )),
        Err(e) => Err(ExprError::parse(input, e.to_string(), location)),
    }
}

/// Parses a match pattern: a union of location paths using only the child
/// and attribute axes. A leading `//` is redundant in a pattern and dropped.
pub fn pattern_ast(input: &str, location: &SourceLocation) -> Result<Expression, ExprError> {
    let expr = expression_ast(input, location)?;
    if !is_pattern_shape(&expr) {
        return Err(ExprError::parse(input, "Not a valid pattern", location));
    }
    Ok(strip_leading_descendant(expr))
}

/// Parses an attribute value template. `{{` and `}}` stand for literal braces.
pub fn avt_ast(input: &str, location: &SourceLocation) -> Result<Expression, ExprError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        if let Some(r) = rest.strip_prefix("{{") {
            text.push('{');
            rest = r;
        } else if let Some(r) = rest.strip_prefix("}}") {
            text.push('}');
            rest = r;
        } else if c == '{' {
            if !text.is_empty() {
                parts.push(AvtPart::Text(std::mem::take(&mut text)));
            }
            match terminated(ws(expression), char('}')).parse(&rest[1..]) {
                Ok((r, expr)) => {
                    parts.push(AvtPart::Expression(expr));
                    rest = r;
                }
                Err(e) => return Err(ExprError::parse(input, e.to_string(), location)),
            }
        } else if c == '}' {
            return Err(ExprError::parse(input, "Unmatched '}' in attribute value template", location));
        } else {
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    if !text.is_empty() {
        parts.push(AvtPart::Text(text));
    }
    Ok(Expression::Avt(parts))
}

fn is_pattern_shape(expr: &Expression) -> bool {
    match expr {
        Expression::Union(left, right) => is_pattern_shape(left) && is_pattern_shape(right),
        Expression::LocationPath(lp) => {
            lp.start_point.is_none()
                && lp
                    .steps
                    .iter()
                    .all(|s| matches!(s.axis, Axis::Child | Axis::Attribute))
        }
        _ => false,
    }
}

fn strip_leading_descendant(expr: Expression) -> Expression {
    match expr {
        Expression::Union(left, right) => Expression::Union(
            Box::new(strip_leading_descendant(*left)),
            Box::new(strip_leading_descendant(*right)),
        ),
        Expression::LocationPath(mut lp) if lp.is_absolute => {
            if let Some(first) = lp.steps.first_mut()
                && first.descendant
            {
                first.descendant = false;
                lp.is_absolute = false;
            }
            Expression::LocationPath(lp)
        }
        other => other,
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// An operator keyword that is not the prefix of a longer name.
fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("and"), |_| BinaryOperator::And).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("="), |_| BinaryOperator::Equals),
        map(tag("!="), |_| BinaryOperator::NotEquals),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag("&lt;="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("&gt;="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag("&lt;"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
        map(tag("&gt;"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(keyword("div"), |_| BinaryOperator::Divide),
        map(keyword("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(ws(char('-')), unary_expr), |expr| Expression::UnaryOp {
            op: UnaryOperator::Minus,
            expr: Box::new(expr),
        }),
        map(preceded(ws(char('+')), unary_expr), |expr| Expression::UnaryOp {
            op: UnaryOperator::Plus,
            expr: Box::new(expr),
        }),
        union_expr,
    ))
    .parse(input)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    let (input, mut left) = path_expr(input)?;
    let (input, rest) = many0(preceded(ws(char('|')), path_expr)).parse(input)?;
    for right in rest {
        left = Expression::Union(Box::new(left), Box::new(right));
    }
    Ok((input, left))
}

/// Handles the ambiguity between location paths and primary expressions that
/// might be followed by a path.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions first: `position()` must not be read as a step named
    // `position`.
    let (i, start_expr) =
        alt((filter_expr, map(location_path, Expression::LocationPath))).parse(input)?;

    let (i, remainder_steps) = many0(step_after_separator).parse(i)?;

    if remainder_steps.is_empty() {
        return Ok((i, start_expr));
    }

    let (start_point, is_absolute, mut steps) = match start_expr {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    steps.extend(remainder_steps);

    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }),
    ))
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, primary) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        Ok((i, primary))
    } else {
        Ok((
            i,
            Expression::Filter {
                primary: Box::new(primary),
                predicates,
            },
        ))
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        variable_reference,
        map(number_literal, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        parenthesized,
    )))
    .parse(input)
}

/// `()` is the empty sequence, `(a)` is just `a`, and `(a, b)` a sequence.
fn parenthesized(input: &str) -> IResult<&str, Expression> {
    map(
        delimited(
            ws(char('(')),
            separated_list0(ws(char(',')), expression),
            ws(char(')')),
        ),
        |mut members| match members.len() {
            0 => Expression::Empty,
            1 => members.remove(0),
            _ => Expression::Sequence(members),
        },
    )
    .parse(input)
}

// --- Literal Parsers ---

fn number_literal(input: &str) -> IResult<&str, f64> {
    map(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        parse_number,
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

// --- Name and NodeTest Parsers ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_name_start), take_while(is_name_char))).parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn empty_parens(input: &str) -> IResult<&str, ()> {
    map(pair(ws(char('(')), char(')')), |_| ()).parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTypeTest> {
    alt((
        map(
            preceded(
                pair(tag("processing-instruction"), ws(char('('))),
                terminated(opt(ws(string_literal)), char(')')),
            ),
            NodeTypeTest::ProcessingInstruction,
        ),
        map(terminated(tag("node"), empty_parens), |_| NodeTypeTest::Node),
        map(terminated(tag("text"), empty_parens), |_| NodeTypeTest::Text),
        map(terminated(tag("cdata"), empty_parens), |_| NodeTypeTest::Cdata),
        map(terminated(tag("comment"), empty_parens), |_| NodeTypeTest::Comment),
    ))
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(preceded(tag("*:"), nc_name), |local| {
            NodeTest::LocalWildcard(local.to_string())
        }),
        map(tag("*"), |_| NodeTest::Wildcard),
        map(node_type_test, NodeTest::NodeType),
        map(terminated(nc_name, tag(":*")), |prefix| {
            NodeTest::PrefixWildcard(prefix.to_string())
        }),
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        terminated(
            alt((tag("child"), tag("attribute"), tag("self"), tag("parent"))),
            tag("::"),
        ),
        |axis_str: &str| match axis_str {
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::NodeType(NodeTypeTest::Node))),
        map(terminated(char('.'), not(digit1)), |_| {
            (Axis::SelfAxis, NodeTest::NodeType(NodeTypeTest::Node))
        }),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            descendant: false,
            axis,
            node_test,
            predicates,
        },
    ))
}

fn step_after_separator(input: &str) -> IResult<&str, Step> {
    let (i, sep) = alt((tag("//"), tag("/"))).parse(input)?;
    let (i, mut next) = step(i)?;
    next.descendant = sep == "//";
    Ok((i, next))
}

/// A path that does not start with a variable or function call.
fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, (is_absolute, mut steps)) = if let Ok((rem, _)) =
        tag::<&str, &str, nom::error::Error<&str>>("//")(input)
    {
        let (rem, mut first) = step(rem)?;
        first.descendant = true;
        (rem, (true, vec![first]))
    } else if let Ok((rem, _)) = tag::<&str, &str, nom::error::Error<&str>>("/")(input) {
        if let Ok((rem, first)) = step(rem) {
            (rem, (true, vec![first]))
        } else {
            // The path is just "/"
            (rem, (true, vec![]))
        }
    } else {
        let (rem, first) = step(input)?;
        (rem, (false, vec![first]))
    };

    // Subsequent steps must be preceded by / or //.
    let (i, remainder) = many0(step_after_separator).parse(i)?;
    steps.extend(remainder);

    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

// --- Function Call Parser ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    // The lookahead keeps a step name like `foo` in `foo/bar` from being read
    // as a function.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;

    // Node-type tests are handled by the step parser.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "cdata" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expression {
        expression_ast(input, &SourceLocation::default()).unwrap()
    }

    fn child(name: &str) -> Step {
        Step {
            descendant: false,
            axis: Axis::Child,
            node_test: NodeTest::Name(name.into()),
            predicates: vec![],
        }
    }

    fn relative(steps: Vec<Step>) -> Expression {
        Expression::LocationPath(LocationPath {
            start_point: None,
            is_absolute: false,
            steps,
        })
    }

    #[test]
    fn test_parse_simple_path() {
        assert_eq!(parse("foo/bar"), relative(vec![child("foo"), child("bar")]));
    }

    #[test]
    fn test_parse_unary_minus() {
        assert_eq!(
            parse("-5"),
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(Expression::Number(5.0))
            }
        );

        let result = parse("10 - -5");
        if let Expression::BinaryOp { left, op, right } = result {
            assert_eq!(op, BinaryOperator::Minus);
            assert_eq!(*left, Expression::Number(10.0));
            assert_eq!(
                *right,
                Expression::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(Expression::Number(5.0))
                }
            );
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_path_starting_with_variable() {
        assert_eq!(
            parse("$myVar/foo"),
            Expression::LocationPath(LocationPath {
                start_point: Some(Box::new(Expression::Variable("myVar".to_string()))),
                is_absolute: false,
                steps: vec![child("foo")],
            })
        );
    }

    #[test]
    fn test_parse_predicate() {
        let result = parse("foo[@id = 'a']");
        let id_path = relative(vec![Step {
            descendant: false,
            axis: Axis::Attribute,
            node_test: NodeTest::Name("id".into()),
            predicates: vec![],
        }]);
        let mut foo = child("foo");
        foo.predicates.push(Expression::BinaryOp {
            left: Box::new(id_path),
            op: BinaryOperator::Equals,
            right: Box::new(Expression::Literal("a".into())),
        });
        assert_eq!(result, relative(vec![foo]));
    }

    #[test]
    fn test_parse_function_in_predicate() {
        let result = parse("para[position()=1]");
        if let Expression::LocationPath(lp) = result {
            assert_eq!(lp.steps.len(), 1);
            assert!(matches!(lp.steps[0].predicates[0], Expression::BinaryOp { .. }));
        } else {
            panic!("Expected LocationPath");
        }
    }

    #[test]
    fn test_parse_node_tests() {
        let result = parse("foo/text()");
        if let Expression::LocationPath(lp) = result {
            assert_eq!(lp.steps[1].node_test, NodeTest::NodeType(NodeTypeTest::Text));
        } else {
            panic!("Expected location path");
        }
        let result = parse("processing-instruction('render')");
        if let Expression::LocationPath(lp) = result {
            assert_eq!(
                lp.steps[0].node_test,
                NodeTest::NodeType(NodeTypeTest::ProcessingInstruction(Some("render".into())))
            );
        } else {
            panic!("Expected location path");
        }
        assert!(matches!(
            parse("p:*"),
            Expression::LocationPath(lp) if lp.steps[0].node_test == NodeTest::PrefixWildcard("p".into())
        ));
        assert!(matches!(
            parse("*:item"),
            Expression::LocationPath(lp) if lp.steps[0].node_test == NodeTest::LocalWildcard("item".into())
        ));
        assert!(matches!(
            parse("cdata()"),
            Expression::LocationPath(lp) if lp.steps[0].node_test == NodeTest::NodeType(NodeTypeTest::Cdata)
        ));
    }

    #[test]
    fn test_parse_abbreviated_steps() {
        if let Expression::LocationPath(lp) = parse("../@id") {
            assert_eq!(lp.steps[0].axis, Axis::Parent);
            assert_eq!(lp.steps[1].axis, Axis::Attribute);
        } else {
            panic!("Expected location path");
        }
        if let Expression::LocationPath(lp) = parse(".") {
            assert_eq!(lp.steps[0].axis, Axis::SelfAxis);
        } else {
            panic!("Expected location path for '.'");
        }
        assert_eq!(parse(".5"), Expression::Number(0.5));
    }

    #[test]
    fn test_parse_operator_precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expression::BinaryOp {
                left: Box::new(Expression::Number(1.0)),
                op: BinaryOperator::Plus,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(Expression::Number(2.0)),
                    op: BinaryOperator::Multiply,
                    right: Box::new(Expression::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_keywords_need_a_boundary() {
        // `order` and `division` are element names, not operators.
        assert_eq!(parse("order"), relative(vec![child("order")]));
        assert!(matches!(
            parse("division div 2"),
            Expression::BinaryOp { op: BinaryOperator::Divide, .. }
        ));
        assert!(matches!(
            parse("a or b"),
            Expression::BinaryOp { op: BinaryOperator::Or, .. }
        ));
        // Number parsing must not swallow names like `info` or `nan`.
        assert_eq!(parse("info"), relative(vec![child("info")]));
    }

    #[test]
    fn test_parse_sequences() {
        assert_eq!(parse("()"), Expression::Empty);
        assert_eq!(parse("(1)"), Expression::Number(1.0));
        assert_eq!(
            parse("(1, 'a')"),
            Expression::Sequence(vec![Expression::Number(1.0), Expression::Literal("a".into())])
        );
        assert!(matches!(parse("(1,2,3)[2]"), Expression::Filter { .. }));
    }

    #[test]
    fn test_parse_descendant() {
        let result = parse("//foo");
        if let Expression::LocationPath(lp) = result {
            assert!(lp.is_absolute);
            assert!(lp.steps[0].descendant);
        } else {
            panic!("Expected location path");
        }
        if let Expression::LocationPath(lp) = parse("a//b") {
            assert!(!lp.steps[0].descendant);
            assert!(lp.steps[1].descendant);
        } else {
            panic!("Expected location path");
        }
    }

    #[test]
    fn test_parse_xml_entities_in_relational_expr() {
        if let Expression::BinaryOp { op, .. } = parse("a &gt;= b") {
            assert_eq!(op, BinaryOperator::GreaterThanOrEqual);
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_pattern_drops_leading_descendant() {
        let loc = SourceLocation::default();
        let pattern = pattern_ast("//item", &loc).unwrap();
        assert_eq!(pattern, relative(vec![child("item")]));
        assert!(pattern_ast("$x", &loc).is_err());
        assert!(pattern_ast("../item", &loc).is_err());
        assert!(pattern_ast("a | /b", &loc).is_ok());
    }

    #[test]
    fn test_parse_avt() {
        let loc = SourceLocation::default();
        let avt = avt_ast("id-{@id}-{{x}}", &loc).unwrap();
        if let Expression::Avt(parts) = avt {
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], AvtPart::Text("id-".into()));
            assert!(matches!(parts[1], AvtPart::Expression(_)));
            assert_eq!(parts[2], AvtPart::Text("-{x}".into()));
        } else {
            panic!("Expected Avt");
        }
        assert!(avt_ast("broken}", &loc).is_err());
        assert!(avt_ast("{1 +", &loc).is_err());
    }

    #[test]
    fn test_parse_error_reports_remainder() {
        let err = expression_ast("1 +", &SourceLocation::default()).unwrap_err();
        assert!(matches!(err, ExprError::Parse { .. }));
    }
}
