//! Comparison and arithmetic over sequences.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::value::{Item, Value};

/// Existential comparison: true if some pair of items from the two
/// sequences satisfies `op`. Comparing against an empty sequence is false.
pub fn compare(op: BinaryOperator, left: &Value, right: &Value) -> bool {
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.iter()
        .any(|a| right.iter().any(|b| compare_items(op, a, b)))
}

fn compare_items(op: BinaryOperator, a: &Item, b: &Item) -> bool {
    match op {
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = if a.is_boolean() || b.is_boolean() {
                a.to_boolean() == b.to_boolean()
            } else if a.is_number() || b.is_number() {
                a.to_number() == b.to_number()
            } else {
                a.to_string_value() == b.to_string_value()
            };
            if op == BinaryOperator::Equals {
                equal
            } else {
                !equal
            }
        }
        BinaryOperator::LessThan => a.to_number() < b.to_number(),
        BinaryOperator::LessThanOrEqual => a.to_number() <= b.to_number(),
        BinaryOperator::GreaterThan => a.to_number() > b.to_number(),
        BinaryOperator::GreaterThanOrEqual => a.to_number() >= b.to_number(),
        _ => false,
    }
}

/// `+ - * div mod` on the first items of both operands. An empty operand
/// makes the result empty.
pub fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    if left.is_empty() || right.is_empty() {
        return Value::empty();
    }
    let (a, b) = (left.to_number(), right.to_number());
    let result = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        BinaryOperator::Modulo => a % b,
        _ => f64::NAN,
    };
    Value::from_number(result)
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Value {
    if operand.is_empty() {
        return Value::empty();
    }
    let n = operand.to_number();
    Value::from_number(match op {
        UnaryOperator::Plus => n,
        UnaryOperator::Minus => -n,
    })
}

pub fn is_comparison(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Equals
            | BinaryOperator::NotEquals
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual
    )
}
