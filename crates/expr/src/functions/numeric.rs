use crate::context::Context;
use crate::error::ExprError;
use crate::value::{Item, Value};

pub fn fn_number(ctx: &mut Context, top: usize, mut args: Vec<Value>) -> Result<Value, ExprError> {
    let n = if args.is_empty() {
        ctx.node(top)
            .map(|n| Item::Node(n.clone()).to_number())
            .unwrap_or(f64::NAN)
    } else {
        args.remove(0).to_number()
    };
    Ok(Value::from_number(n))
}

fn numbers(seq: &Value) -> Vec<f64> {
    seq.iter().map(Item::to_number).collect()
}

pub fn fn_sum(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let total: f64 = numbers(&args.remove(0)).into_iter().sum();
    Ok(Value::from_number(total))
}

fn fold_extreme(seq: &Value, pick: fn(f64, f64) -> f64) -> Value {
    let values = numbers(seq);
    if values.is_empty() {
        return Value::empty();
    }
    if values.iter().any(|n| n.is_nan()) {
        return Value::from_number(f64::NAN);
    }
    Value::from_number(values.into_iter().reduce(pick).unwrap_or(f64::NAN))
}

pub fn fn_min(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(fold_extreme(&args.remove(0), f64::min))
}

pub fn fn_max(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(fold_extreme(&args.remove(0), f64::max))
}

pub fn fn_avg(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let values = numbers(&args.remove(0));
    if values.is_empty() {
        return Ok(Value::empty());
    }
    let count = values.len() as f64;
    Ok(Value::from_number(values.into_iter().sum::<f64>() / count))
}

fn map_number(mut args: Vec<Value>, f: fn(f64) -> f64) -> Result<Value, ExprError> {
    let arg = args.remove(0);
    if arg.is_empty() {
        return Ok(Value::empty());
    }
    Ok(Value::from_number(f(arg.to_number())))
}

pub fn fn_floor(args: Vec<Value>) -> Result<Value, ExprError> {
    map_number(args, f64::floor)
}

pub fn fn_ceiling(args: Vec<Value>) -> Result<Value, ExprError> {
    map_number(args, f64::ceil)
}

/// Halves round towards positive infinity.
pub fn fn_round(args: Vec<Value>) -> Result<Value, ExprError> {
    map_number(args, |n| {
        if n.is_nan() || n.is_infinite() || n == 0.0 {
            n
        } else {
            (n + 0.5).floor()
        }
    })
}
