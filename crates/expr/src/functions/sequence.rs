use crate::ast::BinaryOperator;
use crate::context::Context;
use crate::error::ExprError;
use crate::operators::compare;
use crate::value::{Item, Value};

pub fn fn_position(ctx: &mut Context, _top: usize, _args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_number(ctx.position as f64))
}

pub fn fn_count(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let seq = args.remove(0);
    Ok(Value::from_number(seq.len() as f64))
}

pub fn fn_empty(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(args.remove(0).is_empty()))
}

pub fn fn_exists(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(!args.remove(0).is_empty()))
}

/// Positions of the items equal to the search item.
pub fn fn_index_of(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let search = args.remove(1);
    let seq = args.remove(0);
    let positions = seq.into_items().into_iter().enumerate().filter_map(|(i, item)| {
        compare(BinaryOperator::Equals, &Value::from_item(item), &search)
            .then(|| Item::Number((i + 1) as f64))
    });
    Ok(Value::from_items(positions))
}

/// Items at positions `p` with `round(start) <= p < round(start) + round(length)`.
pub fn fn_subsequence(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let length = if args.len() == 3 {
        Some(round_half_up(args.remove(2).to_number()))
    } else {
        None
    };
    let start = round_half_up(args.remove(1).to_number());
    let end = length.map_or(f64::INFINITY, |l| start + l);
    let seq = args.remove(0);

    let items = seq.into_items().into_iter().enumerate().filter_map(|(i, item)| {
        let pos = (i + 1) as f64;
        (pos >= start && pos < end).then_some(item)
    });
    Ok(Value::from_items(items))
}

pub fn fn_item_at(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let index = args.remove(1).to_number();
    let seq = args.remove(0);
    let len = seq.len();
    if index.is_nan() || index < 1.0 || index > len as f64 || index.fract() != 0.0 {
        return Err(ExprError::function(
            "item-at",
            format!("index {} is out of range for a sequence of {} item(s)", index, len),
        ));
    }
    let item = seq.into_items().swap_remove(index as usize - 1);
    Ok(Value::from_item(item))
}

pub fn fn_insert_before(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let inserts = args.remove(2);
    let position = args.remove(1).to_number();
    let mut items = args.remove(0).into_items();
    let at = if position.is_nan() || position < 1.0 {
        0
    } else {
        ((position as usize) - 1).min(items.len())
    };
    let tail = items.split_off(at);
    items.extend(inserts.into_items());
    items.extend(tail);
    Ok(Value::from_items(items))
}

pub fn fn_remove(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let position = args.remove(1).to_number();
    let mut items = args.remove(0).into_items();
    if position >= 1.0 && position <= items.len() as f64 {
        items.remove(position as usize - 1);
    }
    Ok(Value::from_items(items))
}

pub fn fn_reverse(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let mut items = args.remove(0).into_items();
    items.reverse();
    Ok(Value::from_items(items))
}

fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(ns: &[f64]) -> Value {
        Value::from_items(ns.iter().map(|n| Item::Number(*n)))
    }

    #[test]
    fn test_subsequence() {
        let seq = nums(&[10.0, 20.0, 30.0, 40.0]);
        let result = fn_subsequence(vec![seq.clone(), Value::from_number(2.0), Value::from_number(2.0)]);
        assert_eq!(result.unwrap(), nums(&[20.0, 30.0]));
        let result = fn_subsequence(vec![seq.clone(), Value::from_number(3.0)]);
        assert_eq!(result.unwrap(), nums(&[30.0, 40.0]));
        let result = fn_subsequence(vec![seq, Value::from_number(0.0), Value::from_number(2.0)]);
        assert_eq!(result.unwrap(), nums(&[10.0]));
    }

    #[test]
    fn test_item_at() {
        let seq = nums(&[1.0, 2.0, 3.0]);
        assert_eq!(
            fn_item_at(vec![seq.clone(), Value::from_number(2.0)]).unwrap(),
            Value::from_number(2.0)
        );
        let err = fn_item_at(vec![seq, Value::from_number(4.0)]).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_insert_remove_reverse() {
        let seq = nums(&[1.0, 2.0, 3.0]);
        assert_eq!(
            fn_insert_before(vec![seq.clone(), Value::from_number(2.0), nums(&[9.0, 8.0])]).unwrap(),
            nums(&[1.0, 9.0, 8.0, 2.0, 3.0])
        );
        assert_eq!(
            fn_insert_before(vec![seq.clone(), Value::from_number(10.0), nums(&[9.0])]).unwrap(),
            nums(&[1.0, 2.0, 3.0, 9.0])
        );
        assert_eq!(
            fn_remove(vec![seq.clone(), Value::from_number(1.0)]).unwrap(),
            nums(&[2.0, 3.0])
        );
        assert_eq!(fn_remove(vec![seq.clone(), Value::from_number(7.0)]).unwrap(), seq);
        assert_eq!(fn_reverse(vec![seq]).unwrap(), nums(&[3.0, 2.0, 1.0]));
    }

    #[test]
    fn test_index_of_and_counts() {
        let seq = Value::from_items(vec![
            Item::String("a".into()),
            Item::String("b".into()),
            Item::String("a".into()),
        ]);
        assert_eq!(
            fn_index_of(vec![seq.clone(), Value::from_string("a")]).unwrap(),
            nums(&[1.0, 3.0])
        );
        assert_eq!(fn_count(vec![seq.clone()]).unwrap(), Value::from_number(3.0));
        assert_eq!(fn_exists(vec![seq]).unwrap(), Value::from_bool(true));
        assert_eq!(fn_empty(vec![Value::empty()]).unwrap(), Value::from_bool(true));
    }
}
