use crate::context::Context;
use crate::error::ExprError;
use crate::value::{Value, parse_number};

/// The string argument, or the string value of the context node when the
/// argument is omitted.
fn string_or_context(ctx: &Context, top: usize, args: &mut Vec<Value>) -> String {
    if args.is_empty() {
        ctx.node(top)
            .map(|n| n.string_value().to_string())
            .unwrap_or_default()
    } else {
        args.remove(0).to_string_value()
    }
}

pub fn fn_string(ctx: &mut Context, top: usize, mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_string(string_or_context(ctx, top, &mut args)))
}

pub fn fn_string_length(
    ctx: &mut Context,
    top: usize,
    mut args: Vec<Value>,
) -> Result<Value, ExprError> {
    let s = string_or_context(ctx, top, &mut args);
    Ok(Value::from_number(s.chars().count() as f64))
}

pub fn fn_normalize_space(
    ctx: &mut Context,
    top: usize,
    mut args: Vec<Value>,
) -> Result<Value, ExprError> {
    let s = string_or_context(ctx, top, &mut args);
    Ok(Value::from_string(s.split_whitespace().collect::<Vec<_>>().join(" ")))
}

pub fn fn_concat(args: Vec<Value>) -> Result<Value, ExprError> {
    let result = args.iter().map(Value::to_string_value).collect::<String>();
    Ok(Value::from_string(result))
}

pub fn fn_string_join(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let separator = args.remove(1).to_string_value();
    let parts: Vec<String> = args
        .remove(0)
        .iter()
        .map(|item| item.to_string_value())
        .collect();
    Ok(Value::from_string(parts.join(&separator)))
}

/// XPath rounding rules for start and length, counted in characters.
pub fn fn_substring(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let length = if args.len() == 3 {
        Some(args.remove(2).to_number())
    } else {
        None
    };
    let start = (args.remove(1).to_number() + 0.5).floor();
    let s = args.remove(0).to_string_value();
    let last = length.map_or(f64::INFINITY, |l| start + (l + 0.5).floor());

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64;
            (pos >= start && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(Value::from_string(result))
}

pub fn fn_substring_before(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let s2 = args.remove(1).to_string_value();
    let s1 = args.remove(0).to_string_value();
    let result = s1.find(&s2).map(|i| &s1[..i]).unwrap_or_default();
    Ok(Value::from_string(result))
}

pub fn fn_substring_after(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let s2 = args.remove(1).to_string_value();
    let s1 = args.remove(0).to_string_value();
    let result = s1.find(&s2).map(|i| &s1[i + s2.len()..]).unwrap_or_default();
    Ok(Value::from_string(result))
}

pub fn fn_starts_with(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let s2 = args.remove(1).to_string_value();
    let s1 = args.remove(0).to_string_value();
    Ok(Value::from_bool(s1.starts_with(&s2)))
}

pub fn fn_ends_with(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let s2 = args.remove(1).to_string_value();
    let s1 = args.remove(0).to_string_value();
    Ok(Value::from_bool(s1.ends_with(&s2)))
}

pub fn fn_contains(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let s2 = args.remove(1).to_string_value();
    let s1 = args.remove(0).to_string_value();
    Ok(Value::from_bool(s1.contains(&s2)))
}

pub fn fn_translate(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let to: Vec<char> = args.remove(2).to_string_value().chars().collect();
    let from: Vec<char> = args.remove(1).to_string_value().chars().collect();
    let source = args.remove(0).to_string_value();
    let result = source
        .chars()
        .filter_map(|c| match from.iter().position(|&fc| fc == c) {
            Some(pos) => to.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(Value::from_string(result))
}

pub fn fn_upper_case(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_string(args.remove(0).to_string_value().to_uppercase()))
}

pub fn fn_lower_case(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_string(args.remove(0).to_string_value().to_lowercase()))
}

/// Upper bound on the byte length `string-pad` will build.
const MAX_PADDED_LEN: usize = 1 << 24;

/// `string-pad(s, n)`: `s` repeated `n` times.
pub fn fn_string_pad(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let count_value = args.remove(1);
    let count = match count_value.first() {
        Some(crate::value::Item::Number(n)) => *n,
        _ => parse_number(&count_value.to_string_value()),
    };
    if count.is_nan() || count < 0.0 || count.fract() != 0.0 {
        return Err(ExprError::function(
            "string-pad",
            format!("'{}' is not a valid repeat count", count_value.to_string_value()),
        ));
    }
    let s = args.remove(0).to_string_value();
    if s.is_empty() {
        return Ok(Value::from_string(s));
    }
    let times = count as usize;
    match s.len().checked_mul(times) {
        Some(len) if len <= MAX_PADDED_LEN => Ok(Value::from_string(s.repeat(times))),
        _ => Err(ExprError::function(
            "string-pad",
            format!("repeating '{}' {} times exceeds {} bytes", s, count, MAX_PADDED_LEN),
        )),
    }
}
