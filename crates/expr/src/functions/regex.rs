use crate::error::ExprError;
use crate::value::{Item, Value};
use regex::Regex;

fn build_regex(function: &str, pattern: &str, flags: &str) -> Result<Regex, ExprError> {
    let mut regex_pattern = String::new();

    for flag in flags.chars() {
        match flag {
            'i' => regex_pattern.push_str("(?i)"),
            'm' => regex_pattern.push_str("(?m)"),
            's' => regex_pattern.push_str("(?s)"),
            'x' => regex_pattern.push_str("(?x)"),
            other => {
                return Err(ExprError::function(
                    function,
                    format!("Unknown regular expression flag '{}'", other),
                ));
            }
        }
    }
    regex_pattern.push_str(pattern);

    Regex::new(&regex_pattern)
        .map_err(|e| ExprError::function(function, format!("Invalid regex pattern: {}", e)))
}

fn flags_argument(args: &mut Vec<Value>, index: usize) -> String {
    if args.len() > index {
        args.remove(index).to_string_value()
    } else {
        String::new()
    }
}

pub fn fn_matches(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let flags = flags_argument(&mut args, 2);
    let pattern = args.remove(1).to_string_value();
    let input = args.remove(0).to_string_value();
    let regex = build_regex("matches", &pattern, &flags)?;
    Ok(Value::from_bool(regex.is_match(&input)))
}

pub fn fn_tokenize(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let flags = flags_argument(&mut args, 2);
    let pattern = args.remove(1).to_string_value();
    let input = args.remove(0).to_string_value();
    if input.is_empty() {
        return Ok(Value::empty());
    }
    let regex = build_regex("tokenize", &pattern, &flags)?;
    if regex.is_match("") {
        return Err(ExprError::function(
            "tokenize",
            "pattern matches a zero-length string",
        ));
    }
    let tokens = regex.split(&input).map(|t| Item::String(t.to_string()));
    Ok(Value::from_items(tokens.collect::<Vec<_>>()))
}

pub fn fn_replace(mut args: Vec<Value>) -> Result<Value, ExprError> {
    let flags = flags_argument(&mut args, 3);
    let replacement = args.remove(2).to_string_value();
    let pattern = args.remove(1).to_string_value();
    let input = args.remove(0).to_string_value();
    let regex = build_regex("replace", &pattern, &flags)?;
    if regex.is_match("") {
        return Err(ExprError::function(
            "replace",
            "pattern matches a zero-length string",
        ));
    }
    let replacement = convert_replacement(&replacement);
    Ok(Value::from_string(regex.replace_all(&input, replacement.as_str()).into_owned()))
}

/// `$1` group references become `${1}`; `\$` and `\\` are literal.
fn convert_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '$' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                if digits.is_empty() {
                    out.push_str("$$");
                } else {
                    out.push_str(&format!("${{{}}}", digits));
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(ss: &[&str]) -> Vec<Value> {
        ss.iter().map(|s| Value::from_string(*s)).collect()
    }

    #[test]
    fn test_matches_with_flags() {
        assert_eq!(fn_matches(strings(&["Hello", "^h"])).unwrap(), Value::from_bool(false));
        assert_eq!(
            fn_matches(strings(&["Hello", "^h", "i"])).unwrap(),
            Value::from_bool(true)
        );
        assert!(fn_matches(strings(&["a", "(", ""])).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_tokenize() {
        let result = fn_tokenize(strings(&["a, b,c", ",\\s*"])).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.to_string_value(), "a");
        assert!(fn_tokenize(strings(&["", ","])).unwrap().is_empty());
    }

    #[test]
    fn test_replace_group_references() {
        assert_eq!(
            fn_replace(strings(&["2024-05", "(\\d+)-(\\d+)", "$2/$1"])).unwrap(),
            Value::from_string("05/2024")
        );
        assert_eq!(
            fn_replace(strings(&["cost", "cost", "\\$5"])).unwrap(),
            Value::from_string("$5")
        );
    }
}
