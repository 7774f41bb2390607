//! Core filter implementations.
//!
//! String filters pass null through unchanged so lenient-mode templates can
//! pipe optional values without guarding every use.

use std::cmp::Ordering;
use std::fmt::Write as _;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use heck::ToTitleCase;

use crate::context::EvaluationContext;
use crate::error::ExtensionError;
use crate::extension::Args;
use crate::value::{self, Value};

/// Shared by the `empty` test and the `default` filter.
pub(crate) fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(entries) => entries.is_empty(),
        _ => false,
    }
}

fn expect_string<'v>(input: &'v Value, filter: &str) -> Result<&'v str, ExtensionError> {
    match input {
        Value::String(s) => Ok(s),
        _ => Err(ExtensionError::msg(format!(
            "{filter} expects a string, got {}",
            input.type_name()
        ))),
    }
}

pub(crate) fn abs(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    match input {
        Value::Int(i) => Ok(match i.checked_abs() {
            Some(v) => Value::Int(v),
            None => Value::Decimal(-BigDecimal::from(*i)),
        }),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        _ => Err(ExtensionError::msg(format!(
            "abs expects a number, got {}",
            input.type_name()
        ))),
    }
}

pub(crate) fn capitalize(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    let s = expect_string(input, "capitalize")?;
    let mut chars = s.chars();
    Ok(Value::String(match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }))
}

/// Replaces empty input (null, empty string, empty collection) with the
/// given fallback.
pub(crate) fn default(
    input: &Value,
    args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let fallback = args
        .get_or_named(0, "default")
        .ok_or_else(|| ExtensionError::msg("default expects a fallback argument"))?;
    if is_empty_value(input) {
        Ok(fallback.clone())
    } else {
        Ok(input.clone())
    }
}

pub(crate) fn first(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    match input {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        Value::String(s) => Ok(s
            .chars()
            .next()
            .map_or(Value::Null, |c| Value::String(c.to_string()))),
        _ => Err(ExtensionError::msg(format!(
            "first expects a list or string, got {}",
            input.type_name()
        ))),
    }
}

pub(crate) fn last(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    match input {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        Value::String(s) => Ok(s
            .chars()
            .next_back()
            .map_or(Value::Null, |c| Value::String(c.to_string()))),
        _ => Err(ExtensionError::msg(format!(
            "last expects a list or string, got {}",
            input.type_name()
        ))),
    }
}

pub(crate) fn join(
    input: &Value,
    args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let separator = match args.get_or_named(0, "separator") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(ExtensionError::msg(format!(
                "join expects a string separator, got {}",
                other.type_name()
            )));
        }
        None => String::new(),
    };
    match input {
        Value::Null => Ok(Value::String(String::new())),
        Value::List(items) => Ok(Value::String(
            items
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&separator),
        )),
        _ => Err(ExtensionError::msg(format!(
            "join expects a list, got {}",
            input.type_name()
        ))),
    }
}

pub(crate) fn length(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let len = match input {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        _ => {
            return Err(ExtensionError::msg(format!(
                "length expects a string, list, or map, got {}",
                input.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

pub(crate) fn lower(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    Ok(Value::String(expect_string(input, "lower")?.to_lowercase()))
}

pub(crate) fn upper(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    Ok(Value::String(expect_string(input, "upper")?.to_uppercase()))
}

pub(crate) fn replace(
    input: &Value,
    args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    let s = expect_string(input, "replace")?;
    let from = match args.get_or_named(0, "from") {
        Some(Value::String(v)) => v,
        _ => return Err(ExtensionError::msg("replace expects a string 'from' argument")),
    };
    let to = match args.get_or_named(1, "to") {
        Some(Value::String(v)) => v,
        _ => return Err(ExtensionError::msg("replace expects a string 'to' argument")),
    };
    Ok(Value::String(s.replace(from.as_str(), to)))
}

pub(crate) fn slice(
    input: &Value,
    args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let bound = |index: usize, name: &str, len: usize| -> Result<usize, ExtensionError> {
        match args.get_or_named(index, name) {
            Some(Value::Int(i)) if *i >= 0 => Ok((*i as usize).min(len)),
            Some(other) => Err(ExtensionError::msg(format!(
                "slice expects a non-negative integer '{name}', got {other}"
            ))),
            None => Ok(if name == "from" { 0 } else { len }),
        }
    };
    match input {
        Value::Null => Ok(Value::Null),
        Value::List(items) => {
            let from = bound(0, "from", items.len())?;
            let to = bound(1, "to", items.len())?.max(from);
            Ok(Value::List(items[from..to].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let from = bound(0, "from", chars.len())?;
            let to = bound(1, "to", chars.len())?.max(from);
            Ok(Value::String(chars[from..to].iter().collect()))
        }
        _ => Err(ExtensionError::msg(format!(
            "slice expects a list or string, got {}",
            input.type_name()
        ))),
    }
}

fn sorted(input: &Value, filter: &str) -> Result<Vec<Value>, ExtensionError> {
    let Value::List(items) = input else {
        return Err(ExtensionError::msg(format!(
            "{filter} expects a list, got {}",
            input.type_name()
        )));
    };
    let mut items = items.clone();
    let mut comparable = true;
    items.sort_by(|a, b| match value::compare(a, b) {
        Some(ordering) => ordering,
        None => {
            comparable = false;
            Ordering::Equal
        }
    });
    if !comparable {
        return Err(ExtensionError::msg(format!(
            "{filter} expects mutually comparable elements"
        )));
    }
    Ok(items)
}

pub(crate) fn sort(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    Ok(Value::List(sorted(input, "sort")?))
}

pub(crate) fn rsort(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let mut items = sorted(input, "rsort")?;
    items.reverse();
    Ok(Value::List(items))
}

pub(crate) fn title(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    Ok(Value::String(
        expect_string(input, "title")?.to_title_case(),
    ))
}

pub(crate) fn trim(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    Ok(Value::String(
        expect_string(input, "trim")?.trim().to_string(),
    ))
}

pub(crate) fn urlencode(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    if matches!(input, Value::Null) {
        return Ok(Value::Null);
    }
    let s = expect_string(input, "urlencode")?;
    let encoded: String = url::form_urlencoded::byte_serialize(s.as_bytes()).collect();
    Ok(Value::String(encoded))
}

/// Formats a timestamp (epoch seconds) or a date string (RFC 3339,
/// `%Y-%m-%d %H:%M:%S`, or `%Y-%m-%d`) with a strftime pattern.
pub(crate) fn date(
    input: &Value,
    args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<Value, ExtensionError> {
    let format = match args.get_or_named(0, "format") {
        Some(Value::String(f)) => f.clone(),
        Some(other) => {
            return Err(ExtensionError::msg(format!(
                "date expects a string format, got {}",
                other.type_name()
            )));
        }
        None => "%Y-%m-%d".to_string(),
    };
    let datetime = match input {
        Value::Null => return Ok(Value::Null),
        Value::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| ExtensionError::msg(format!("timestamp {secs} is out of range")))?,
        Value::String(s) => parse_datetime(s)
            .ok_or_else(|| ExtensionError::msg(format!("cannot parse date '{s}'")))?,
        _ => {
            return Err(ExtensionError::msg(format!(
                "date expects a timestamp or date string, got {}",
                input.type_name()
            )));
        }
    };
    let mut out = String::new();
    write!(out, "{}", datetime.format(&format))
        .map_err(|_| ExtensionError::msg(format!("invalid date format '{format}'")))?;
    Ok(Value::String(out))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::RegistryBuilder;

    fn apply(
        filter: fn(&Value, &Args, &EvaluationContext<'_>) -> Result<Value, ExtensionError>,
        input: Value,
        args: Args,
    ) -> Result<Value, ExtensionError> {
        let registry = RegistryBuilder::new().build();
        let vars = crate::context::Context::new();
        let ctx = EvaluationContext::new(&registry, "unit", false, &vars);
        filter(&input, &args, &ctx)
    }

    fn positional(values: Vec<Value>) -> Args {
        Args::new(values, Default::default())
    }

    #[test]
    fn test_upper_lower() {
        assert_eq!(
            apply(upper, Value::String("abc".into()), Args::default()).unwrap(),
            Value::String("ABC".into())
        );
        assert_eq!(
            apply(lower, Value::String("ABC".into()), Args::default()).unwrap(),
            Value::String("abc".into())
        );
    }

    #[test]
    fn test_string_filters_pass_null_through() {
        assert_eq!(apply(upper, Value::Null, Args::default()).unwrap(), Value::Null);
        assert_eq!(apply(trim, Value::Null, Args::default()).unwrap(), Value::Null);
    }

    #[test]
    fn test_abs() {
        assert_eq!(apply(abs, Value::Int(-3), Args::default()).unwrap(), Value::Int(3));
        assert_eq!(
            apply(abs, Value::Float(-1.5), Args::default()).unwrap(),
            Value::Float(1.5)
        );
        assert!(apply(abs, Value::String("x".into()), Args::default()).is_err());
    }

    #[test]
    fn test_capitalize_first_letter_only() {
        assert_eq!(
            apply(capitalize, Value::String("hello world".into()), Args::default()).unwrap(),
            Value::String("Hello world".into())
        );
    }

    #[test]
    fn test_default_replaces_empty() {
        let args = positional(vec![Value::String("fallback".into())]);
        assert_eq!(
            apply(default, Value::Null, args.clone()).unwrap(),
            Value::String("fallback".into())
        );
        assert_eq!(
            apply(default, Value::Int(0), args).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_join() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let args = positional(vec![Value::String(", ".into())]);
        assert_eq!(
            apply(join, list, args).unwrap(),
            Value::String("1, 2, 3".into())
        );
    }

    #[test]
    fn test_first_last_length() {
        let list = Value::List(vec![Value::Int(7), Value::Int(8)]);
        assert_eq!(apply(first, list.clone(), Args::default()).unwrap(), Value::Int(7));
        assert_eq!(apply(last, list.clone(), Args::default()).unwrap(), Value::Int(8));
        assert_eq!(apply(length, list, Args::default()).unwrap(), Value::Int(2));
        assert_eq!(
            apply(length, Value::String("héllo".into()), Args::default()).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_replace_named_args() {
        let mut named = std::collections::BTreeMap::new();
        named.insert("from".to_string(), Value::String("a".into()));
        named.insert("to".to_string(), Value::String("o".into()));
        let args = Args::new(Vec::new(), named);
        assert_eq!(
            apply(replace, Value::String("banana".into()), args).unwrap(),
            Value::String("bonono".into())
        );
    }

    #[test]
    fn test_slice() {
        let list = Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ]);
        let args = positional(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(
            apply(slice, list, args).unwrap(),
            Value::List(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_sort_and_rsort() {
        let list = Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(
            apply(sort, list.clone(), Args::default()).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(
            apply(rsort, list, Args::default()).unwrap(),
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn test_sort_rejects_mixed_elements() {
        let list = Value::List(vec![Value::Int(1), Value::String("a".into())]);
        assert!(apply(sort, list, Args::default()).is_err());
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(
            apply(urlencode, Value::String("a b&c".into()), Args::default()).unwrap(),
            Value::String("a+b%26c".into())
        );
    }

    #[test]
    fn test_date_from_timestamp() {
        let args = positional(vec![Value::String("%Y-%m-%d".into())]);
        assert_eq!(
            apply(date, Value::Int(0), args).unwrap(),
            Value::String("1970-01-01".into())
        );
    }

    #[test]
    fn test_date_from_string() {
        let args = positional(vec![Value::String("%d/%m/%Y".into())]);
        assert_eq!(
            apply(date, Value::String("2014-07-01".into()), args).unwrap(),
            Value::String("01/07/2014".into())
        );
    }
}
