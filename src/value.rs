//! Runtime values and the numeric coercion rules shared by all operators.
//!
//! Arithmetic promotes operands along a fixed ladder: integer, then
//! floating-point, then arbitrary-precision decimal. Integer results that
//! overflow `i64` climb to the decimal tier instead of wrapping.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use bigdecimal::{BigDecimal, FromPrimitive, Zero};
use serde::Serialize;

use crate::error::ArithmeticError;

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    /// Null, false, zero, and empty strings/collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }
}

/// Rendering a null produces no output; everything else uses its natural
/// textual form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        loose_eq(self, other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Equality across numeric tiers compares numerically; everything else
/// compares structurally.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loose_eq(l, r))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((lk, lv), (rk, rv))| lk == rk && loose_eq(lv, rv))
        }
        _ if a.is_number() && b.is_number() => compare(a, b) == Some(Ordering::Equal),
        _ => false,
    }
}

/// Ordering for relational operators: numbers across tiers, strings
/// lexicographically. Anything else is incomparable.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ if a.is_number() && b.is_number() => {
            if matches!(a, Value::Decimal(_)) || matches!(b, Value::Decimal(_)) {
                Some(to_decimal(a)?.cmp(&to_decimal(b)?))
            } else {
                to_f64(a).partial_cmp(&to_f64(b))
            }
        }
        _ => None,
    }
}

/// Membership: substring for strings, element for lists, key for maps.
pub(crate) fn contains(container: &Value, needle: &Value) -> Result<bool, ArithmeticError> {
    match container {
        Value::String(s) => Ok(s.contains(&needle.to_string())),
        Value::List(items) => Ok(items.iter().any(|item| loose_eq(item, needle))),
        Value::Map(entries) => match needle {
            Value::String(key) => Ok(entries.contains_key(key)),
            _ => Ok(entries.contains_key(&needle.to_string())),
        },
        _ => Err(ArithmeticError::IncompatibleOperands {
            op: "contains",
            left: container.type_name(),
            right: needle.type_name(),
        }),
    }
}

enum Promoted {
    Int(i64, i64),
    Float(f64, f64),
    Decimal(BigDecimal, BigDecimal),
}

fn to_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn to_decimal(v: &Value) -> Option<BigDecimal> {
    match v {
        Value::Int(i) => Some(BigDecimal::from(*i)),
        Value::Float(f) => BigDecimal::from_f64(*f),
        Value::Decimal(d) => Some(d.clone()),
        _ => None,
    }
}

/// Promote a pair of operands to their common numeric tier.
fn promote(op: &'static str, a: &Value, b: &Value) -> Result<Promoted, ArithmeticError> {
    let incompatible = || ArithmeticError::IncompatibleOperands {
        op,
        left: a.type_name(),
        right: b.type_name(),
    };
    if !a.is_number() || !b.is_number() {
        return Err(incompatible());
    }
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Promoted::Int(*x, *y)),
        _ if matches!(a, Value::Decimal(_)) || matches!(b, Value::Decimal(_)) => {
            let x = to_decimal(a).ok_or_else(incompatible)?;
            let y = to_decimal(b).ok_or_else(incompatible)?;
            Ok(Promoted::Decimal(x, y))
        }
        _ => Ok(Promoted::Float(to_f64(a), to_f64(b))),
    }
}

pub(crate) fn add(a: &Value, b: &Value) -> Result<Value, ArithmeticError> {
    match promote("+", a, b)? {
        Promoted::Int(x, y) => Ok(match x.checked_add(y) {
            Some(sum) => Value::Int(sum),
            None => Value::Decimal(BigDecimal::from(x) + BigDecimal::from(y)),
        }),
        Promoted::Float(x, y) => Ok(Value::Float(x + y)),
        Promoted::Decimal(x, y) => Ok(Value::Decimal(x + y)),
    }
}

pub(crate) fn subtract(a: &Value, b: &Value) -> Result<Value, ArithmeticError> {
    match promote("-", a, b)? {
        Promoted::Int(x, y) => Ok(match x.checked_sub(y) {
            Some(diff) => Value::Int(diff),
            None => Value::Decimal(BigDecimal::from(x) - BigDecimal::from(y)),
        }),
        Promoted::Float(x, y) => Ok(Value::Float(x - y)),
        Promoted::Decimal(x, y) => Ok(Value::Decimal(x - y)),
    }
}

pub(crate) fn multiply(a: &Value, b: &Value) -> Result<Value, ArithmeticError> {
    match promote("*", a, b)? {
        Promoted::Int(x, y) => Ok(match x.checked_mul(y) {
            Some(product) => Value::Int(product),
            None => Value::Decimal(BigDecimal::from(x) * BigDecimal::from(y)),
        }),
        Promoted::Float(x, y) => Ok(Value::Float(x * y)),
        Promoted::Decimal(x, y) => Ok(Value::Decimal(x * y)),
    }
}

/// Division between evenly-divisible integers stays integral; any remainder
/// moves the result to the float tier.
pub(crate) fn divide(a: &Value, b: &Value) -> Result<Value, ArithmeticError> {
    match promote("/", a, b)? {
        Promoted::Int(x, y) => {
            if y == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            match (x.checked_div(y), x.checked_rem(y)) {
                (Some(quotient), Some(0)) => Ok(Value::Int(quotient)),
                (Some(_), Some(_)) => Ok(Value::Float(x as f64 / y as f64)),
                _ => Ok(Value::Decimal(BigDecimal::from(x) / BigDecimal::from(y))),
            }
        }
        Promoted::Float(x, y) => {
            if y == 0.0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            Ok(Value::Float(x / y))
        }
        Promoted::Decimal(x, y) => {
            if y.is_zero() {
                return Err(ArithmeticError::DivisionByZero);
            }
            Ok(Value::Decimal(x / y))
        }
    }
}

pub(crate) fn modulo(a: &Value, b: &Value) -> Result<Value, ArithmeticError> {
    match promote("%", a, b)? {
        Promoted::Int(x, y) => {
            if y == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            match x.checked_rem(y) {
                Some(rem) => Ok(Value::Int(rem)),
                None => Ok(Value::Decimal(BigDecimal::from(x) % BigDecimal::from(y))),
            }
        }
        Promoted::Float(x, y) => {
            if y == 0.0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            Ok(Value::Float(x % y))
        }
        Promoted::Decimal(x, y) => {
            if y.is_zero() {
                return Err(ArithmeticError::DivisionByZero);
            }
            Ok(Value::Decimal(x % y))
        }
    }
}

pub(crate) fn negate(v: &Value) -> Result<Value, ArithmeticError> {
    match v {
        Value::Int(i) => Ok(match i.checked_neg() {
            Some(n) => Value::Int(n),
            None => Value::Decimal(-BigDecimal::from(*i)),
        }),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Decimal(d) => Ok(Value::Decimal(-d.clone())),
        _ => Err(ArithmeticError::UnaryIncompatible {
            op: "-",
            operand: v.type_name(),
        }),
    }
}

pub(crate) fn numeric_identity(v: &Value) -> Result<Value, ArithmeticError> {
    if v.is_number() {
        Ok(v.clone())
    } else {
        Err(ArithmeticError::UnaryIncompatible {
            op: "+",
            operand: v.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_stays_int() {
        assert_eq!(add(&Value::Int(1), &Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(
            multiply(&Value::Int(4), &Value::Int(5)).unwrap(),
            Value::Int(20)
        );
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            add(&Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_decimal_operand_promotes_both_sides() {
        let result = add(&Value::Int(1), &Value::Decimal(BigDecimal::from(2))).unwrap();
        assert_eq!(result, Value::Decimal(BigDecimal::from(3)));
    }

    #[test]
    fn test_int_overflow_promotes_to_decimal() {
        let result = add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(result, Value::Decimal(_)));
        assert_eq!(
            result,
            Value::Decimal(BigDecimal::from(i64::MAX) + BigDecimal::from(1))
        );
    }

    #[test]
    fn test_even_division_stays_int() {
        assert_eq!(
            divide(&Value::Int(6), &Value::Int(3)).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_uneven_division_yields_float() {
        assert_eq!(
            divide(&Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            divide(&Value::Int(1), &Value::Int(0)),
            Err(ArithmeticError::DivisionByZero)
        ));
        assert!(matches!(
            divide(&Value::Float(1.0), &Value::Float(0.0)),
            Err(ArithmeticError::DivisionByZero)
        ));
    }

    #[test]
    fn test_incompatible_operands() {
        let err = add(&Value::String("a".into()), &Value::Int(1)).unwrap_err();
        assert!(matches!(
            err,
            ArithmeticError::IncompatibleOperands { op: "+", .. }
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::String("x".into()).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
    }

    #[test]
    fn test_cross_tier_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(Value::Int(2), Value::Decimal(BigDecimal::from(2)));
    }

    #[test]
    fn test_contains() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(contains(&list, &Value::Int(2)).unwrap());
        assert!(!contains(&list, &Value::Int(3)).unwrap());
        assert!(contains(&Value::String("hello".into()), &Value::String("ell".into())).unwrap());
        assert!(contains(&list, &Value::Float(2.0)).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"count": 3, "name": "acme", "tags": ["a", "b"]});
        let value = Value::from(json);
        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(entries["count"], Value::Int(3));
        assert_eq!(entries["name"], Value::String("acme".into()));
    }
}
