//! The core extension: the default operator table and the built-in
//! filter, test, and function rosters.

use std::cmp::Ordering;
use std::sync::Arc;

use super::filters;
use super::{Args, Extension, Filter, Function, Test};
use crate::context::EvaluationContext;
use crate::error::ExtensionError;
use crate::operator::{
    Associativity, BinaryOpKind, BinaryOperator, UnaryOpKind, UnaryOperator,
};
use crate::value::{self, Value};

/// The default feature bundle.
///
/// Registered automatically by the engine builder; disable it wholesale with
/// [`EngineBuilder::without_core_extension`](crate::engine::EngineBuilder::without_core_extension),
/// which swaps in a no-op contribution instead of branching registry logic.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreExtension;

impl Extension for CoreExtension {
    fn unary_operators(&self) -> Vec<UnaryOperator> {
        vec![
            UnaryOperator::new("not", 5, UnaryOpKind::Not),
            UnaryOperator::new("+", 500, UnaryOpKind::Plus),
            UnaryOperator::new("-", 500, UnaryOpKind::Negate),
        ]
    }

    fn binary_operators(&self) -> Vec<BinaryOperator> {
        let left = Associativity::Left;
        vec![
            BinaryOperator::new("or", 10, BinaryOpKind::Or, left),
            BinaryOperator::new("and", 15, BinaryOpKind::And, left),
            BinaryOperator::new("is", 20, BinaryOpKind::Is, left),
            BinaryOperator::new("is not", 20, BinaryOpKind::IsNot, left),
            BinaryOperator::new("contains", 20, BinaryOpKind::Contains, left),
            BinaryOperator::new("==", 30, BinaryOpKind::Equals, left),
            BinaryOperator::new("equals", 30, BinaryOpKind::Equals, left),
            BinaryOperator::new("!=", 30, BinaryOpKind::NotEquals, left),
            BinaryOperator::new(">", 30, BinaryOpKind::GreaterThan, left),
            BinaryOperator::new("<", 30, BinaryOpKind::LessThan, left),
            BinaryOperator::new(">=", 30, BinaryOpKind::GreaterThanEquals, left),
            BinaryOperator::new("<=", 30, BinaryOpKind::LessThanEquals, left),
            BinaryOperator::new("+", 40, BinaryOpKind::Add, left),
            BinaryOperator::new("-", 40, BinaryOpKind::Subtract, left),
            BinaryOperator::new("*", 60, BinaryOpKind::Multiply, left),
            BinaryOperator::new("/", 60, BinaryOpKind::Divide, left),
            BinaryOperator::new("%", 60, BinaryOpKind::Modulus, left),
            BinaryOperator::new("|", 100, BinaryOpKind::Filter, left),
            BinaryOperator::new("~", 110, BinaryOpKind::Concatenate, left),
            BinaryOperator::new("..", 120, BinaryOpKind::Range, left),
        ]
    }

    fn filters(&self) -> Vec<(String, Arc<dyn Filter>)> {
        fn entry(name: &str, filter: impl Filter + 'static) -> (String, Arc<dyn Filter>) {
            (name.to_string(), Arc::new(filter) as Arc<dyn Filter>)
        }
        vec![
            entry("abs", filters::abs),
            entry("capitalize", filters::capitalize),
            entry("date", filters::date),
            entry("default", filters::default),
            entry("first", filters::first),
            entry("join", filters::join),
            entry("last", filters::last),
            entry("length", filters::length),
            entry("lower", filters::lower),
            entry("replace", filters::replace),
            entry("rsort", filters::rsort),
            entry("slice", filters::slice),
            entry("sort", filters::sort),
            entry("title", filters::title),
            entry("trim", filters::trim),
            entry("upper", filters::upper),
            entry("urlencode", filters::urlencode),
        ]
    }

    fn tests(&self) -> Vec<(String, Arc<dyn Test>)> {
        fn entry(name: &str, test: impl Test + 'static) -> (String, Arc<dyn Test>) {
            (name.to_string(), Arc::new(test) as Arc<dyn Test>)
        }
        vec![
            entry("defined", defined),
            entry("empty", empty),
            entry("even", even),
            entry("iterable", iterable),
            entry("map", map),
            entry("null", null),
            entry("odd", odd),
        ]
    }

    fn functions(&self) -> Vec<(String, Arc<dyn Function>)> {
        fn entry(name: &str, function: impl Function + 'static) -> (String, Arc<dyn Function>) {
            (name.to_string(), Arc::new(function) as Arc<dyn Function>)
        }
        vec![
            entry("max", max),
            entry("min", min),
            entry("range", range),
        ]
    }
}

fn defined(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    Ok(!matches!(input, Value::Null))
}

fn empty(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    Ok(filters::is_empty_value(input))
}

fn even(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    match input {
        Value::Int(i) => Ok(i % 2 == 0),
        _ => Err(ExtensionError::msg(format!(
            "even expects an integer, got {}",
            input.type_name()
        ))),
    }
}

fn odd(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    match input {
        Value::Int(i) => Ok(i % 2 != 0),
        _ => Err(ExtensionError::msg(format!(
            "odd expects an integer, got {}",
            input.type_name()
        ))),
    }
}

fn iterable(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    Ok(matches!(input, Value::List(_)))
}

fn map(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    Ok(matches!(input, Value::Map(_)))
}

fn null(
    input: &Value,
    _args: &Args,
    _ctx: &EvaluationContext<'_>,
) -> Result<bool, ExtensionError> {
    Ok(matches!(input, Value::Null))
}

fn pick(
    args: &Args,
    name: &'static str,
    want: Ordering,
) -> Result<Value, ExtensionError> {
    let mut best: Option<&Value> = None;
    for candidate in args.positional() {
        best = match best {
            None => Some(candidate),
            Some(current) => match value::compare(candidate, current) {
                Some(ordering) if ordering == want => Some(candidate),
                Some(_) => Some(current),
                None => {
                    return Err(ExtensionError::msg(format!(
                        "{name} expects mutually comparable arguments"
                    )));
                }
            },
        };
    }
    best.cloned()
        .ok_or_else(|| ExtensionError::msg(format!("{name} expects at least one argument")))
}

fn max(args: &Args, _ctx: &EvaluationContext<'_>) -> Result<Value, ExtensionError> {
    pick(args, "max", Ordering::Greater)
}

fn min(args: &Args, _ctx: &EvaluationContext<'_>) -> Result<Value, ExtensionError> {
    pick(args, "min", Ordering::Less)
}

/// `range(start, end)` or `range(start, end, step)`, inclusive of `end`.
fn range(args: &Args, _ctx: &EvaluationContext<'_>) -> Result<Value, ExtensionError> {
    let int_arg = |index: usize, name: &str| -> Result<i64, ExtensionError> {
        match args.get_or_named(index, name) {
            Some(Value::Int(i)) => Ok(*i),
            Some(other) => Err(ExtensionError::msg(format!(
                "range expects an integer '{name}', got {}",
                other.type_name()
            ))),
            None => Err(ExtensionError::msg(format!(
                "range expects a '{name}' argument"
            ))),
        }
    };
    let start = int_arg(0, "start")?;
    let end = int_arg(1, "end")?;
    let step = match args.get_or_named(2, "step") {
        None => 1,
        Some(Value::Int(i)) => *i,
        Some(other) => {
            return Err(ExtensionError::msg(format!(
                "range expects an integer 'step', got {}",
                other.type_name()
            )));
        }
    };
    if step == 0 {
        return Err(ExtensionError::msg("range step must not be zero"));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current <= end) || (step < 0 && current >= end) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::extension::{ExtensionRegistry, RegistryBuilder};

    fn registry() -> ExtensionRegistry {
        let mut builder = RegistryBuilder::new();
        builder.register(&CoreExtension).unwrap();
        builder.build()
    }

    #[test]
    fn test_core_operator_table_is_complete() {
        let registry = registry();
        assert_eq!(registry.binary_operator("or").map(|op| op.precedence), Some(10));
        assert_eq!(registry.binary_operator("|").map(|op| op.precedence), Some(100));
        assert_eq!(registry.binary_operator("..").map(|op| op.precedence), Some(120));
        assert_eq!(registry.unary_operator("not").map(|op| op.precedence), Some(5));
        assert_eq!(registry.unary_operator("-").map(|op| op.precedence), Some(500));
        assert_eq!(
            registry.binary_operator("equals").map(|op| op.kind),
            Some(BinaryOpKind::Equals)
        );
    }

    #[test]
    fn test_core_rosters_resolve() {
        let registry = registry();
        assert!(registry.filter("upper").is_some());
        assert!(registry.test("empty").is_some());
        assert!(registry.function("range").is_some());
        assert!(registry.filter("nope").is_none());
    }

    fn call(
        function: fn(&Args, &EvaluationContext<'_>) -> Result<Value, ExtensionError>,
        args: Vec<Value>,
    ) -> Result<Value, ExtensionError> {
        let registry = registry();
        let vars = Context::new();
        let ctx = EvaluationContext::new(&registry, "unit", false, &vars);
        function(&Args::new(args, Default::default()), &ctx)
    }

    #[test]
    fn test_max_min() {
        assert_eq!(
            call(max, vec![Value::Int(1), Value::Int(9), Value::Int(4)]).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            call(min, vec![Value::Int(1), Value::Int(9), Value::Int(4)]).unwrap(),
            Value::Int(1)
        );
        assert!(call(max, vec![]).is_err());
        assert!(call(max, vec![Value::Int(1), Value::String("a".into())]).is_err());
    }

    #[test]
    fn test_range_function() {
        assert_eq!(
            call(range, vec![Value::Int(0), Value::Int(4), Value::Int(2)]).unwrap(),
            Value::List(vec![Value::Int(0), Value::Int(2), Value::Int(4)])
        );
        assert_eq!(
            call(range, vec![Value::Int(3), Value::Int(1), Value::Int(-1)]).unwrap(),
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
        assert!(call(range, vec![Value::Int(0), Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_even_odd_require_integers() {
        let registry = registry();
        let vars = Context::new();
        let ctx = EvaluationContext::new(&registry, "unit", false, &vars);
        let args = Args::default();
        assert!(even(&Value::Int(2), &args, &ctx).unwrap());
        assert!(odd(&Value::Int(3), &args, &ctx).unwrap());
        assert!(even(&Value::String("2".into()), &args, &ctx).is_err());
    }
}
