//! Expression nodes and their evaluation contract.
//!
//! Nodes are built once by the parser, immutable thereafter, and evaluated
//! any number of times against independent contexts. Evaluation is a single
//! exhaustive match over the tagged union; adding a variant forces every
//! match site to handle it.

pub mod visitor;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::context::EvaluationContext;
use crate::error::{ArithmeticError, EvalError, ExtensionError, IdentifierKind};
use crate::extension::Args;
use crate::operator::{BinaryOpKind, UnaryOpKind};
use crate::value::{self, Value};

/// One expression node with the source line it was parsed from.
#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub line: u32,
}

/// Unevaluated positional and named argument expressions, in source order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Expression>,
    pub named: Vec<(String, Expression)>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    Variable(String),
    Unary {
        op: UnaryOpKind,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOpKind,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `target | name(args)`.
    Filter {
        target: Box<Expression>,
        name: String,
        args: Arguments,
    },
    /// Right-hand side of `is` / `is not`; meaningful only under a test
    /// operator node.
    TestInvocation { name: String, args: Arguments },
    FunctionCall { name: String, args: Arguments },
    /// `target.name`.
    GetAttribute {
        target: Box<Expression>,
        name: String,
    },
}

impl Expression {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        Self { kind, line }
    }

    /// Evaluate this node against a render context.
    ///
    /// Operands evaluate left to right; every failure surfacing from below
    /// an operator is annotated with the owning node's line and the template
    /// name.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvalError> {
        match &self.kind {
            ExprKind::Literal(v) => Ok(v.clone()),
            ExprKind::Variable(name) => match ctx.lookup(name) {
                Some(v) => Ok(v.clone()),
                None if ctx.strict_variables() => Err(EvalError::UndefinedVariable {
                    name: name.clone(),
                    template: ctx.template_name().to_string(),
                    line: self.line,
                }),
                None => Ok(Value::Null),
            },
            ExprKind::Unary { op, operand } => {
                let v = operand.evaluate(ctx)?;
                match op {
                    UnaryOpKind::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOpKind::Negate => {
                        value::negate(&v).map_err(|e| self.arithmetic(ctx, e))
                    }
                    UnaryOpKind::Plus => {
                        value::numeric_identity(&v).map_err(|e| self.arithmetic(ctx, e))
                    }
                }
            }
            ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right, ctx),
            ExprKind::Filter { target, name, args } => {
                let input = target.evaluate(ctx)?;
                let filter = ctx
                    .registry()
                    .filter(name)
                    .cloned()
                    .ok_or_else(|| self.unknown(ctx, IdentifierKind::Filter, name))?;
                let args = self.resolve_args(args, ctx)?;
                filter
                    .apply(&input, &args, ctx)
                    .map_err(|e| self.extension_failure(ctx, IdentifierKind::Filter, name, e))
            }
            ExprKind::TestInvocation { .. } => Err(EvalError::MalformedNode {
                template: ctx.template_name().to_string(),
                line: self.line,
            }),
            ExprKind::FunctionCall { name, args } => {
                let function = ctx
                    .registry()
                    .function(name)
                    .cloned()
                    .ok_or_else(|| self.unknown(ctx, IdentifierKind::Function, name))?;
                let args = self.resolve_args(args, ctx)?;
                function
                    .call(&args, ctx)
                    .map_err(|e| self.extension_failure(ctx, IdentifierKind::Function, name, e))
            }
            ExprKind::GetAttribute { target, name } => {
                let base = target.evaluate(ctx)?;
                let attr = match &base {
                    Value::Map(entries) => entries.get(name).cloned(),
                    _ => None,
                };
                match attr {
                    Some(v) => Ok(v),
                    None if ctx.strict_variables() => Err(EvalError::UndefinedVariable {
                        name: name.clone(),
                        template: ctx.template_name().to_string(),
                        line: self.line,
                    }),
                    None => Ok(Value::Null),
                }
            }
        }
    }

    fn evaluate_binary(
        &self,
        op: BinaryOpKind,
        left: &Expression,
        right: &Expression,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOpKind::Or => {
                if left.evaluate(ctx)?.is_truthy() {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(right.evaluate(ctx)?.is_truthy()))
                }
            }
            BinaryOpKind::And => {
                if !left.evaluate(ctx)?.is_truthy() {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Bool(right.evaluate(ctx)?.is_truthy()))
                }
            }
            BinaryOpKind::Is | BinaryOpKind::IsNot => {
                let input = left.evaluate(ctx)?;
                let ExprKind::TestInvocation { name, args } = &right.kind else {
                    return Err(EvalError::MalformedNode {
                        template: ctx.template_name().to_string(),
                        line: self.line,
                    });
                };
                let test = ctx
                    .registry()
                    .test(name)
                    .cloned()
                    .ok_or_else(|| self.unknown(ctx, IdentifierKind::Test, name))?;
                let args = self.resolve_args(args, ctx)?;
                let outcome = test
                    .apply(&input, &args, ctx)
                    .map_err(|e| self.extension_failure(ctx, IdentifierKind::Test, name, e))?;
                Ok(Value::Bool(if op == BinaryOpKind::IsNot {
                    !outcome
                } else {
                    outcome
                }))
            }
            BinaryOpKind::Contains => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                value::contains(&l, &r)
                    .map(Value::Bool)
                    .map_err(|e| self.arithmetic(ctx, e))
            }
            BinaryOpKind::Equals => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                Ok(Value::Bool(value::loose_eq(&l, &r)))
            }
            BinaryOpKind::NotEquals => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                Ok(Value::Bool(!value::loose_eq(&l, &r)))
            }
            BinaryOpKind::GreaterThan => self.relational(left, right, ctx, ">", |o| o == Ordering::Greater),
            BinaryOpKind::LessThan => self.relational(left, right, ctx, "<", |o| o == Ordering::Less),
            BinaryOpKind::GreaterThanEquals => {
                self.relational(left, right, ctx, ">=", |o| o != Ordering::Less)
            }
            BinaryOpKind::LessThanEquals => {
                self.relational(left, right, ctx, "<=", |o| o != Ordering::Greater)
            }
            BinaryOpKind::Add => self.arith(left, right, ctx, value::add),
            BinaryOpKind::Subtract => self.arith(left, right, ctx, value::subtract),
            BinaryOpKind::Multiply => self.arith(left, right, ctx, value::multiply),
            BinaryOpKind::Divide => self.arith(left, right, ctx, value::divide),
            BinaryOpKind::Modulus => self.arith(left, right, ctx, value::modulo),
            BinaryOpKind::Concatenate => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                Ok(Value::String(format!("{l}{r}")))
            }
            BinaryOpKind::Range => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                match (&l, &r) {
                    (Value::Int(start), Value::Int(end)) => {
                        let items: Vec<Value> = if start <= end {
                            (*start..=*end).map(Value::Int).collect()
                        } else {
                            (*end..=*start).rev().map(Value::Int).collect()
                        };
                        Ok(Value::List(items))
                    }
                    _ => Err(self.arithmetic(
                        ctx,
                        ArithmeticError::IncompatibleOperands {
                            op: "..",
                            left: l.type_name(),
                            right: r.type_name(),
                        },
                    )),
                }
            }
            // The parser folds '|' into a dedicated filter node; a plain
            // binary node with this kind cannot be given meaning.
            BinaryOpKind::Filter => Err(EvalError::MalformedNode {
                template: ctx.template_name().to_string(),
                line: self.line,
            }),
        }
    }

    fn relational(
        &self,
        left: &Expression,
        right: &Expression,
        ctx: &EvaluationContext<'_>,
        symbol: &'static str,
        accept: impl Fn(Ordering) -> bool,
    ) -> Result<Value, EvalError> {
        let l = left.evaluate(ctx)?;
        let r = right.evaluate(ctx)?;
        match value::compare(&l, &r) {
            Some(ordering) => Ok(Value::Bool(accept(ordering))),
            None => Err(self.arithmetic(
                ctx,
                ArithmeticError::IncompatibleOperands {
                    op: symbol,
                    left: l.type_name(),
                    right: r.type_name(),
                },
            )),
        }
    }

    fn arith(
        &self,
        left: &Expression,
        right: &Expression,
        ctx: &EvaluationContext<'_>,
        apply: fn(&Value, &Value) -> Result<Value, ArithmeticError>,
    ) -> Result<Value, EvalError> {
        let l = left.evaluate(ctx)?;
        let r = right.evaluate(ctx)?;
        apply(&l, &r).map_err(|e| self.arithmetic(ctx, e))
    }

    fn resolve_args(
        &self,
        args: &Arguments,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Args, EvalError> {
        let mut positional = Vec::with_capacity(args.positional.len());
        for arg in &args.positional {
            positional.push(arg.evaluate(ctx)?);
        }
        let mut named = BTreeMap::new();
        for (name, arg) in &args.named {
            named.insert(name.clone(), arg.evaluate(ctx)?);
        }
        Ok(Args::new(positional, named))
    }

    fn arithmetic(&self, ctx: &EvaluationContext<'_>, source: ArithmeticError) -> EvalError {
        EvalError::Arithmetic {
            template: ctx.template_name().to_string(),
            line: self.line,
            source,
        }
    }

    fn unknown(
        &self,
        ctx: &EvaluationContext<'_>,
        kind: IdentifierKind,
        name: &str,
    ) -> EvalError {
        EvalError::UnknownIdentifier {
            kind,
            name: name.to_string(),
            template: ctx.template_name().to_string(),
            line: self.line,
        }
    }

    fn extension_failure(
        &self,
        ctx: &EvaluationContext<'_>,
        kind: IdentifierKind,
        name: &str,
        source: ExtensionError,
    ) -> EvalError {
        EvalError::Extension {
            kind,
            name: name.to_string(),
            template: ctx.template_name().to_string(),
            line: self.line,
            source,
        }
    }

    /// Pre-order traversal over this node and every child, including
    /// argument subtrees.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expression)) {
        visit(self);
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) => {}
            ExprKind::Unary { operand, .. } => operand.walk(visit),
            ExprKind::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ExprKind::Filter { target, args, .. } => {
                target.walk(visit);
                walk_args(args, visit);
            }
            ExprKind::TestInvocation { args, .. } | ExprKind::FunctionCall { args, .. } => {
                walk_args(args, visit);
            }
            ExprKind::GetAttribute { target, .. } => target.walk(visit),
        }
    }
}

fn walk_args(args: &Arguments, visit: &mut dyn FnMut(&Expression)) {
    for arg in &args.positional {
        arg.walk(visit);
    }
    for (_, arg) in &args.named {
        arg.walk(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::extension::RegistryBuilder;

    fn lit(v: impl Into<Value>) -> Expression {
        Expression::new(ExprKind::Literal(v.into()), 1)
    }

    fn binary(op: BinaryOpKind, left: Expression, right: Expression) -> Expression {
        Expression::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            1,
        )
    }

    fn eval(expr: &Expression, strict: bool) -> Result<Value, EvalError> {
        let registry = RegistryBuilder::new().build();
        let vars = Context::new();
        let ctx = EvaluationContext::new(&registry, "unit", strict, &vars);
        expr.evaluate(&ctx)
    }

    #[test]
    fn test_binary_add() {
        let expr = binary(BinaryOpKind::Add, lit(1), lit(2));
        assert_eq!(eval(&expr, false).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_undefined_variable_lenient_vs_strict() {
        let expr = Expression::new(ExprKind::Variable("missing".into()), 4);
        assert_eq!(eval(&expr, false).unwrap(), Value::Null);
        let err = eval(&expr, true).unwrap_err();
        assert!(matches!(
            err,
            EvalError::UndefinedVariable { name, line: 4, .. } if name == "missing"
        ));
    }

    #[test]
    fn test_or_short_circuits_past_strict_failure() {
        let expr = binary(
            BinaryOpKind::Or,
            lit(true),
            Expression::new(ExprKind::Variable("missing".into()), 1),
        );
        assert_eq!(eval(&expr, true).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_division_by_zero_carries_line() {
        let expr = Expression::new(
            ExprKind::Binary {
                op: BinaryOpKind::Divide,
                left: Box::new(lit(1)),
                right: Box::new(lit(0)),
            },
            7,
        );
        let err = eval(&expr, false).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Arithmetic {
                line: 7,
                source: ArithmeticError::DivisionByZero,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_filter_diagnostic() {
        let expr = Expression::new(
            ExprKind::Filter {
                target: Box::new(lit(1)),
                name: "missing".into(),
                args: Arguments::default(),
            },
            2,
        );
        let err = eval(&expr, false).unwrap_err();
        assert!(matches!(
            err,
            EvalError::UnknownIdentifier {
                kind: IdentifierKind::Filter,
                line: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_range_produces_inclusive_list() {
        let expr = binary(BinaryOpKind::Range, lit(1), lit(3));
        assert_eq!(
            eval(&expr, false).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_concatenate_stringifies() {
        let expr = binary(BinaryOpKind::Concatenate, lit("a"), lit(1));
        assert_eq!(eval(&expr, false).unwrap(), Value::String("a1".into()));
    }

    #[test]
    fn test_walk_visits_all_nodes() {
        let expr = binary(
            BinaryOpKind::Add,
            lit(1),
            binary(BinaryOpKind::Multiply, lit(2), lit(3)),
        );
        let mut count = 0;
        expr.walk(&mut |_| count += 1);
        assert_eq!(count, 5);
    }
}
