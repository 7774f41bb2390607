//! Extension contribution surface, the registry builder, and the frozen
//! registry snapshot consumed by the parser and evaluator.
//!
//! The split between [`RegistryBuilder`] (mutable, configuration time only)
//! and [`ExtensionRegistry`] (immutable, shared read-only across renders)
//! makes the concurrency guarantee structural: once built, nothing can
//! mutate the merged tables.

pub mod core;
mod filters;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::ast::visitor::AstVisitor;
use crate::context::EvaluationContext;
use crate::error::{ConfigError, ExtensionError};
use crate::operator::{BinaryOperator, OperatorTable, UnaryOperator};
use crate::value::Value;

/// Evaluated positional and named arguments for one filter/test/function
/// invocation, in source order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>, named: BTreeMap<String, Value>) -> Self {
        Self { positional, named }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Positional argument by index, falling back to a named argument.
    pub fn get_or_named(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.named.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Transforms an evaluated input value.
pub trait Filter: Send + Sync {
    fn apply(
        &self,
        input: &Value,
        args: &Args,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Value, ExtensionError>;
}

impl<F> Filter for F
where
    F: Fn(&Value, &Args, &EvaluationContext<'_>) -> Result<Value, ExtensionError> + Send + Sync,
{
    fn apply(
        &self,
        input: &Value,
        args: &Args,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Value, ExtensionError> {
        self(input, args, ctx)
    }
}

/// Predicate applied to an evaluated input value by `is` / `is not`.
pub trait Test: Send + Sync {
    fn apply(
        &self,
        input: &Value,
        args: &Args,
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, ExtensionError>;
}

impl<F> Test for F
where
    F: Fn(&Value, &Args, &EvaluationContext<'_>) -> Result<bool, ExtensionError> + Send + Sync,
{
    fn apply(
        &self,
        input: &Value,
        args: &Args,
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, ExtensionError> {
        self(input, args, ctx)
    }
}

/// Callable invoked without an input value.
pub trait Function: Send + Sync {
    fn call(&self, args: &Args, ctx: &EvaluationContext<'_>) -> Result<Value, ExtensionError>;
}

impl<F> Function for F
where
    F: Fn(&Args, &EvaluationContext<'_>) -> Result<Value, ExtensionError> + Send + Sync,
{
    fn call(&self, args: &Args, ctx: &EvaluationContext<'_>) -> Result<Value, ExtensionError> {
        self(args, ctx)
    }
}

/// Registration point for outer-template statement syntax.
///
/// The statement grammar itself lives outside the expression subsystem; the
/// registry only indexes parsers by tag and rejects duplicates.
pub trait TokenParser: Send + Sync {
    fn tag(&self) -> &str;
}

/// A package of operators, filters, tests, functions, and hooks contributed
/// at engine configuration time.
///
/// Every method defaults to an empty contribution, so an extension
/// implementing none of them is a valid no-op.
pub trait Extension: Send + Sync {
    fn unary_operators(&self) -> Vec<UnaryOperator> {
        Vec::new()
    }

    fn binary_operators(&self) -> Vec<BinaryOperator> {
        Vec::new()
    }

    fn filters(&self) -> Vec<(String, Arc<dyn Filter>)> {
        Vec::new()
    }

    fn tests(&self) -> Vec<(String, Arc<dyn Test>)> {
        Vec::new()
    }

    fn functions(&self) -> Vec<(String, Arc<dyn Function>)> {
        Vec::new()
    }

    fn token_parsers(&self) -> Vec<Arc<dyn TokenParser>> {
        Vec::new()
    }

    fn ast_visitors(&self) -> Vec<Arc<dyn AstVisitor>> {
        Vec::new()
    }

    fn global_variables(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// An extension contributing nothing; stands in for a disabled feature
/// bundle without branching registry logic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpExtension;

impl Extension for NoOpExtension {}

/// Mutable accumulation of extension contributions, consumed during engine
/// construction only.
#[derive(Default)]
pub struct RegistryBuilder {
    operators: OperatorTable,
    filters: HashMap<String, Arc<dyn Filter>>,
    tests: HashMap<String, Arc<dyn Test>>,
    functions: HashMap<String, Arc<dyn Function>>,
    token_parsers: HashMap<String, Arc<dyn TokenParser>>,
    visitors: Vec<Arc<dyn AstVisitor>>,
    globals: BTreeMap<String, Value>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one extension's contributions, failing fast on any collision
    /// within the same kind (and arity class, for operators).
    pub fn register(&mut self, extension: &dyn Extension) -> Result<(), ConfigError> {
        for op in extension.unary_operators() {
            self.operators.add_unary(op)?;
        }
        for op in extension.binary_operators() {
            self.operators.add_binary(op)?;
        }
        for (name, filter) in extension.filters() {
            if self.filters.contains_key(&name) {
                return Err(ConfigError::DuplicateFilter(name));
            }
            self.filters.insert(name, filter);
        }
        for (name, test) in extension.tests() {
            if self.tests.contains_key(&name) {
                return Err(ConfigError::DuplicateTest(name));
            }
            self.tests.insert(name, test);
        }
        for (name, function) in extension.functions() {
            if self.functions.contains_key(&name) {
                return Err(ConfigError::DuplicateFunction(name));
            }
            self.functions.insert(name, function);
        }
        for parser in extension.token_parsers() {
            let tag = parser.tag().to_string();
            if self.token_parsers.contains_key(&tag) {
                return Err(ConfigError::DuplicateTokenParser(tag));
            }
            self.token_parsers.insert(tag, parser);
        }
        for (name, value) in extension.global_variables() {
            if self.globals.contains_key(&name) {
                return Err(ConfigError::DuplicateGlobalVariable(name));
            }
            self.globals.insert(name, value);
        }
        self.visitors.extend(extension.ast_visitors());

        tracing::debug!(
            filters = self.filters.len(),
            tests = self.tests.len(),
            functions = self.functions.len(),
            "Merged extension contributions"
        );
        Ok(())
    }

    /// Freeze into the immutable snapshot shared by all parses and renders.
    pub fn build(self) -> ExtensionRegistry {
        ExtensionRegistry {
            operators: self.operators,
            filters: self.filters,
            tests: self.tests,
            functions: self.functions,
            token_parsers: self.token_parsers,
            visitors: self.visitors,
            globals: self.globals,
        }
    }
}

/// Immutable merged registry; safe for concurrent read access from any
/// number of simultaneous parses and renders.
pub struct ExtensionRegistry {
    operators: OperatorTable,
    filters: HashMap<String, Arc<dyn Filter>>,
    tests: HashMap<String, Arc<dyn Test>>,
    functions: HashMap<String, Arc<dyn Function>>,
    token_parsers: HashMap<String, Arc<dyn TokenParser>>,
    visitors: Vec<Arc<dyn AstVisitor>>,
    globals: BTreeMap<String, Value>,
}

impl ExtensionRegistry {
    pub fn unary_operator(&self, symbol: &str) -> Option<&UnaryOperator> {
        self.operators.unary(symbol)
    }

    pub fn binary_operator(&self, symbol: &str) -> Option<&BinaryOperator> {
        self.operators.binary(symbol)
    }

    /// All registered operator symbols, for the lexer's punctuation matcher.
    pub fn operator_symbols(&self) -> Vec<String> {
        self.operators.symbols()
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&Arc<dyn Test>> {
        self.tests.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn token_parser(&self, tag: &str) -> Option<&Arc<dyn TokenParser>> {
        self.token_parsers.get(tag)
    }

    pub fn visitors(&self) -> &[Arc<dyn AstVisitor>] {
        &self.visitors
    }

    pub fn global_variable(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("filters", &self.filters.len())
            .field("tests", &self.tests.len())
            .field("functions", &self.functions.len())
            .field("token_parsers", &self.token_parsers.len())
            .field("visitors", &self.visitors.len())
            .field("globals", &self.globals.len())
            .finish()
    }
}
