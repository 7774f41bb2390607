//! Render-time variable bindings and the per-render evaluation context.

use std::collections::BTreeMap;

use crate::extension::ExtensionRegistry;
use crate::value::Value;

/// Variable bindings supplied by the caller for one render.
#[derive(Debug, Clone, Default)]
pub struct Context {
    variables: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Build a context from a JSON object, converting each field.
    pub fn from_json(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            variables: object
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// The per-render bundle passed into every evaluation call: caller bindings
/// layered over extension globals, registry access, and the identifying
/// metadata used in diagnostics.
///
/// One instance per render invocation; never shared between concurrent
/// renders.
#[derive(Debug)]
pub struct EvaluationContext<'a> {
    variables: &'a Context,
    registry: &'a ExtensionRegistry,
    template_name: &'a str,
    strict_variables: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        registry: &'a ExtensionRegistry,
        template_name: &'a str,
        strict_variables: bool,
        variables: &'a Context,
    ) -> Self {
        Self {
            variables,
            registry,
            template_name,
            strict_variables,
        }
    }

    /// Caller bindings shadow extension-contributed globals.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables
            .get(name)
            .or_else(|| self.registry.global_variable(name))
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        self.registry
    }

    pub fn template_name(&self) -> &str {
        self.template_name
    }

    pub fn strict_variables(&self) -> bool {
        self.strict_variables
    }
}
