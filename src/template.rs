//! Compiled templates and rendering.

use std::sync::Arc;

use crate::ast::Expression;
use crate::context::{Context, EvaluationContext};
use crate::error::Error;
use crate::extension::ExtensionRegistry;

/// One compiled piece of a template: literal text or a parsed expression.
#[derive(Debug, Clone)]
pub enum Segment {
    Text(String),
    Expression(Expression),
}

/// A compiled template. Immutable once built; safe to render concurrently
/// from multiple threads, each render against its own [`Context`].
#[derive(Debug)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
    registry: Arc<ExtensionRegistry>,
    strict_variables: bool,
}

impl Template {
    pub(crate) fn new(
        name: String,
        segments: Vec<Segment>,
        registry: Arc<ExtensionRegistry>,
        strict_variables: bool,
    ) -> Self {
        Self {
            name,
            segments,
            registry,
            strict_variables,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate every expression segment against `variables` and write the
    /// results between the text segments.
    pub fn render(&self, variables: &Context) -> Result<String, Error> {
        let ctx = EvaluationContext::new(
            &self.registry,
            &self.name,
            self.strict_variables,
            variables,
        );
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expression(expr) => {
                    let value = expr.evaluate(&ctx)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }

    /// The parsed expression trees, in document order.
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Expression(expr) => Some(expr),
            Segment::Text(_) => None,
        })
    }
}
