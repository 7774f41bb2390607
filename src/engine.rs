//! Engine facade: configuration builder, template compilation, and the
//! compiled-template cache.

use std::sync::Arc;

use dashmap::DashMap;

use crate::context::Context;
use crate::error::{ConfigError, Error};
use crate::extension::core::CoreExtension;
use crate::extension::{Extension, ExtensionRegistry, NoOpExtension, RegistryBuilder};
use crate::lexer::{self, RawSegment};
use crate::loader::{CacheKey, Loader, StringLoader};
use crate::parser;
use crate::template::{Segment, Template};

/// Configures and builds an [`Engine`].
///
/// Extension registration happens once, here; after `build()` the merged
/// registry is frozen and shared read-only by every parse and render.
pub struct EngineBuilder {
    loader: Option<Box<dyn Loader>>,
    extensions: Vec<Box<dyn Extension>>,
    strict_variables: bool,
    core_extension: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            loader: None,
            extensions: Vec::new(),
            strict_variables: false,
            core_extension: true,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template source provider; defaults to [`StringLoader`].
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// In strict mode, referencing an unbound variable is a hard failure
    /// instead of yielding null.
    pub fn strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// Replace the default [`CoreExtension`] with a no-op contribution.
    pub fn without_core_extension(mut self) -> Self {
        self.core_extension = false;
        self
    }

    /// Merge all extensions and freeze the registry.
    ///
    /// Fails fast on any duplicate registration; collisions are
    /// configuration errors, never render-time surprises.
    pub fn build(self) -> Result<Engine, ConfigError> {
        let mut registry = RegistryBuilder::new();
        if self.core_extension {
            registry.register(&CoreExtension)?;
        } else {
            registry.register(&NoOpExtension)?;
        }
        for extension in &self.extensions {
            registry.register(extension.as_ref())?;
        }
        Ok(Engine {
            registry: Arc::new(registry.build()),
            loader: self.loader.unwrap_or_else(|| Box::new(StringLoader::new())),
            strict_variables: self.strict_variables,
            cache: DashMap::new(),
        })
    }
}

/// The template engine: resolves sources through its loader, compiles them
/// once, and caches compiled templates under the loader's cache keys.
pub struct Engine {
    registry: Arc<ExtensionRegistry>,
    loader: Box<dyn Loader>,
    strict_variables: bool,
    cache: DashMap<CacheKey, Arc<Template>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("strict_variables", &self.strict_variables)
            .field("cached_templates", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Compile the named template, or fetch it from the cache when the
    /// loader's key for it is unchanged.
    pub fn get_template(&self, name: &str) -> Result<Arc<Template>, Error> {
        let key = self.loader.create_cache_key(name);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(name, "Template cache hit");
            return Ok(Arc::clone(cached.value()));
        }
        let source = self.loader.get_source(name)?;
        let template = Arc::new(self.compile(name, &source)?);
        tracing::debug!(name, "Compiled template");
        self.cache.insert(key, Arc::clone(&template));
        Ok(template)
    }

    /// Resolve, compile, and render in one call.
    pub fn render(&self, name: &str, variables: &Context) -> Result<String, Error> {
        self.get_template(name)?.render(variables)
    }

    fn compile(&self, name: &str, source: &str) -> Result<Template, Error> {
        let mut segments = Vec::new();
        for raw in lexer::segment(source, name)? {
            match raw {
                RawSegment::Text(text) => segments.push(Segment::Text(text)),
                RawSegment::Expression { text, line } => {
                    let expr = parser::parse_source(&text, &self.registry, name, line)?;
                    for visitor in self.registry.visitors() {
                        visitor.visit(&expr, name);
                    }
                    segments.push(Segment::Expression(expr));
                }
            }
        }
        Ok(Template::new(
            name.to_string(),
            segments,
            Arc::clone(&self.registry),
            self.strict_variables,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::ast::visitor::AstVisitor;
    use crate::ast::Expression;
    use crate::error::ExtensionError;
    use crate::extension::{Args, Filter};
    use crate::value::Value;

    struct ShoutBundle;

    fn shout(
        input: &Value,
        _args: &Args,
        _ctx: &crate::context::EvaluationContext<'_>,
    ) -> Result<Value, ExtensionError> {
        Ok(Value::String(format!("{input}!")))
    }

    impl Extension for ShoutBundle {
        fn filters(&self) -> Vec<(String, Arc<dyn Filter>)> {
            vec![("shout".to_string(), Arc::new(shout) as Arc<dyn Filter>)]
        }
    }

    struct UpperBundle;

    impl Extension for UpperBundle {
        fn filters(&self) -> Vec<(String, Arc<dyn Filter>)> {
            vec![("upper".to_string(), Arc::new(shout) as Arc<dyn Filter>)]
        }
    }

    #[test]
    fn test_render_with_variables() {
        let engine = Engine::builder().build().unwrap();
        let mut vars = Context::new();
        vars.insert("name", "world");
        assert_eq!(
            engine.render("Hello {{ name }}!", &vars).unwrap(),
            "Hello world!"
        );
    }

    #[test]
    fn test_custom_extension_filter() {
        let engine = Engine::builder().extension(ShoutBundle).build().unwrap();
        let vars = Context::new();
        assert_eq!(engine.render("{{ 'hi' | shout }}", &vars).unwrap(), "hi!");
    }

    #[test]
    fn test_collision_with_core_fails_at_build() {
        let err = Engine::builder().extension(UpperBundle).build().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFilter(name) if name == "upper"));
    }

    #[test]
    fn test_disabled_core_makes_room_for_replacement() {
        let engine = Engine::builder()
            .without_core_extension()
            .extension(UpperBundle)
            .build()
            .unwrap();
        assert!(engine.registry().filter("upper").is_some());
        assert!(engine.registry().filter("lower").is_none());
    }

    #[test]
    fn test_compiled_template_is_cached() {
        let engine = Engine::builder().build().unwrap();
        let first = engine.get_template("{{ 1 + 2 }}").unwrap();
        let second = engine.get_template("{{ 1 + 2 }}").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    struct CountingVisitor(Arc<AtomicUsize>);

    impl AstVisitor for CountingVisitor {
        fn visit(&self, _root: &Expression, _template: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct VisitorBundle(Arc<AtomicUsize>);

    impl Extension for VisitorBundle {
        fn ast_visitors(&self) -> Vec<Arc<dyn AstVisitor>> {
            vec![Arc::new(CountingVisitor(Arc::clone(&self.0)))]
        }
    }

    #[test]
    fn test_visitors_run_once_per_parsed_expression() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Engine::builder()
            .extension(VisitorBundle(Arc::clone(&calls)))
            .build()
            .unwrap();
        engine.get_template("{{ 1 }} and {{ 2 }}").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A cache hit does not re-parse, so visitors do not run again.
        engine.get_template("{{ 1 }} and {{ 2 }}").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
