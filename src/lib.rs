//! Basalt: a lightweight template-expression engine.
//!
//! Templates are text documents interpolating `{{ expression }}` segments.
//! Expressions are parsed by a precedence-climbing parser over an operator
//! table assembled from extensions, evaluated against per-render contexts,
//! and compiled templates are cached under loader-derived keys.
//!
//! # Modules
//!
//! - [`engine`] — configuration builder, compilation, template cache
//! - [`extension`] — contribution surface, registry builder and frozen snapshot
//! - [`parser`] — precedence-climbing expression parser
//! - [`ast`] — expression nodes, evaluation, post-parse visitors
//! - [`lexer`] — tokens, scanner, `{{ }}` segmentation
//! - [`operator`] — operator definitions and table
//! - [`loader`] — source providers and cache keys
//! - [`value`] — runtime values and numeric coercion
//! - [`context`] — render bindings and the evaluation context
//! - [`template`] — compiled templates
//! - [`error`] — the error taxonomy
//!
//! # Example
//!
//! ```
//! use basalt::{Context, Engine};
//!
//! let engine = Engine::builder().build().unwrap();
//! let mut vars = Context::new();
//! vars.insert("name", "world");
//! let out = engine.render("Hello {{ name | capitalize }}!", &vars).unwrap();
//! assert_eq!(out, "Hello World!");
//! ```

pub mod ast;
pub mod context;
pub mod engine;
pub mod error;
pub mod extension;
pub mod lexer;
pub mod loader;
pub mod operator;
pub mod parser;
pub mod template;
pub mod value;

pub use context::Context;
pub use engine::{Engine, EngineBuilder};
pub use error::{ConfigError, Error, EvalError, ExtensionError, LoaderError, ParseError};
pub use extension::{Args, Extension, Filter, Function, Test};
pub use loader::{CacheKey, ChainLoader, FileLoader, Loader, MemoryLoader, StringLoader};
pub use template::Template;
pub use value::Value;
