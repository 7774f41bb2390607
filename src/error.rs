//! Error taxonomy for configuration, parsing, evaluation, and loading.
//!
//! Each concern gets its own enum so callers can match on the failure class
//! without string inspection. Evaluation-time failures always carry the
//! template name and the source line of the owning AST node.

use thiserror::Error;

/// Duplicate registration detected while merging extensions.
///
/// Raised during engine construction, never at render time. Silent shadowing
/// would make template behavior depend on extension registration order.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("filter '{0}' is already registered")]
    DuplicateFilter(String),

    #[error("test '{0}' is already registered")]
    DuplicateTest(String),

    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("token parser '{0}' is already registered")]
    DuplicateTokenParser(String),

    #[error("unary operator '{0}' is already registered")]
    DuplicateUnaryOperator(String),

    #[error("binary operator '{0}' is already registered")]
    DuplicateBinaryOperator(String),

    #[error("global variable '{0}' is already registered")]
    DuplicateGlobalVariable(String),
}

/// Malformed token sequence in one template's expression text.
#[derive(Debug, Error)]
#[error("{message} (template '{template}', line {line})")]
pub struct ParseError {
    pub message: String,
    pub template: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, template: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            template: template.into(),
            line,
        }
    }
}

/// Failure raised inside a filter, test, or function implementation.
///
/// Implementations do not know their call site; the evaluator annotates this
/// with the owning node's line and template name before surfacing it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtensionError {
    pub message: String,
}

impl ExtensionError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Numeric operator failure, wrapped by [`EvalError::Arithmetic`].
#[derive(Debug, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot apply '{op}' to {left} and {right}")]
    IncompatibleOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot apply unary '{op}' to {operand}")]
    UnaryIncompatible {
        op: &'static str,
        operand: &'static str,
    },
}

/// The registry kind an unresolved identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Filter,
    Test,
    Function,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Filter => f.write_str("filter"),
            IdentifierKind::Test => f.write_str("test"),
            IdentifierKind::Function => f.write_str("function"),
        }
    }
}

/// Evaluation-time failure, annotated with template name and line number.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Unresolved name in strict-variables mode.
    #[error("undefined variable '{name}' (template '{template}', line {line})")]
    UndefinedVariable {
        name: String,
        template: String,
        line: u32,
    },

    /// Filter, test, or function name not present in the registry.
    #[error("unknown {kind} '{name}' (template '{template}', line {line})")]
    UnknownIdentifier {
        kind: IdentifierKind,
        name: String,
        template: String,
        line: u32,
    },

    /// Numeric operator failure at the owning node.
    #[error("arithmetic failure (template '{template}', line {line}): {source}")]
    Arithmetic {
        template: String,
        line: u32,
        #[source]
        source: ArithmeticError,
    },

    /// A filter, test, or function implementation raised a domain failure.
    #[error("{kind} '{name}' failed (template '{template}', line {line}): {source}")]
    Extension {
        kind: IdentifierKind,
        name: String,
        template: String,
        line: u32,
        #[source]
        source: ExtensionError,
    },

    /// An AST shape the evaluator cannot give meaning to, e.g. a test
    /// operator whose right-hand side is not a test invocation.
    #[error("malformed expression node (template '{template}', line {line})")]
    MalformedNode { template: String, line: u32 },
}

/// Template source resolution failure.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A single loader could not find the template.
    #[error("template '{name}' not found")]
    NotFound { name: String },

    /// Every member of a loader chain failed or returned absent. Reports
    /// only the original template name, never per-member diagnostics.
    #[error("could not find template '{name}'")]
    ChainExhausted { name: String },

    /// The configured charset is not supported by this loader.
    #[error("unsupported charset '{charset}' for template '{name}'")]
    Charset { charset: String, name: String },

    /// The template bytes are not valid in the configured charset.
    #[error("template '{name}' is not valid {charset}")]
    Decode { charset: String, name: String },

    #[error("failed to read template '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}
