//! Post-parse hooks over freshly compiled expression trees.

use super::Expression;

/// Invoked once per parsed expression tree after parsing completes, before
/// the template is cached. Intended for cross-cutting static analysis; has
/// no evaluation-time role.
///
/// Implementations typically use [`Expression::walk`] to traverse the tree.
pub trait AstVisitor: Send + Sync {
    fn visit(&self, root: &Expression, template: &str);
}
