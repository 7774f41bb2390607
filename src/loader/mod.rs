//! Template source resolution.
//!
//! A loader maps a template name to source text and derives the cache key
//! the engine stores compiled templates under. Keys must differ whenever a
//! configuration change could change the resolved source, and be equal
//! otherwise; compiled-output caching is only correct under that invariant.

mod chain;
mod file;
mod memory;
mod string;

pub use chain::ChainLoader;
pub use file::FileLoader;
pub use memory::MemoryLoader;
pub use string::StringLoader;

use crate::error::LoaderError;

/// Identity of one template's resolved source under the current loader
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single loader's key.
    Leaf(String),
    /// A chain's key: the ordered member keys plus the template name.
    Composite {
        parts: Vec<CacheKey>,
        name: String,
    },
}

/// A template source provider.
///
/// Configuration setters are administrative operations expected to run
/// before render traffic begins.
pub trait Loader: Send + Sync {
    /// Resolve a template name to its source text.
    fn get_source(&self, name: &str) -> Result<String, LoaderError>;

    /// Prepend this to every template name before resolution.
    fn set_prefix(&mut self, prefix: &str);

    /// Append this to every template name before resolution.
    fn set_suffix(&mut self, suffix: &str);

    /// Character encoding used to decode template bytes.
    fn set_charset(&mut self, charset: &str);

    /// Resolve a sibling-relative template path against an anchor, without
    /// checking what the result resolves to beyond this loader's own
    /// knowledge. Returns `None` when the path cannot be resolved here.
    fn resolve_relative_path(&self, relative: &str, anchor: &str) -> Option<String>;

    /// Key identifying the source `name` resolves to under the current
    /// configuration.
    fn create_cache_key(&self, name: &str) -> CacheKey;
}

/// Join a `/`-separated relative path onto the directory of an anchor path,
/// normalizing `.` and `..` segments. Returns `None` when `..` escapes the
/// root.
pub(crate) fn join_relative(relative: &str, anchor: &str) -> Option<String> {
    let mut segments: Vec<&str> = match anchor.rfind('/') {
        Some(pos) => anchor[..pos].split('/').collect(),
        None => Vec::new(),
    };
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name),
        }
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative_sibling() {
        assert_eq!(
            join_relative("partial.html", "pages/index.html"),
            Some("pages/partial.html".to_string())
        );
    }

    #[test]
    fn test_join_relative_parent() {
        assert_eq!(
            join_relative("../shared/header.html", "pages/index.html"),
            Some("shared/header.html".to_string())
        );
    }

    #[test]
    fn test_join_relative_escaping_root() {
        assert_eq!(join_relative("../../x.html", "pages/index.html"), None);
    }
}
