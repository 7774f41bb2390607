//! In-memory name → source loader.

use std::collections::HashMap;

use super::{join_relative, CacheKey, Loader};
use crate::error::LoaderError;

/// Explicit name → source map. The registered names include any prefix and
/// suffix, matching how a filesystem loader lays templates out.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
    prefix: String,
    suffix: String,
    charset: String,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            charset: "UTF-8".to_string(),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }
}

impl Loader for MemoryLoader {
    fn get_source(&self, name: &str) -> Result<String, LoaderError> {
        self.templates
            .get(&self.qualified(name))
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
            })
    }

    fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    fn set_suffix(&mut self, suffix: &str) {
        self.suffix = suffix.to_string();
    }

    fn set_charset(&mut self, charset: &str) {
        self.charset = charset.to_string();
    }

    fn resolve_relative_path(&self, relative: &str, anchor: &str) -> Option<String> {
        let resolved = join_relative(relative, anchor)?;
        self.templates
            .contains_key(&self.qualified(&resolved))
            .then_some(resolved)
    }

    fn create_cache_key(&self, name: &str) -> CacheKey {
        CacheKey::Leaf(format!(
            "memory:{}@{}",
            self.qualified(name),
            self.charset
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_honors_prefix_and_suffix() {
        let mut loader = MemoryLoader::new();
        loader.insert("emails/welcome.html", "hi");
        loader.set_prefix("emails/");
        loader.set_suffix(".html");
        assert_eq!(loader.get_source("welcome").unwrap(), "hi");
        assert!(matches!(
            loader.get_source("missing"),
            Err(LoaderError::NotFound { name }) if name == "missing"
        ));
    }

    #[test]
    fn test_relative_resolution_requires_existence() {
        let mut loader = MemoryLoader::new();
        loader.insert("pages/partial.html", "x");
        assert_eq!(
            loader.resolve_relative_path("partial.html", "pages/index.html"),
            Some("pages/partial.html".to_string())
        );
        assert_eq!(
            loader.resolve_relative_path("absent.html", "pages/index.html"),
            None
        );
    }

    #[test]
    fn test_cache_key_tracks_configuration() {
        let mut loader = MemoryLoader::new();
        let before = loader.create_cache_key("page");
        loader.set_suffix(".html");
        assert_ne!(before, loader.create_cache_key("page"));
    }
}
