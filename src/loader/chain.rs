//! Ordered delegation across member loaders.

use super::{CacheKey, Loader};
use crate::error::LoaderError;

/// Delegates to a list of member loaders in order. The first member that
/// resolves a name wins and the rest are never consulted. A chain is itself
/// a [`Loader`], so chains compose into larger chains.
pub struct ChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ChainLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

impl Loader for ChainLoader {
    /// Short-circuits on the first success. A member's not-found is the one
    /// locally recovered failure; anything else propagates unmodified.
    fn get_source(&self, name: &str) -> Result<String, LoaderError> {
        for loader in &self.loaders {
            match loader.get_source(name) {
                Ok(source) => return Ok(source),
                Err(LoaderError::NotFound { .. }) | Err(LoaderError::ChainExhausted { .. }) => {
                    tracing::debug!(name, "Member loader missed, trying next");
                }
                Err(other) => return Err(other),
            }
        }
        Err(LoaderError::ChainExhausted {
            name: name.to_string(),
        })
    }

    /// Broadcast: every member receives the same value, so resolution
    /// behaves identically regardless of which member wins a name.
    fn set_prefix(&mut self, prefix: &str) {
        for loader in &mut self.loaders {
            loader.set_prefix(prefix);
        }
    }

    fn set_suffix(&mut self, suffix: &str) {
        for loader in &mut self.loaders {
            loader.set_suffix(suffix);
        }
    }

    fn set_charset(&mut self, charset: &str) {
        for loader in &mut self.loaders {
            loader.set_charset(charset);
        }
    }

    fn resolve_relative_path(&self, relative: &str, anchor: &str) -> Option<String> {
        self.loaders
            .iter()
            .find_map(|loader| loader.resolve_relative_path(relative, anchor))
    }

    fn create_cache_key(&self, name: &str) -> CacheKey {
        CacheKey::Composite {
            parts: self
                .loaders
                .iter()
                .map(|loader| loader.create_cache_key(name))
                .collect(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn member(entries: &[(&str, &str)]) -> Box<dyn Loader> {
        let mut loader = MemoryLoader::new();
        for (name, source) in entries {
            loader.insert(*name, *source);
        }
        Box::new(loader)
    }

    #[test]
    fn test_first_match_wins() {
        let chain = ChainLoader::new(vec![
            member(&[]),
            member(&[("page", "X")]),
            member(&[("page", "Y")]),
        ]);
        assert_eq!(chain.get_source("page").unwrap(), "X");
    }

    #[test]
    fn test_exhaustion_names_only_the_template() {
        let chain = ChainLoader::new(vec![member(&[]), member(&[])]);
        let err = chain.get_source("missing").unwrap_err();
        assert!(matches!(
            err,
            LoaderError::ChainExhausted { name } if name == "missing"
        ));
    }

    #[test]
    fn test_broadcast_setters_reach_every_member() {
        let mut chain = ChainLoader::new(vec![
            member(&[("templates/page.html", "A")]),
            member(&[("templates/other.html", "B")]),
        ]);
        chain.set_prefix("templates/");
        chain.set_suffix(".html");
        assert_eq!(chain.get_source("page").unwrap(), "A");
        assert_eq!(chain.get_source("other").unwrap(), "B");
    }

    #[test]
    fn test_cache_key_is_stable_and_configuration_sensitive() {
        let mut chain = ChainLoader::new(vec![member(&[]), member(&[])]);
        let before = chain.create_cache_key("page");
        assert_eq!(before, chain.create_cache_key("page"));

        chain.set_prefix("other/");
        let after = chain.create_cache_key("page");
        assert_ne!(before, after);
    }

    #[test]
    fn test_chain_composes_into_chains() {
        let inner = ChainLoader::new(vec![member(&[("page", "inner")])]);
        let outer = ChainLoader::new(vec![member(&[]), Box::new(inner)]);
        assert_eq!(outer.get_source("page").unwrap(), "inner");
        assert!(matches!(
            outer.create_cache_key("page"),
            CacheKey::Composite { ref parts, .. }
                if matches!(parts[1], CacheKey::Composite { .. })
        ));
    }
}
