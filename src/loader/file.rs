//! Filesystem loader rooted at a directory.

use std::path::{Path, PathBuf};

use super::{join_relative, CacheKey, Loader};
use crate::error::LoaderError;

/// Loads templates from files under a root directory. The resolved relative
/// path is `prefix + name + suffix`; bytes are decoded with the configured
/// charset (UTF-8 is the only supported encoding).
#[derive(Debug)]
pub struct FileLoader {
    root: PathBuf,
    prefix: String,
    suffix: String,
    charset: String,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: String::new(),
            suffix: String::new(),
            charset: "UTF-8".to_string(),
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(self.qualified(name))
    }

    fn charset_supported(&self) -> bool {
        self.charset.eq_ignore_ascii_case("utf-8") || self.charset.eq_ignore_ascii_case("utf8")
    }
}

impl Loader for FileLoader {
    fn get_source(&self, name: &str) -> Result<String, LoaderError> {
        if !self.charset_supported() {
            return Err(LoaderError::Charset {
                charset: self.charset.clone(),
                name: name.to_string(),
            });
        }
        let path = self.path_for(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoaderError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => {
                return Err(LoaderError::Io {
                    name: name.to_string(),
                    source: e,
                });
            }
        };
        tracing::debug!(name, path = %path.display(), "Loaded template source");
        String::from_utf8(bytes).map_err(|_| LoaderError::Decode {
            charset: self.charset.clone(),
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
        self.root
            .join(Path::new(&self.qualified(&resolved)))
            .is_file()
            .then_some(resolved)
    }

    fn create_cache_key(&self, name: &str) -> CacheKey {
        CacheKey::Leaf(format!(
            "file:{}:{}@{}",
            self.root.display(),
            self.qualified(name),
            self.charset
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_loads_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "{{ 1 + 2 }}").unwrap();
        let loader = FileLoader::new(dir.path());
        assert_eq!(loader.get_source("page.html").unwrap(), "{{ 1 + 2 }}");
    }

    #[test]
    fn test_prefix_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("emails")).unwrap();
        fs::write(dir.path().join("emails/welcome.html"), "hi").unwrap();
        let mut loader = FileLoader::new(dir.path());
        loader.set_prefix("emails/");
        loader.set_suffix(".html");
        assert_eq!(loader.get_source("welcome").unwrap(), "hi");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileLoader::new(dir.path());
        assert!(matches!(
            loader.get_source("absent.html"),
            Err(LoaderError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unsupported_charset_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "x").unwrap();
        let mut loader = FileLoader::new(dir.path());
        loader.set_charset("latin-1");
        assert!(matches!(
            loader.get_source("page.html"),
            Err(LoaderError::Charset { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_fails_decode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), [0xff, 0xfe, 0x00]).unwrap();
        let loader = FileLoader::new(dir.path());
        assert!(matches!(
            loader.get_source("page.html"),
            Err(LoaderError::Decode { .. })
        ));
    }
}
