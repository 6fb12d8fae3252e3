//! Filesystem-backed template loader.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::trace;

use crate::error::LoadError;
use crate::key::TemplateKey;

use super::TemplateLoader;

/// Loads templates from a directory tree.
///
/// A key maps to `<base>/<module>/<name>[_<locale>]<extension>`, where the
/// module directory is skipped for unqualified keys and the locale suffix
/// is `_en` or `_en_US` per the key's locale. The template name's `/`
/// segments become path components, so `shop/cart` under locale `pl_PL`
/// reads `<base>/shop/cart_pl_PL.ftl`.
///
/// Canonical names cannot contain `..` or start at the filesystem root,
/// so lookups stay inside the base directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    base: PathBuf,
    extension: String,
}

impl FileLoader {
    /// Creates a loader rooted at `base` with the default `.ftl`
    /// extension.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self::with_extension(base, ".ftl")
    }

    /// Creates a loader rooted at `base` with a custom file extension
    /// (leading dot included).
    pub fn with_extension(base: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extension: extension.into(),
        }
    }

    fn file_path(&self, key: &TemplateKey) -> PathBuf {
        let mut path = self.base.clone();
        if let Some(module) = key.module() {
            path.push(module);
        }
        let file_name = match key.locale() {
            Some(locale) => format!("{}_{}{}", key.name(), locale, self.extension),
            None => format!("{}{}", key.name(), self.extension),
        };
        path.join(file_name)
    }
}

#[async_trait]
impl TemplateLoader for FileLoader {
    async fn load(&self, key: &TemplateKey) -> Result<Option<String>, LoadError> {
        let path = self.file_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                trace!("loaded template {key} from file {}", path.display());
                Ok(Some(content))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                trace!("no file for template {key} at {}", path.display());
                Ok(None)
            }
            Err(source) => Err(LoadError::Io { path, source }),
        }
    }
}
