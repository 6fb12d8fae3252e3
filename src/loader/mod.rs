//! Template backing stores.
//!
//! A [`TemplateLoader`] is the async boundary between the engine and
//! wherever template sources actually live. The contract is small:
//!
//! - `Ok(Some(content))` - the key matched, here is the source text
//! - `Ok(None)` - this backend does not have the key; the resolver moves
//!   on to the next candidate key (or the next loader in a chain)
//! - `Err(_)` - transport trouble; the whole render aborts with a
//!   [`BackendFetch`](crate::ResolveError::BackendFetch) error
//!
//! Three implementations ship with the engine: [`FileLoader`] reads a
//! directory tree, [`StaticLoader`] serves an in-memory map (embedded
//! templates, tests), and [`ChainLoader`] tries a list of loaders in
//! order.

mod file;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{LoadError, ResolveError};
use crate::key::TemplateKey;
use crate::locale::Locale;

pub use file::FileLoader;

/// Asynchronous source of template content.
///
/// Loaders are shared across concurrent fetches and must be cheap to call
/// repeatedly: the engine's resolution cache, not the loader, is
/// responsible for memoization.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Fetches the content for one exact key.
    ///
    /// `None` means this backend has no such template. Locale and module
    /// fallback happen above this call, one candidate key at a time, so
    /// implementations must not apply fallback themselves.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] only for transport failures, never for
    /// misses.
    async fn load(&self, key: &TemplateKey) -> Result<Option<String>, LoadError>;
}

/// In-memory template store.
///
/// The embedded-resources loader: register content under exact keys and
/// serve it without I/O. Useful for templates compiled into the binary
/// and as the primary test double.
///
/// # Examples
///
/// ```
/// use reweave::loader::StaticLoader;
///
/// let loader = StaticLoader::new()
///     .with("page", "<@include \"./header\"/>body")?
///     .with("header", "head | ")?;
/// # Ok::<(), reweave::ResolveError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    templates: HashMap<TemplateKey, String>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers content under a plain name, no module, no locale.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name is invalid.
    pub fn with(self, name: &str, content: &str) -> Result<Self, ResolveError> {
        Ok(self.with_key(TemplateKey::new(name)?, content))
    }

    /// Registers localized content under a plain name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name is invalid.
    pub fn with_localized(
        self,
        name: &str,
        locale: Locale,
        content: &str,
    ) -> Result<Self, ResolveError> {
        Ok(self.with_key(TemplateKey::new(name)?.with_locale(locale), content))
    }

    /// Registers content under an exact key.
    pub fn with_key(mut self, key: TemplateKey, content: &str) -> Self {
        self.templates.insert(key, content.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[async_trait]
impl TemplateLoader for StaticLoader {
    async fn load(&self, key: &TemplateKey) -> Result<Option<String>, LoadError> {
        Ok(self.templates.get(key).cloned())
    }
}

/// Tries a list of loaders in order; the first hit wins.
///
/// Misses fall through to the next loader, errors do not: a failing
/// backend aborts the lookup rather than silently serving stale content
/// from a later one.
pub struct ChainLoader {
    loaders: Vec<Arc<dyn TemplateLoader>>,
}

impl ChainLoader {
    pub fn new(loaders: Vec<Arc<dyn TemplateLoader>>) -> Self {
        Self { loaders }
    }
}

#[async_trait]
impl TemplateLoader for ChainLoader {
    async fn load(&self, key: &TemplateKey) -> Result<Option<String>, LoadError> {
        for (position, loader) in self.loaders.iter().enumerate() {
            if let Some(content) = loader.load(key).await? {
                trace!("loaded template {key} from chained loader #{position}");
                return Ok(Some(content));
            }
        }
        Ok(None)
    }
}
