//! Template identity.
//!
//! A [`TemplateKey`] names one renderable template: a canonical name plus
//! an optional module and an optional locale. Keys are immutable values;
//! the `with_*` methods derive new keys instead of mutating.
//!
//! Two identities matter during resolution:
//!
//! - the **full key** is what the backing store is asked for (module and
//!   locale picked by candidate expansion), and
//! - the **minimal key** ([`TemplateKey::minimal`]) is the rendering
//!   identity used by the resolution context: two keys that render the
//!   same content share one minimal key. Scoped templates keep their
//!   module (they resolve only inside it) but drop the locale; non-scoped
//!   templates drop both, because module search and locale fallback are
//!   re-applied per request.

use std::fmt;

use crate::error::ResolveError;
use crate::locale::Locale;
use crate::name::{self, SCOPE_MARKER, SEPARATOR};

/// Identity of a template: canonical name, optional module, optional
/// locale.
///
/// # Examples
///
/// ```
/// use reweave::TemplateKey;
///
/// let key = TemplateKey::new("shop/cart")?;
/// let dep = key.dependency_key("./_prices")?;
/// assert_eq!(dep.name(), "shop/_prices");
/// assert!(dep.is_scoped());
/// assert!(dep.is_accessible_from(&key));
/// # Ok::<(), reweave::ResolveError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    module: Option<String>,
    name: String,
    locale: Option<Locale>,
}

impl TemplateKey {
    /// Creates a key from a raw name, validating and canonicalizing it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name breaks the
    /// rules of [`name::resolve_template_name`].
    pub fn new(name: &str) -> Result<Self, ResolveError> {
        Ok(Self::canonical(None, name::resolve_template_name(name)?, None))
    }

    /// Creates a key from parts already known to be canonical.
    pub(crate) fn canonical(module: Option<String>, name: String, locale: Option<Locale>) -> Self {
        Self { module, name, locale }
    }

    /// The canonical template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module this key is pinned to, when any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    /// The locale this key was resolved under, when any.
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    pub fn has_locale(&self) -> bool {
        self.locale.is_some()
    }

    /// The name with a trailing `/index` segment stripped.
    ///
    /// Default import aliases derive from the base name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] for the bare `index` name.
    pub fn base_name(&self) -> Result<String, ResolveError> {
        name::resolve_base_name(&self.name)
    }

    /// True when the last name segment starts with the scoping marker.
    ///
    /// Scoped templates are implementation details of their directory and
    /// are only visible to sibling templates.
    pub fn is_scoped(&self) -> bool {
        self.name
            .rsplit(SEPARATOR)
            .next()
            .is_some_and(|segment| segment.starts_with(SCOPE_MARKER))
    }

    /// Whether `dependent` may reference this key.
    ///
    /// Non-scoped templates are accessible from anywhere. A scoped
    /// template is accessible only from a dependent whose name has the
    /// same number of segments and matches on every segment but the last:
    /// `a/_impl` can be used by `a/b`, but not by `a/c/d` or `b/c`.
    pub fn is_accessible_from(&self, dependent: &TemplateKey) -> bool {
        if !self.is_scoped() {
            return true;
        }
        let mine: Vec<&str> = self.name.split(SEPARATOR).collect();
        let theirs: Vec<&str> = dependent.name.split(SEPARATOR).collect();
        mine.len() == theirs.len() && mine[..mine.len() - 1] == theirs[..theirs.len() - 1]
    }

    /// Derives the key of a dependency referenced from this template.
    ///
    /// `./` and `../` references resolve against this template's
    /// directory; other references resolve from the template root. Module
    /// and locale carry over so the dependency is looked up in the same
    /// context as its dependent.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] for invalid references and
    /// references escaping the template root.
    pub fn dependency_key(&self, reference: &str) -> Result<Self, ResolveError> {
        let resolved = name::resolve_dependency_name(&self.name, reference)?;
        Ok(Self::canonical(self.module.clone(), resolved, self.locale.clone()))
    }

    /// This key with a different name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the new name is invalid.
    pub fn with_name(&self, name: &str) -> Result<Self, ResolveError> {
        Ok(Self::canonical(
            self.module.clone(),
            name::resolve_template_name(name)?,
            self.locale.clone(),
        ))
    }

    /// This key pinned to a module.
    pub fn with_module(&self, module: impl Into<String>) -> Self {
        Self::canonical(Some(module.into()), self.name.clone(), self.locale.clone())
    }

    /// This key without a module.
    pub fn with_no_module(&self) -> Self {
        Self::canonical(None, self.name.clone(), self.locale.clone())
    }

    /// This key under a locale.
    pub fn with_locale(&self, locale: Locale) -> Self {
        Self::canonical(self.module.clone(), self.name.clone(), Some(locale))
    }

    /// This key without a locale.
    pub fn with_no_locale(&self) -> Self {
        Self::canonical(self.module.clone(), self.name.clone(), None)
    }

    /// The rendering identity of this key.
    ///
    /// All full keys that denote the same rendered content collapse to one
    /// minimal key: the locale is dropped (fallback re-picks it), and for
    /// non-scoped templates the module is dropped too (module search
    /// re-picks it). Scoped templates keep the module because they only
    /// ever resolve inside it.
    pub fn minimal(&self) -> Self {
        if self.is_scoped() {
            self.with_no_locale()
        } else {
            Self::canonical(None, self.name.clone(), None)
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("'")?;
        if let Some(module) = &self.module {
            write!(f, "{module}:")?;
        }
        write!(f, "{}'", self.name)?;
        if let Some(locale) = &self.locale {
            write!(f, "({locale})")?;
        }
        Ok(())
    }
}
