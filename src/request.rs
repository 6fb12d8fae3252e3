//! Resolution requests.
//!
//! A [`RenderRequest`] is what callers hand to the engine to identify a
//! root template: a name, the modules to search, and an optional locale.
//! The same type drives dependency resolution internally, re-targeted via
//! the `with_*` methods.

use std::collections::HashSet;
use std::fmt;

use crate::error::ResolveError;
use crate::locale::Locale;
use crate::name;

/// A request to resolve a template by name, within a set of search
/// modules, under an optional locale.
///
/// Module order is meaningful: candidate keys probe modules in the order
/// given here, first hit wins. Duplicate modules collapse to their first
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    name: String,
    modules: Vec<String>,
    locale: Option<Locale>,
}

impl RenderRequest {
    /// Creates a request for a template name with no modules and no
    /// locale.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name is invalid.
    pub fn new(name: &str) -> Result<Self, ResolveError> {
        Ok(Self {
            name: name::resolve_template_name(name)?,
            modules: Vec::new(),
            locale: None,
        })
    }

    /// Creates a localized request.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name is invalid.
    pub fn localized(name: &str, locale: Locale) -> Result<Self, ResolveError> {
        Ok(Self::new(name)?.with_locale(locale))
    }

    /// The canonical template name being requested.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The modules to search, in probe order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn has_modules(&self) -> bool {
        !self.modules.is_empty()
    }

    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    pub fn has_locale(&self) -> bool {
        self.locale.is_some()
    }

    /// This request for a different name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when the name is invalid.
    pub fn with_name(&self, name: &str) -> Result<Self, ResolveError> {
        Ok(Self {
            name: name::resolve_template_name(name)?,
            modules: self.modules.clone(),
            locale: self.locale.clone(),
        })
    }

    /// This request searching exactly the given modules, deduplicated in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] for invalid module names.
    pub fn with_modules<I, S>(&self, modules: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules = dedup_modules(Vec::new(), modules)?;
        Ok(Self {
            name: self.name.clone(),
            modules,
            locale: self.locale.clone(),
        })
    }

    /// This request searching one module only.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] for an invalid module name.
    pub fn with_module(&self, module: &str) -> Result<Self, ResolveError> {
        self.with_modules([module])
    }

    /// This request with no module search at all.
    pub fn with_no_modules(&self) -> Self {
        Self {
            name: self.name.clone(),
            modules: Vec::new(),
            locale: self.locale.clone(),
        }
    }

    /// This request with extra modules appended after the existing ones,
    /// deduplicated in order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] for invalid module names.
    pub fn add_modules<I, S>(&self, modules: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules = dedup_modules(self.modules.clone(), modules)?;
        Ok(Self {
            name: self.name.clone(),
            modules,
            locale: self.locale.clone(),
        })
    }

    /// This request under a locale.
    pub fn with_locale(&self, locale: Locale) -> Self {
        Self {
            name: self.name.clone(),
            modules: self.modules.clone(),
            locale: Some(locale),
        }
    }

    /// This request without a locale.
    pub fn with_no_locale(&self) -> Self {
        Self {
            name: self.name.clone(),
            modules: self.modules.clone(),
            locale: None,
        }
    }
}

fn dedup_modules<I, S>(existing: Vec<String>, extra: I) -> Result<Vec<String>, ResolveError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    let mut modules = existing;
    for module in extra {
        let module = module.into();
        name::validate_module(&module)?;
        if seen.insert(module.clone()) {
            modules.push(module);
        }
    }
    Ok(modules)
}

impl fmt::Display for RenderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("'")?;
        if !self.modules.is_empty() {
            write!(f, "{}:", self.modules.join(","))?;
        }
        write!(f, "{}'", self.name)?;
        if let Some(locale) = &self.locale {
            write!(f, "({locale})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canonicalizes_the_name() {
        let request = RenderRequest::new("a/./b").unwrap();
        assert_eq!(request.name(), "a/b");
        assert!(!request.has_modules());
        assert!(!request.has_locale());
    }

    #[test]
    fn test_modules_keep_order_and_dedup() {
        let request = RenderRequest::new("a")
            .unwrap()
            .with_modules(["mails", "common", "mails"])
            .unwrap();
        assert_eq!(request.modules(), ["mails", "common"]);
    }

    #[test]
    fn test_add_modules_appends_without_duplicates() {
        let request = RenderRequest::new("a")
            .unwrap()
            .with_modules(["mails"])
            .unwrap()
            .add_modules(["common", "mails"])
            .unwrap();
        assert_eq!(request.modules(), ["mails", "common"]);
    }

    #[test]
    fn test_invalid_module_is_rejected() {
        let request = RenderRequest::new("a").unwrap();
        assert!(request.with_modules(["bad module"]).is_err());
    }

    #[test]
    fn test_with_module_replaces_the_search_list() {
        let request = RenderRequest::new("a")
            .unwrap()
            .with_modules(["mails", "common"])
            .unwrap()
            .with_module("other")
            .unwrap();
        assert_eq!(request.modules(), ["other"]);
        assert_eq!(request.with_no_modules().modules(), &[] as &[String]);
    }

    #[test]
    fn test_display_format() {
        let request = RenderRequest::new("a/b")
            .unwrap()
            .with_modules(["m1", "m2"])
            .unwrap()
            .with_locale(Locale::new("en", Some("US")));
        assert_eq!(request.to_string(), "'m1,m2:a/b'(en_US)");
    }
}
