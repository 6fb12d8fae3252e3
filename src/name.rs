//! Template name validation and canonicalization.
//!
//! Template names are logical, `/`-separated paths into the template tree,
//! deliberately independent of `std::path` and OS separators. This module is
//! the single place where raw names become canonical names; every
//! [`TemplateKey`](crate::key::TemplateKey) runs its name through here.
//!
//! # Name Rules
//!
//! - allowed characters: `a-z A-Z 0-9 - _ / .`
//! - `.` and `..` segments are normalized away (`a/./b` → `a/b`,
//!   `a/../b` → `b`)
//! - names must stay inside the template root: no leading `/`, no
//!   normalization above the root, no `...` sequences, no doubled `//`
//! - the scoping marker `_` may only appear at the start of a name's last
//!   segment (`a/_impl` is scoped, `a/_imp_l` and `a_b/c` are invalid)
//!
//! # Dependency Names
//!
//! A dependency reference starting with `./` or `../` is resolved against
//! the directory containing the referencing template, so `./footer` inside
//! `shop/cart` means `shop/footer`. Anything else is resolved from the
//! template root. Either way the result obeys the same name rules.

use crate::error::ResolveError;

/// Separator between template name segments.
pub const SEPARATOR: char = '/';

/// Name of the index template a directory-level name falls back to.
pub const INDEX_FILE: &str = "index";

/// Prefix marking a template as scoped to its directory siblings.
pub const SCOPE_MARKER: char = '_';

/// Validates a raw template name and returns its canonical form.
///
/// Canonicalization collapses `.` and `..` segments and is idempotent:
/// resolving an already-canonical name returns it unchanged.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidName`] when the name is blank, contains a
/// character outside the allowed set, contains `...` or `//`, misplaces the
/// scoping marker, or normalizes outside the template root.
pub fn resolve_template_name(name: &str) -> Result<String, ResolveError> {
    validate_template_name(name)?;
    normalize(name.trim_end_matches(SEPARATOR).split(SEPARATOR), name)
}

/// Resolves a dependency reference against the template that contains it.
///
/// `template_name` is the referencing template's resolved name. References
/// starting with `./` or `../` are joined onto its parent directory;
/// everything else goes through [`resolve_template_name`] untouched.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidName`] for the same rule violations as
/// [`resolve_template_name`], including relative references that climb
/// above the template root.
pub fn resolve_dependency_name(
    template_name: &str,
    dependency_name: &str,
) -> Result<String, ResolveError> {
    if !dependency_name.starts_with("./") && !dependency_name.starts_with("../") {
        return resolve_template_name(dependency_name);
    }
    validate_template_name(dependency_name)?;
    let base = resolve_template_name(template_name)?;
    let parent = match base.rsplit_once(SEPARATOR) {
        Some((parent, _)) => parent,
        None => "",
    };
    let segments = parent
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .chain(dependency_name.trim_end_matches(SEPARATOR).split(SEPARATOR));
    normalize(segments, dependency_name)
}

/// Returns the base name of a template: the name with one trailing
/// `/index` segment stripped.
///
/// Default import aliases derive from the base name, so `shop/index`
/// and `shop` import under the same alias.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidName`] when the name is invalid or is
/// the bare index name, which has no base.
pub fn resolve_base_name(name: &str) -> Result<String, ResolveError> {
    let resolved = resolve_template_name(name)?;
    if resolved == INDEX_FILE {
        return Err(invalid(name, "the bare index name points at the template root"));
    }
    if let Some(base) = resolved.strip_suffix("/index") {
        return Ok(base.to_string());
    }
    Ok(resolved)
}

/// Validates a module identifier.
///
/// Modules are single identifiers, not paths: `a-z A-Z 0-9 - _` only.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidName`] for blank identifiers or
/// characters outside the allowed set.
pub fn validate_module(module: &str) -> Result<(), ResolveError> {
    if module.trim().is_empty() {
        return Err(invalid(module, "module name must not be blank"));
    }
    if !module.chars().all(is_module_char) {
        return Err(invalid(
            module,
            "module names may only contain alphanumerics, '-' and '_'",
        ));
    }
    Ok(())
}

/// Validates every module identifier in a list.
pub fn validate_modules<'a>(
    modules: impl IntoIterator<Item = &'a str>,
) -> Result<(), ResolveError> {
    for module in modules {
        validate_module(module)?;
    }
    Ok(())
}

fn validate_template_name(name: &str) -> Result<(), ResolveError> {
    if name.trim().is_empty() {
        return Err(invalid(name, "name must not be blank"));
    }
    if !name.chars().all(is_name_char) {
        return Err(invalid(
            name,
            "names may only contain alphanumerics, '-', '_', '.' and '/'",
        ));
    }
    if name.contains("...") {
        return Err(invalid(name, "invalid character sequence '...'"));
    }
    if name.contains("//") {
        return Err(invalid(name, "invalid character sequence '//'"));
    }
    if name.starts_with(SEPARATOR) {
        return Err(invalid(name, "name must not start with the separator"));
    }
    let segments: Vec<&str> = name.trim_end_matches(SEPARATOR).split(SEPARATOR).collect();
    for (index, segment) in segments.iter().enumerate() {
        if *segment == "." || *segment == ".." {
            continue;
        }
        let misplaced = if index == segments.len() - 1 {
            // Scoped names carry the marker only as the leading character.
            segment.len() > 1 && segment[1..].contains(SCOPE_MARKER)
        } else {
            segment.contains(SCOPE_MARKER)
        };
        if misplaced {
            return Err(invalid(
                name,
                "the scoping marker '_' may only start the last segment; use '-' instead",
            ));
        }
    }
    Ok(())
}

fn normalize<'a>(
    segments: impl Iterator<Item = &'a str>,
    name: &str,
) -> Result<String, ResolveError> {
    let mut resolved: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "." => {}
            ".." => {
                if resolved.pop().is_none() {
                    return Err(invalid(name, "name points outside of the template root"));
                }
            }
            segment => resolved.push(segment),
        }
    }
    if resolved.is_empty() {
        return Err(invalid(name, "name resolves to an empty name"));
    }
    Ok(resolved.join(&SEPARATOR.to_string()))
}

fn invalid(name: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.')
}

fn is_module_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}
