//! Candidate key expansion.
//!
//! A [`RenderRequest`] usually matches more than one physical template:
//! the name may live in any of the searched modules, under the full
//! locale, the bare language, or no locale at all, and a directory-level
//! name falls back to its `index` template. This module expands a request
//! into the ordered list of keys worth probing; the resolver tries them in
//! order and the first backend hit wins.
//!
//! Expansion order (most to least specific):
//!
//! 1. modules, in request order; one unqualified key when none
//! 2. locale: full tag, then bare language (when a region was present),
//!    then none
//! 3. index: the name itself, then `name/index`
//!
//! Scoped names skip the index step: a scoped template is a leaf, never a
//! directory, because names nested under a scoping marker do not validate.
//!
//! The expansion is pure; no I/O happens here.

use crate::key::TemplateKey;
use crate::locale::Locale;
use crate::name::{INDEX_FILE, SEPARATOR};
use crate::request::RenderRequest;

/// Expands a request into candidate keys, ordered and free of duplicates.
pub(crate) fn candidate_keys(request: &RenderRequest) -> Vec<TemplateKey> {
    let mut keys = Vec::new();
    let modules: Vec<Option<&str>> = if request.has_modules() {
        request.modules().iter().map(|module| Some(module.as_str())).collect()
    } else {
        vec![None]
    };
    for module in modules {
        for locale in locale_steps(request.locale()) {
            push_with_index_fallback(&mut keys, module, request.name(), locale);
        }
    }
    keys
}

/// Locale fallback steps, most specific first, duplicates skipped.
fn locale_steps(locale: Option<&Locale>) -> Vec<Option<Locale>> {
    match locale {
        Some(locale) if locale.has_region() => {
            vec![Some(locale.clone()), Some(locale.language_only()), None]
        }
        Some(locale) => vec![Some(locale.clone()), None],
        None => vec![None],
    }
}

fn push_with_index_fallback(
    keys: &mut Vec<TemplateKey>,
    module: Option<&str>,
    name: &str,
    locale: Option<Locale>,
) {
    let key = TemplateKey::canonical(module.map(str::to_string), name.to_string(), locale);
    let index_key = (!key.is_scoped()).then(|| {
        let name = format!("{name}{SEPARATOR}{INDEX_FILE}");
        TemplateKey::canonical(module.map(str::to_string), name, key.locale().cloned())
    });
    keys.push(key);
    keys.extend(index_key);
}
