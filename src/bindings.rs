//! Variable bindings for a render.
//!
//! [`Bindings`] is the JSON-backed variable scope handed to
//! [`Template::render`](crate::Template::render). Values are
//! [`serde_json::Value`]s, so anything serializable can go in, and
//! renderers address nested data with dotted paths (`user.address.city`,
//! `items.0.price`).

use serde::Serialize;
use serde_json::{Map, Value};

/// Named values available to a render.
///
/// # Examples
///
/// ```
/// use reweave::Bindings;
/// use serde_json::json;
///
/// let mut bindings = Bindings::new();
/// bindings.insert("title", "Checkout");
/// bindings.insert("user", json!({ "name": "Jo", "vip": true }));
/// assert_eq!(bindings.get("user.name"), Some(&json!("Jo")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Map<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value under a name, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Binds any serializable value under a name.
    ///
    /// # Errors
    ///
    /// Returns the serialization error when the value cannot be
    /// represented as JSON.
    pub fn try_insert(
        &mut self,
        name: impl Into<String>,
        value: &impl Serialize,
    ) -> Result<&mut Self, serde_json::Error> {
        self.values.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Looks up a dotted path, descending through objects by field name
    /// and through arrays by index.
    pub fn get(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            Some((head, rest)) => descend(self.values.get(head)?, rest),
            None => self.values.get(path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Descends a dotted path inside a value, objects by field name and
/// arrays by index.
pub(crate) fn descend<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut value = value;
    for part in path.split('.') {
        value = match value {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }
    Some(value)
}
