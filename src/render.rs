//! The renderer seam.
//!
//! The engine drives an external, synchronous renderer through two small
//! traits. [`TemplateRenderer`] is one blocking pass over one template's
//! source. Whenever the renderer hits an include or import directive it
//! calls back into the engine through [`DirectiveHost`] and acts on the
//! returned [`DirectiveOutcome`]: splice content, bind a namespace, or
//! render nothing because the dependency has not been fetched yet.
//!
//! Renderers must not invent output for names they cannot resolve.
//! Dereferencing an unbound variable raises
//! [`RenderError::UnresolvedReference`], which the engine treats as
//! recoverable while fetches are pending. [`RenderError::Aborted`] must
//! pass through unchanged.

use serde_json::Value;

use crate::bindings::Bindings;
use crate::error::RenderError;
use crate::key::TemplateKey;

/// Which directive a template used to pull in a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Render the dependency and splice its output into the stream.
    Include,
    /// Bind the dependency as a named namespace without emitting output.
    Import,
}

/// One include or import directive, as declared in template source.
#[derive(Debug, Clone)]
pub struct DirectiveCall {
    pub kind: DirectiveKind,
    /// The dependency reference as written, absolute or `./`-relative.
    pub name: String,
    /// Namespace alias for imports; `None` derives one from the name.
    pub alias: Option<String>,
    /// Whether absence of the dependency aborts the render.
    pub required: bool,
}

impl DirectiveCall {
    /// An include directive, required by default.
    pub fn include(name: impl Into<String>) -> Self {
        Self {
            kind: DirectiveKind::Include,
            name: name.into(),
            alias: None,
            required: true,
        }
    }

    /// An import directive, required by default.
    pub fn import(name: impl Into<String>) -> Self {
        Self {
            kind: DirectiveKind::Import,
            name: name.into(),
            alias: None,
            required: true,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// What the engine decided for one directive.
#[derive(Debug, Clone)]
pub enum DirectiveOutcome {
    /// Rendered dependency content to splice into the output stream.
    Spliced(String),
    /// A namespace value to bind under `alias` for the rest of the pass.
    Bound { alias: String, value: Value },
    /// Nothing to splice at this point: the dependency is either not
    /// fetched yet or optional and missing.
    Pending,
}

/// Engine-side handler the renderer calls for each directive it executes.
///
/// Handed to [`TemplateRenderer::render`] per pass; a host is only valid
/// for the duration of that one call.
pub trait DirectiveHost {
    /// Resolves one directive against the current render session.
    ///
    /// # Errors
    ///
    /// [`RenderError::Aborted`] when the directive breaks a dependency
    /// rule (visibility, cycle, required-but-missing); the renderer must
    /// propagate it unchanged.
    fn directive(&self, call: DirectiveCall) -> Result<DirectiveOutcome, RenderError>;
}

/// A synchronous renderer the engine can drive to completion.
///
/// One call is one full pass over one template's source. The renderer
/// cannot suspend; everything it needs is either in `bindings` already or
/// obtained synchronously through `host`.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `source` with `bindings`, consulting `host` for every
    /// include and import directive.
    ///
    /// # Errors
    ///
    /// [`RenderError::UnresolvedReference`] for a dereference of unbound
    /// content, parse and evaluation failures as themselves, and
    /// [`RenderError::Aborted`] propagated verbatim from the host.
    fn render(
        &self,
        key: &TemplateKey,
        source: &str,
        bindings: &Bindings,
        host: &dyn DirectiveHost,
    ) -> Result<String, RenderError>;
}
