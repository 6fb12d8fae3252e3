//! Error handling for the resolution engine
//!
//! Three error layers mirror the three seams of the engine:
//!
//! - [`ResolveError`] - everything the engine itself can report: invalid
//!   names, dependency-graph violations, backend failures, and wrapped
//!   renderer failures. This is the error type of the public API.
//! - [`LoadError`] - transport failures raised by a [`TemplateLoader`]
//!   backing store. A loader distinguishes "not found" (an `Ok(None)`
//!   result, not an error) from genuine I/O or backend trouble.
//! - [`RenderError`] - failures raised by the renderer collaborator during
//!   a synchronous pass, including the recoverable
//!   [`RenderError::UnresolvedReference`] signal that drives the
//!   fetch-and-retry loop.
//!
//! # Recoverable vs. fatal
//!
//! [`RenderError::UnresolvedReference`] is special: it marks a pass that
//! dereferenced content the engine has not fetched yet. The render loop
//! treats it as recoverable exactly when the resolution context has
//! unresolved keys pending; with nothing pending it is a genuine missing
//! variable and surfaces as [`ResolveError::Render`].
//!
//! [`RenderError::Aborted`] carries an engine-raised [`ResolveError`]
//! (cycle, visibility violation, missing required dependency) through the
//! renderer's unwinding without loss; the loop unwraps it verbatim.
//!
//! [`TemplateLoader`]: crate::loader::TemplateLoader

use std::path::PathBuf;

use thiserror::Error;

use crate::key::TemplateKey;
use crate::request::RenderRequest;

/// The main error type for template resolution operations.
///
/// Each variant represents one failure mode of the resolution pipeline and
/// carries the keys involved, so callers can report which template pulled
/// in which dependency.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A template name failed validation or normalization.
    ///
    /// Raised for empty names, characters outside `[a-zA-Z0-9-_/.]`,
    /// doubled separators, `...` sequences, a scoping marker (`_`) placed
    /// anywhere but the start of the last segment, and relative names that
    /// escape above the template root.
    ///
    /// # Fields
    /// - `name`: the offending raw name as the caller supplied it
    /// - `reason`: what rule the name broke
    #[error("invalid template name {name:?}: {reason}")]
    InvalidName {
        /// The offending raw name as the caller supplied it
        name: String,
        /// What rule the name broke
        reason: String,
    },

    /// A template referenced a scoped template it may not see.
    ///
    /// Scoped templates (last name segment starting with `_`) are visible
    /// only to siblings: dependents whose name shares every segment except
    /// the last.
    #[error("template {dependency} is not accessible from {dependent}")]
    VisibilityViolation {
        /// The template that tried to use the dependency
        dependent: TemplateKey,
        /// The scoped template that is out of reach
        dependency: TemplateKey,
    },

    /// Registering a dependency edge would close a cycle.
    ///
    /// Detected at registration time: either the edge is a self-reference
    /// or the dependency already depends, transitively, on the dependent.
    #[error("circular dependency between templates {dependent} and {dependency}")]
    CyclicDependency {
        /// The template whose directive introduced the closing edge
        dependent: TemplateKey,
        /// The dependency that completes the cycle
        dependency: TemplateKey,
    },

    /// A directive marked `required` executed for a template the backing
    /// store does not have.
    ///
    /// Raised lazily: a missing dependency only fails the render when a
    /// required directive for it actually runs in a pass. Optional
    /// directives for the same key render nothing instead.
    #[error("missing required dependency {dependency} of template {dependent}")]
    MissingRequiredDependency {
        /// The template whose directive demanded the dependency
        dependent: TemplateKey,
        /// The dependency the backing store could not provide
        dependency: TemplateKey,
    },

    /// The backing store failed while fetching a template.
    ///
    /// This is a transport failure, not a miss; misses become `Missing`
    /// entries in the resolution context. Any fetch error aborts the whole
    /// render after the current batch settles.
    #[error("failed to fetch template {key}")]
    BackendFetch {
        /// The key whose fetch failed
        key: TemplateKey,
        /// The underlying loader failure
        #[source]
        source: LoadError,
    },

    /// No candidate key of the root request matched any backing store.
    ///
    /// Only the root template promotes not-found to an error; missing
    /// dependencies stay recoverable until a required directive runs.
    #[error("no template found for {request}")]
    RootNotFound {
        /// The request whose candidate expansion all missed
        request: RenderRequest,
    },

    /// The renderer collaborator failed for a reason the engine cannot
    /// recover from.
    ///
    /// Covers parse and evaluation failures, and unresolved references
    /// raised when no fetches were pending.
    #[error("failed to render template {key}")]
    Render {
        /// The template whose pass failed
        key: TemplateKey,
        /// The renderer failure
        #[source]
        source: RenderError,
    },
}

/// Transport errors raised by a template backing store.
///
/// "Not found" is not an error at this layer; loaders report it as
/// `Ok(None)` so the resolver can fall through to the next candidate key.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Reading a template file failed.
    #[error("failed to read template file {path}")]
    Io {
        /// The path the loader tried to read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A non-filesystem backend failed.
    ///
    /// # Fields
    /// - `reason`: backend-specific description of the failure
    #[error("template backend error: {reason}")]
    Backend {
        /// Backend-specific description of the failure
        reason: String,
    },
}

/// Errors raised by the renderer collaborator during a synchronous pass.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The pass dereferenced a name with no bound content.
    ///
    /// Recoverable while the resolution context has unresolved keys
    /// pending; fatal otherwise. Renderers raise this instead of inventing
    /// placeholder output so the engine can fetch and retry.
    #[error("unresolved reference {name:?}")]
    UnresolvedReference {
        /// The variable or namespace path that had no binding
        name: String,
    },

    /// The template source failed to parse.
    #[error("template parse error at line {line}: {message}")]
    Parse {
        /// What the parser choked on
        message: String,
        /// 1-based source line of the failure
        line: usize,
    },

    /// Evaluating an expression or directive argument failed.
    #[error("template evaluation error: {message}")]
    Eval {
        /// What went wrong during evaluation
        message: String,
    },

    /// The engine aborted the pass from inside a directive callback.
    ///
    /// Renderers must propagate this variant unchanged; the render loop
    /// unwraps it back into the original [`ResolveError`].
    #[error(transparent)]
    Aborted(Box<ResolveError>),
}

impl RenderError {
    /// Wraps an engine error for transport through the renderer.
    pub fn aborted(err: ResolveError) -> Self {
        Self::Aborted(Box::new(err))
    }

    /// True when this is the recoverable unresolved-reference signal.
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(self, Self::UnresolvedReference { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display() {
        let err = ResolveError::InvalidName {
            name: "a//b".to_string(),
            reason: "doubled separator".to_string(),
        };
        assert_eq!(err.to_string(), "invalid template name \"a//b\": doubled separator");
    }

    #[test]
    fn test_aborted_round_trip() {
        let inner = ResolveError::RootNotFound {
            request: RenderRequest::new("missing").unwrap(),
        };
        let wrapped = RenderError::aborted(inner);
        assert!(!wrapped.is_unresolved_reference());
        match wrapped {
            RenderError::Aborted(boxed) => {
                assert!(matches!(*boxed, ResolveError::RootNotFound { .. }));
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_reference_predicate() {
        let err = RenderError::UnresolvedReference {
            name: "user.name".to_string(),
        };
        assert!(err.is_unresolved_reference());
    }
}
