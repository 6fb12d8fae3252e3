//! Reweave - speculative asynchronous template resolution for
//! synchronous renderers
//!
//! Template renderers are synchronous: once a pass starts, it runs to
//! completion and cannot suspend to wait for I/O. Template content, on
//! the other hand, usually lives somewhere asynchronous (files, object
//! stores, services). Reweave bridges the two without blocking a thread
//! per render: it runs the renderer speculatively, collects the
//! dependencies the pass discovers, fetches them concurrently, and
//! renders again until a pass completes with everything in hand.
//!
//! # How a render works
//!
//! 1. The engine resolves the root template through its candidate keys
//!    (module search order, locale fallback, index fallback) and starts
//!    a render session.
//! 2. One synchronous renderer pass runs. Every `include`/`import`
//!    directive reports a dependency edge; edges are validated for
//!    visibility and cycles as they appear. Content already fetched is
//!    spliced in place; anything else is registered as unresolved and
//!    renders as nothing for now.
//! 3. If the pass finished with no unresolved keys, its output is the
//!    result. Otherwise the output is discarded, the whole unresolved
//!    batch is fetched concurrently, and the loop re-enters step 2.
//!
//! Termination is bounded by the dependency tree depth: each pass
//! discovers at least one level more of the tree, and keys never leave
//! the resolved state once fetched.
//!
//! # Key Concepts
//!
//! - **Template names** are `/`-separated paths, validated and
//!   canonicalized; dependency references may be relative (`./`, `../`)
//!   to the including template.
//! - **Scoped templates** (last name segment starting with `_`) are
//!   private to their directory: only sibling templates may include
//!   them.
//! - **Candidate keys**: one logical request expands to an ordered list
//!   of physical identities (per search module, per locale fallback
//!   step, with an `index` fallback); the first backing-store hit wins.
//! - **Single-flight fetch cache**: each distinct key hits the backing
//!   store at most once per engine, shared across renders; concurrent
//!   requests for one key join the in-flight fetch.
//!
//! # Entry Points
//!
//! - [`TemplateEngine`] - configured once via [`EngineConfig`], creates
//!   [`Template`]s
//! - [`Template::render`] - drives the pass/fetch loop with [`Bindings`]
//! - [`loader`] - the [`TemplateLoader`](loader::TemplateLoader) seam
//!   with file, in-memory, and chained implementations
//! - [`TemplateRenderer`] - implement to drive a different synchronous
//!   renderer; [`MarkupRenderer`] is the built-in one
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use reweave::loader::StaticLoader;
//! use reweave::{Bindings, EngineConfig, TemplateEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), reweave::ResolveError> {
//! let loader = StaticLoader::new()
//!     .with("page", "<@include \"./header\"/>hello ${name}")?
//!     .with("header", "== ")?;
//! let engine = TemplateEngine::new(EngineConfig::new(Arc::new(loader)))?;
//! let template = engine.create_template("page").await?;
//!
//! let mut bindings = Bindings::new();
//! bindings.insert("name", "world");
//! assert_eq!(template.render(&bindings).await?, "== hello world");
//! # Ok(())
//! # }
//! ```

// Identity and addressing
mod candidates;
mod key;
mod locale;
mod name;
mod request;

// Resolution machinery
mod cache;
mod context;
mod graph;
mod resolver;

// Rendering
mod bindings;
mod directive;
mod engine;
mod markup;
mod render;

mod error;

// Backing stores
pub mod loader;

pub use bindings::Bindings;
pub use cache::CachePolicy;
pub use engine::{EngineConfig, Template, TemplateEngine};
pub use error::{LoadError, RenderError, ResolveError};
pub use key::TemplateKey;
pub use locale::{Locale, ParseLocaleError};
pub use markup::MarkupRenderer;
pub use render::{
    DirectiveCall, DirectiveHost, DirectiveKind, DirectiveOutcome, TemplateRenderer,
};
pub use request::RenderRequest;
