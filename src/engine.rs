//! The template engine and its render loop.
//!
//! [`TemplateEngine`] is the public entry point: configure it once with
//! an [`EngineConfig`], then create [`Template`]s and render them with
//! [`Bindings`]. Rendering alternates synchronous renderer passes with
//! concurrent batch fetches of whatever dependencies the pass
//! discovered, until a pass completes with nothing left unresolved:
//!
//! 1. run one renderer pass; directives register dependency edges and
//!    render already-fetched content
//! 2. if the pass left no keys unresolved, its output is the result
//! 3. otherwise discard the output, fetch the whole unresolved batch
//!    concurrently, merge every result, and go to 1
//!
//! Passes are strictly sequential per render call; only the fetches in
//! step 3 run concurrently. Each render call gets a fresh resolution
//! context, so concurrent renders of one [`Template`] are independent
//! sessions sharing nothing but the engine's fetch cache.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;

use crate::bindings::Bindings;
use crate::cache::{CachePolicy, ResolutionCache};
use crate::context::ResolutionContext;
use crate::directive::DirectiveScope;
use crate::error::{RenderError, ResolveError};
use crate::key::TemplateKey;
use crate::loader::TemplateLoader;
use crate::locale::Locale;
use crate::markup::MarkupRenderer;
use crate::name;
use crate::render::TemplateRenderer;
use crate::request::RenderRequest;
use crate::resolver::{ResolvedTemplate, TemplateResolver};

/// Fully-enumerated engine configuration.
///
/// Every knob is an explicit field; there are no ambient defaults beyond
/// what [`EngineConfig::new`] fills in.
pub struct EngineConfig {
    /// The backing store templates are fetched from.
    pub loader: Arc<dyn TemplateLoader>,
    /// The synchronous renderer driven by the engine. Defaults to the
    /// built-in [`MarkupRenderer`].
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Modules appended to every root and non-scoped dependency search.
    pub common_modules: Vec<String>,
    /// Locale applied by [`TemplateEngine::create_template`] when the
    /// caller does not pick one.
    pub default_locale: Option<Locale>,
    /// What the fetch cache remembers. Defaults to
    /// [`CachePolicy::HitsAndMisses`].
    pub cache_policy: CachePolicy,
}

impl EngineConfig {
    /// A configuration with the given loader and defaults for the rest.
    pub fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            loader,
            renderer: Arc::new(MarkupRenderer),
            common_modules: Vec::new(),
            default_locale: None,
            cache_policy: CachePolicy::default(),
        }
    }
}

/// Asynchronous template engine over a synchronous renderer.
pub struct TemplateEngine {
    resolver: Arc<TemplateResolver>,
    renderer: Arc<dyn TemplateRenderer>,
    default_locale: Option<Locale>,
}

impl TemplateEngine {
    /// Builds an engine from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidName`] when a common module name is
    /// not a valid identifier.
    pub fn new(config: EngineConfig) -> Result<Self, ResolveError> {
        name::validate_modules(config.common_modules.iter().map(String::as_str))?;
        let cache = ResolutionCache::new(config.cache_policy);
        let resolver = TemplateResolver::new(config.loader, config.common_modules, cache);
        Ok(Self {
            resolver: Arc::new(resolver),
            renderer: config.renderer,
            default_locale: config.default_locale,
        })
    }

    /// Creates a template by name, under the engine's default locale.
    ///
    /// # Errors
    ///
    /// [`ResolveError::RootNotFound`] when no candidate key matches,
    /// [`ResolveError::InvalidName`] for an invalid name.
    pub async fn create_template(&self, name: &str) -> Result<Template, ResolveError> {
        let request = match &self.default_locale {
            Some(locale) => RenderRequest::localized(name, locale.clone())?,
            None => RenderRequest::new(name)?,
        };
        self.create_template_for(request).await
    }

    /// Creates a template by name under an explicit locale.
    pub async fn create_template_localized(
        &self,
        name: &str,
        locale: Locale,
    ) -> Result<Template, ResolveError> {
        self.create_template_for(RenderRequest::localized(name, locale)?)
            .await
    }

    /// Creates a template for a fully-specified request, taken verbatim.
    ///
    /// The engine's default locale does not apply here; an unlocalized
    /// request stays unlocalized.
    pub async fn create_template_for(
        &self,
        request: RenderRequest,
    ) -> Result<Template, ResolveError> {
        match self.resolver.resolve_with_common_modules(&request).await? {
            Some(root) => Ok(Template {
                root,
                request,
                resolver: Arc::clone(&self.resolver),
                renderer: Arc::clone(&self.renderer),
            }),
            None => Err(ResolveError::RootNotFound { request }),
        }
    }
}

/// A resolved root template, ready to render.
///
/// Cheap to clone-and-share via the engine handles inside; each
/// [`render`](Template::render) call is an independent session.
pub struct Template {
    root: ResolvedTemplate,
    request: RenderRequest,
    resolver: Arc<TemplateResolver>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("key", self.root.key())
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl Template {
    /// The actual key the root template resolved to.
    pub fn key(&self) -> &TemplateKey {
        self.root.key()
    }

    /// The request this template was created for.
    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    /// Renders the template to completion.
    ///
    /// # Errors
    ///
    /// Any [`ResolveError`] raised by dependency validation, fetching, or
    /// the renderer. No partial output is ever returned.
    pub async fn render(&self, bindings: &Bindings) -> Result<String, ResolveError> {
        let mut context = ResolutionContext::new(self.root.clone());
        let mut passes = 0u32;
        loop {
            passes += 1;
            tracing::debug!("Render pass {passes} for template {}", self.root.key());
            match self.render_pass(&mut context, bindings) {
                Ok(output) => {
                    if !context.has_unresolved() {
                        return Ok(output);
                    }
                    // Dependencies were discovered; the output is a
                    // partial rendering and gets discarded.
                }
                Err(RenderError::Aborted(err)) => return Err(*err),
                Err(err) if err.is_unresolved_reference() && context.has_unresolved() => {
                    // A pending import namespace was dereferenced; the
                    // next pass has it bound.
                }
                Err(err) => {
                    return Err(ResolveError::Render {
                        key: self.root.key().clone(),
                        source: err,
                    });
                }
            }
            self.fetch_unresolved(&mut context).await?;
        }
    }

    fn render_pass(
        &self,
        context: &mut ResolutionContext,
        bindings: &Bindings,
    ) -> Result<String, RenderError> {
        let scope = DirectiveScope::new(context, self.renderer.as_ref(), bindings);
        self.renderer
            .render(self.root.key(), self.root.content(), bindings, &scope)
    }

    /// Fetches every unresolved key concurrently and merges the whole
    /// batch into the context before reporting the first fetch error.
    async fn fetch_unresolved(&self, context: &mut ResolutionContext) -> Result<(), ResolveError> {
        let snapshot = context.unresolved_snapshot();
        tracing::debug!(
            "Fetching {} unresolved dependencies of {}",
            snapshot.len(),
            self.root.key()
        );
        let results = join_all(
            snapshot
                .iter()
                .map(|key| self.resolver.resolve_dependency(&self.request, key)),
        )
        .await;

        let mut first_error = None;
        for (key, result) in snapshot.iter().zip(results) {
            match result {
                Ok(Some(template)) => context.add_resolved(key, template),
                Ok(None) => context.add_missing(key),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
