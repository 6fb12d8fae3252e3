//! Candidate probing against the backing store.
//!
//! The resolver turns a [`RenderRequest`] into its candidate keys and
//! probes them in order through the [`ResolutionCache`], first hit wins.
//! An all-miss result is `Ok(None)`; whether that is an error is the
//! caller's call (only the root template promotes it to one).

use std::sync::Arc;

use crate::cache::ResolutionCache;
use crate::candidates::candidate_keys;
use crate::error::ResolveError;
use crate::key::TemplateKey;
use crate::loader::TemplateLoader;
use crate::request::RenderRequest;

/// A template together with the backing key that actually matched.
///
/// The key records which candidate hit (module, locale variant, index
/// fallback), not the logical name the caller asked for. Dependency
/// references inside the content resolve relative to this actual key.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTemplate {
    key: TemplateKey,
    content: Arc<str>,
}

impl ResolvedTemplate {
    pub(crate) fn new(key: TemplateKey, content: Arc<str>) -> Self {
        Self { key, content }
    }

    pub(crate) fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub(crate) fn content(&self) -> &Arc<str> {
        &self.content
    }
}

/// Resolves requests to templates by probing candidates sequentially.
pub(crate) struct TemplateResolver {
    loader: Arc<dyn TemplateLoader>,
    common_modules: Vec<String>,
    cache: ResolutionCache,
}

impl TemplateResolver {
    pub(crate) fn new(
        loader: Arc<dyn TemplateLoader>,
        common_modules: Vec<String>,
        cache: ResolutionCache,
    ) -> Self {
        Self {
            loader,
            common_modules,
            cache,
        }
    }

    /// Resolves a request with the engine's common modules appended after
    /// the request's own.
    pub(crate) async fn resolve_with_common_modules(
        &self,
        request: &RenderRequest,
    ) -> Result<Option<ResolvedTemplate>, ResolveError> {
        let request = request.add_modules(self.common_modules.iter().cloned())?;
        self.resolve(&request).await
    }

    /// Resolves a request by probing its candidate keys in order.
    pub(crate) async fn resolve(
        &self,
        request: &RenderRequest,
    ) -> Result<Option<ResolvedTemplate>, ResolveError> {
        let keys = candidate_keys(request);
        for key in &keys {
            let content = self
                .cache
                .get_or_load(key, &self.loader)
                .await
                .map_err(|source| ResolveError::BackendFetch {
                    key: key.clone(),
                    source,
                })?;
            if let Some(content) = content {
                log_loaded(request, key);
                return Ok(Some(ResolvedTemplate::new(key.clone(), content)));
            }
        }
        log_missing(request, &keys);
        Ok(None)
    }

    /// Resolves one dependency key discovered during a render pass.
    ///
    /// A scoped dependency stays pinned to its own module; it never falls
    /// back to the engine's common modules. Any other dependency is
    /// re-requested like a root template: the root request's modules plus
    /// the common modules, under the root request's locale.
    pub(crate) async fn resolve_dependency(
        &self,
        request: &RenderRequest,
        key: &TemplateKey,
    ) -> Result<Option<ResolvedTemplate>, ResolveError> {
        let request = request.with_name(key.name())?;
        if key.is_scoped() {
            let request = match key.module() {
                Some(module) => request.with_module(module)?,
                None => request.with_no_modules(),
            };
            return self.resolve(&request).await;
        }
        self.resolve_with_common_modules(&request).await
    }
}

fn log_loaded(request: &RenderRequest, key: &TemplateKey) {
    let key_string = key.to_string();
    let request_string = request.to_string();
    if key_string == request_string {
        tracing::debug!("Loaded template {request_string}");
    } else {
        tracing::debug!("Loaded template {request_string} from {key_string}");
    }
}

fn log_missing(request: &RenderRequest, candidates: &[TemplateKey]) {
    if candidates.len() > 1 {
        let tried: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        tracing::debug!(
            "Missing template {request}, no candidate matched: {}",
            tried.join(", ")
        );
    } else {
        tracing::debug!("Missing template {request}");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::cache::CachePolicy;
    use crate::error::LoadError;
    use crate::loader::StaticLoader;
    use crate::locale::Locale;

    fn resolver(loader: StaticLoader, common_modules: &[&str]) -> TemplateResolver {
        TemplateResolver::new(
            Arc::new(loader),
            common_modules.iter().map(ToString::to_string).collect(),
            ResolutionCache::new(CachePolicy::default()),
        )
    }

    #[tokio::test]
    async fn test_resolves_exact_name() {
        let loader = StaticLoader::default().with("page", "content").unwrap();
        let resolver = resolver(loader, &[]);
        let request = RenderRequest::new("page").unwrap();

        let resolved = resolver.resolve(&request).await.unwrap().unwrap();
        assert_eq!(resolved.key().name(), "page");
        assert_eq!(resolved.content().as_ref(), "content");
    }

    #[tokio::test]
    async fn test_falls_back_to_index() {
        let loader = StaticLoader::default()
            .with("page/index", "indexed")
            .unwrap();
        let resolver = resolver(loader, &[]);
        let request = RenderRequest::new("page").unwrap();

        let resolved = resolver.resolve(&request).await.unwrap().unwrap();
        assert_eq!(resolved.key().name(), "page/index");
    }

    #[tokio::test]
    async fn test_first_module_wins() {
        let loader = StaticLoader::default()
            .with_key(
                TemplateKey::new("widget").unwrap().with_module("first"),
                "from first",
            )
            .with_key(
                TemplateKey::new("widget").unwrap().with_module("second"),
                "from second",
            );
        let resolver = resolver(loader, &[]);
        let request = RenderRequest::new("widget")
            .unwrap()
            .with_modules(["first", "second"])
            .unwrap();

        let resolved = resolver.resolve(&request).await.unwrap().unwrap();
        assert_eq!(resolved.key().module(), Some("first"));
        assert_eq!(resolved.content().as_ref(), "from first");
    }

    #[tokio::test]
    async fn test_common_modules_extend_the_search() {
        let loader = StaticLoader::default().with_key(
            TemplateKey::new("widget").unwrap().with_module("shared"),
            "shared widget",
        );
        let resolver = resolver(loader, &["shared"]);
        let request = RenderRequest::new("widget").unwrap();

        assert!(resolver.resolve(&request).await.unwrap().is_none());
        let resolved = resolver
            .resolve_with_common_modules(&request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.key().module(), Some("shared"));
    }

    #[tokio::test]
    async fn test_scoped_dependency_pinned_to_its_module() {
        let loader = StaticLoader::default().with_key(
            TemplateKey::new("a/_impl").unwrap().with_module("mails"),
            "scoped",
        );
        let resolver = resolver(loader, &["shared"]);
        let request = RenderRequest::new("a/b").unwrap();

        let pinned = TemplateKey::new("a/_impl").unwrap().with_module("mails");
        let resolved = resolver
            .resolve_dependency(&request, &pinned)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.key().module(), Some("mails"));
    }

    #[tokio::test]
    async fn test_scoped_dependency_skips_common_modules() {
        let loader = StaticLoader::default().with_key(
            TemplateKey::new("a/_impl").unwrap().with_module("shared"),
            "scoped",
        );
        let resolver = resolver(loader, &["shared"]);
        let request = RenderRequest::new("a/b").unwrap();

        let unqualified = TemplateKey::new("a/_impl").unwrap();
        assert!(resolver
            .resolve_dependency(&request, &unqualified)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_locale_fallback_prefers_language_over_plain() {
        let loader = StaticLoader::default()
            .with("page", "plain")
            .unwrap()
            .with_localized("page", Locale::language("en"), "english")
            .unwrap();
        let resolver = resolver(loader, &[]);
        let request = RenderRequest::localized("page", Locale::new("en", Some("US"))).unwrap();

        let resolved = resolver.resolve(&request).await.unwrap().unwrap();
        assert_eq!(resolved.content().as_ref(), "english");
        assert_eq!(resolved.key().locale(), Some(&Locale::language("en")));
    }

    struct BrokenLoader;

    #[async_trait]
    impl crate::loader::TemplateLoader for BrokenLoader {
        async fn load(&self, _key: &TemplateKey) -> Result<Option<String>, LoadError> {
            Err(LoadError::Backend {
                reason: "backend down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_backend_error_carries_the_probed_key() {
        let resolver = TemplateResolver::new(
            Arc::new(BrokenLoader),
            Vec::new(),
            ResolutionCache::new(CachePolicy::default()),
        );
        let request = RenderRequest::new("page").unwrap();

        let err = resolver.resolve(&request).await.unwrap_err();
        match err {
            ResolveError::BackendFetch { key, .. } => assert_eq!(key.name(), "page"),
            other => panic!("expected BackendFetch, got {other:?}"),
        }
    }
}
