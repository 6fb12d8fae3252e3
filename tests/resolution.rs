//! End-to-end resolution tests: render loops, relative references,
//! locale fallback, module search, and import namespaces.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use reweave::loader::StaticLoader;
use reweave::{Bindings, EngineConfig, Locale, RenderRequest, TemplateEngine, TemplateKey};
use serde_json::json;

mod common;
use common::{init_test_logging, RecordingLoader};

fn engine(loader: StaticLoader) -> Result<TemplateEngine> {
    Ok(TemplateEngine::new(EngineConfig::new(Arc::new(loader)))?)
}

/// A template without dependencies renders in a single pass.
#[tokio::test]
async fn test_render_without_dependencies() -> Result<()> {
    init_test_logging();
    let loader = Arc::new(RecordingLoader::new(
        StaticLoader::new().with("page", "Hello ${user.name}!")?,
    ));
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;

    let template = engine.create_template("page").await?;
    let mut bindings = Bindings::new();
    bindings.insert("user", json!({ "name": "Ada" }));

    assert_eq!(template.render(&bindings).await?, "Hello Ada!");
    assert_eq!(loader.load_count(), 1);
    Ok(())
}

/// Includes discovered in the first pass are fetched together and the
/// retry completes; nothing is fetched twice.
#[tokio::test]
async fn test_includes_resolve_on_the_second_pass() -> Result<()> {
    init_test_logging();
    let loader = Arc::new(RecordingLoader::new(
        StaticLoader::new()
            .with("page", r#"<@include "./header"/>body<@include "./footer"/>"#)?
            .with("header", "head|")?
            .with("footer", "|foot")?,
    ));
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "head|body|foot");

    assert_eq!(loader.loads_of("'page'"), 1);
    assert_eq!(loader.loads_of("'header'"), 1);
    assert_eq!(loader.loads_of("'footer'"), 1);
    assert_eq!(loader.load_count(), 3);

    // A second render reuses every fetch.
    assert_eq!(template.render(&Bindings::new()).await?, "head|body|foot");
    assert_eq!(loader.load_count(), 3);
    Ok(())
}

/// The unresolved batch of one pass is fetched concurrently: two delayed
/// dependencies settle in about one delay, where sequential fetching
/// would need at least two.
#[tokio::test]
async fn test_unresolved_batch_is_fetched_concurrently() -> Result<()> {
    init_test_logging();
    let delay = Duration::from_millis(30);
    let loader = Arc::new(
        RecordingLoader::new(
            StaticLoader::new()
                .with("page", r#"<@include "./left"/>|<@include "./right"/>"#)?
                .with("left", "L")?
                .with("right", "R")?,
        )
        .with_delay(delay),
    );
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;
    let template = engine.create_template("page").await?;

    let started = Instant::now();
    assert_eq!(template.render(&Bindings::new()).await?, "L|R");
    let elapsed = started.elapsed();

    assert!(
        elapsed < delay * 2,
        "batch of two delayed fetches took {elapsed:?}"
    );
    assert_eq!(loader.loads_of("'left'"), 1);
    assert_eq!(loader.loads_of("'right'"), 1);
    Ok(())
}

/// Dependencies of dependencies surface one pass at a time until the
/// whole tree is fetched.
#[tokio::test]
async fn test_transitive_includes_resolve_pass_by_pass() -> Result<()> {
    init_test_logging();
    let loader = Arc::new(RecordingLoader::new(
        StaticLoader::new()
            .with("page", r#"[<@include "./inner"/>]"#)?
            .with("inner", r#"(<@include "./leaf"/>)"#)?
            .with("leaf", "x")?,
    ));
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "[(x)]");
    assert_eq!(loader.loads_of("'inner'"), 1);
    assert_eq!(loader.loads_of("'leaf'"), 1);
    Ok(())
}

/// `./` references resolve against the directory of the template that
/// uses them, including scoped siblings.
#[tokio::test]
async fn test_relative_reference_to_a_scoped_sibling() -> Result<()> {
    init_test_logging();
    let loader = Arc::new(RecordingLoader::new(
        StaticLoader::new()
            .with("shop/cart", r#"Cart: <@include "./_total"/>"#)?
            .with("shop/_total", "9.99")?,
    ));
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;

    let template = engine.create_template("shop/cart").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "Cart: 9.99");

    // Scoped keys are probed exactly, with no index fallback.
    assert_eq!(loader.loads_of("'shop/_total'"), 1);
    Ok(())
}

/// References without a `./` prefix resolve from the template root, no
/// matter how deep the referencing template sits.
#[tokio::test]
async fn test_absolute_reference_from_a_nested_template() -> Result<()> {
    let engine = engine(
        StaticLoader::new()
            .with("app/page", r#"<@include "lib/button"/>"#)?
            .with("lib/button", "[OK]")?,
    )?;

    let template = engine.create_template("app/page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "[OK]");
    Ok(())
}

/// A full locale falls back through the bare language before giving up
/// on localization entirely.
#[tokio::test]
async fn test_locale_fallback_prefers_language_over_plain() -> Result<()> {
    init_test_logging();
    let mut config = EngineConfig::new(Arc::new(
        StaticLoader::new()
            .with("greeting", "Hi!")?
            .with_localized("greeting", Locale::language("en"), "Hello!")?,
    ));
    config.default_locale = Some(Locale::new("en", Some("US")));
    let engine = TemplateEngine::new(config)?;

    let template = engine.create_template("greeting").await?;
    assert_eq!(template.key().locale(), Some(&Locale::language("en")));
    assert_eq!(template.render(&Bindings::new()).await?, "Hello!");
    Ok(())
}

/// An explicit locale on the request overrides the engine default.
#[tokio::test]
async fn test_explicit_locale_overrides_the_default() -> Result<()> {
    let mut config = EngineConfig::new(Arc::new(
        StaticLoader::new()
            .with_localized("greeting", Locale::language("pl"), "Hej!")?
            .with_localized("greeting", Locale::language("en"), "Hello!")?,
    ));
    config.default_locale = Some(Locale::language("en"));
    let engine = TemplateEngine::new(config)?;

    let template = engine
        .create_template_localized("greeting", Locale::language("pl"))
        .await?;
    assert_eq!(template.render(&Bindings::new()).await?, "Hej!");
    Ok(())
}

/// Modules are searched in request order; the first hit wins.
#[tokio::test]
async fn test_module_search_order() -> Result<()> {
    let engine = engine(
        StaticLoader::new()
            .with_key(TemplateKey::new("banner")?.with_module("sales"), "S")
            .with_key(TemplateKey::new("banner")?.with_module("marketing"), "M"),
    )?;

    let request = RenderRequest::new("banner")?.with_modules(["sales", "marketing"])?;
    let template = engine.create_template_for(request).await?;
    assert_eq!(template.key().module(), Some("sales"));
    assert_eq!(template.render(&Bindings::new()).await?, "S");
    Ok(())
}

/// Common modules extend the search for the root template and for every
/// non-scoped dependency.
#[tokio::test]
async fn test_common_modules_cover_root_and_dependencies() -> Result<()> {
    init_test_logging();
    let mut config = EngineConfig::new(Arc::new(
        StaticLoader::new()
            .with_key(
                TemplateKey::new("page")?.with_module("shared"),
                r#"A<@include "./part"/>B"#,
            )
            .with_key(TemplateKey::new("part")?.with_module("shared"), "-inner-"),
    ));
    config.common_modules = vec!["shared".to_string()];
    let engine = TemplateEngine::new(config)?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.key().module(), Some("shared"));
    assert_eq!(template.render(&Bindings::new()).await?, "A-inner-B");
    Ok(())
}

/// An import binds a namespace instead of splicing output.
#[tokio::test]
async fn test_import_binds_a_namespace() -> Result<()> {
    let engine = engine(
        StaticLoader::new()
            .with("page", r#"<@import "./prices" as p/>Total: ${p.content}"#)?
            .with("prices", "9.99")?,
    )?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "Total: 9.99");
    Ok(())
}

/// Without an alias, an import is bound under its base name with the
/// scope marker stripped.
#[tokio::test]
async fn test_import_default_alias_strips_the_scope_marker() -> Result<()> {
    let engine = engine(
        StaticLoader::new()
            .with("page", r#"<@import "./_prices"/>${prices.content}"#)?
            .with("_prices", "9.99")?,
    )?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "9.99");
    Ok(())
}

/// A name that only exists as a directory resolves to its index
/// template.
#[tokio::test]
async fn test_index_fallback_for_directory_names() -> Result<()> {
    let engine = engine(StaticLoader::new().with("shop/index", "Shop front")?)?;

    let template = engine.create_template("shop").await?;
    assert_eq!(template.key().name(), "shop/index");
    assert_eq!(template.render(&Bindings::new()).await?, "Shop front");
    Ok(())
}

/// Bindings flow into included templates unchanged.
#[tokio::test]
async fn test_bindings_reach_nested_templates() -> Result<()> {
    let engine = engine(
        StaticLoader::new()
            .with("page", r#"Hello ${user.name}, <@include "./cta"/>"#)?
            .with("cta", "click ${cta.label}")?,
    )?;

    let template = engine.create_template("page").await?;
    let mut bindings = Bindings::new();
    bindings.insert("user", json!({ "name": "Ada" }));
    bindings.insert("cta", json!({ "label": "here" }));
    assert_eq!(template.render(&bindings).await?, "Hello Ada, click here");
    Ok(())
}

/// Conditionals pick their branch from the bindings; only the taken
/// branch contributes output.
#[tokio::test]
async fn test_conditional_branches_on_bindings() -> Result<()> {
    let engine = engine(
        StaticLoader::new().with("page", "<#if promo>SALE<#else>regular</#if>")?,
    )?;

    let template = engine.create_template("page").await?;
    let mut bindings = Bindings::new();
    bindings.insert("promo", true);
    assert_eq!(template.render(&bindings).await?, "SALE");

    let mut bindings = Bindings::new();
    bindings.insert("promo", false);
    assert_eq!(template.render(&bindings).await?, "regular");
    Ok(())
}

/// The same include appearing twice is fetched once and spliced twice.
#[tokio::test]
async fn test_repeated_include_is_fetched_once() -> Result<()> {
    init_test_logging();
    let loader = Arc::new(RecordingLoader::new(
        StaticLoader::new()
            .with("page", r#"<@include "./sep"/>mid<@include "./sep"/>"#)?
            .with("sep", "--")?,
    ));
    let engine = TemplateEngine::new(EngineConfig::new(loader.clone()))?;

    let template = engine.create_template("page").await?;
    assert_eq!(template.render(&Bindings::new()).await?, "--mid--");
    assert_eq!(loader.loads_of("'sep'"), 1);
    Ok(())
}
