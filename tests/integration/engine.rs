//! Compiling and rendering resources through the engine.

use std::sync::Arc;

use handlebar::config::EngineConfig;
use handlebar::core::HandlebarError;
use handlebar::engine::Engine;
use handlebar::reference::TemplateKey;
use handlebar::test_utils::MemoryLoader;
use serde_json::json;

use super::engine_with;

const PAGE: &str = r##"{$: "#page" | title = data.title ? data.title : "Untitled" }
<h1>{$= title $}</h1>
<ul>{$* data.items }<li class="{$= item.odd ? "odd" : "even" $}">{$= item.value $}</li>{$}</ul>
{$/ editors only /$}{$% {$= not rendered $} %$}
{$}"##;

#[tokio::test]
async fn test_process_template_renders_declarations_loops_and_raw() {
    let engine = engine_with(&MemoryLoader::new());

    let out = engine
        .process_template(PAGE, "#page", json!({"title": "Fruit", "items": ["apple", "pear"]}), None)
        .await
        .unwrap();

    assert_eq!(
        out,
        "\n<h1>Fruit</h1>\n<ul><li class=\"even\">apple</li><li class=\"odd\">pear</li></ul>\n {$= not rendered $} \n"
    );

    let out = engine.process_template(PAGE, "#page", json!({}), None).await.unwrap();
    assert!(out.contains("<h1>Untitled</h1>"));
    assert!(out.contains("<ul></ul>"));
}

#[tokio::test]
async fn test_unknown_identifier_renders_empty() {
    let engine = engine_with(&MemoryLoader::new());
    let out = engine.process_template(r##"{$: "#a" }a{$}"##, "#missing", json!({}), None).await.unwrap();
    assert_eq!(out, "");
}

#[tokio::test]
async fn test_process_file_compiles_once() {
    let loader = MemoryLoader::new().with_file("views/page.html", PAGE);
    let engine = engine_with(&loader);

    let first = engine.process_file("views/page.html#page", json!({"title": "A"})).await.unwrap();
    let compiled = engine.lookup("views/page.html", "#page").await.unwrap();
    let second = engine.process_file("/views/./page.html#page", json!({"title": "B"})).await.unwrap();

    assert!(first.contains("<h1>A</h1>"));
    assert!(second.contains("<h1>B</h1>"));
    assert_eq!(loader.fetch_count("views/page.html"), 1);
    assert!(Arc::ptr_eq(&compiled, &engine.lookup("views/page.html", "#page").await.unwrap()));
}

#[tokio::test]
async fn test_nested_sub_templates_are_addressable() {
    let loader = MemoryLoader::new().with_file(
        "card.html",
        r##"{$: "#card" }<div>{$: "#title" }<b>{$= data.name $}</b>{$}</div>{$}"##,
    );
    let engine = engine_with(&loader);

    let card = engine.process_file("card.html#card", json!({"name": "Ada"})).await.unwrap();
    let title = engine.process_file("card.html#title", json!({"name": "Bob"})).await.unwrap();

    assert_eq!(card, "<div><b>Ada</b></div>");
    assert_eq!(title, "<b>Bob</b>");
    assert_eq!(engine.sub_templates("card.html").await, vec!["#card", "#title"]);
}

#[tokio::test]
async fn test_includes_resolve_after_loading_the_check_queue() {
    let loader = MemoryLoader::new()
        .with_file("views/page.html", r##"{$: "#page" }[{$= @"../shared/nav.html#menu" $}]{$}"##)
        .with_file("shared/nav.html", r##"{$: "#menu" }{$* data.links }{$= item.value $};{$}{$}"##);
    let engine = engine_with(&loader);
    let data = json!({"links": ["home", "about"]});

    let before = engine.process_file("views/page.html#page", data.clone()).await.unwrap();
    assert_eq!(before, "[]");
    assert_eq!(engine.check_queue().await, vec![TemplateKey::new("shared/nav.html", "#menu")]);

    assert_eq!(engine.resolve_includes().await, vec!["shared/nav.html"]);
    let after = engine.process_file("views/page.html#page", data).await.unwrap();
    assert_eq!(after, "[home;about;]");

    assert!(engine.resolve_includes().await.is_empty());
}

#[tokio::test]
async fn test_check_queue_follows_declaration_order() {
    let loader = MemoryLoader::new().with_file(
        "page.html",
        r##"{$: "#zeta" }{$= @"z.html#z" $}{$}{$: "#alpha" }{$= @"a.html#a" $}{$}"##,
    );
    let engine = engine_with(&loader);
    engine.load_resource("page.html").await.unwrap();

    assert_eq!(
        engine.check_queue().await,
        vec![TemplateKey::new("z.html", "#z"), TemplateKey::new("a.html", "#a")]
    );
}

#[tokio::test]
async fn test_include_sees_caller_scope() {
    let loader = MemoryLoader::new().with_file(
        "list.html",
        r##"{$: "#list" }{$* data.people }{$= @"#row" $}{$}{$}{$: "#row" }<{$= item.value.name $}>{$}"##,
    );
    let engine = engine_with(&loader);

    let out = engine
        .process_file("list.html#list", json!({"people": [{"name": "Ada"}, {"name": "Grace"}]}))
        .await
        .unwrap();
    assert_eq!(out, "<Ada><Grace>");
}

#[tokio::test]
async fn test_passthru_returns_text_untouched() {
    let loader = MemoryLoader::new().with_file("raw.html", PAGE);
    let engine = engine_with(&loader);

    assert_eq!(engine.passthru_file("raw.html#page").await.unwrap(), PAGE);
    assert!(engine.lookup("raw.html", "#page").await.is_none());

    engine.passthru_file("raw.html").await.unwrap();
    assert_eq!(loader.fetch_count("raw.html"), 2);
}

#[tokio::test]
async fn test_missing_resource_is_a_load_failure() {
    let engine = engine_with(&MemoryLoader::new());
    let err = engine.process_file("nope.html#x", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::LoadFailure { ref reference, .. } if reference == "nope.html"));

    let err = engine.process_file("#only-a-fragment", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::InvalidReference { .. }));
}

#[tokio::test]
async fn test_slow_loader_times_out() {
    let loader = MemoryLoader::new().hanging_on("slow.html");
    let config = EngineConfig {
        load_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let engine = Engine::new(loader, config);

    let err = engine.process_file("slow.html#a", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::LoadTimeout { timeout_ms: 50, .. }));
}

#[tokio::test]
async fn test_unbalanced_markup_fails_to_compile() {
    let loader = MemoryLoader::new().with_file("bad.html", r##"{$: "#open" }<p>{$* data.x }never closed"##);
    let engine = engine_with(&loader);

    let err = engine.process_file("bad.html#open", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::StructuralImbalance { ref resource, .. } if resource == "bad.html"));
}

#[tokio::test]
async fn test_fresh_engine_starts_empty() {
    let loader = MemoryLoader::new().with_file("a.html", r##"{$: "#a" }A{$}"##);
    let engine = engine_with(&loader);
    engine.process_file("a.html#a", json!({})).await.unwrap();

    let fresh = engine.fresh();
    assert!(fresh.lookup("a.html", "#a").await.is_none());
    assert_eq!(fresh.process_file("a.html#a", json!({})).await.unwrap(), "A");
    assert_eq!(loader.fetch_count("a.html"), 2);
}

#[tokio::test]
async fn test_declarations_do_not_leak_into_data() {
    let loader = MemoryLoader::new().with_file(
        "scope.html",
        r##"{$: "#s" | data.count = data.count + 1 }{$= data.count $}{$}"##,
    );
    let engine = engine_with(&loader);
    let data = json!({"count": 1});

    assert_eq!(engine.process_file("scope.html#s", data.clone()).await.unwrap(), "2");
    assert_eq!(engine.process_file("scope.html#s", data).await.unwrap(), "2");
}
