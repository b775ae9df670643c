//! Resources extending parent slots.

use handlebar::core::HandlebarError;
use handlebar::test_utils::MemoryLoader;
use serde_json::json;

use super::engine_with;

const BASE: &str = r##"{$: "#page" | title = "Base" }<html><title>{$= title $}</title><main>{$= @"#content" $}</main><pre>{$% {$} %$}</pre></html>{$}
{$: "#unused" }never merged{$}"##;

#[tokio::test]
async fn test_child_fills_parent_slot() {
    let loader = MemoryLoader::new()
        .with_file("layouts/base.html", BASE)
        .with_file(
            "pages/home.html",
            r##"{$+ "../layouts/base.html#page" $}
{$: "#content" }Hello {$= data.name $}{$}"##,
        );
    let engine = engine_with(&loader);

    let out = engine.process_file("pages/home.html#page", json!({"name": "Ada"})).await.unwrap();
    assert_eq!(out, "<html><title>Base</title><main>Hello Ada</main><pre> {$} </pre></html>");

    // Only the named slot comes across from the parent.
    assert!(engine.lookup("pages/home.html", "#unused").await.is_none());
    assert!(engine.lookup("layouts/base.html", "#page").await.is_none());
}

#[tokio::test]
async fn test_merged_file_matches_hand_merged_template() {
    let child = r##"{$+ "/layouts/base.html#page" $}{$: "#content" }<p>{$= data.body $}</p>{$}"##;
    let loader = MemoryLoader::new().with_file("layouts/base.html", BASE).with_file("home.html", child);
    let engine = engine_with(&loader);
    let data = json!({"body": "text"});

    let via_extends = engine.process_file("home.html#page", data.clone()).await.unwrap();

    let hand_merged = format!(
        "{}\n\n{}",
        r##"{$: "#page" | title = "Base" }<html><title>{$= title $}</title><main>{$= @"#content" $}</main><pre>{$% {$} %$}</pre></html>{$}"##,
        r##"{$: "#content" }<p>{$= data.body $}</p>{$}"##
    );
    let reference = engine.fresh();
    let by_hand = reference.process_template(&hand_merged, "#page", data, Some("home.html")).await.unwrap();

    assert_eq!(via_extends, by_hand);
}

#[tokio::test]
async fn test_child_declaration_overrides_parent() {
    let loader = MemoryLoader::new()
        .with_file("base.html", r##"{$: "#page" }[{$= @"#title" $}]{$: "#title" }parent{$}{$}"##)
        .with_file("child.html", r##"{$+ "base.html#page" $}{$: "#title" }child{$}"##);
    let engine = engine_with(&loader);

    // The nested parent declaration renders through the registry, so it is
    // replaced as well.
    let out = engine.process_file("child.html#page", json!({})).await.unwrap();
    assert_eq!(out, "[child]child");
}

#[tokio::test]
async fn test_extends_chain_follows_grandparent() {
    let loader = MemoryLoader::new()
        .with_file("root.html", r##"{$: "#frame" }<body>{$= @"#content" $}</body>{$}"##)
        .with_file(
            "section/mid.html",
            r##"{$+ "../root.html#frame" $}{$: "#content" }<section>{$= @"#inner" $}</section>{$}"##,
        )
        .with_file("section/leaf.html", r##"{$+ "mid.html#content" $}{$: "#inner" }leaf{$}"##);
    let engine = engine_with(&loader);

    let out = engine.process_file("section/leaf.html#frame", json!({})).await.unwrap();
    assert_eq!(out, "<body><section>leaf</section></body>");
    assert_eq!(loader.fetches(), vec!["section/leaf.html", "section/mid.html", "root.html"]);
}

#[tokio::test]
async fn test_extending_whole_parent() {
    let loader = MemoryLoader::new()
        .with_file("parts.html", r##"{$: "#a" }A{$}{$: "#b" }B{$}"##)
        .with_file("all.html", r##"{$+ "parts.html" $}{$: "#both" }{$= @"#a" $}{$= @"#b" $}{$}"##);
    let engine = engine_with(&loader);

    assert_eq!(engine.process_file("all.html#both", json!({})).await.unwrap(), "AB");
}

#[tokio::test]
async fn test_missing_slot_is_an_error() {
    let loader = MemoryLoader::new()
        .with_file("base.html", r##"{$: "#page" }p{$}"##)
        .with_file("child.html", r##"{$+ "base.html#nope" $}x"##);
    let engine = engine_with(&loader);

    let err = engine.process_file("child.html#page", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::MissingExtendsSlot { ref slot, .. } if slot == "#nope"));
}

#[tokio::test]
async fn test_cyclic_extends_is_bounded() {
    let loader = MemoryLoader::new()
        .with_file("a.html", r##"{$+ "b.html" $}"##)
        .with_file("b.html", r##"{$+ "a.html" $}"##);
    let engine = engine_with(&loader);

    let err = engine.process_file("a.html#x", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::ExtendsDepthExceeded { .. }));
}

#[tokio::test]
async fn test_process_template_reuses_compiled_child() {
    let loader = MemoryLoader::new().with_file("base.html", r##"{$: "#page" }[{$= @"#c" $}]{$}"##);
    let engine = engine_with(&loader);
    let child = r##"{$+ "base.html#page" $}{$: "#c" }x{$}"##;

    for _ in 0..3 {
        let out = engine.process_template(child, "#page", json!({}), Some("child.html")).await.unwrap();
        assert_eq!(out, "[x]");
    }
    assert_eq!(loader.fetch_count("base.html"), 1);
}

#[tokio::test]
async fn test_slot_survives_malformed_parent_tail() {
    let loader = MemoryLoader::new()
        .with_file("base.html", r##"{$: "#page" }P{$} trailing {$= broken"##)
        .with_file("child.html", r##"{$+ "base.html#page" $}"##);
    let engine = engine_with(&loader);

    assert_eq!(engine.process_file("child.html#page", json!({})).await.unwrap(), "P");
}
