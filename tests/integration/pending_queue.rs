//! State renders issued before and while the manifest loads.

use handlebar::core::HandlebarError;
use handlebar::test_utils::MemoryLoader;
use serde_json::json;

use super::engine_with;

const MANIFEST: &str = r##"{"templates": {"home": "home.html#page", "about": "about.html#page"}}"##;

fn site() -> MemoryLoader {
    MemoryLoader::new()
        .with_file("templates.json", MANIFEST)
        .with_file("home.html", r##"{$: "#page" }home:{$= data.n $}{$}"##)
        .with_file("about.html", r##"{$: "#page" }about:{$= data.n $}{$}"##)
}

#[tokio::test]
async fn test_state_before_init_is_rejected() {
    let engine = engine_with(&site());
    let err = engine.process_state("home", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::ManifestNotLoaded));
}

#[tokio::test]
async fn test_renders_parked_during_load_replay_in_order() {
    let loader = site().held();
    let engine = engine_with(&loader);

    let (ready, about, home, ()) = tokio::join!(
        engine.init(None),
        engine.process_state("about", json!({"n": 1})),
        engine.process_state("home", json!({"n": 2})),
        async {
            tokio::task::yield_now().await;
            loader.release();
        },
    );

    ready.unwrap();
    assert_eq!(about.unwrap(), "about:1");
    assert_eq!(home.unwrap(), "home:2");
    assert_eq!(loader.fetches(), vec!["templates.json", "about.html", "home.html"]);
}

#[tokio::test]
async fn test_failed_manifest_reaches_every_waiter() {
    let loader = MemoryLoader::new().held();
    let engine = engine_with(&loader);

    let (ready, first, second, ()) = tokio::join!(
        engine.init(Some("missing.json")),
        engine.process_state("home", json!({})),
        engine.process_state("about", json!({})),
        async {
            tokio::task::yield_now().await;
            loader.release();
        },
    );

    let expected = ready.unwrap_err();
    assert!(matches!(expected, HandlebarError::LoadFailure { ref reference, .. } if reference == "missing.json"));
    assert_eq!(first.unwrap_err(), expected);
    assert_eq!(second.unwrap_err(), expected);

    let err = engine.process_state("home", json!({})).await.unwrap_err();
    assert!(matches!(err, HandlebarError::ManifestNotLoaded));
}

#[tokio::test]
async fn test_states_render_directly_after_init() {
    let loader = site();
    let engine = engine_with(&loader);
    engine.init(None).await.unwrap();

    assert_eq!(engine.process_state("home", json!({"n": 3})).await.unwrap(), "home:3");
    assert_eq!(engine.process_state("home", json!({"n": 4})).await.unwrap(), "home:4");
    assert_eq!(loader.fetch_count("home.html"), 1);
}

#[tokio::test]
async fn test_unknown_state_suggests_close_names() {
    let engine = engine_with(&site());
    engine.init(None).await.unwrap();

    let err = engine.process_state("hom", json!({})).await.unwrap_err();
    match err {
        HandlebarError::UnknownState {
            state,
            suggestions,
        } => {
            assert_eq!(state, "hom");
            assert_eq!(suggestions, vec!["home"]);
        }
        other => panic!("expected UnknownState, got {other:?}"),
    }
}

#[tokio::test]
async fn test_init_runs_once() {
    let engine = engine_with(&site());
    engine.init(None).await.unwrap();
    let err = engine.init(None).await.unwrap_err();
    assert!(matches!(err, HandlebarError::AlreadyInitialized));
}

#[tokio::test]
async fn test_malformed_manifest() {
    let loader = MemoryLoader::new().with_file("templates.json", r#"{"templates": ["home.html"]}"#);
    let engine = engine_with(&loader);

    let err = engine.init(None).await.unwrap_err();
    assert!(matches!(err, HandlebarError::MalformedManifest { .. }));
}
