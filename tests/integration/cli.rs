//! The `handlebar` binary against template trees on disk.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn site() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("site");
    write(
        &root,
        "views/page.html",
        r##"{$: "#page" | title = data.title }<h1>{$= title $}</h1>{$= @"../shared/nav.html#menu" $}{$}"##,
    );
    write(&root, "shared/nav.html", r##"{$: "#menu" }<nav>{$* data.links }{$= item.value $} {$}</nav>{$}"##);
    write(&root, "templates.json", r#"{"templates": {"home": "views/page.html#page"}}"#);
    temp
}

fn handlebar(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("handlebar").unwrap();
    cmd.current_dir(temp.path()).env_remove("HANDLEBAR_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_render_with_includes() {
    let temp = site();
    handlebar(&temp)
        .args(["render", "views/page.html#page", "--root", "site"])
        .args(["--json", r#"{"title": "Home", "links": ["a", "b"]}"#])
        .assert()
        .success()
        .stdout("<h1>Home</h1><nav>a b </nav>");
}

#[test]
fn test_render_without_includes() {
    let temp = site();
    handlebar(&temp)
        .args(["render", "views/page.html#page", "--root", "site", "--no-includes"])
        .args(["--json", r#"{"title": "Home"}"#])
        .assert()
        .success()
        .stdout("<h1>Home</h1>");
}

#[test]
fn test_render_reads_data_file_and_config() {
    let temp = site();
    fs::write(temp.path().join("handlebar.toml"), "root = \"site\"\n").unwrap();
    fs::write(temp.path().join("data.json"), r#"{"title": "From file", "links": []}"#).unwrap();

    handlebar(&temp)
        .args(["render", "views/page.html#page", "--data", "data.json"])
        .assert()
        .success()
        .stdout("<h1>From file</h1><nav></nav>");
}

#[test]
fn test_state_uses_manifest() {
    let temp = site();
    let data = r#"{"title": "State", "links": ["a", "b"]}"#;
    handlebar(&temp)
        .args(["state", "home", "--root", "site", "--json", data])
        .assert()
        .success()
        .stdout("<h1>State</h1><nav>a b </nav>");

    handlebar(&temp)
        .args(["state", "home", "--root", "site", "--no-includes", "--json", data])
        .assert()
        .success()
        .stdout("<h1>State</h1>");
}

#[test]
fn test_unknown_state_suggests_names() {
    let temp = site();
    handlebar(&temp)
        .args(["state", "hoem", "--root", "site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("State 'hoem'").and(predicate::str::contains("Did you mean: home")));
}

#[test]
fn test_raw_prints_source() {
    let temp = site();
    let expected = fs::read_to_string(temp.path().join("site/shared/nav.html")).unwrap();
    handlebar(&temp).args(["raw", "shared/nav.html#menu", "--root", "site"]).assert().success().stdout(expected);
}

#[test]
fn test_check_reports_sub_templates_and_includes() {
    let temp = site();
    handlebar(&temp)
        .args(["check", "views/page.html", "--root", "site"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("#page")
                .and(predicate::str::contains("shared/nav.html#menu"))
                .and(predicate::str::contains("(unresolved)")),
        );

    let output = handlebar(&temp)
        .args(["check", "views/page.html", "--root", "site", "--follow", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["sub_templates"], serde_json::json!(["#page"]));
    assert_eq!(report["includes"][0]["target"], "shared/nav.html#menu");
    assert_eq!(report["includes"][0]["resolved"], true);
}

#[test]
fn test_check_fails_on_unbalanced_markup() {
    let temp = site();
    write(&temp.path().join("site"), "broken.html", r##"{$: "#open" }never closed"##);

    handlebar(&temp)
        .args(["check", "broken.html", "--root", "site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error").and(predicate::str::contains("{$}")));
}

#[test]
fn test_missing_file_fails() {
    let temp = site();
    handlebar(&temp)
        .args(["render", "nowhere.html#x", "--root", "site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere.html"));
}
