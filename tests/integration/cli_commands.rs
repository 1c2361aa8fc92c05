#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "tags": [{"id": 1, "name": "sky"}],
    "authors": [{"id": 2, "name": "monet", "other_names": ["claude monet"]}]
}"#;

/// Runs the binary with the config path pointed into a scratch directory so
/// the user's own config never leaks in.
fn tagql(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tagql");
    cmd.env("TAGQL_CONFIG", dir.path().join("missing.toml"));
    cmd.env_remove("TAGQL_LOG");
    cmd
}

fn write_catalog(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("catalog.json");
    fs::write(&path, CATALOG).expect("write catalog");
    path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn lex_lists_tokens_and_warnings() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_stdout(tagql(&dir).args(["--format", "json", "lex", "a:b %"]));
    let tokens = json["tokens"].as_array().expect("tokens");
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0]["span"]["begin"], 0);
    assert_eq!(json["diagnostics"][0]["code"], 1004);
    assert_eq!(json["diagnostics"][0]["severity"], "warning");
}

#[test]
fn lex_text_output() {
    let dir = TempDir::new().expect("tempdir");
    let output = tagql(&dir)
        .args(["lex", "\"open"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("Tokens"), "{text}");
    assert!(text.contains("[1003]"), "{text}");
}

#[test]
fn parse_failure_exits_with_two() {
    let dir = TempDir::new().expect("tempdir");
    let output = tagql(&dir)
        .args(["parse", "a:]"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("[2001]"), "{text}");
}

#[test]
fn plan_reports_semantic_errors() {
    let dir = TempDir::new().expect("tempdir");
    let output = tagql(&dir)
        .args(["--format", "json", "plan", "score:abc"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json");
    assert!(json["plan"].is_null());
    assert_eq!(json["diagnostics"][0]["code"], 3019);
}

#[test]
fn plan_shows_sorts_and_filters() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_stdout(tagql(&dir).args(["--format", "json", "plan", "f sort:-score"]));
    assert_eq!(json["plan"]["sorts"][0]["field"], "score");
    assert_eq!(json["plan"]["sorts"][0]["descending"], true);
    assert_eq!(json["plan"]["filters"][0]["filters"][0]["field"], "favorite");
}

#[test]
fn compile_resolves_against_catalog() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = write_catalog(&dir);
    let json = json_stdout(
        tagql(&dir)
            .args(["--format", "json", "compile", "sky -@\"claude monet\"", "--catalog"])
            .arg(&catalog),
    );
    let calls = json["calls"].as_array().expect("calls");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["call"], "tag");
    assert_eq!(calls[0]["ids"][0], 1);
    assert_eq!(calls[1]["call"], "author");
    assert_eq!(calls[1]["exclude"], true);
    assert_eq!(json["schema"]["plan"]["elements"][0]["type"], "meta-tag");
}

#[test]
fn compile_without_catalog_warns() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_stdout(tagql(&dir).args(["--format", "json", "compile", "sky"]));
    assert_eq!(json["schema"]["warnings"][0]["code"], 4001);
}

#[test]
fn broken_catalog_exits_with_one() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("catalog.json");
    fs::write(&path, "{ not json").expect("write");
    tagql(&dir)
        .args(["compile", "sky", "--catalog"])
        .arg(&path)
        .assert()
        .code(1);
}

#[test]
fn forecast_suggests_sort_items() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_stdout(tagql(&dir).args(["--format", "json", "forecast", "sort:sc"]));
    assert_eq!(json["kind"], "sort");
    assert_eq!(json["partial"], "sc");
    assert_eq!(json["suggestions"][0]["name"], "score");
}

#[test]
fn forecast_at_cursor_uses_catalog() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = write_catalog(&dir);
    let json = json_stdout(
        tagql(&dir)
            .args(["--format", "json", "forecast", "@mon f", "--cursor", "4", "--catalog"])
            .arg(&catalog),
    );
    assert_eq!(json["kind"], "meta-tag");
    assert_eq!(json["suggestions"][0]["name"], "monet");
}

#[test]
fn config_file_sets_lexical_options() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[lexical]\ntranslate_underscore_to_space = true\n").expect("write");
    let json = json_stdout(
        tagql(&dir)
            .arg("--config")
            .arg(&config)
            .args(["--format", "json", "lex", "a_b"]),
    );
    assert_eq!(json["tokens"][0]["token"]["v"]["value"], "a b");
}

#[test]
fn flags_override_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "dialect = \"meta\"\n").expect("write");
    let json = json_stdout(
        tagql(&dir)
            .arg("--config")
            .arg(&config)
            .args(["--dialect", "illust", "--format", "json", "plan", "ext:png"]),
    );
    assert_eq!(json["plan"]["filters"][0]["filters"][0]["field"], "extension");
}

#[test]
fn invalid_config_exits_with_one() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "dialect = 3\n").expect("write");
    tagql(&dir)
        .arg("--config")
        .arg(&config)
        .args(["lex", "a"])
        .assert()
        .code(1);
}

#[test]
fn table_prints_every_state() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_stdout(tagql(&dir).args(["--format", "json", "table"]));
    assert_eq!(json["states"], 79);
    assert!(json["conflicts"].as_array().is_some_and(|c| !c.is_empty()));
    let text = json["table"].as_str().expect("table text");
    assert_eq!(text.lines().filter(|l| !l.trim().is_empty()).count(), 80);
}
