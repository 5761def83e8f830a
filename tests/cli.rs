use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn libflix_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("libflix");
    path
}

/// Temp dir with a config and a catalog. None of the catalog items can
/// reach the network except `hp1`, which is only listed, never resolved.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("catalog.json"),
        r#"{
  "items": [
    { "id": "hp1", "title": "Harry Potter and the Sorcerer's Stone",
      "author": "J.K. Rowling", "isbn": "978-0-439-70818-0" },
    { "id": "bare", "title": "Untitled", "author": "Anon",
      "fallbackUrls": ["https://badhost.example/x.jpg"] },
    { "id": "empty", "title": "Nothing Here" }
  ]
}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[catalog]
path = "{}/data/catalog.json"

[resolver]
retry_delay_ms = 10

[[hosts]]
host = "covers.example.net"
base_score = 77
class = "trusted"
cross_origin = true
"#,
        root.display()
    );
    let config_path = config_dir.join("libflix.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_libflix(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = libflix_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run libflix binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_isbn_normalizes_both_forms() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_libflix(&config_path, &["isbn", "0-439-70818-4"]);
    assert!(success, "isbn failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("normalized: 0439708184"));
    assert!(stdout.contains("isbn10: 0439708184"));
    assert!(stdout.contains("isbn13: 9780439708180"));
}

#[test]
fn test_isbn_rejects_bad_check_digit() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_libflix(&config_path, &["isbn", "0439708185"]);
    assert!(!success);
    assert!(stderr.contains("invalid ISBN"), "stderr: {}", stderr);
}

#[test]
fn test_score_builtin_and_override() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_libflix(
        &config_path,
        &["score", "https://covers.openlibrary.org/b/isbn/0439708184-L.jpg"],
    );
    assert!(success);
    assert!(stdout.contains("score: 95"), "got: {}", stdout);
    assert!(stdout.contains("class: trusted"));
    assert!(stdout.contains("cross_origin: true"));

    let (stdout, _, success) =
        run_libflix(&config_path, &["score", "https://covers.example.net/a.png"]);
    assert!(success);
    assert!(stdout.contains("score: 82"), "got: {}", stdout);
    assert!(stdout.contains("host: covers.example.net"));
}

#[test]
fn test_score_without_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (stdout, _, success) =
        run_libflix(&missing, &["score", "https://unknown.example/cover"]);
    assert!(success);
    assert!(stdout.contains("score: 50"), "got: {}", stdout);
    assert!(stdout.contains("host: (default)"));
}

#[test]
fn test_candidates_lists_generated_urls_in_order() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_libflix(&config_path, &["candidates", "hp1"]);
    assert!(success, "candidates failed: stderr={}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("SCORE"));
    assert_eq!(lines.len(), 6, "got: {}", stdout);
    assert!(lines[1].contains("covers.openlibrary.org/b/isbn/9780439708180"));
    assert!(stdout.contains("images/P/0439708184.01.L.jpg"));
}

#[test]
fn test_candidates_unknown_id() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_libflix(&config_path, &["candidates", "missing"]);
    assert!(!success);
    assert!(stderr.contains("no catalog item with id: missing"));
}

#[test]
fn test_resolve_item_without_identifiers() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_libflix(&config_path, &["resolve", "bare"]);
    assert!(success, "resolve failed: stderr={}", stderr);
    assert!(stdout.contains("no cover for \"Untitled\" by Anon"));
    assert!(!stdout.contains("tried:"));

    let (stdout, _, success) = run_libflix(&config_path, &["resolve", "bare", "--json"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["status"], "failure");
    assert_eq!(value["title"], "Untitled");
    assert_eq!(value["tried_urls"].as_array().unwrap().len(), 0);
}

#[test]
fn test_resolve_rejects_bad_priority() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_libflix(&config_path, &["resolve", "bare", "--priority", "urgent"]);
    assert!(!success);
}

#[test]
fn test_preload_reports_misses() {
    let (_tmp, config_path) = setup_test_env();

    // hp1 is left out so nothing reaches the network
    let catalog = config_path.parent().unwrap().parent().unwrap().join("data/catalog.json");
    fs::write(
        &catalog,
        r#"[{"id":"bare","title":"Untitled"},{"id":"empty","title":"Nothing Here"}]"#,
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_libflix(&config_path, &["preload", "--progress", "off"]);
    assert!(success, "preload failed: stderr={}", stderr);
    assert!(stdout.contains("preload ok"));
    assert!(stdout.contains("items: 2"));
    assert!(stdout.contains("resolved: 0"));
    assert!(stdout.contains("missing: 2"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        format!(
            "[catalog]\npath = \"{}/data/catalog.json\"\n\n[resolver]\nretry_passes = 9\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_libflix(&config_path, &["candidates", "hp1"]);
    assert!(!success);
    assert!(stderr.contains("retry_passes"), "stderr: {}", stderr);
}
