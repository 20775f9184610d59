use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lore_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lore");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(config_dir.join("mappings")).unwrap();
    fs::write(
        config_dir.join("mappings/characters.json"),
        r#"{ "Name": { "json": "name", "type": "title" }, "Species": { "json": "species", "type": "select" } }"#,
    )
    .unwrap();

    let characters = root.join("lore/characters");
    fs::create_dir_all(&characters).unwrap();
    fs::write(
        characters.join("court.json"),
        r#"{
  "characters": [
    { "name": "Lyra", "species": "HIGH FAE", "relationship_rival": "Kael" },
    { "name": "Kael", "species": "human" }
  ]
}"#,
    )
    .unwrap();
    fs::write(characters.join("broken.json"), "{ not json").unwrap();

    let plots = root.join("lore/plots");
    fs::create_dir_all(&plots).unwrap();
    fs::write(
        plots.join("arcs.json"),
        r#"{ "plots": [ { "name": "Lyra", "summary": "The exile returns." } ] }"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[lore]
root = "{root}/lore"

[mappings]
dir = "{root}/config/mappings"

[remote]
token_env = "LORE_HARNESS_IT_UNSET_TOKEN"
database_env = false

[remote.databases]
characters = "characters-db"

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("lore.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lore(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lore_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("LORE_HARNESS_IT_UNSET_TOKEN")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lore binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn parse(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, stdout))
}

#[test]
fn test_normalize_writes_entities_and_skips_bad_files() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lore(&config_path, &["normalize", "characters"]);
    assert!(success, "normalize failed: stdout={}, stderr={}", stdout, stderr);
    let report = parse(&stdout);
    assert_eq!(report["entities"], 2);
    assert_eq!(report["created"], 2);
    assert_eq!(report["skipped"][0]["file"], "characters/broken.json");

    let lyra: Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("lore/characters/formatted/Lyra.json")).unwrap())
            .unwrap();
    assert_eq!(lyra["species"], "Fae");
    assert_eq!(lyra["relationships"]["rival"], "Kael");
    assert!(tmp.path().join("lore/characters/formatted/_index.json").exists());
}

#[test]
fn test_normalize_twice_is_idempotent() {
    let (tmp, config_path) = setup_test_env();
    let lyra = tmp.path().join("lore/characters/formatted/Lyra.json");

    run_lore(&config_path, &["normalize", "characters"]);
    let first = fs::read(&lyra).unwrap();
    let (stdout, _, success) = run_lore(&config_path, &["normalize", "characters"]);
    assert!(success);
    assert_eq!(parse(&stdout)["unchanged"], 2);
    assert_eq!(fs::read(&lyra).unwrap(), first);
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_lore(&config_path, &["normalize", "characters", "--dry-run"]);
    assert!(success);
    assert_eq!(parse(&stdout)["entities"], 2);
    assert!(!tmp.path().join("lore/characters/formatted").exists());
}

#[test]
fn test_index_search_and_related() {
    let (tmp, config_path) = setup_test_env();
    run_lore(&config_path, &["normalize", "characters"]);
    run_lore(&config_path, &["normalize", "plots"]);

    let (stdout, stderr, success) = run_lore(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);
    let master = parse(&stdout);
    assert_eq!(master["characters"]["entry_count"], 2);
    assert_eq!(master["crosslinks"]["Lyra"].as_array().unwrap().len(), 2);
    assert!(tmp.path().join("lore/masterindex.json").exists());

    let (stdout, _, success) = run_lore(&config_path, &["search", "Lyrra"]);
    assert!(success);
    let names: Vec<String> = parse(&stdout)
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"Lyra".to_string()));

    let (stdout, _, success) = run_lore(&config_path, &["related", "Lyra"]);
    assert!(success);
    let related = parse(&stdout);
    assert_eq!(related["status"], "found");
    assert_eq!(related["links"][1]["category"], "plots");

    let (stdout, _, success) = run_lore(&config_path, &["get", "characters", "kael"]);
    assert!(success);
    assert_eq!(parse(&stdout)["name"], "Kael");
}

#[test]
fn test_migrate_then_normalize_skips_stub() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_lore(&config_path, &["migrate", "characters"]);
    assert!(success, "migrate failed: {}", stderr);
    let report = parse(&stdout);
    assert_eq!(report["migrated"][0]["entity_count"], 2);
    assert!(tmp.path().join("lore/characters/archive/court.json").exists());

    let (stdout, _, success) = run_lore(&config_path, &["normalize", "characters"]);
    assert!(success);
    let report = parse(&stdout);
    assert_eq!(report["entities"], 0);
    let reasons: Vec<&str> = report["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["reason"].as_str().unwrap())
        .collect();
    assert!(reasons.contains(&"migrated stub"));
}

#[test]
fn test_sync_without_token_reports_structured_error() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_lore(&config_path, &["sync", "push", "characters"]);
    assert!(!success);
    assert_eq!(parse(&stdout)["error"]["code"], "missing_credential");

    let (stdout, _, success) = run_lore(&config_path, &["sync", "pull", "realms"]);
    assert!(!success);
    assert_eq!(parse(&stdout)["error"]["code"], "missing_database_id");
}

#[test]
fn test_unknown_category_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_lore(&config_path, &["normalize", "dragons"]);
    assert!(!success);
    assert!(stderr.contains("Unknown category"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, _, success) = run_lore(&missing, &["index"]);
    assert!(!success);
}
