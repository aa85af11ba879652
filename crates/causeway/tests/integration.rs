use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cwy_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cwy");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // A small charity catalog
    fs::write(
        root.join("charities.json"),
        r#"[
  {
    "name": "Global Relief Fund",
    "mission": "Rapid emergency response after natural disasters",
    "url": "https://relief.example.org",
    "wallet": "0x0000000000000000000000000000000000000001"
  },
  {
    "name": "Clean Water Trust",
    "mission": "Safe drinking water and sanitation for rural communities",
    "wallet": "0x0000000000000000000000000000000000000002"
  },
  {
    "name": "Broken Wallet Org",
    "mission": "This entry has an invalid wallet and must be skipped",
    "wallet": "not-a-wallet"
  }
]"#,
    )
    .unwrap();

    // Embeddings and LLM disabled, no bridge: fully offline
    let config_content = format!(
        r#"[db]
path = "{}/data/causeway.sqlite"

[embedding]
provider = "disabled"

[llm]
provider = "disabled"

[server]
bind = "127.0.0.1:7420"
"#,
        root.display()
    );

    let config_path = config_dir.join("causeway.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cwy(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cwy_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cwy binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cwy(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_cwy(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_cwy(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_load_catalog() {
    let (tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let catalog = tmp.path().join("charities.json");
    let (stdout, stderr, success) =
        run_cwy(&config_path, &["load", catalog.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("catalog entries: 3"));
    assert!(stdout.contains("upserted charities: 2"));
    assert!(stdout.contains("skipped (invalid wallet): 1"));
    assert!(stdout.contains("categorization skipped (embeddings disabled)"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_load_idempotent_no_duplicates() {
    let (tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let catalog = tmp.path().join("charities.json");

    let (stdout1, _, _) = run_cwy(&config_path, &["load", catalog.to_str().unwrap()]);
    assert!(stdout1.contains("upserted charities: 2"));

    // Upsert is keyed by charity name; a second load must not duplicate
    let (stdout2, _, success) = run_cwy(&config_path, &["load", catalog.to_str().unwrap()]);
    assert!(success, "Second load failed");
    assert!(stdout2.contains("upserted charities: 2"));
}

#[test]
fn test_load_missing_file_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let (_, stderr, success) = run_cwy(&config_path, &["load", "/nonexistent/charities.json"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read catalog"));
}

#[test]
fn test_subscribe_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let (_, stderr, success) = run_cwy(
        &config_path,
        &[
            "subscribe",
            "disaster relief in coastal regions",
            "--wallet",
            "0x0000000000000000000000000000000000000099",
        ],
    );
    assert!(!success, "subscribe must fail with embeddings disabled");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_subscribe_rejects_bad_wallet() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let (_, stderr, success) = run_cwy(
        &config_path,
        &["subscribe", "clean water", "--wallet", "not-a-wallet"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid wallet address"));
}

#[test]
fn test_match_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let (_, stderr, success) = run_cwy(
        &config_path,
        &["match", "Earthquake strikes northern region"],
    );
    assert!(!success, "match must fail with embeddings disabled");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_portfolio_unknown_user() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    let (_, stderr, success) = run_cwy(&config_path, &["portfolio", "no-such-user"]);
    assert!(!success);
    assert!(stderr.contains("user not found"));
}

#[test]
fn test_watch_once_with_no_feeds() {
    let (_tmp, config_path) = setup_test_env();

    run_cwy(&config_path, &["init"]);
    // No feeds configured: a single pass fetches nothing and exits cleanly
    let (stdout, stderr, success) = run_cwy(&config_path, &["watch", "--once"]);
    assert!(success, "watch failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Fetched 0 article(s)"));
    assert!(stdout.contains("Pass complete"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let binary = cwy_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(missing.to_str().unwrap())
        .arg("init")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
