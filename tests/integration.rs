use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dbk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dbk");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let notes_dir = root.join("notes");
    fs::create_dir_all(&notes_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        notes_dir.join("2025-01-01.md"),
        "---\ntitle: Kickoff planning\ncategory: work\ntags: [planning]\n---\n\nKickoff with @hannah about the roadmap this quarter.\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join("2025-01-05.md"),
        "---\ntitle: Standup notes\ncategory: work\ntags: [meeting]\n---\n\nQuick standup with @hannah and @bob. #meeting\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join("2025-01-07.md"),
        "Quiet day. Reading and journaling.\n",
    )
    .unwrap();
    fs::write(notes_dir.join("scratch.txt"), "Not a note.\n").unwrap();

    let config_content = format!(
        r#"[notes]
root = "{}/notes"
default_category = "daily"

[index]
path = "{}/data/index.db"

[retrieval]
default_limit = 12
"#,
        root.display(),
        root.display()
    );

    let config_path = root.join("daybook.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dbk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dbk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dbk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dbk(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dbk(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dbk(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_notes() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    let (stdout, stderr, success) = run_dbk(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("notes found: 3"));
    assert!(stdout.contains("indexed: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_index_skips_unchanged_content() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["index"]);
    assert!(success);
    assert!(
        stdout.contains("indexed: 0") && stdout.contains("unchanged: 3"),
        "Expected second run to skip everything, got: {}",
        stdout
    );
}

#[test]
fn test_index_full_reprocesses_everything() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["index", "--full"]);
    assert!(success);
    assert!(
        stdout.contains("indexed: 3"),
        "Expected --full to reindex all notes, got: {}",
        stdout
    );
}

#[test]
fn test_index_single_file() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    let note = tmp.path().join("notes/2025-01-05.md");
    let (stdout, stderr, success) = run_dbk(&config_path, &["index", note.to_str().unwrap()]);
    assert!(success, "single-file index failed: {}", stderr);
    assert!(stdout.contains("Indexed"));

    let (stdout, _, _) = run_dbk(&config_path, &["show", "2025-01-05"]);
    assert!(stdout.contains("Standup notes"));
}

#[test]
fn test_index_single_file_rejects_non_note() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    let junk = tmp.path().join("notes/scratch.txt");
    let (_, stderr, success) = run_dbk(&config_path, &["index", junk.to_str().unwrap()]);
    assert!(!success, "Indexing a non-note path should fail");
    assert!(
        stderr.contains("not a note file"),
        "Should explain the name requirement, got: {}",
        stderr
    );
}

#[test]
fn test_index_skips_malformed_note() {
    let (tmp, config_path) = setup_test_env();

    // front matter that opens but never closes
    fs::write(
        tmp.path().join("notes/2025-02-01.md"),
        "---\ntitle: broken\n",
    )
    .unwrap();

    run_dbk(&config_path, &["init"]);
    let (stdout, _, success) = run_dbk(&config_path, &["index"]);
    assert!(success, "Malformed notes must not abort indexing");
    assert!(
        stdout.contains("malformed (skipped): 1"),
        "Expected one skipped note, got: {}",
        stdout
    );

    let (stdout, _, _) = run_dbk(&config_path, &["stats"]);
    assert!(stdout.contains("Notes: 3"));
}

#[test]
fn test_search_person() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, stderr, success) = run_dbk(&config_path, &["search", "@bob"]);
    assert!(success, "search failed: {}", stderr);
    assert!(
        stdout.contains("2025-01-05"),
        "Expected the standup note, got: {}",
        stdout
    );
    assert!(
        !stdout.contains("2025-01-01"),
        "Kickoff note does not mention bob, got: {}",
        stdout
    );
}

#[test]
fn test_search_tag() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "#planning"]);
    assert!(success);
    assert!(stdout.contains("2025-01-01"));
    assert!(!stdout.contains("2025-01-05"));
}

#[test]
fn test_search_text() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "roadmap"]);
    assert!(success);
    assert!(
        stdout.contains("2025-01-01"),
        "Expected full-text match on the kickoff note, got: {}",
        stdout
    );
}

#[test]
fn test_search_category() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "category:work"]);
    assert!(success);
    assert!(stdout.contains("2025-01-01"));
    assert!(stdout.contains("2025-01-05"));
    assert!(
        !stdout.contains("2025-01-07"),
        "Default-category note should be excluded, got: {}",
        stdout
    );
}

#[test]
fn test_search_combined_terms_intersect() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    // hannah appears in two notes; the tag narrows it to one
    let (stdout, _, success) = run_dbk(&config_path, &["search", "@hannah #meeting"]);
    assert!(success);
    assert!(stdout.contains("2025-01-05"));
    assert!(!stdout.contains("2025-01-01"));
}

#[test]
fn test_search_explicit_date_range() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) =
        run_dbk(&config_path, &["search", "from 2025-01-01 to 2025-01-04"]);
    assert!(success);
    assert!(stdout.contains("2025-01-01"));
    assert!(!stdout.contains("2025-01-05"));
}

#[test]
fn test_search_relative_window() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);

    let today = chrono::Utc::now().date_naive();
    let stale = today - chrono::Days::new(30);
    let notes_dir = tmp.path().join("notes");
    fs::write(
        notes_dir.join(format!("{today}.md")),
        "Current sprint notes.\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join(format!("{stale}.md")),
        "Month-old sprint notes.\n",
    )
    .unwrap();
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "past week"]);
    assert!(success);
    assert!(
        stdout.contains(&today.to_string()),
        "Expected today's note inside the window, got: {}",
        stdout
    );
    assert!(
        !stdout.contains(&stale.to_string()),
        "Month-old note should be outside the window, got: {}",
        stdout
    );
}

#[test]
fn test_search_empty_query_lists_recent() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);

    let today = chrono::Utc::now().date_naive();
    fs::write(
        tmp.path().join(format!("notes/{today}.md")),
        "Fresh note written today.\n",
    )
    .unwrap();
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", ""]);
    assert!(success, "Empty query should not panic");
    assert!(
        stdout.contains(&today.to_string()),
        "Expected today's note in the recent view, got: {}",
        stdout
    );
    assert!(
        !stdout.contains("2025-01-01"),
        "Old notes should be outside the recent view, got: {}",
        stdout
    );
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout1, _, _) = run_dbk(&config_path, &["search", "notes"]);
    let (stdout2, _, _) = run_dbk(&config_path, &["search", "notes"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_json_output() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "@hannah", "--json"]);
    assert!(success);
    let hits: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let arr = hits.as_array().expect("JSON array");
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["id"], "2025-01-05");
    assert_eq!(arr[1]["id"], "2025-01-01");
}

#[test]
fn test_search_flag_overrides() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["search", "", "--person", "bob"]);
    assert!(success);
    assert!(stdout.contains("2025-01-05"));
    assert!(!stdout.contains("2025-01-01"));

    // the flag accepts the sigil form too
    let (stdout2, _, _) = run_dbk(&config_path, &["search", "", "--person", "@bob"]);
    assert!(stdout2.contains("2025-01-05"));
}

#[test]
fn test_show_note() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["show", "2025-01-05"]);
    assert!(success);
    assert!(stdout.contains("Standup notes"));
    assert!(stdout.contains("Quick standup with @hannah and @bob."));
    assert!(stdout.contains("category: work"));
}

#[test]
fn test_show_defaults_for_bare_note() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    // no front matter: title falls back to the id, category to the default
    let (stdout, _, success) = run_dbk(&config_path, &["show", "2025-01-07"]);
    assert!(success);
    assert!(stdout.contains("title: 2025-01-07"));
    assert!(stdout.contains("category: daily"));
}

#[test]
fn test_show_json_output() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["show", "2025-01-05", "--json"]);
    assert!(success);
    let note: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(note["title"], "Standup notes");
    assert_eq!(note["category"], "work");
    assert!(note["mentions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m == "bob"));
}

#[test]
fn test_show_missing_note() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);

    let (_, stderr, success) = run_dbk(&config_path, &["show", "2030-12-31"]);
    assert!(!success, "show with missing id should fail");
    assert!(
        stderr.contains("not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_remove_note() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["remove", "2025-01-07"]);
    assert!(success);
    assert!(stdout.contains("Removed 2025-01-07"));

    let (_, _, show_success) = run_dbk(&config_path, &["show", "2025-01-07"]);
    assert!(!show_success, "Removed note should no longer resolve");

    // removal only touches the index, never the file
    assert!(tmp.path().join("notes/2025-01-07.md").exists());

    let (stdout, _, success) = run_dbk(&config_path, &["remove", "2025-01-07"]);
    assert!(success, "Removing an unknown id is a no-op, not an error");
    assert!(stdout.contains("Not indexed"));
}

#[test]
fn test_reindex_matches_disk() {
    let (tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    fs::remove_file(tmp.path().join("notes/2025-01-07.md")).unwrap();

    let (stdout, _, success) = run_dbk(&config_path, &["reindex"]);
    assert!(success);
    assert!(stdout.contains("Reindexed 2 notes"));

    let (_, _, show_success) = run_dbk(&config_path, &["show", "2025-01-07"]);
    assert!(!show_success, "Deleted note should be gone after reindex");
}

#[test]
fn test_entities_lists_people() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["entities"]);
    assert!(success);
    assert!(stdout.contains("hannah"));
    assert!(stdout.contains("bob"));

    let (stdout, _, _) = run_dbk(&config_path, &["entities", "--json"]);
    let entities: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let arr = entities.as_array().expect("JSON array");
    // hannah appears in two notes, bob in one; count ordering puts hannah first
    assert_eq!(arr[0]["name"], "hannah");
    assert_eq!(arr[0]["mention_count"], 2);
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();

    run_dbk(&config_path, &["init"]);
    run_dbk(&config_path, &["index"]);

    let (stdout, _, success) = run_dbk(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Notes: 3"));
    assert!(stdout.contains("People: 2"));
    assert!(stdout.contains("Database:"));

    let (stdout, _, _) = run_dbk(&config_path, &["stats", "--json"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(stats["note_count"], 3);
    assert_eq!(stats["entity_count"], 2);
    assert!(stats["db_size_bytes"].as_u64().unwrap() > 0);
}

#[test]
fn test_bad_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("daybook.toml");
    fs::write(
        &config_path,
        "[notes]\nroot = \"/tmp/notes\"\n[retrieval]\ndefault_limit = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_dbk(&config_path, &["stats"]);
    assert!(!success, "Invalid config should fail");
    assert!(
        stderr.contains("default_limit"),
        "Should name the bad setting, got: {}",
        stderr
    );
}
