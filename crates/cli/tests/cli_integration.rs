//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `bizflow` binary against a data file in
//! a temp dir, then checks exit codes, output and the rewritten file.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = r#"{
  "records": [
    {"type": "customer", "id": "c-1", "owner_id": "owner-1", "created_at": "2024-03-01T10:00:00Z",
     "name": "Acme", "email": "ops@acme.test", "tags": ["vip", "retail"]},
    {"type": "customer", "id": "c-2", "owner_id": "owner-1", "created_at": "2024-03-05T10:00:00Z",
     "name": "Nimbus", "email": "hi@nimbus.test", "tags": []},
    {"type": "customer", "id": "c-3", "owner_id": "owner-1", "created_at": "2024-03-10T10:00:00Z",
     "name": "Orbit", "email": "team@orbit.test", "tags": ["VIP"]},
    {"type": "customer", "id": "c-4", "owner_id": "owner-2", "created_at": "2024-03-02T10:00:00Z",
     "name": "Elsewhere", "email": "x@else.test", "tags": ["vip"]},
    {"type": "lead", "id": "l-1", "owner_id": "owner-1", "created_at": "2024-03-01T09:00:00Z",
     "name": "Website", "amount": "1500", "stage": "new"},
    {"type": "lead", "id": "l-2", "owner_id": "owner-1", "created_at": "2024-03-02T09:00:00Z",
     "name": "Retainer", "amount": "2500.50", "stage": "proposal"},
    {"type": "lead", "id": "l-3", "owner_id": "owner-1", "created_at": "2024-03-03T09:00:00Z",
     "name": "Audit", "amount": "800", "stage": "won"},
    {"type": "task", "id": "t-1", "owner_id": "owner-1", "created_at": "2024-03-01T08:00:00Z",
     "title": "Draft brief", "project_id": "p-1", "stage": "todo"},
    {"type": "task", "id": "t-2", "owner_id": "owner-1", "created_at": "2024-03-02T08:00:00Z",
     "title": "Review copy", "project_id": "p-2", "stage": "todo"}
  ]
}"#;

/// A temp dir holding `data.json` seeded with [`FIXTURE`].
fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let data = dir.path().join("data.json");
    fs::write(&data, FIXTURE).expect("write fixture");
    (dir, data)
}

/// Helper: the `bizflow` binary, run inside `dir` against `data`.
fn bizflow(dir: &Path, data: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("bizflow");
    cmd.current_dir(dir)
        .env_remove("BIZFLOW_LOG")
        .arg("--data")
        .arg(data);
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("stdout is JSON")
}

fn stored(data: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(data).expect("read data")).expect("data is JSON")
}

fn stored_record(data: &Path, id: &str) -> serde_json::Value {
    stored(data)["records"]
        .as_array()
        .expect("records")
        .iter()
        .find(|r| r["id"] == id)
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}

// ──────────────────────────────────────────────
// 1. Help and errors
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("bizflow")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Small-business CRM data toolkit"));
}

#[test]
fn missing_owner_is_an_error() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["query", "customers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --owner"));
}

#[test]
fn json_errors_are_objects_on_stderr() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--output", "json", "query", "customers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}

#[test]
fn malformed_data_file_is_reported() {
    let (dir, data) = workspace();
    fs::write(&data, "{ not json").unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error parsing JSON"));
}

// ──────────────────────────────────────────────
// 2. Query
// ──────────────────────────────────────────────

#[test]
fn query_lists_only_the_owners_records_newest_first() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("c-3  Orbit"))
        .stdout(predicate::str::contains("Elsewhere").not())
        .stdout(predicate::str::contains("-- 1-3 of 3 (page 1/1)"));
}

#[test]
fn query_filters_by_tag_case_insensitively() {
    let (dir, data) = workspace();
    let page = json_stdout(
        bizflow(dir.path(), &data).args([
            "--owner", "owner-1", "--output", "json", "query", "customers", "--tag", "vip",
            "--sort", "name", "--direction", "asc",
        ]),
    );
    assert_eq!(page["total"], 2);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Acme", "Orbit"]);
}

#[test]
fn query_untagged_segment_and_text() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers", "--segment", "without-tags"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nimbus"))
        .stdout(predicate::str::contains("Acme").not());

    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers", "--text", "  ORBIT.test "])
        .assert()
        .success()
        .stdout(predicate::str::contains("Orbit"))
        .stdout(predicate::str::contains("Nimbus").not());
}

#[test]
fn query_date_range_is_inclusive() {
    let (dir, data) = workspace();
    let page = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers", "--from", "2024-03-01",
        "--to", "2024-03-05",
    ]));
    assert_eq!(page["total"], 2);
}

#[test]
fn query_rejects_bad_dates() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers", "--from", "03/01/2024"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn query_pages_are_clamped() {
    let (dir, data) = workspace();
    let page = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers", "--page-size", "2",
        "--page", "9",
    ]));
    assert_eq!(page["page"], 2);
    assert_eq!(page["page_count"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
}

#[test]
fn query_zero_page_size_fails() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "customers", "--page-size", "0"])
        .assert()
        .failure();
}

#[test]
fn query_with_no_matches() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "query", "leads", "--text", "nothing-like-this"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no matching leads"));
}

#[test]
fn config_file_sets_default_page_size() {
    let (dir, data) = workspace();
    fs::write(dir.path().join("bizflow.toml"), "[view]\npage_size = 1\n").unwrap();
    let page = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers",
    ]));
    assert_eq!(page["page_count"], 3);
}

#[test]
fn invalid_config_is_reported() {
    let (dir, data) = workspace();
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[view]\npage_size = 0\n").unwrap();
    bizflow(dir.path(), &data)
        .arg("--config")
        .arg(&config)
        .args(["--owner", "owner-1", "query", "customers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

// ──────────────────────────────────────────────
// 3. Export and import
// ──────────────────────────────────────────────

#[test]
fn export_writes_quoted_csv_of_every_match() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args([
            "--owner", "owner-1", "export", "customers", "--sort", "name", "--direction", "asc",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\"id\","))
        .stdout(predicate::str::contains("\"Acme\",\"ops@acme.test\",\"vip; retail\""));
}

#[test]
fn export_to_file_then_reimport() {
    let (dir, data) = workspace();
    let out = dir.path().join("customers.csv");
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "--quiet", "export", "customers", "--tag", "vip", "--out"])
        .arg(&out)
        .assert()
        .success();
    let csv = fs::read_to_string(&out).unwrap();
    assert_eq!(csv.lines().count(), 3);

    bizflow(dir.path(), &data)
        .args(["--owner", "owner-9", "import"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 2 customers"));
    let imported = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-9", "--output", "json", "query", "customers", "--tag", "retail",
    ]));
    assert_eq!(imported["total"], 1);
}

#[test]
fn import_skips_rows_without_name_or_email() {
    let (dir, data) = workspace();
    let csv = dir.path().join("in.csv");
    fs::write(
        &csv,
        "Name,Email,Tags\nBlueBay,hello@bluebay.test,\"new, coastal\"\n,missing@name.test,\nNoEmail,,\n",
    )
    .unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "import"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 1 customers (2 skipped, 0 failed)"));

    let customers = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers", "--tag", "coastal",
    ]));
    assert_eq!(customers["items"][0]["name"], "BlueBay");
    assert_eq!(customers["items"][0]["tags"], serde_json::json!(["new", "coastal"]));
}

#[test]
fn import_dry_run_leaves_data_untouched() {
    let (dir, data) = workspace();
    let csv = dir.path().join("in.csv");
    fs::write(&csv, "name,email\nBlueBay,hello@bluebay.test\n").unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "import", "--dry-run"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rows parsed, 0 skipped"));
    assert_eq!(fs::read_to_string(&data).unwrap(), FIXTURE);
}

#[test]
fn import_requires_name_and_email_columns() {
    let (dir, data) = workspace();
    let csv = dir.path().join("in.csv");
    fs::write(&csv, "company,phone\nBlueBay,555\n").unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "import"])
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no name and email columns"));
}

// ──────────────────────────────────────────────
// 4. Boards
// ──────────────────────────────────────────────

#[test]
fn lead_board_shows_columns_and_totals() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "show", "leads"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NEW (1)  $1500"))
        .stdout(predicate::str::contains("QUALIFIED (0)  $0"))
        .stdout(predicate::str::contains("open pipeline: $4000.50  total: $4800.50"));
}

#[test]
fn moving_a_lead_persists_its_stage() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "move", "leads", "l-1", "new", "Qualified"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moved l-1: new -> qualified"));
    assert_eq!(stored_record(&data, "l-1")["stage"], "qualified");
}

#[test]
fn move_from_the_wrong_stage_fails() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "move", "leads", "l-1", "won", "lost"])
        .assert()
        .failure();
    assert_eq!(stored_record(&data, "l-1")["stage"], "new");
}

#[test]
fn move_to_an_unknown_stage_fails() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "move", "tasks", "t-1", "todo", "blocked"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked"));
}

#[test]
fn move_to_the_same_stage_changes_nothing() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "move", "tasks", "t-1", "todo", "todo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already in todo"));
    assert_eq!(fs::read_to_string(&data).unwrap(), FIXTURE);
}

#[test]
fn task_board_filters_by_project() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "show", "tasks", "--project", "p-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TODO (1)"))
        .stdout(predicate::str::contains("Review copy"))
        .stdout(predicate::str::contains("Draft brief").not());
}

#[test]
fn clearing_a_stage_deletes_its_records() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "board", "clear", "tasks", "todo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 updated"));
    assert!(stored_record(&data, "t-1").is_null());
    assert!(stored_record(&data, "t-2").is_null());
    assert!(!stored_record(&data, "l-1").is_null());
}

// ──────────────────────────────────────────────
// 5. Tags
// ──────────────────────────────────────────────

#[test]
fn tags_list_counts_case_insensitively() {
    // Orbit is listed first, so its spelling of the tag wins.
    let (dir, data) = workspace();
    let tags = json_stdout(
        bizflow(dir.path(), &data).args(["--owner", "owner-1", "--output", "json", "tags", "list"]),
    );
    assert_eq!(
        tags,
        serde_json::json!([
            { "tag": "retail", "count": 1 },
            { "tag": "VIP", "count": 2 },
        ])
    );
}

#[test]
fn tag_counts_agree_with_tag_filter_for_non_ascii_tags() {
    let dir = TempDir::new().expect("tempdir");
    let data = dir.path().join("data.json");
    fs::write(
        &data,
        r#"{"records": [
          {"type": "customer", "id": "c-1", "owner_id": "owner-1", "created_at": "2024-03-01T10:00:00Z",
           "name": "Alpen", "email": "a@alpen.test", "tags": ["Über"]},
          {"type": "customer", "id": "c-2", "owner_id": "owner-1", "created_at": "2024-03-02T10:00:00Z",
           "name": "Berg", "email": "b@berg.test", "tags": ["über"]}
        ]}"#,
    )
    .expect("write data");

    let tags = json_stdout(
        bizflow(dir.path(), &data).args(["--owner", "owner-1", "--output", "json", "tags", "list"]),
    );
    assert_eq!(tags, serde_json::json!([{ "tag": "über", "count": 2 }]));

    let page = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers", "--tag", "ÜBER",
    ]));
    assert_eq!(page["total"], tags[0]["count"]);
}

#[test]
fn adding_tags_merges_without_duplicates() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args([
            "--owner", "owner-1", "tags", "add", "--id", "c-1", "--id", "c-2", "--id", "c-4",
            "VIP", "q3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 updated, 0 skipped, 0 failed"));
    assert_eq!(
        stored_record(&data, "c-1")["tags"],
        serde_json::json!(["vip", "retail", "q3"])
    );
    assert_eq!(stored_record(&data, "c-2")["tags"], serde_json::json!(["VIP", "q3"]));
    // Another owner's record is never touched.
    assert_eq!(stored_record(&data, "c-4")["tags"], serde_json::json!(["vip"]));
}

#[test]
fn removing_tags_skips_records_without_them() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "tags", "remove", "--id", "c-1", "--id", "c-2", "vip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 updated, 1 skipped"));
    assert_eq!(stored_record(&data, "c-1")["tags"], serde_json::json!(["retail"]));
}

#[test]
fn renaming_a_tag_touches_every_holder() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "tags", "rename", "vip", "gold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 updated"));
    assert_eq!(stored_record(&data, "c-3")["tags"], serde_json::json!(["gold"]));
    assert_eq!(stored_record(&data, "c-4")["tags"], serde_json::json!(["vip"]));
}

#[test]
fn renaming_to_the_same_tag_is_rejected() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "tags", "rename", "vip", "VIP"])
        .assert()
        .failure();
}

#[test]
fn deleting_a_tag_removes_it_everywhere() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "tags", "delete", "VIP"])
        .assert()
        .success();
    assert_eq!(stored_record(&data, "c-1")["tags"], serde_json::json!(["retail"]));
    assert_eq!(stored_record(&data, "c-3")["tags"], serde_json::json!([]));
}

// ──────────────────────────────────────────────
// 6. Segments
// ──────────────────────────────────────────────

#[test]
fn saved_segment_round_trip() {
    let (dir, data) = workspace();
    let saved = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "segments", "save", "VIPs", "--tag", "vip",
    ]));
    assert_eq!(saved["id"], "seg-1");
    assert_eq!(saved["name"], "VIPs");

    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "segments", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seg-1  VIPs  (2 customers)"));

    let page = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "query", "customers", "--saved", "vips",
    ]));
    assert_eq!(page["total"], 2);

    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "segments", "rename", "seg-1", "Top accounts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("renamed segment seg-1 (Top accounts)"));

    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "segments", "delete", "seg-1"])
        .assert()
        .success();
    assert!(stored(&data).get("segments").is_none());
}

#[test]
fn segments_are_per_owner() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "segments", "save", "Tagged", "--segment", "with-tags"])
        .assert()
        .success();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-2", "segments", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no saved segments"));
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-2", "query", "customers", "--saved", "Tagged"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("segment not found"));
}

#[test]
fn blank_segment_names_are_rejected() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "segments", "save", "   "])
        .assert()
        .failure();
}

// ──────────────────────────────────────────────
// 7. Notes
// ──────────────────────────────────────────────

#[test]
fn notes_are_listed_newest_first_and_deleted() {
    let (dir, data) = workspace();
    let first = json_stdout(bizflow(dir.path(), &data).args([
        "--owner", "owner-1", "--output", "json", "notes", "add", "c-1", "  Intro call  ",
    ]));
    assert_eq!(first["content"], "Intro call");
    assert_eq!(first["customer_id"], "c-1");
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "add", "c-1", "Follow-up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added note"));
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "add", "c-2", "Other customer"])
        .assert()
        .success();

    let listed = json_stdout(
        bizflow(dir.path(), &data).args(["--owner", "owner-1", "--output", "json", "notes", "list", "c-1"]),
    );
    let contents: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["Follow-up", "Intro call"]);

    let id = first["id"].as_str().unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "delete", "c-1", id])
        .assert()
        .success();
    assert_eq!(stored_record(&data, id), serde_json::Value::Null);
    // The note belongs to c-1, so it cannot be deleted through c-2.
    let remaining = listed[0]["id"].as_str().unwrap();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "delete", "c-2", remaining])
        .assert()
        .failure()
        .stderr(predicate::str::contains("note not found"));
}

#[test]
fn notes_need_a_customer_of_the_owner() {
    let (dir, data) = workspace();
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "add", "c-4", "Not mine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("customer not found: c-4"));
    bizflow(dir.path(), &data)
        .args(["--owner", "owner-1", "notes", "add", "c-1", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("note must not be blank"));
    assert_eq!(fs::read_to_string(&data).unwrap(), FIXTURE);
}
