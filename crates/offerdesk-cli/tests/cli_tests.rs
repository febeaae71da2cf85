use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const COUNT_JULY_PLAN: &str = r#"{"kind":"count","timeRange":{"year":2025,"month":7}}"#;

const OFFERS: &str = r#"[
  {"studentName": "Asha Rao", "companyName": "Acme", "location": "Pune", "packageLPA": 6.5, "offerDate": "2025-06-30T18:30:00Z", "totalPostPlacementFee": 50000},
  {"studentName": "Ravi Kumar", "companyName": "Acme", "location": "Bengaluru", "packageLPA": 9.5, "offerDate": "2025-07-15T05:00:00Z"},
  {"studentName": "Meena Iyer", "companyName": "Globex", "location": "Pune", "packageLPA": 4, "offerDate": "2025-07-31T18:30:00Z"}
]"#;

/// Helper function to create a Command with --no-color and no model key
fn offerdesk_cmd(db_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("offerdesk").expect("Failed to find offerdesk binary");
    cmd.env_remove("GEMINI_API_KEY")
        .arg("--no-color")
        .arg("--database-file")
        .arg(db_path);
    cmd
}

/// Temporary database seeded with three offers
fn seeded_environment() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("cli_test.db");
    let offers_path = temp_dir.path().join("offers.json");
    std::fs::write(&offers_path, OFFERS).expect("Failed to write offers");

    offerdesk_cmd(&db_path)
        .arg("import")
        .arg(&offers_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 3 offer(s): 3 new, 0 updated."));
    (temp_dir, db_path)
}

#[test]
fn test_cli_reimport_updates() {
    let (temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .arg("import")
        .arg(temp_dir.path().join("offers.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0 new, 3 updated."));
}

#[test]
fn test_cli_month_report() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args(["month", "--year", "2025", "--month", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# July 2025"))
        .stdout(predicate::str::contains("**Offers**: 2"))
        .stdout(predicate::str::contains("Asha Rao"))
        .stdout(predicate::str::contains("Meena Iyer").not());
}

#[test]
fn test_cli_month_out_of_range() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args(["month", "--year", "2025", "--month", "13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Month must be between 1 and 12"));
}

#[test]
fn test_cli_year_report_json() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args(["year", "--year", "2025", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""month": 7"#))
        .stdout(predicate::str::contains(r#""month": 8"#));
}

#[test]
fn test_cli_ask_with_stored_plan() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args([
            "ask",
            "How many students got placed in July 2025?",
            "--plan",
            COUNT_JULY_PLAN,
        ])
        .assert()
        .success()
        .stdout(predicate::eq("2\n"));
}

#[test]
fn test_cli_ask_json_debug() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args([
            "ask",
            "How many students got placed in July 2025?",
            "--plan",
            COUNT_JULY_PLAN,
            "--json",
            "--debug",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ok": true"#))
        .stdout(predicate::str::contains(r#""type": "text""#))
        .stdout(predicate::str::contains(r#""_debug""#))
        .stdout(predicate::str::contains(r#""match""#));
}

#[test]
fn test_cli_ask_without_model() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args(["ask", "How many placements?", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""ok": false"#))
        .stdout(predicate::str::contains("no model configured"));
}

#[test]
fn test_cli_ask_invalid_plan_shows_raw() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args(["ask", "How many placements?", "--plan", "not a plan"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("**Error (400)**: Plan JSON invalid"))
        .stdout(predicate::str::contains("not a plan"));
}

#[test]
fn test_cli_chat_with_stored_plan() {
    let (_temp_dir, db_path) = seeded_environment();

    offerdesk_cmd(&db_path)
        .args([
            "chat",
            "How many students got placed in July 2025?",
            "--plan",
            r#"{"intent":"COUNT_PLACEMENTS"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Students placed in July 2025: 2."));
}

#[test]
fn test_cli_explain_ranking_override() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("cli_test.db");

    offerdesk_cmd(&db_path)
        .args([
            "explain",
            "--plan",
            r#"{"kind":"count"}"#,
            "--message",
            "Which month had the most placements?",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""rankingOverride": true"#))
        .stdout(predicate::str::contains(r#""$dateTrunc""#));
}

#[test]
fn test_cli_explain_unknown_field() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("cli_test.db");

    offerdesk_cmd(&db_path)
        .args([
            "explain",
            "--plan",
            r#"{"kind":"aggregate","groupBy":["salary"],"metrics":[{"op":"count"}]}"#,
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unknown field 'salary' at groupBy[0]"));
}

#[test]
fn test_cli_pipeline_refuses_write_stage() {
    let (temp_dir, db_path) = seeded_environment();
    let pipeline_path = temp_dir.path().join("pipeline.json");
    std::fs::write(&pipeline_path, r#"[{"$match": {}}, {"$merge": "copy"}]"#).unwrap();

    offerdesk_cmd(&db_path)
        .arg("pipeline")
        .arg(&pipeline_path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Forbidden stage in pipeline: $merge"));
}

#[test]
fn test_cli_pipeline_runs() {
    let (temp_dir, db_path) = seeded_environment();
    let pipeline_path = temp_dir.path().join("pipeline.json");
    std::fs::write(
        &pipeline_path,
        r#"[{"$group": {"_id": "$companyName", "offers": {"$sum": 1}}}, {"$sort": {"offers": -1}}]"#,
    )
    .unwrap();

    offerdesk_cmd(&db_path)
        .arg("pipeline")
        .arg(&pipeline_path)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""_id": "Acme""#))
        .stdout(predicate::str::contains(r#""offers": 2"#));
}
