use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CSV: &str = "KOD;NAZWA BADANIA;KWOTA\nA1;Test A;5,00\nB001;Morfologia;25,00\nMORF2;Inne badanie;10,00\nB030;Konsultacja;\n";

fn catalog_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("badania.csv"), CSV).unwrap();
    dir
}

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("exam-catalog").unwrap();
    cmd.env_remove("EXAM_CATALOG_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--catalog-dir")
        .arg(dir.path());
    cmd
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn quote_json_merges_codes_and_reports_unknown() {
    let dir = catalog_dir();
    let output = cmd(&dir)
        .args(["quote", "A1", " a1", "ZZZ", "B030", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let quote = stdout_json(&output);

    let lines = quote["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["code"], "A1");
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(lines[0]["line_total"], 10.0);
    assert_eq!(lines[1]["code"], "B030");
    assert_eq!(lines[1]["amount"], Value::Null);
    assert_eq!(quote["unknown_codes"], serde_json::json!(["ZZZ"]));
    assert_eq!(quote["total"], 10.0);
}

#[test]
fn quote_text_prints_total_and_warns() {
    let dir = catalog_dir();
    cmd(&dir)
        .args(["quote", "B001", "A1", "nope"])
        .assert()
        .success()
        .stdout(contains("Morfologia"))
        .stdout(contains("30,00 zł"))
        .stderr(contains("Unknown code: nope"));
}

#[test]
fn list_query_json_filters_by_name_or_code() {
    let dir = catalog_dir();
    let output = cmd(&dir)
        .args(["list", "--query", "morf", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries = stdout_json(&output);

    let codes: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["MORF2", "B001"]);
    assert_eq!(entries[1]["amount"], 25.0);
}

#[test]
fn list_without_query_prints_everything() {
    let dir = catalog_dir();
    cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("4 of 4 entries"))
        .stdout(contains("Konsultacja"));
}

#[test]
fn missing_catalog_fails() {
    let dir = catalog_dir();
    cmd(&dir)
        .args(["--name", "absent", "list"])
        .assert()
        .failure()
        .stderr(contains("Failed to load catalog"));
}
