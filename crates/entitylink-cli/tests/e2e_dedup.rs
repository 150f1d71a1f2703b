//! End-to-end tests driving the `entitylink` binary over temp files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

const CONFIG: &str = r#"
threshold = 0.9
maybe_threshold = 0.7

[[properties]]
name = "ssn"
role = "identity"
comparator = { kind = "exact_match" }

[[properties]]
name = "name"
role = "lookup"
lookup_behaviour = "required"
comparator = { kind = "weighted_levenshtein" }
high_probability = 0.95
low_probability = 0.1
"#;

fn write(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn dedup_reports_a_match_for_near_identical_records() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "config.toml", CONFIG);
    let records = write(
        dir.path(),
        "records.jsonl",
        concat!(
            r#"{"id":"r1","fields":{"ssn":"111-11-1111","name":["John Smith"]}}"#,
            "\n",
            r#"{"id":"r2","fields":{"ssn":"111-11-1111","name":["Jon Smith"]}}"#,
            "\n",
        ),
    );

    Command::cargo_bin("entitylink")
        .unwrap()
        .env("ENTITYLINK_LOG", "error")
        .args(["--config", config.to_str().unwrap(), "dedup", records.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verdict\":\"match\""));
}

#[test]
fn dedup_reports_no_match_for_an_unrelated_singleton() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "config.toml", CONFIG);
    let records = write(
        dir.path(),
        "records.jsonl",
        concat!(r#"{"id":"r1","fields":{"ssn":"111-11-1111","name":["John Smith"]}}"#, "\n"),
    );

    Command::cargo_bin("entitylink")
        .unwrap()
        .env("ENTITYLINK_LOG", "error")
        .args(["--config", config.to_str().unwrap(), "dedup", records.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verdict\":\"no_match\""));
}

#[test]
fn link_matches_a_probe_against_an_indexed_reference_corpus() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "config.toml", CONFIG);
    let reference = write(
        dir.path(),
        "reference.jsonl",
        concat!(r#"{"id":"ref1","fields":{"ssn":"222-22-2222","name":["Alice Jones"]}}"#, "\n"),
    );
    let probes = write(
        dir.path(),
        "probes.jsonl",
        concat!(r#"{"id":"p1","fields":{"ssn":"222-22-2222","name":["Alice Jonas"]}}"#, "\n"),
    );

    Command::cargo_bin("entitylink")
        .unwrap()
        .env("ENTITYLINK_LOG", "error")
        .args([
            "--config",
            config.to_str().unwrap(),
            "link",
            reference.to_str().unwrap(),
            probes.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"a\":\"p1\""));
}

#[test]
fn dedup_via_sqlite_backend_surfaces_both_docs_sharing_a_lookup_value() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "config.toml",
        &format!("{CONFIG}\npath = \"{}\"\n", dir.path().join("index.db").display()),
    );
    let classes = dir.path().join("classes.db");
    let records = write(
        dir.path(),
        "records.jsonl",
        concat!(
            r#"{"id":"d1","fields":{"ssn":"111-11-1111","name":["John Smith"]}}"#,
            "\n",
            r#"{"id":"d2","fields":{"ssn":"222-22-2222","name":["John Smith"]}}"#,
            "\n",
        ),
    );

    // Both docs share an identical "name" value but have distinct identity
    // (ssn), so the durable index's exact-match lookup path must surface
    // both as candidates rather than only the first one it finds.
    Command::cargo_bin("entitylink")
        .unwrap()
        .env("ENTITYLINK_LOG", "error")
        .args([
            "--config",
            config.to_str().unwrap(),
            "--classes",
            classes.to_str().unwrap(),
            "dedup",
            records.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"a\":\"d1\"")
                .and(predicate::str::contains("\"a\":\"d2\""))
                .and(predicate::str::contains("\"verdict\":\"match\"")),
        );
}

#[test]
fn rejects_a_record_missing_its_id_field() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "config.toml", CONFIG);
    let records = write(dir.path(), "records.jsonl", concat!(r#"{"fields":{"name":["Jane Doe"]}}"#, "\n"));

    Command::cargo_bin("entitylink")
        .unwrap()
        .env("ENTITYLINK_LOG", "error")
        .args(["--config", config.to_str().unwrap(), "dedup", records.to_str().unwrap()])
        .assert()
        .failure();
}
