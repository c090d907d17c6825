//! End-to-end tests for the hubctl binary (offline only).

use std::io::Write;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::NamedTempFile;

const DEFINITIONS: &str = r#"
default_category: testing
topics:
  testing:
    Test:
      Created:
        type: object
        required: [id, url]
    TestEntity:
      Create:
        type: object
"#;

fn topics_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DEFINITIONS.as_bytes()).unwrap();
    file
}

fn hubctl(topics: &NamedTempFile, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hubctl"))
        .args(args)
        .env("HUB_TOPICS_FILE", topics.path())
        .env_remove("HUB_API_URL")
        .env_remove("HUB_BULK_URL")
        .env_remove("HUB_DEFAULT_CATEGORY")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

#[test]
fn test_topics_json() {
    let topics = topics_file();
    let output = hubctl(&topics, &["topics", "--format", "json"]);
    assert!(output.status.success(), "{output:?}");

    let rows: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["testing.TestCreated", "testing.TestEntityCreate"]);
    assert_eq!(rows[1]["shorthand"], "create_test_entity");
}

#[test]
fn test_validate_reports_missing_property() {
    let topics = topics_file();
    let output = hubctl(
        &topics,
        &[
            "validate",
            "--entity",
            "Test",
            "--action",
            "Created",
            "--data",
            r#"{"bad": "payload"}"#,
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"id\" is a required property"), "{stderr}");
}

#[test]
fn test_offline_replay_flushes() {
    let topics = topics_file();
    let mut requests = NamedTempFile::new().unwrap();
    let body: Vec<Value> = (0..8)
        .map(|n| {
            serde_json::json!({
                "action": "Created",
                "entity": "Test",
                "data": {"id": format!("id-{n}"), "url": format!("https://somewhere.com/{n}")}
            })
        })
        .collect();
    requests
        .write_all(serde_json::to_string(&body).unwrap().as_bytes())
        .unwrap();

    let path = requests.path().to_str().unwrap();
    let output = hubctl(&topics, &["replay", path, "--format", "json"]);
    assert!(output.status.success(), "{output:?}");

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["events"], 8);
    assert_eq!(summary["outcome"], "flushed in bulk");
}
