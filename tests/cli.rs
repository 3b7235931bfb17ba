use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const SAMPLE: &str = r#"{
  "nodes": [
    {
      "id": "1",
      "position": { "x": 250.0, "y": 50.0 },
      "data": { "label": "Start", "description": "" }
    }
  ],
  "edges": []
}"#;

#[test]
fn normalizes_a_flow_document() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let input_path = tmp.path().join("in.json");
    let output_path = tmp.path().join("out.json");
    fs::write(&input_path, SAMPLE)?;

    let mut cmd = Command::cargo_bin("flowpad")?;
    cmd.arg("--input")
        .arg(&input_path)
        .arg("--output")
        .arg(&output_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let contents = fs::read_to_string(&output_path)?;
    assert!(contents.contains("\"nodes\""));
    assert!(contents.contains("\"Start\""));

    Ok(())
}

#[test]
fn arrange_rewrites_positions() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let input_path = tmp.path().join("in.json");
    fs::write(&input_path, SAMPLE)?;

    let mut cmd = Command::cargo_bin("flowpad")?;
    cmd.arg("--input")
        .arg(&input_path)
        .arg("--output")
        .arg("-")
        .arg("--arrange");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"x\": 100.0"));

    Ok(())
}

#[test]
fn rejects_a_document_missing_edges() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let input_path = tmp.path().join("in.json");
    fs::write(&input_path, r#"{"nodes": []}"#)?;

    let mut cmd = Command::cargo_bin("flowpad")?;
    cmd.arg("--input").arg(&input_path).arg("--output").arg("-");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid document"));

    Ok(())
}
