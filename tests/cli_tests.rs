//! End-to-end tests for the `burn` binary.

mod common;

use assert_cmd::Command;
use burn_tools::cli::commands::EXIT_NO_ATTACHED_CONTAINER;
use common::*;
use predicates::prelude::*;
use std::fs;

fn burn() -> Command {
    Command::cargo_bin("burn").unwrap()
}

#[test]
fn test_detach_then_reattach_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = standard_bundle(dir.path());
    let engine = dir.path().join("engine.exe");
    let out = dir.path().join("final.exe");

    burn()
        .arg("detach")
        .arg(&bundle.path)
        .arg("--engine")
        .arg(&engine)
        .assert()
        .success()
        .stdout(predicate::str::contains("Detached engine"));
    assert_eq!(fs::metadata(&engine).unwrap().len(), bundle.engine_size());

    apply_fake_signature(&engine);

    burn()
        .arg("reattach")
        .arg(&bundle.path)
        .arg("--engine")
        .arg(&engine)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert_eq!(
        fs::metadata(&out).unwrap().len(),
        bundle.engine_size() + bundle.attached.len() as u64
    );
}

#[test]
fn test_reattach_without_attached_exits_with_marker_code() {
    let dir = tempfile::tempdir().unwrap();
    let ux = zip_bytes(&[("manifest.xml", b"<BootstrapperApplicationData/>" as &[u8])]);
    let bundle = write_bundle(dir.path(), "noattached.exe", &ux, None);
    let engine = dir.path().join("engine.exe");
    let out = dir.path().join("final.exe");

    burn()
        .arg("detach")
        .arg(&bundle.path)
        .arg("--engine")
        .arg(&engine)
        .assert()
        .success();

    // The OS truncates exit statuses to the low byte on Unix.
    #[cfg(unix)]
    let expected = EXIT_NO_ATTACHED_CONTAINER & 0xFF;
    #[cfg(not(unix))]
    let expected = EXIT_NO_ATTACHED_CONTAINER;

    burn()
        .arg("reattach")
        .arg(&bundle.path)
        .arg("--engine")
        .arg(&engine)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(expected);
    assert!(out.exists());
}

#[test]
fn test_extract_writes_ux_into_ba_subfolder() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = standard_bundle(dir.path());
    let out = dir.path().join("extracted");

    // Attached bytes in the standard fixture are not a valid archive; the
    // command must warn about them but still succeed.
    burn()
        .arg("extract")
        .arg(&bundle.path)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted UX container"));
    assert!(out.join("BA").join("manifest.xml").exists());
}

#[test]
fn test_rejects_non_bundle_input() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_bundle = dir.path().join("notes.txt");
    fs::write(&not_a_bundle, b"just some text").unwrap();

    burn()
        .arg("detach")
        .arg(&not_a_bundle)
        .arg("--engine")
        .arg(dir.path().join("engine.exe"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed"));
}

#[test]
fn test_remote_payload_writes_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let payload = dir.path().join("payload.bin");
    fs::write(&payload, b"payload bytes").unwrap();
    let report = dir.path().join("report.json");

    burn()
        .arg("remote-payload")
        .arg(&payload)
        .arg("--out")
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "payload.bin");
    assert_eq!(records[0]["size"], 13);
    assert!(records[0]["hash"].is_string());
}

#[test]
fn test_remote_payload_requires_at_least_one_file() {
    burn().arg("remote-payload").assert().code(1);
}

#[test]
fn test_remote_payload_fails_when_no_file_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    burn()
        .arg("remote-payload")
        .arg(dir.path().join("missing.dll"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No file could be harvested"));
}
