//! Test vector tests for fxpid
//!
//! Runs the `test_harness` binary over every file in `spec/test-vectors`
//! so the vectors fail `cargo test` when the crate drifts from them.

#![cfg(feature = "std")]

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

fn vector_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../spec/test-vectors")
}

fn vector_files() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(vector_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn run_harness(files: &[PathBuf]) -> (bool, Vec<Value>) {
    let output = Command::new(env!("CARGO_BIN_EXE_test_harness"))
        .args(files)
        .output()
        .unwrap();
    let results: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    (output.status.success(), results)
}

#[test]
fn test_all_vectors_pass() {
    let files = vector_files();
    assert!(!files.is_empty(), "no vectors in {}", vector_dir().display());

    let (success, results) = run_harness(&files);

    let failures: Vec<&Value> = results
        .iter()
        .filter(|r| r["passed"] != Value::Bool(true))
        .collect();
    assert!(failures.is_empty(), "failing vectors: {:#?}", failures);
    assert!(success);
    assert_eq!(results.len(), 18);
}

#[test]
fn test_every_file_loads() {
    for file in vector_files() {
        let (success, results) = run_harness(std::slice::from_ref(&file));
        assert!(success, "{} failed", file.display());
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r["module"] != "harness"));
    }
}

#[test]
fn test_unreadable_file_fails_run() {
    let missing = vector_dir().join("absent.json");
    let (success, results) = run_harness(&[missing]);

    assert!(!success);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "absent");
    assert_eq!(results[0]["module"], "harness");
    assert_eq!(results[0]["passed"], false);
}
