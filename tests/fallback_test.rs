mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::commands_csv;
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let csv = commands_csv(&[format!("cac,{},AUTO,,,,,,", Uuid::new_v4())]);

    let mut cmd = Command::new(cargo_bin!("command-handler"));
    cmd.arg(csv.path()).arg("--db-path").arg("some_db");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."))
        .stdout(predicate::str::contains("\"channel\":\"acfa\""));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let csv = commands_csv(&[format!("cac,{},AUTO,,,,,,", Uuid::new_v4())]);

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("command-handler"));
    cmd.arg(csv.path()).arg("--db-path").arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING:").not());
}
