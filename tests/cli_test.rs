mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use command_handler::domain::iban::open_iban;
use common::{commands_csv, count, create_row, events, transfer_row};
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = (open_iban(1), open_iban(2));
    let csv = commands_csv(&[
        create_row(&a, "MANUAL"),
        create_row(&b, "AUTO"),
        transfer_row(Uuid::new_v4(), "cash", &a, 10_000),
        transfer_row(Uuid::new_v4(), &a, &b, 2_500),
        transfer_row(Uuid::new_v4(), &a, &b, 999_999),
    ]);
    let dir = tempfile::tempdir()?;
    let balances = dir.path().join("balances.csv");

    let output = Command::new(cargo_bin!("command-handler"))
        .arg(csv.path())
        .arg("--workers")
        .arg("1")
        .arg("--balances")
        .arg(&balances)
        .output()?;
    assert!(output.status.success());

    let events = events(&output.stdout);
    assert_eq!(count(&events, "acfa"), 2);
    assert_eq!(count(&events, "mtco"), 2);
    assert_eq!(count(&events, "bach"), 3);
    assert_eq!(count(&events, "mtfa"), 1);

    let failure = events.iter().find(|e| e["channel"] == "mtfa").unwrap();
    assert_eq!(failure["value"]["reason"], "insufficient funds");
    let bach = events.iter().find(|e| e["key"] == b.as_str()).unwrap();
    assert_eq!(bach["value"]["changed_by"], 2_500);
    assert_eq!(bach["value"]["from_to"], a.as_str());

    let snapshot = std::fs::read_to_string(&balances)?;
    let lines: Vec<&str> = snapshot.lines().collect();
    assert_eq!(
        lines,
        vec![
            "balance_id,iban,type,amount,lmt".to_string(),
            format!("1,{},MANUAL,75.00,2", a),
            format!("2,{},AUTO,25.00,1", b),
        ]
    );

    Ok(())
}

#[test]
fn test_cli_replays_duplicate_commands() {
    let a = open_iban(3);
    let id = Uuid::new_v4();
    let csv = commands_csv(&[
        create_row(&a, "AUTO"),
        transfer_row(id, "cash", &a, 500),
        transfer_row(id, "cash", &a, 500),
    ]);

    let output = Command::new(cargo_bin!("command-handler"))
        .arg(csv.path())
        .args(["--workers", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let events = events(&output.stdout);
    assert_eq!(count(&events, "mtco"), 2);
    let bach: Vec<_> = events.iter().filter(|e| e["channel"] == "bach").collect();
    assert_eq!(bach.len(), 2);
    assert_eq!(bach[0], bach[1]);
    assert_eq!(bach[1]["value"]["new_balance"], 500);
    let keys: Vec<&str> = events
        .iter()
        .filter(|e| e["channel"] == "mtco")
        .filter_map(|e| e["key"].as_str())
        .collect();
    assert_eq!(keys, vec![id.to_string(), id.to_string()]);
}

#[test]
fn test_malformed_rows_are_reported_and_skipped() {
    let a = open_iban(4);
    let csv = commands_csv(&[
        create_row(&a, "AUTO"),
        "bogus,not-a-uuid,,,,,,,".to_string(),
        format!("cmt,{},,,,,cash,{},no amount", Uuid::new_v4(), a),
        format!("acfa,{},AUTO,,,,,,", Uuid::new_v4()),
        transfer_row(Uuid::new_v4(), "cash", &a, 300),
    ]);

    let mut cmd = Command::new(cargo_bin!("command-handler"));
    cmd.arg(csv.path()).args(["--workers", "1"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("\"new_balance\":300"));
}

#[test]
fn test_cli_json_logs_stay_off_stdout() {
    let csv = commands_csv(&[format!("cac,{},AUTO,,,,,,", Uuid::new_v4())]);

    let output = Command::new(cargo_bin!("command-handler"))
        .arg(csv.path())
        .args(["--log-format", "json"])
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();
    assert!(output.status.success());

    let events = events(&output.stdout);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["channel"], "acfa");
    assert_eq!(events[0]["value"]["a_type"], "AUTO");
    assert!(String::from_utf8_lossy(&output.stderr).contains("\"level\""));
}

#[test]
fn test_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("command-handler"));
    cmd.arg("does/not/exist.csv");
    cmd.assert().failure();
}
