use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const GENESIS_JSON: &str = r#"[{
    "label": "Block #0",
    "height": 0,
    "version": 1,
    "prev_block": "0000000000000000000000000000000000000000000000000000000000000000",
    "merkle_root": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
    "timestamp": 1231006505,
    "bits": 486604799
}]"#;

fn chainlab() -> Command {
    Command::cargo_bin("chainlab").expect("binary should build")
}

#[test]
fn chain_demo_shows_an_intact_chain_and_quits() {
    chainlab()
        .args(["chain", "--blocks", "3", "--difficulty", "1"])
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Chain intact."))
        .stdout(predicate::str::contains("Bye!"));
}

#[test]
fn chain_demo_quits_when_stdin_closes() {
    chainlab()
        .args(["chain", "--blocks", "2", "--difficulty", "1"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bye!"));
}

#[test]
fn cancelled_repair_leaves_the_chain_broken() {
    chainlab()
        .args(["chain", "--blocks", "4", "--difficulty", "1", "--fix-seconds", "5"])
        .write_stdin("t\n9\n0\n\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Enter a number from 0 to 2."))
        .stdout(predicate::str::contains("*tampered*"))
        .stdout(predicate::str::contains("Repair stopped at block 0 (cancelled)."))
        .stdout(predicate::str::contains("Chain broken from block"));
}

#[test]
fn fixed_block_waits_for_enter_before_redrawing() {
    // difficulty 0: the first typed nonce is a hit and relinking needs no search
    chainlab()
        .args(["chain", "--blocks", "3", "--difficulty", "0", "--fix-seconds", "5"])
        .write_stdin("t\n0\n\n5\n\n\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Block 0] You have 5s."))
        .stdout(predicate::str::contains("Block 0 fixed. Press ENTER to continue..."))
        .stdout(predicate::str::contains("Chain repaired up to the last block."))
        .stdout(predicate::str::contains("Bye!"));
}

#[test]
fn chain_demo_rejects_bad_arguments() {
    chainlab()
        .args(["chain", "--fix-seconds", "0"])
        .assert()
        .failure();
}

#[test]
fn miner_counts_typed_attempts() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("blocks.json");
    fs::write(&path, GENESIS_JSON)?;

    chainlab()
        .arg("mine")
        .arg("--headers")
        .arg(&path)
        .args(["--seconds", "1", "--difficulty", "8"])
        .write_stdin("\n1\n2\n3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Block #0"))
        .stdout(predicate::str::contains("Total attempts: 3"))
        .stdout(predicate::str::contains("Hits (hashes starting with 00000000): 0"));
    Ok(())
}

#[test]
fn miner_exits_with_2_when_headers_are_missing() {
    let dir = tempdir().unwrap();
    chainlab()
        .arg("mine")
        .arg("--headers")
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error loading"));
}

#[test]
fn miner_exits_with_2_on_invalid_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blocks.json");
    fs::write(&path, GENESIS_JSON.replace("\"version\": 1,", "\"version\": -1,")).unwrap();
    chainlab()
        .arg("mine")
        .arg("--headers")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("item 0"));
}

#[test]
fn miner_requires_a_positive_difficulty() {
    chainlab()
        .args(["mine", "--difficulty", "0"])
        .assert()
        .failure();
}
