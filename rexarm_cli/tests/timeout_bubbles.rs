mod common;

use assert_cmd::prelude::*;
use common::{rexarm, write_planar_config};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn joint_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = write_planar_config(&dir, "");
    rexarm(&cfg)
        .env("REXARM_TEST_SIM_TIMEOUT", "10")
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: Joint 0 timed out during enable_torque",
        ));
}

#[test]
fn retries_absorb_a_single_timeout() {
    let dir = tempdir().unwrap();
    let cfg = write_planar_config(&dir, "");
    rexarm(&cfg)
        .env("REXARM_TEST_SIM_TIMEOUT", "1")
        .arg("self-check")
        .assert()
        .success();
}

#[test]
fn timeout_json_names_joint_and_op() {
    let dir = tempdir().unwrap();
    let cfg = write_planar_config(&dir, "");
    let out = rexarm(&cfg)
        .env("REXARM_TEST_SIM_TIMEOUT", "10")
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["reason"], "ActuatorTimeout");
    assert_eq!(v["details"]["joint"], "0");
    assert_eq!(v["details"]["op"], "enable_torque");
}
