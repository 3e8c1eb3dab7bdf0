#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::prelude::*;
use std::process::Command;

/// Two planar joints with 10 cm links, no gripper, fast loops.
pub fn write_planar_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let record = dir.path().join("joints.csv");
    let toml = format!(
        r#"
[arm]
limits_deg = [[-90.0, 90.0], [-90.0, 90.0]]
pause_poll_ms = 5

[gripper]
enabled = false

[[kinematics.links]]
a = 10.0
alpha_deg = 0.0
d = 0.0

[[kinematics.links]]
a = 10.0
alpha_deg = 0.0
d = 0.0

[loops]
acquisition_ms = 10
control_ms = 10
status_ms = 10
pointer_ms = 10

[hardware]
sim_warmup_frames = 0

[record]
path = '{}'

{extra}
"#,
        record.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

pub fn record_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("joints.csv")
}

pub fn rexarm(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("rexarm").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    cmd
}
