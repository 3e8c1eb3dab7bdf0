mod common;

use common::{rexarm, write_planar_config};
use tempfile::tempdir;

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

#[test]
fn run_emits_readouts_then_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_planar_config(&dir, "");
    let out = rexarm(&cfg)
        .args(["--json", "run", "--duration-s", "0.4", "--print-ms", "50", "--cursor", "300,100"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines = json_lines(&out.stdout);
    let (summary, readouts) = lines.split_last().expect("at least a summary line");
    assert_eq!(summary["event"], "summary");
    assert_eq!(summary["state"], "idle");
    assert_eq!(summary["estopped"], false);
    assert!(summary["ticks"]["rexarm-control"].as_u64().unwrap() > 0);

    assert!(!readouts.is_empty());
    for r in readouts {
        assert!(r["state"].is_string());
        assert_eq!(r["joints_deg"].as_array().unwrap().len(), 2);
        assert!(r["pointer_pixel"].is_string());
    }
}

#[test]
fn pose_json_has_all_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_planar_config(&dir, "");
    let out = rexarm(&cfg).args(["--json", "pose", "--deg", "0,0"]).output().unwrap();
    assert!(out.status.success());
    let v = &json_lines(&out.stdout)[0];
    assert!((v["x"].as_f64().unwrap() - 20.0).abs() < 1e-9);
    for key in ["y", "z", "roll", "pitch", "yaw"] {
        assert!(v[key].as_f64().unwrap().abs() < 1e-9, "{key} = {}", v[key]);
    }
}
