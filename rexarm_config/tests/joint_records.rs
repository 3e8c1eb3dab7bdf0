use std::io::Write;

use rexarm_config::load_joint_records;
use tempfile::NamedTempFile;

#[test]
fn reads_rows_with_spaces() {
    let mut f = NamedTempFile::new().unwrap();
    writeln!(f, "0.1, -0.2, 0.3").unwrap();
    writeln!(f, "0,0,1.5").unwrap();
    let rows = load_joint_records(f.path()).unwrap();
    assert_eq!(rows, vec![vec![0.1, -0.2, 0.3], vec![0.0, 0.0, 1.5]]);
}

#[test]
fn empty_file_has_no_rows() {
    let f = NamedTempFile::new().unwrap();
    assert!(load_joint_records(f.path()).unwrap().is_empty());
}

#[test]
fn ragged_rows_are_rejected() {
    let mut f = NamedTempFile::new().unwrap();
    writeln!(f, "0.1,0.2").unwrap();
    writeln!(f, "0.1").unwrap();
    let err = load_joint_records(f.path()).unwrap_err();
    assert!(format!("{err}").contains("row 2"), "{err}");
}

#[test]
fn missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("nope.csv");
    let err = load_joint_records(&p).unwrap_err();
    assert!(format!("{err}").contains("nope.csv"));
}
