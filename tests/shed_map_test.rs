mod common;

use common::{hyshed, stdout_json, write_shed};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn map_prints_archive_summary() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .arg("map")
        .output()
        .expect("run map");
    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["name"], "eldorado");
    assert_eq!(summary["holes"], serde_json::json!(["H01", "H02"]));
    assert_eq!(summary["H01"], serde_json::json!(["b001"]));
}

#[test]
fn map_reads_shed_dir_from_env() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .env("HYSHED_SHED_DIR", &shed)
        .args(["map", "--hole", "H02"])
        .output()
        .expect("run map");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!(["b010"]));
}

#[test]
fn map_box_reports_dims_and_legends() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["map", "--hole", "H01", "--box", "b001"])
        .output()
        .expect("run map");
    assert!(output.status.success());
    let bx = stdout_json(&output);
    assert_eq!(bx["start"], 0.0);
    assert_eq!(bx["end"], 1.23);
    assert_eq!(
        bx["sensors"]["FENIX"],
        serde_json::json!({"dims": [40, 120], "leg": ""})
    );
    assert_eq!(bx["results"]["BR_Clays"]["leg"], "LEG_Clays");
    assert!(bx["results"].get("LEG_Clays").is_none());
}

#[test]
fn unknown_hole_fails_with_not_found_code() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["map", "--hole", "H09"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001_NOT_FOUND"));

    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["map", "--hole", "H01", "--box", "b999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001_NOT_FOUND"));
}

#[test]
fn box_flag_requires_hole() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["map", "--box", "b001"])
        .assert()
        .failure();
}
