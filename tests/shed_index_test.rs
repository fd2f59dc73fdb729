mod common;

use common::{hyshed, stdout_json, write_shed, write_text};
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn index_json_normalizes_depths_and_fills_missing_previews() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .arg("index")
        .output()
        .expect("run index");
    assert!(output.status.success());
    let index = stdout_json(&output);

    assert_eq!(index["sensors"]["FENIX"], serde_json::json!([450.0, 1001.0, 2500.0]));
    assert_eq!(index["H02"]["b010"]["start"], 10.0);
    assert_eq!(index["H02"]["b010"]["end"], 11.0);
    assert_eq!(
        index["H02"]["b010"]["sensors"]["FENIX"],
        serde_json::json!({"dims": [0, 0], "leg": ""})
    );
    let note = &index["H01"]["annotations"]["Notes"]["note_Notes_0_100"];
    assert_eq!(note["name"], "Top");
    assert_eq!(note["value"], "Fresh core");
    assert_eq!(note["end"], 1.0);
    assert!(index["about"].as_str().is_some_and(|s| !s.is_empty()));
    assert!(shed.join("about.md").is_file());
}

#[test]
fn index_sensor_filter_limits_boxes_and_wavelengths() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["index", "--sensor", "SWIR"])
        .output()
        .expect("run index");
    assert!(output.status.success());
    let index = stdout_json(&output);
    assert_eq!(
        index["H01"]["b001"]["sensors"]["SWIR"],
        serde_json::json!({"dims": [0, 0], "leg": ""})
    );
    assert!(index["H01"]["b001"]["sensors"].get("FENIX").is_none());
    assert!(index["sensors"].get("SWIR").is_none());
}

#[test]
fn index_writes_site_then_decode_and_annotate_round_trip() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());
    let site = tmp.path().join("eldorado_html");

    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .arg("index")
        .arg("--out")
        .arg(&site)
        .assert()
        .success()
        .stdout(predicate::str::contains("written="));
    let blob = fs::read_to_string(site.join("map/index.js")).expect("read blob");
    assert!(blob.starts_with("var b64=\""));

    let patch = tmp.path().join("patch.json");
    write_text(
        &patch,
        r#"{"H02":{"annotations":{"Notes":{"note_Notes_1000_1050":{"type":"note","name":"Hi","value":"There","start":10.0,"end":10.5}}}}}"#,
    );
    // site dir defaults to <parent>/<name>_html
    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["annotate", "--patch"])
        .arg(&patch)
        .assert()
        .success()
        .stdout(predicate::str::contains("records_written=1"));

    let output = hyshed(tmp.path())
        .args(["decode", "--index"])
        .arg(&site)
        .output()
        .expect("run decode");
    assert!(output.status.success());
    let index = stdout_json(&output);
    assert_eq!(index["H02"]["annotations"]["Notes"]["note_Notes_1000_1050"]["name"], "Hi");
    assert_eq!(index["H01"]["annotations"]["Notes"]["note_Notes_0_100"]["name"], "Top");
    assert_eq!(index["H02"]["boxes"], serde_json::json!(["b010"]));

    write_text(&patch, "{}");
    hyshed(tmp.path())
        .args(["annotate", "--replace", "--index"])
        .arg(&site)
        .arg("--patch")
        .arg(&patch)
        .assert()
        .success()
        .stdout(predicate::str::contains("holes_reset=2"));
    let output = hyshed(tmp.path())
        .args(["decode", "--index"])
        .arg(site.join("map/index.js"))
        .output()
        .expect("run decode");
    let index = stdout_json(&output);
    assert!(index["H01"].get("annotations").is_none());
    assert!(index["H02"].get("annotations").is_none());
}

#[test]
fn plain_js_format_is_decodable() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());
    let out = tmp.path().join("plain.js");

    hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .args(["index", "--format", "js", "--out"])
        .arg(&out)
        .assert()
        .success();
    let text = fs::read_to_string(&out).expect("read");
    assert!(text.starts_with("var data = {"));

    let output = hyshed(tmp.path())
        .args(["decode", "--index"])
        .arg(&out)
        .output()
        .expect("run decode");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["name"], "eldorado");
}

#[test]
fn annotate_failures_carry_distinct_codes() {
    let tmp = tempdir().expect("tempdir");
    let site = tmp.path().join("site");
    let patch = tmp.path().join("patch.json");
    write_text(&patch, "{}");

    hyshed(tmp.path())
        .args(["annotate", "--index"])
        .arg(&site)
        .arg("--patch")
        .arg(&patch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E002_INDEX_MISSING"));

    write_text(&site.join("map/index.js"), "var b64=\"Zm9v\";");
    hyshed(tmp.path())
        .args(["decode", "--index"])
        .arg(&site)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E003_CORRUPT_INDEX"));

    write_text(&site.join("map/index.js"), "var data = {\"name\":\"x\"};");
    write_text(&patch, "[1, 2, 3]");
    hyshed(tmp.path())
        .args(["annotate", "--index"])
        .arg(&site)
        .arg("--patch")
        .arg(&patch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E004_INVALID_PATCH"));
    let untouched = fs::read_to_string(site.join("map/index.js")).expect("read");
    assert_eq!(untouched, "var data = {\"name\":\"x\"};");
}

#[test]
fn discover_lists_sensors_and_legends() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .arg("discover")
        .output()
        .expect("run discover");
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"sensors": ["FENIX"], "results": {"BR_Clays": "LEG_Clays"}})
    );
}

#[test]
fn status_reports_paths_as_json() {
    let tmp = tempdir().expect("tempdir");
    let shed = write_shed(tmp.path());

    let output = hyshed(tmp.path())
        .arg("--shed")
        .arg(&shed)
        .env("HYSHED_LEGEND_PREFIX", "KEY")
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["command"], "status");
    assert_eq!(report["ok"], true);
    let details = report["details"].as_array().expect("details");
    let has = |want: &dyn Fn(&str) -> bool| details.iter().any(|d| d.as_str().is_some_and(want));
    assert!(has(&|s| s.starts_with("site_dir=") && s.ends_with("eldorado_html")));
    assert!(has(&|s| s == "legend_prefix=KEY"));
    assert!(has(&|s| s == "env_override=HYSHED_LEGEND_PREFIX (shed/config.rs)"));
    assert!(!has(&|s| s.contains("HYSHED_ENV_ALLOWLIST")));
}

#[test]
fn status_without_shed_dir_fails() {
    let tmp = tempdir().expect("tempdir");
    hyshed(tmp.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("HYSHED_SHED_DIR"));
}
