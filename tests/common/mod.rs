#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};

pub fn write_png(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().expect("png parent")).expect("mkdir png parent");
    image::RgbImage::new(width, height)
        .save(path)
        .expect("write png");
}

pub fn write_text(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir parent");
    fs::write(path, text).expect("write file");
}

/// `eldorado.shed` with two holes, one annotated, and a clay result with its legend.
pub fn write_shed(parent: &Path) -> PathBuf {
    let root = parent.join("eldorado.shed");
    write_text(
        &root.join("H01/hole.hdr"),
        "ENVI\nnote_Notes_0_100 = Top,Fresh core\n",
    );
    write_text(&root.join("H01/b001/box.hdr"), "start = 0\nend = 1.234\n");
    write_text(
        &root.join("H01/b001/FENIX.hdr"),
        "ENVI\nwavelength = {450.4,\n 1000.6,\n 2500.2}\n",
    );
    write_png(&root.join("H01/b001/FENIX.png"), 40, 120);
    write_png(&root.join("H01/b001/results/BR_Clays.png"), 40, 120);
    write_png(&root.join("H01/b001/results/LEG_Clays.png"), 10, 30);
    write_text(&root.join("H02/hole.hdr"), "");
    write_text(&root.join("H02/b010/box.hdr"), "start = 11\nend = 10\n");
    write_text(&root.join("H02/b010/FENIX.hdr"), "wavelength = {450.4, 1000.6}\n");
    root
}

/// The binary with config and dotenv lookups pinned inside `tmp`.
pub fn hyshed(tmp: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("hyshed");
    cmd.current_dir(tmp)
        .env("HYSHED_CONFIG_PATH", tmp.join("no-config.toml"))
        .env("HYSHED_HOME", tmp.join("home"))
        .env_remove("HYSHED_SHED_DIR")
        .env_remove("HYSHED_SITE_DIR")
        .env_remove("HYSHED_LEGEND_PREFIX")
        .env_remove("HYSHED_CROP_TO_MASK")
        .env_remove("HYSHED_EXPORT_COMPRESS");
    cmd
}

pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
