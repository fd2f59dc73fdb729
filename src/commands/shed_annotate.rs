use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::commands::{CommandReport, index_location};
use crate::shed::config::load_config;
use crate::shed::patch::{apply_annotations, load_patch_file};

#[derive(Debug, Clone)]
pub struct ShedAnnotateOptions {
    pub shed: Option<PathBuf>,
    pub index: Option<PathBuf>,
    pub patch: PathBuf,
    pub replace: bool,
}

pub fn run(opts: &ShedAnnotateOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let location = index_location(opts.index.as_deref(), opts.shed.as_deref())?;
    let mut report = CommandReport::new("annotate");

    let patch = load_patch_file(&opts.patch)?;
    let outcome = apply_annotations(
        &location,
        &patch,
        !opts.replace,
        Duration::from_millis(cfg.export.lock_timeout_ms),
    )?;

    report.detail(format!("index={}", outcome.index_path.display()));
    report.detail(format!("mode={}", if opts.replace { "replace" } else { "merge" }));
    report.detail(format!("holes_reset={}", outcome.holes_reset));
    report.detail(format!("holes_touched={}", outcome.holes_touched));
    report.detail(format!("records_written={}", outcome.records_written));
    report.detail(format!("sha256={}", outcome.content_hash));
    Ok(report)
}
