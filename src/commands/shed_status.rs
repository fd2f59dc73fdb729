use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::shed::config::{load_config, resolve_config_path};
use crate::shed::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/hyshed_env_allowlist.rs"));

pub fn run(shed: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    report.detail(format!("build_uuid={}", env!("BUILD_UUID")));

    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config={}", path.display())),
        Some(path) => report.detail(format!("config={} (absent, defaults)", path.display())),
        None => report.detail("config=<none>"),
    }
    match load_config() {
        Ok(cfg) => {
            report.detail(format!("legend_prefix={}", cfg.index.legend_prefix));
            report.detail(format!("crop_to_mask={}", cfg.index.crop_to_mask));
            report.detail(format!("about_author={}", cfg.index.about_author));
            report.detail(format!("export_compress={}", cfg.export.compress));
            report.detail(format!("lock_timeout_ms={}", cfg.export.lock_timeout_ms));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    report.detail(format!("env_keys={}", GENERATED_HYSHED_ENV_ALLOWLIST.len()));
    for (key, module) in GENERATED_HYSHED_ENV_ALLOWLIST {
        if std::env::var_os(key).is_some() {
            report.detail(format!("env_override={key} ({module})"));
        }
    }

    match resolve_paths(shed) {
        Ok(paths) => {
            report.detail(format!("shed_dir={}", paths.shed_dir.display()));
            report.detail(format!("site_dir={}", paths.site_dir.display()));
            report.detail(format!("index_file={}", paths.index_file.display()));
            if !paths.shed_dir.is_dir() {
                report.issue("missing shed dir");
            }
            if !paths.index_file.is_file() {
                report.detail("compiled index not written yet");
            }
        }
        Err(err) => report.issue(format!("{err:#}")),
    }

    Ok(report)
}
