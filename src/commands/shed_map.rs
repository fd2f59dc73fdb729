use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_shed};
use crate::shed::builder::{self, BuildOptions};
use crate::shed::config::load_config;

#[derive(Debug, Clone, Default)]
pub struct ShedMapOptions {
    pub shed: Option<PathBuf>,
    pub hole: Option<String>,
    pub box_name: Option<String>,
}

pub fn run(opts: &ShedMapOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let archive = open_shed(opts.shed.as_deref())?;
    let mut report = CommandReport::new("map");
    report.detail(format!("shed={}", archive.root().display()));

    let payload = match (&opts.hole, &opts.box_name) {
        (None, _) => serde_json::to_value(builder::summary(&archive)?)?,
        (Some(hole), None) => {
            report.detail(format!("hole={hole}"));
            serde_json::to_value(builder::hole_boxes(&archive, hole)?)?
        }
        (Some(hole), Some(box_name)) => {
            report.detail(format!("box={hole}/{box_name}"));
            let opts = BuildOptions::new(&cfg.index);
            serde_json::to_value(builder::box_contents(&archive, hole, box_name, &opts)?)?
        }
    };
    report.payload(payload);
    Ok(report)
}
