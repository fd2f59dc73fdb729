use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, open_shed};
use crate::shed::config::load_config;
use crate::shed::discovery::discover;

pub fn run(shed: Option<&Path>) -> Result<CommandReport> {
    let cfg = load_config()?;
    let archive = open_shed(shed)?;
    let mut report = CommandReport::new("discover");

    let found = discover(&archive, &cfg.index)?;
    report.detail(format!("sensors={}", found.sensors.len()));
    report.detail(format!("results={}", found.results.len()));
    for (result, legend) in &found.results {
        if legend.is_empty() {
            report.detail(format!("no legend for result {result}"));
        }
    }
    report.payload(serde_json::to_value(&found)?);
    Ok(report)
}
