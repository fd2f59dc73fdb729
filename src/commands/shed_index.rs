use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::commands::{CommandReport, open_shed};
use crate::shed::builder::{self, BuildOptions};
use crate::shed::codec;
use crate::shed::config::load_config;
use crate::shed::patch::write_atomic;
use crate::shed::paths::resolve_index_location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexFormat {
    Json,
    Js,
    JsCompressed,
}

#[derive(Debug, Clone, Default)]
pub struct ShedIndexOptions {
    pub shed: Option<PathBuf>,
    pub sensors: Vec<String>,
    pub results: Vec<String>,
    pub crop: bool,
    pub format: Option<IndexFormat>,
    pub out: Option<PathBuf>,
}

/// `R` or `R=LEG`.
pub fn parse_result_filter(raw: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut out = BTreeMap::new();
    for entry in raw {
        let (name, legend) = match entry.split_once('=') {
            Some((name, legend)) => (name.trim(), legend.trim()),
            None => (entry.trim(), ""),
        };
        if name.is_empty() {
            return Err(anyhow!("invalid --result `{entry}`: missing result name"));
        }
        out.insert(name.to_string(), legend.to_string());
    }
    Ok(Some(out))
}

pub fn run(opts: &ShedIndexOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let archive = open_shed(opts.shed.as_deref())?;
    let mut report = CommandReport::new("index");

    let mut build_opts = BuildOptions::new(&cfg.index);
    build_opts.crop_to_mask |= opts.crop;
    if !opts.sensors.is_empty() {
        build_opts.sensors = Some(opts.sensors.iter().cloned().collect::<BTreeSet<_>>());
    }
    build_opts.results = parse_result_filter(&opts.results)?;

    let format = opts.format.unwrap_or(match (&opts.out, cfg.export.compress) {
        (None, _) => IndexFormat::Json,
        (Some(_), true) => IndexFormat::JsCompressed,
        (Some(_), false) => IndexFormat::Js,
    });

    let index = builder::build(&archive, &build_opts)?;
    let text = match format {
        IndexFormat::Json => codec::to_json(&index)?,
        IndexFormat::Js => codec::encode(&index, false)?,
        IndexFormat::JsCompressed => codec::encode(&index, true)?,
    };
    report.detail(format!("shed={}", archive.root().display()));
    report.detail(format!("holes={}", index.holes.len()));
    report.detail(format!("format={format:?}"));
    report.detail(format!("crop_to_mask={}", build_opts.crop_to_mask));

    match &opts.out {
        Some(out) => {
            let path = resolve_index_location(out, format == IndexFormat::Json);
            write_atomic(&path, &text)?;
            report.detail(format!("written={}", path.display()));
            report.detail(format!("bytes={}", text.len()));
        }
        None => report.payload(Value::String(text)),
    }
    Ok(report)
}
