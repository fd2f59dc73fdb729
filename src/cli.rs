use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::commands::shed_annotate::ShedAnnotateOptions;
use crate::commands::shed_index::{IndexFormat, ShedIndexOptions};
use crate::commands::shed_map::ShedMapOptions;
use crate::commands::{
    CommandReport, shed_annotate, shed_decode, shed_discover, shed_index, shed_map, shed_status,
};

#[derive(Parser)]
#[command(
    name = "hyshed",
    version,
    about = "Index hyperspectral drill-core sheds for live and static viewers"
)]
struct Cli {
    /// Shed directory (or set HYSHED_SHED_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    shed: Option<PathBuf>,
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive, hole or box summary
    Map {
        #[arg(long)]
        hole: Option<String>,
        #[arg(long = "box", requires = "hole", value_name = "BOX")]
        box_name: Option<String>,
    },
    /// Build the full index
    Index {
        /// Sensor to report (repeatable; default: every sensor found)
        #[arg(long = "sensor", value_name = "SENSOR")]
        sensors: Vec<String>,
        /// Result to report, optionally with a fallback legend (R or R=LEG)
        #[arg(long = "result", value_name = "RESULT")]
        results: Vec<String>,
        /// Report mask-cropped dimensions
        #[arg(long)]
        crop: bool,
        #[arg(long, value_enum)]
        format: Option<IndexFormat>,
        /// Output file, or site directory (written to map/index.js)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// List sensors and results with their legends
    Discover,
    /// Apply an annotation patch to a compiled index
    Annotate {
        /// Compiled index file or site directory
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,
        /// Patch file (JSON or JSON5)
        #[arg(long, value_name = "FILE")]
        patch: PathBuf,
        /// Drop existing annotations before applying
        #[arg(long)]
        replace: bool,
    },
    /// Print a compiled index as JSON
    Decode {
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,
    },
    /// Show resolved configuration and paths
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    match &report.payload {
        Some(Value::String(text)) => println!("{text}"),
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => {
            println!("{}: {}", report.command, if report.ok { "ok" } else { "failed" });
            for detail in &report.details {
                println!("  {detail}");
            }
        }
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let shed = cli.shed.clone();

    let report = match cli.command {
        Commands::Map { hole, box_name } => shed_map::run(&ShedMapOptions {
            shed,
            hole,
            box_name,
        })?,
        Commands::Index {
            sensors,
            results,
            crop,
            format,
            out,
        } => shed_index::run(&ShedIndexOptions {
            shed,
            sensors,
            results,
            crop,
            format,
            out,
        })?,
        Commands::Discover => shed_discover::run(shed.as_deref())?,
        Commands::Annotate {
            index,
            patch,
            replace,
        } => shed_annotate::run(&ShedAnnotateOptions {
            shed,
            index,
            patch,
            replace,
        })?,
        Commands::Decode { index } => shed_decode::run(index.as_deref(), shed.as_deref())?,
        Commands::Status => shed_status::run(shed.as_deref())?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
