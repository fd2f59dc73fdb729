use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, index_location};
use crate::shed::patch::load_compiled;
use crate::shed::paths::resolve_index_location;

pub fn run(index: Option<&Path>, shed: Option<&Path>) -> Result<CommandReport> {
    let location = index_location(index, shed)?;
    let mut report = CommandReport::new("decode");
    report.detail(format!(
        "index={}",
        resolve_index_location(&location, false).display()
    ));
    report.payload(load_compiled(&location)?);
    Ok(report)
}
