use crate::shed::archive::Archive;
use crate::shed::builder::{self, BuildOptions};
use crate::shed::config::IndexConfig;
use crate::shed::index::ShedIndex;
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Every sensor and result present anywhere in a shed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovery {
    pub sensors: BTreeSet<String>,
    /// Result name → legend name (empty when no box has a legend for it).
    pub results: BTreeMap<String, String>,
}

impl Discovery {
    pub fn from_index(index: &ShedIndex) -> Self {
        let mut out = Self::default();
        for hole in &index.holes {
            for entry in &hole.boxes {
                out.sensors.extend(entry.sensors.keys().cloned());
                for (name, image) in &entry.results {
                    out.merge_result(name, &image.leg);
                }
            }
        }
        out
    }

    /// A recorded non-empty legend is never replaced; an empty one is filled
    /// by the first non-empty legend seen later.
    fn merge_result(&mut self, name: &str, leg: &str) {
        match self.results.get_mut(name) {
            None => {
                self.results.insert(name.to_string(), leg.to_string());
            }
            Some(existing) if existing.is_empty() => *existing = leg.to_string(),
            Some(_) => {}
        }
    }
}

pub fn discover(archive: &dyn Archive, cfg: &IndexConfig) -> Result<Discovery> {
    let mut opts = BuildOptions::new(cfg);
    opts.crop_to_mask = false;
    let index = builder::build(archive, &opts)?;
    let found = Discovery::from_index(&index);
    tracing::debug!(
        sensors = found.sensors.len(),
        results = found.results.len(),
        "discovered shed contents"
    );
    Ok(found)
}
