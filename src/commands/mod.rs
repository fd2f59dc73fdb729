pub mod shed_annotate;
pub mod shed_decode;
pub mod shed_discover;
pub mod shed_index;
pub mod shed_map;
pub mod shed_status;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::shed::archive::FsArchive;
use crate::shed::paths::{resolve_paths, resolve_shed_dir};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            payload: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn payload(&mut self, value: Value) {
        self.payload = Some(value);
    }
}

pub fn open_shed(shed_override: Option<&Path>) -> Result<FsArchive> {
    FsArchive::open(resolve_shed_dir(shed_override)?)
}

/// Explicit `--index`, else the default site index next to the shed.
pub fn index_location(explicit: Option<&Path>, shed_override: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(resolve_paths(shed_override)?.index_file),
    }
}
