use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Group name → annotation id → record.
pub type AnnotationGroups = BTreeMap<String, BTreeMap<String, AnnotationRecord>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationRecord {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationKey {
    pub kind: String,
    pub group: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationKeyError {
    #[error("expected 4 `_`-separated parts, found {0}")]
    PartCount(usize),
    #[error("empty {0} part")]
    EmptyPart(&'static str),
    #[error("{part} depth `{raw}` is not a number")]
    BadDepth { part: &'static str, raw: String },
}

/// Header keys naming a note or a link are annotation candidates.
pub fn is_annotation_key(key: &str) -> bool {
    key.contains("note") || key.contains("link")
}

fn parse_depth(part: &'static str, raw: &str) -> Result<f64, AnnotationKeyError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| AnnotationKeyError::BadDepth {
            part,
            raw: raw.to_string(),
        })?;
    if !value.is_finite() {
        return Err(AnnotationKeyError::BadDepth {
            part,
            raw: raw.to_string(),
        });
    }
    Ok(value / 100.0)
}

impl AnnotationKey {
    pub fn parse(key: &str) -> Result<Self, AnnotationKeyError> {
        let parts = key.split('_').collect::<Vec<_>>();
        let [kind, group, start, end] = parts.as_slice() else {
            return Err(AnnotationKeyError::PartCount(parts.len()));
        };
        if kind.is_empty() {
            return Err(AnnotationKeyError::EmptyPart("type"));
        }
        if group.is_empty() {
            return Err(AnnotationKeyError::EmptyPart("group"));
        }
        Ok(Self {
            kind: (*kind).to_string(),
            group: (*group).to_string(),
            start: parse_depth("start", start)?,
            end: parse_depth("end", end)?,
        })
    }

    pub fn record(&self, header_value: &str) -> AnnotationRecord {
        let (name, value) = header_value.split_once(',').unwrap_or((header_value, ""));
        AnnotationRecord {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            kind: self.kind.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.kind,
            self.group,
            (self.start * 100.0).round() as i64,
            (self.end * 100.0).round() as i64
        )
    }
}
