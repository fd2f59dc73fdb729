use crate::error::ShedError;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};

const PLAIN_PREFIX: &str = "var data = ";
const PLAIN_MARKER: &str = "var data";
const COMPRESSED_MARKER: &str = "var b64";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Plain,
    Compressed,
}

impl Form {
    pub fn from_compressed(compressed: bool) -> Self {
        if compressed {
            Self::Compressed
        } else {
            Self::Plain
        }
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("failed to serialize shed index")
}

pub fn compress_json(json: &str) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .context("failed to compress shed index")?;
    let bytes = encoder.finish().context("failed to compress shed index")?;
    Ok(STANDARD.encode(bytes))
}

/// `var data = <json>;`, or `var b64="<base64(zlib(<json>))>";` when compressed.
pub fn encode<T: Serialize + ?Sized>(value: &T, compressed: bool) -> Result<String> {
    let json = to_json(value)?;
    match Form::from_compressed(compressed) {
        Form::Plain => Ok(format!("{PLAIN_PREFIX}{json};")),
        Form::Compressed => Ok(format!("var b64=\"{}\";", compress_json(&json)?)),
    }
}

fn corrupt(reason: impl Into<String>) -> ShedError {
    ShedError::CorruptIndex(reason.into())
}

fn strip_statement(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim()
}

/// base64 → zlib → UTF-8, checking the JSON object boundaries.
pub fn inflate_payload(payload: &str) -> Result<String, ShedError> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| corrupt(format!("payload is not valid base64: {err}")))?;
    let mut json = String::new();
    ZlibDecoder::new(bytes.as_slice())
        .read_to_string(&mut json)
        .map_err(|err| corrupt(format!("payload does not inflate to UTF-8 text: {err}")))?;
    if !json.starts_with('{') || !json.ends_with('}') {
        return Err(corrupt("inflated payload is not a JSON object"));
    }
    Ok(json)
}

fn parse_object(json: &str) -> Result<Value, ShedError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| corrupt(format!("invalid JSON: {err}")))?;
    if !value.is_object() {
        return Err(corrupt("index JSON is not an object"));
    }
    Ok(value)
}

/// The form is decided by the statement the text opens with.
pub fn detect(text: &str) -> Option<Form> {
    let trimmed = text.trim_start();
    if trimmed.starts_with(COMPRESSED_MARKER) {
        Some(Form::Compressed)
    } else if trimmed.starts_with(PLAIN_MARKER) || trimmed.starts_with('{') {
        Some(Form::Plain)
    } else {
        None
    }
}

/// What follows `<marker> =` in a `var` statement, without the trailing `;`.
fn assigned_value<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let rest = text.trim().strip_prefix(marker)?.trim_start();
    rest.strip_prefix('=').map(strip_statement)
}

/// Parse either text form (or bare JSON) back into an index-shaped value.
pub fn decode(text: &str) -> Result<Value, ShedError> {
    match detect(text) {
        Some(Form::Compressed) => {
            let quoted = assigned_value(text, COMPRESSED_MARKER)
                .ok_or_else(|| corrupt("missing b64 payload"))?;
            let payload = quoted
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| corrupt("b64 payload is not a quoted string"))?;
            parse_object(&inflate_payload(payload)?)
        }
        Some(Form::Plain) => {
            let trimmed = text.trim();
            let json = if trimmed.starts_with(PLAIN_MARKER) {
                assigned_value(trimmed, PLAIN_MARKER)
                    .ok_or_else(|| corrupt("data statement has no assignment"))?
            } else {
                strip_statement(trimmed)
            };
            parse_object(json)
        }
        None => Err(corrupt("text is neither a compiled index script nor JSON")),
    }
}
