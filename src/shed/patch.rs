use crate::error::ShedError;
use crate::shed::codec;
use crate::shed::index::RESERVED_TOP_KEYS;
use crate::shed::paths::{lock_path_for, resolve_index_location};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const ANNOTATIONS: &str = "annotations";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default)]
pub struct PatchOutcome {
    pub index_path: PathBuf,
    pub holes_reset: usize,
    pub holes_touched: usize,
    pub records_written: usize,
    pub content_hash: String,
}

struct WriterLock {
    file: File,
}

impl WriterLock {
    fn acquire(index_file: &Path, timeout: Duration) -> Result<Self> {
        let path = lock_path_for(index_file);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { file }),
                Err(_) if started.elapsed() < timeout => thread::sleep(LOCK_POLL_INTERVAL),
                Err(_) => return Err(ShedError::Locked(index_file.to_path_buf()).into()),
            }
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read and decode a compiled index (`.js` file or site directory).
pub fn load_compiled(location: &Path) -> Result<Value> {
    let path = resolve_index_location(location, false);
    if !path.is_file() {
        return Err(ShedError::IndexMissing(path).into());
    }
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = codec::decode(&raw).with_context(|| format!("failed to load {}", path.display()))?;
    Ok(value)
}

/// Write `index` in compressed form, replacing the file atomically.
pub fn compile(index: &Value, location: &Path) -> Result<(PathBuf, String)> {
    let path = resolve_index_location(location, false);
    let text = codec::encode(index, true)?;
    write_atomic(&path, &text)?;
    Ok((path, content_hash(&text)))
}

pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to stage a write in {}", parent.display()))?;
    tmp.write_all(text.as_bytes())
        .with_context(|| format!("failed to stage {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Strict JSON first, then JSON5 for hand-edited files.
pub fn load_patch_file(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Ok(value),
        Err(json_err) => json5::from_str::<Value>(&raw).map_err(|_| {
            anyhow::Error::from(ShedError::InvalidPatch(format!(
                "{} is not JSON: {json_err}",
                path.display()
            )))
        }),
    }
}

fn invalid(reason: impl Into<String>) -> ShedError {
    ShedError::InvalidPatch(reason.into())
}

/// Holes (with their annotation groups) that a patch will write.
fn patch_holes(patch: &Value) -> Result<Vec<(&str, &Map<String, Value>)>, ShedError> {
    let obj = patch
        .as_object()
        .ok_or_else(|| invalid("patch must be a JSON object keyed by hole"))?;
    let mut out = Vec::new();
    for (hole, subtree) in obj {
        if RESERVED_TOP_KEYS.contains(&hole.as_str()) {
            return Err(invalid(format!("`{hole}` is not a hole name")));
        }
        let Some(groups) = subtree.as_object().and_then(|s| s.get(ANNOTATIONS)) else {
            continue;
        };
        let groups = groups
            .as_object()
            .ok_or_else(|| invalid(format!("`{hole}.annotations` must be an object")))?;
        for (group, records) in groups {
            if !records.is_object() {
                return Err(invalid(format!(
                    "`{hole}.annotations.{group}` must be an object keyed by annotation id"
                )));
            }
        }
        out.push((hole.as_str(), groups));
    }
    Ok(out)
}

fn check_targets(
    index: &Map<String, Value>,
    holes: &[(&str, &Map<String, Value>)],
) -> Result<(), ShedError> {
    for (hole, groups) in holes {
        let Some(existing) = index.get(*hole) else {
            continue;
        };
        let subtree = existing.as_object().ok_or_else(|| {
            invalid(format!("`{hole}` names a non-hole field of the index"))
        })?;
        let Some(current) = subtree.get(ANNOTATIONS) else {
            continue;
        };
        let current = current.as_object().ok_or_else(|| {
            ShedError::CorruptIndex(format!("`{hole}.annotations` is not an object"))
        })?;
        for group in groups.keys() {
            if current.get(group).is_some_and(|g| !g.is_object()) {
                return Err(ShedError::CorruptIndex(format!(
                    "`{hole}.annotations.{group}` is not an object"
                )));
            }
        }
    }
    Ok(())
}

/// Drop the `annotations` field of every hole subtree. Returns holes reset.
pub fn reset_annotations(index: &mut Map<String, Value>) -> usize {
    let mut reset = 0;
    for subtree in index.values_mut() {
        if let Some(obj) = subtree.as_object_mut()
            && obj.remove(ANNOTATIONS).is_some()
        {
            reset += 1;
        }
    }
    reset
}

fn ensure_object<'a>(slot: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = slot
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
    }
}

fn write_records(index: &mut Map<String, Value>, holes: &[(&str, &Map<String, Value>)]) -> usize {
    let mut written = 0;
    for (hole, groups) in holes {
        let annotations = ensure_object(ensure_object(index, hole), ANNOTATIONS);
        for (group, records) in *groups {
            let target = ensure_object(annotations, group);
            if let Some(records) = records.as_object() {
                for (id, record) in records {
                    target.insert(id.clone(), record.clone());
                    written += 1;
                }
            }
        }
    }
    written
}

/// Apply `patch` to an in-memory index. Validation happens before any change.
pub fn apply_to_index(
    index: &mut Value,
    patch: &Value,
    merge: bool,
) -> Result<(usize, usize, usize), ShedError> {
    let holes = patch_holes(patch)?;
    let map = index
        .as_object_mut()
        .ok_or_else(|| ShedError::CorruptIndex("index is not a JSON object".into()))?;
    check_targets(map, &holes)?;
    let reset = if merge { 0 } else { reset_annotations(map) };
    let written = write_records(map, &holes);
    Ok((reset, holes.len(), written))
}

pub fn apply_annotations(
    location: &Path,
    patch: &Value,
    merge: bool,
    lock_timeout: Duration,
) -> Result<PatchOutcome> {
    patch_holes(patch)?;
    let path = resolve_index_location(location, false);
    if !path.is_file() {
        return Err(ShedError::IndexMissing(path).into());
    }

    let _lock = WriterLock::acquire(&path, lock_timeout)?;
    let mut index = load_compiled(&path)?;
    let (holes_reset, holes_touched, records_written) = apply_to_index(&mut index, patch, merge)?;
    let (index_path, content_hash) = compile(&index, &path)?;

    tracing::info!(
        index = %index_path.display(),
        merge,
        holes_reset,
        holes_touched,
        records_written,
        "applied annotation patch"
    );
    Ok(PatchOutcome {
        index_path,
        holes_reset,
        holes_touched,
        records_written,
        content_hash,
    })
}
