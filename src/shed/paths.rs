use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

pub const SITE_INDEX_JS: &str = "map/index.js";
pub const SITE_INDEX_JSON: &str = "map/index.json";

#[derive(Debug, Clone)]
pub struct ShedPaths {
    pub shed_dir: PathBuf,
    pub site_dir: PathBuf,
    pub index_file: PathBuf,
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

/// `<parent>/<name>_html` next to the shed directory.
pub fn default_site_dir(shed_dir: &Path) -> PathBuf {
    let name = shed_dir
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.strip_suffix(".shed").unwrap_or(s))
        .unwrap_or("shed");
    let parent = shed_dir.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}_html"))
}

/// A `.js`/`.json` path is used as is; anything else is a site directory.
pub fn resolve_index_location(path: &Path, json: bool) -> PathBuf {
    let is_index_file = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("js") || ext.eq_ignore_ascii_case("json"));
    if is_index_file {
        return path.to_path_buf();
    }
    if json {
        path.join(SITE_INDEX_JSON)
    } else {
        path.join(SITE_INDEX_JS)
    }
}

pub fn lock_path_for(index_file: &Path) -> PathBuf {
    let mut raw = index_file.as_os_str().to_owned();
    raw.push(".lock");
    PathBuf::from(raw)
}

pub fn resolve_shed_dir(cli_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_override {
        return Ok(path.to_path_buf());
    }
    env_path("HYSHED_SHED_DIR")
        .ok_or_else(|| anyhow::anyhow!("no shed directory: pass --shed or set HYSHED_SHED_DIR"))
}

pub fn resolve_paths(cli_override: Option<&Path>) -> Result<ShedPaths> {
    let shed_dir = resolve_shed_dir(cli_override)?;
    let site_dir = env_path("HYSHED_SITE_DIR").unwrap_or_else(|| default_site_dir(&shed_dir));
    let index_file = resolve_index_location(&site_dir, false);
    Ok(ShedPaths {
        shed_dir,
        site_dir,
        index_file,
    })
}
