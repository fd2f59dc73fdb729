use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub legend_prefix: String,
    #[serde(default)]
    pub crop_to_mask: bool,
    #[serde(default = "default_about_author")]
    pub about_author: String,
}

fn default_about_author() -> String {
    "Anonymous".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            legend_prefix: "LEG".to_string(),
            crop_to_mask: false,
            about_author: default_about_author(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub compress: bool,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compress: true,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShedConfig {
    pub index: IndexConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialShedConfig {
    index: Option<IndexConfig>,
    export: Option<ExportConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &ShedConfig) -> Result<()> {
    let prefix = cfg.index.legend_prefix.trim();
    if prefix.is_empty() {
        return Err(anyhow!("invalid legend prefix: cannot be empty"));
    }
    if prefix.contains('/') || prefix.contains('\\') {
        return Err(anyhow!(
            "invalid legend prefix: must not contain path separators"
        ));
    }
    if cfg.index.about_author.trim().is_empty() {
        return Err(anyhow!("invalid about author: cannot be empty"));
    }
    if cfg.export.lock_timeout_ms == 0 {
        return Err(anyhow!("invalid lock timeout: must be >= 1 ms"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("HYSHED_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".hyshed").join("config.toml"))
}

fn merge_file_config(base: &mut ShedConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse hyshed config {}: {err}", path.display()))
}

fn merge_toml(base: &mut ShedConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialShedConfig = toml::from_str(raw)?;
    if let Some(index) = parsed.index {
        base.index = index;
    }
    if let Some(export) = parsed.export {
        base.export = export;
    }
    Ok(())
}

fn apply_env(cfg: &mut ShedConfig) {
    cfg.index.legend_prefix = env_or_string("HYSHED_LEGEND_PREFIX", &cfg.index.legend_prefix);
    cfg.index.crop_to_mask = env_or_bool("HYSHED_CROP_TO_MASK", cfg.index.crop_to_mask);
    cfg.index.about_author = env_or_string("HYSHED_ABOUT_AUTHOR", &cfg.index.about_author);
    cfg.export.compress = env_or_bool("HYSHED_EXPORT_COMPRESS", cfg.export.compress);
    cfg.export.lock_timeout_ms =
        env_or_u64("HYSHED_LOCK_TIMEOUT_MS", cfg.export.lock_timeout_ms);
}

pub fn load_config() -> Result<ShedConfig> {
    let mut cfg = ShedConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
