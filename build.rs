use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const KEY_PREFIX: &str = "\"HYSHED_";

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_rs_files(&path, out)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
            out.push(path);
        }
    }
    out.sort();
    Ok(())
}

/// Only complete `"HYSHED_*"` string literals count as config keys.
fn literal_keys(source: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = source;
    while let Some(at) = rest.find(KEY_PREFIX) {
        let tail = &rest[at + 1..];
        let len = tail
            .bytes()
            .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
            .count();
        if tail.as_bytes().get(len) == Some(&b'"') {
            keys.push(&tail[..len]);
        }
        rest = &tail[len..];
    }
    keys
}

/// Key → first module (relative to `src/`) that reads it.
fn collect_env_keys(src: &Path) -> std::io::Result<BTreeMap<String, String>> {
    let mut files = Vec::new();
    collect_rs_files(src, &mut files)?;
    let mut keys = BTreeMap::new();
    for file in files {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        let module = file
            .strip_prefix(src)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        for key in literal_keys(&content) {
            keys.entry(key.to_string()).or_insert_with(|| module.clone());
        }
    }
    Ok(keys)
}

fn write_generated_allowlist() -> std::io::Result<()> {
    let keys = collect_env_keys(Path::new("src"))?;
    let out_dir = env::var_os("OUT_DIR")
        .ok_or_else(|| std::io::Error::other("OUT_DIR is not set"))?;
    let generated = Path::new(&out_dir).join("hyshed_env_allowlist.rs");
    let mut f = fs::File::create(generated)?;
    writeln!(f, "/// `(key, module that reads it)` for every `HYSHED_*` setting.")?;
    writeln!(f, "pub const GENERATED_HYSHED_ENV_ALLOWLIST: &[(&str, &str)] = &[")?;
    for (key, module) in &keys {
        writeln!(f, "    ({key:?}, {module:?}),")?;
        println!("cargo:rerun-if-env-changed={key}");
    }
    writeln!(f, "];")?;
    Ok(())
}

fn main() {
    if let Err(err) = write_generated_allowlist() {
        panic!("failed to generate HYSHED env allowlist: {err}");
    }

    let build_id = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|now| format!("{:x}-{:x}", now.as_secs(), now.subsec_nanos()))
        .unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_UUID={build_id}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
