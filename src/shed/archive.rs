use crate::shed::header::Header;
use crate::shed::util::sort_natural;
use crate::shed::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const HOLE_HEADER_FILE: &str = "hole.hdr";
pub const BOX_HEADER_FILE: &str = "box.hdr";
pub const MASK_STEM: &str = "mask";
pub const RESULTS_DIR: &str = "results";
pub const ABOUT_FILE: &str = "about.md";
pub const MOSAIC_TEMPLATE_FILE: &str = "template.hdr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicKind {
    Pole,
    Fence,
}

impl MosaicKind {
    pub const ALL: [MosaicKind; 2] = [MosaicKind::Pole, MosaicKind::Fence];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pole => "pole",
            Self::Fence => "fence",
        }
    }
}

/// Which preview image of a box to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preview<'a> {
    Sensor(&'a str),
    Result(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxInfo {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

pub trait Archive {
    fn name(&self) -> &str;

    fn hole_names(&self) -> Result<Vec<String>>;

    fn has_hole(&self, hole: &str) -> Result<bool> {
        Ok(self.hole_names()?.iter().any(|h| h == hole))
    }

    fn hole_header(&self, hole: &str) -> Result<Header>;

    fn boxes(&self, hole: &str) -> Result<Vec<BoxInfo>>;

    fn box_info(&self, hole: &str, box_name: &str) -> Result<Option<BoxInfo>> {
        Ok(self
            .boxes(hole)?
            .into_iter()
            .find(|b| b.name == box_name))
    }

    /// Sensors with a header in this box.
    fn sensor_names(&self, hole: &str, box_name: &str) -> Result<Vec<String>>;

    fn sensor_header(&self, hole: &str, box_name: &str, sensor: &str) -> Result<Option<Header>>;

    /// Stems of every image in the box results directory, legends included.
    fn result_names(&self, hole: &str, box_name: &str) -> Result<Vec<String>>;

    /// `[width, height]` of a preview, read without decoding pixels.
    fn preview_dims(&self, hole: &str, box_name: &str, preview: Preview<'_>) -> Result<[u32; 2]>;

    /// Extent of the box mask, or `None` when the box has no mask.
    fn mask_dims(&self, hole: &str, box_name: &str) -> Result<Option<[u32; 2]>>;

    fn mosaic_template(&self, hole: &str, kind: MosaicKind) -> Result<Option<Header>>;

    fn about(&self) -> Result<Option<String>>;

    fn create_about(&self, author: &str) -> Result<()>;

    /// Drop anything held since the last release.
    fn release(&self);
}

/// Scoped acquisition of an archive: releases on every exit path.
pub struct ArchiveSession<'a> {
    archive: &'a dyn Archive,
}

impl<'a> ArchiveSession<'a> {
    pub fn new(archive: &'a dyn Archive) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &'a dyn Archive {
        self.archive
    }
}

impl Drop for ArchiveSession<'_> {
    fn drop(&mut self) {
        self.archive.release();
    }
}

#[derive(Debug)]
pub struct FsArchive {
    root: PathBuf,
    name: String,
    headers: RefCell<BTreeMap<PathBuf, Header>>,
}

fn is_listable(name: &str) -> bool {
    !name.starts_with('.') && !name.starts_with("__") && name != RESULTS_DIR
}

fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if is_listable(name) {
            out.push(name.to_string());
        }
    }
    sort_natural(&mut out);
    Ok(out)
}

fn list_stems(dir: &Path, ext: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches_ext = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !matches_ext {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push(stem.to_string());
        }
    }
    sort_natural(&mut out);
    Ok(out)
}

/// Bounding box of non-zero pixels as `[width, height]`.
fn mask_bounds(path: &Path) -> Result<[u32; 2]> {
    let img = image::open(path)
        .with_context(|| format!("failed to decode mask {}", path.display()))?
        .into_luma8();
    let (mut xmin, mut ymin) = (u32::MAX, u32::MAX);
    let (mut xmax, mut ymax) = (0u32, 0u32);
    for (x, y, px) in img.enumerate_pixels() {
        if px.0[0] == 0 {
            continue;
        }
        xmin = xmin.min(x);
        ymin = ymin.min(y);
        xmax = xmax.max(x + 1);
        ymax = ymax.max(y + 1);
    }
    if xmin == u32::MAX {
        anyhow::bail!("mask {} has no unmasked pixels", path.display());
    }
    Ok([xmax - xmin, ymax - ymin])
}

impl FsArchive {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("shed directory does not exist: {}", root.display());
        }
        let name = root
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.strip_suffix(".shed").unwrap_or(s).to_string())
            .filter(|s| !s.is_empty())
            .context("shed directory has no usable name")?;
        Ok(Self {
            root,
            name,
            headers: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached_headers(&self) -> usize {
        self.headers.borrow().len()
    }

    fn hole_dir(&self, hole: &str) -> PathBuf {
        self.root.join(hole)
    }

    fn box_dir(&self, hole: &str, box_name: &str) -> PathBuf {
        self.root.join(hole).join(box_name)
    }

    fn header_at(&self, path: &Path) -> Result<Option<Header>> {
        if let Some(cached) = self.headers.borrow().get(path) {
            return Ok(Some(cached.clone()));
        }
        if !path.is_file() {
            return Ok(None);
        }
        let header = Header::load(path)?;
        self.headers
            .borrow_mut()
            .insert(path.to_path_buf(), header.clone());
        Ok(Some(header))
    }

    fn box_from_dir(&self, hole: &str, box_name: &str) -> Result<BoxInfo> {
        let header = match self.header_at(&self.box_dir(hole, box_name).join(BOX_HEADER_FILE)) {
            Ok(header) => header.unwrap_or_default(),
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "W008_BOX_HEADER",
                    stage: "box",
                    hole,
                    item: box_name,
                    reason: &format!("{err:#}"),
                });
                Header::default()
            }
        };
        Ok(BoxInfo {
            name: box_name.to_string(),
            start: header.get_f64("start").unwrap_or(0.0),
            end: header.get_f64("end").unwrap_or(0.0),
        })
    }
}

impl Archive for FsArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn hole_names(&self) -> Result<Vec<String>> {
        list_dirs(&self.root)
    }

    fn hole_header(&self, hole: &str) -> Result<Header> {
        Ok(self
            .header_at(&self.hole_dir(hole).join(HOLE_HEADER_FILE))?
            .unwrap_or_default())
    }

    fn boxes(&self, hole: &str) -> Result<Vec<BoxInfo>> {
        list_dirs(&self.hole_dir(hole))?
            .iter()
            .map(|name| self.box_from_dir(hole, name))
            .collect()
    }

    fn box_info(&self, hole: &str, box_name: &str) -> Result<Option<BoxInfo>> {
        if !is_listable(box_name) || !self.box_dir(hole, box_name).is_dir() {
            return Ok(None);
        }
        self.box_from_dir(hole, box_name).map(Some)
    }

    fn sensor_names(&self, hole: &str, box_name: &str) -> Result<Vec<String>> {
        let stems = list_stems(&self.box_dir(hole, box_name), "hdr")?;
        Ok(stems
            .into_iter()
            .filter(|s| format!("{s}.hdr") != BOX_HEADER_FILE && s != MASK_STEM)
            .collect())
    }

    fn sensor_header(&self, hole: &str, box_name: &str, sensor: &str) -> Result<Option<Header>> {
        self.header_at(&self.box_dir(hole, box_name).join(format!("{sensor}.hdr")))
    }

    fn result_names(&self, hole: &str, box_name: &str) -> Result<Vec<String>> {
        list_stems(&self.box_dir(hole, box_name).join(RESULTS_DIR), "png")
    }

    fn preview_dims(&self, hole: &str, box_name: &str, preview: Preview<'_>) -> Result<[u32; 2]> {
        let dir = self.box_dir(hole, box_name);
        let path = match preview {
            Preview::Sensor(name) => dir.join(format!("{name}.png")),
            Preview::Result(name) => dir.join(RESULTS_DIR).join(format!("{name}.png")),
        };
        let (w, h) = image::image_dimensions(&path)
            .with_context(|| format!("failed to probe {}", path.display()))?;
        Ok([w, h])
    }

    fn mask_dims(&self, hole: &str, box_name: &str) -> Result<Option<[u32; 2]>> {
        let path = self
            .box_dir(hole, box_name)
            .join(format!("{MASK_STEM}.png"));
        if !path.is_file() {
            return Ok(None);
        }
        mask_bounds(&path).map(Some)
    }

    fn mosaic_template(&self, hole: &str, kind: MosaicKind) -> Result<Option<Header>> {
        let path = self
            .hole_dir(hole)
            .join(RESULTS_DIR)
            .join(kind.as_str())
            .join(MOSAIC_TEMPLATE_FILE);
        self.header_at(&path)
    }

    fn about(&self) -> Result<Option<String>> {
        let path = self.root.join(ABOUT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(raw))
    }

    fn create_about(&self, author: &str) -> Result<()> {
        let path = self.root.join(ABOUT_FILE);
        let created = chrono::Local::now().format("%Y-%m-%d");
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.name));
        out.push_str(&format!("*Author: {author}*  \n*Created: {created}*\n\n"));
        out.push_str("## Overview\n\n");
        out.push_str("Hyperspectral drill-core collection. Describe the project, sensors and processing here.\n\n");
        out.push_str("## Holes\n\n");
        for hole in self.hole_names()? {
            out.push_str(&format!("- {hole}\n"));
        }
        fs::write(&path, out).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn release(&self) {
        self.headers.borrow_mut().clear();
    }
}
