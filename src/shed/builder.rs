use crate::error::ShedError;
use crate::shed::annotation::{AnnotationGroups, AnnotationKey, is_annotation_key};
use crate::shed::archive::{Archive, ArchiveSession, BoxInfo, MosaicKind, Preview};
use crate::shed::config::IndexConfig;
use crate::shed::header::Header;
use crate::shed::index::{
    BoxIndex, HoleIndex, ImageEntry, MosaicMeta, RESERVED_HOLE_KEYS, RESERVED_TOP_KEYS, ShedIndex,
    ShedSummary,
};
use crate::shed::util::round_to;
use crate::shed::warn::{self, WarnEvent};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Sensors to report in every box. `None` reports what each box holds.
    pub sensors: Option<BTreeSet<String>>,
    /// Results to report (name → fallback legend). `None` reports every result.
    pub results: Option<BTreeMap<String, String>>,
    pub crop_to_mask: bool,
    pub legend_prefix: String,
    pub about_author: String,
}

impl BuildOptions {
    pub fn new(cfg: &IndexConfig) -> Self {
        Self {
            sensors: None,
            results: None,
            crop_to_mask: cfg.crop_to_mask,
            legend_prefix: cfg.legend_prefix.clone(),
            about_author: cfg.about_author.clone(),
        }
    }
}

/// How preview dimensions are reported for one box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Full,
    Cropped([u32; 2]),
    Unavailable,
}

fn hole_is_indexable(hole: &str) -> bool {
    if RESERVED_TOP_KEYS.contains(&hole) {
        warn::emit(WarnEvent {
            code: "W001_RESERVED_NAME",
            stage: "hole",
            hole,
            item: hole,
            reason: "hole name collides with a top-level index key",
        });
        return false;
    }
    true
}

fn box_is_indexable(hole: &str, box_name: &str) -> bool {
    if RESERVED_HOLE_KEYS.contains(&box_name) {
        warn::emit(WarnEvent {
            code: "W001_RESERVED_NAME",
            stage: "box",
            hole,
            item: box_name,
            reason: "box name collides with a hole index key",
        });
        return false;
    }
    true
}

fn indexable_holes(archive: &dyn Archive) -> Result<Vec<String>> {
    Ok(archive
        .hole_names()?
        .into_iter()
        .filter(|h| hole_is_indexable(h))
        .collect())
}

fn indexable_boxes(archive: &dyn Archive, hole: &str) -> Result<Vec<BoxInfo>> {
    Ok(archive
        .boxes(hole)?
        .into_iter()
        .filter(|b| box_is_indexable(hole, &b.name))
        .collect())
}

fn require_hole(archive: &dyn Archive, hole: &str) -> Result<()> {
    if RESERVED_TOP_KEYS.contains(&hole) || !archive.has_hole(hole)? {
        return Err(ShedError::HoleNotFound(hole.to_string()).into());
    }
    Ok(())
}

/// Legends are recognised by their prefix anywhere in the stem, ignoring case.
pub fn is_legend(stem: &str, prefix: &str) -> bool {
    stem.to_lowercase().contains(&prefix.to_lowercase())
}

/// First legend (in listing order) whose prefix-stripped name occurs in the
/// result name, ignoring case.
pub fn resolve_legend(result: &str, stems: &[String], prefix: &str) -> Option<String> {
    let result_lower = result.to_lowercase();
    let prefix_lower = prefix.to_lowercase();
    stems.iter().find_map(|stem| {
        let lower = stem.to_lowercase();
        let at = lower.rfind(&prefix_lower)?;
        let suffix = &lower[at + prefix_lower.len()..];
        if suffix.is_empty() || !result_lower.contains(suffix) {
            return None;
        }
        Some(stem.clone())
    })
}

pub fn decode_annotations(hole: &str, header: &Header) -> AnnotationGroups {
    let mut groups = AnnotationGroups::new();
    for (key, value) in header.iter() {
        if !is_annotation_key(key) {
            continue;
        }
        let parsed = match AnnotationKey::parse(key) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "W002_ANNOTATION_KEY",
                    stage: "annotations",
                    hole,
                    item: key,
                    reason: &err.to_string(),
                });
                continue;
            }
        };
        groups
            .entry(parsed.group.clone())
            .or_default()
            .insert(key.to_string(), parsed.record(value));
    }
    groups
}

fn box_frame(archive: &dyn Archive, hole: &str, box_name: &str, crop: bool) -> Frame {
    if !crop {
        return Frame::Full;
    }
    match archive.mask_dims(hole, box_name) {
        Ok(Some(dims)) => Frame::Cropped(dims),
        Ok(None) => Frame::Full,
        Err(err) => {
            warn::emit(WarnEvent {
                code: "W003_MASK",
                stage: "box",
                hole,
                item: box_name,
                reason: &format!("{err:#}"),
            });
            Frame::Unavailable
        }
    }
}

fn probe(
    archive: &dyn Archive,
    hole: &str,
    box_name: &str,
    preview: Preview<'_>,
    frame: Frame,
) -> Option<[u32; 2]> {
    match frame {
        Frame::Cropped(dims) => return Some(dims),
        Frame::Unavailable => return None,
        Frame::Full => {}
    }
    match archive.preview_dims(hole, box_name, preview) {
        Ok(dims) => Some(dims),
        Err(err) => {
            let item = match preview {
                Preview::Sensor(name) | Preview::Result(name) => name,
            };
            tracing::debug!(hole, box_name, item, error = %format!("{err:#}"), "preview unavailable");
            warn::emit(WarnEvent {
                code: "W004_PREVIEW",
                stage: "box",
                hole,
                item,
                reason: "preview missing or unreadable",
            });
            None
        }
    }
}

fn normalized_extent(hole: &str, info: &BoxInfo) -> (f64, f64) {
    if info.start <= info.end {
        return (info.start, info.end);
    }
    warn::emit(WarnEvent {
        code: "W005_DEPTH_ORDER",
        stage: "box",
        hole,
        item: &info.name,
        reason: "start depth after end depth; swapped",
    });
    (info.end, info.start)
}

fn collect_box(
    archive: &dyn Archive,
    hole: &str,
    info: &BoxInfo,
    opts: &BuildOptions,
) -> Result<BoxIndex> {
    let (start, end) = normalized_extent(hole, info);
    let frame = box_frame(archive, hole, &info.name, opts.crop_to_mask);

    let sensor_names = match &opts.sensors {
        Some(filter) => filter.iter().cloned().collect::<Vec<_>>(),
        None => archive.sensor_names(hole, &info.name)?,
    };
    let mut dims = None;
    let mut sensors = BTreeMap::new();
    for sensor in sensor_names {
        let entry = match probe(archive, hole, &info.name, Preview::Sensor(&sensor), frame) {
            Some(found) => {
                dims = Some(found);
                ImageEntry {
                    dims: found,
                    leg: String::new(),
                }
            }
            None => ImageEntry::missing(),
        };
        sensors.insert(sensor, entry);
    }

    let stems = archive.result_names(hole, &info.name)?;
    let legends = stems
        .iter()
        .filter(|s| is_legend(s, &opts.legend_prefix))
        .cloned()
        .collect::<Vec<_>>();
    let mut results = BTreeMap::new();
    for stem in stems.iter().filter(|s| !is_legend(s, &opts.legend_prefix)) {
        let fallback = match &opts.results {
            Some(filter) => match filter.get(stem) {
                Some(leg) => leg.clone(),
                None => continue,
            },
            None => String::new(),
        };
        let leg = resolve_legend(stem, &legends, &opts.legend_prefix).unwrap_or(fallback);
        let dims = probe(archive, hole, &info.name, Preview::Result(stem), frame).unwrap_or([0, 0]);
        results.insert(stem.clone(), ImageEntry { dims, leg });
    }

    Ok(BoxIndex {
        name: info.name.clone(),
        start: round_to(start, 2),
        end: round_to(end, 2),
        dims,
        sensors,
        results,
    })
}

fn mosaic_meta(archive: &dyn Archive, hole: &str, kind: MosaicKind) -> Option<MosaicMeta> {
    let template = match archive.mosaic_template(hole, kind) {
        Ok(Some(template)) => template,
        Ok(None) => return None,
        Err(err) => {
            warn::emit(WarnEvent {
                code: "W006_MOSAIC",
                stage: kind.as_str(),
                hole,
                item: "template.hdr",
                reason: &format!("{err:#}"),
            });
            return None;
        }
    };
    let (Some(samples), Some(lines)) = (template.get_u32("samples"), template.get_u32("lines"))
    else {
        warn::emit(WarnEvent {
            code: "W006_MOSAIC",
            stage: kind.as_str(),
            hole,
            item: "template.hdr",
            reason: "template lacks samples or lines",
        });
        return None;
    };
    let depths = template
        .get_list("depths")
        .map(|list| list.into_iter().map(|z| round_to(z, 4)).collect());
    Some(MosaicMeta {
        dims: [samples, lines],
        depths,
    })
}

fn build_hole(archive: &dyn Archive, hole: &str, opts: &BuildOptions) -> Result<HoleIndex> {
    let header = match archive.hole_header(hole) {
        Ok(header) => header,
        Err(err) => {
            warn::emit(WarnEvent {
                code: "W009_HOLE_HEADER",
                stage: "hole",
                hole,
                item: hole,
                reason: &format!("{err:#}"),
            });
            Header::default()
        }
    };
    let annotations = decode_annotations(hole, &header);

    let mut boxes = Vec::new();
    let mut length = 0.0;
    for info in indexable_boxes(archive, hole)? {
        let entry = collect_box(archive, hole, &info, opts)?;
        let (start, end) = normalized_extent(hole, &info);
        length += end - start;
        boxes.push(entry);
    }

    Ok(HoleIndex {
        name: hole.to_string(),
        length: round_to(length, 2),
        annotations,
        pole: mosaic_meta(archive, hole, MosaicKind::Pole),
        fence: mosaic_meta(archive, hole, MosaicKind::Fence),
        boxes,
    })
}

fn sensor_wavelengths(
    archive: &dyn Archive,
    holes: &[String],
    wanted: &BTreeSet<String>,
) -> Result<BTreeMap<String, Vec<f64>>> {
    let mut out = BTreeMap::new();
    'holes: for hole in holes {
        for info in indexable_boxes(archive, hole)? {
            for sensor in wanted {
                if out.contains_key(sensor) {
                    continue;
                }
                let header = match archive.sensor_header(hole, &info.name, sensor) {
                    Ok(Some(header)) => header,
                    Ok(None) => continue,
                    Err(err) => {
                        warn::emit(WarnEvent {
                            code: "W007_SENSOR_HEADER",
                            stage: "sensors",
                            hole,
                            item: sensor,
                            reason: &format!("{err:#}"),
                        });
                        continue;
                    }
                };
                let Some(wavelengths) = header.wavelengths() else {
                    continue;
                };
                out.insert(
                    sensor.clone(),
                    wavelengths.into_iter().map(|w| round_to(w, 0)).collect(),
                );
            }
            if out.len() == wanted.len() {
                break 'holes;
            }
        }
    }
    for sensor in wanted.iter().filter(|s| !out.contains_key(*s)) {
        tracing::debug!(sensor = %sensor, "no box exposes a header for sensor");
    }
    Ok(out)
}

fn all_sensor_names(archive: &dyn Archive, holes: &[String]) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for hole in holes {
        for info in indexable_boxes(archive, hole)? {
            out.extend(archive.sensor_names(hole, &info.name)?);
        }
    }
    Ok(out)
}

fn read_about(archive: &dyn Archive, author: &str) -> Result<String> {
    if let Some(about) = archive.about()? {
        return Ok(about);
    }
    tracing::info!(author, "no about.md found; creating a default description");
    archive.create_about(author)?;
    Ok(archive.about()?.unwrap_or_default())
}

/// `{name, holes, <hole>: [box names]}` for the whole archive.
pub fn summary(archive: &dyn Archive) -> Result<ShedSummary> {
    let session = ArchiveSession::new(archive);
    let archive = session.archive();
    let mut holes = Vec::new();
    for hole in indexable_holes(archive)? {
        let boxes = indexable_boxes(archive, &hole)?
            .into_iter()
            .map(|b| b.name)
            .collect();
        holes.push((hole, boxes));
    }
    Ok(ShedSummary {
        name: archive.name().to_string(),
        holes,
    })
}

pub fn hole_boxes(archive: &dyn Archive, hole: &str) -> Result<Vec<String>> {
    let session = ArchiveSession::new(archive);
    let archive = session.archive();
    require_hole(archive, hole)?;
    Ok(indexable_boxes(archive, hole)?
        .into_iter()
        .map(|b| b.name)
        .collect())
}

pub fn box_contents(
    archive: &dyn Archive,
    hole: &str,
    box_name: &str,
    opts: &BuildOptions,
) -> Result<BoxIndex> {
    let session = ArchiveSession::new(archive);
    let archive = session.archive();
    require_hole(archive, hole)?;
    let info = match archive.box_info(hole, box_name)? {
        Some(info) if !RESERVED_HOLE_KEYS.contains(&box_name) => info,
        _ => {
            return Err(ShedError::BoxNotFound {
                hole: hole.to_string(),
                box_name: box_name.to_string(),
            }
            .into());
        }
    };
    collect_box(archive, hole, &info, opts)
}

pub fn build(archive: &dyn Archive, opts: &BuildOptions) -> Result<ShedIndex> {
    let session = ArchiveSession::new(archive);
    let archive = session.archive();

    let hole_names = indexable_holes(archive)?;
    let mut holes = Vec::with_capacity(hole_names.len());
    for hole in &hole_names {
        holes.push(build_hole(archive, hole, opts)?);
    }

    let wanted = match &opts.sensors {
        Some(filter) => filter.clone(),
        None => all_sensor_names(archive, &hole_names)?,
    };
    let sensors = sensor_wavelengths(archive, &hole_names, &wanted)?;
    let about = read_about(archive, &opts.about_author)?;

    tracing::info!(
        shed = archive.name(),
        holes = holes.len(),
        boxes = holes.iter().map(|h| h.boxes.len()).sum::<usize>(),
        sensors = sensors.len(),
        "built shed index"
    );
    Ok(ShedIndex {
        name: archive.name().to_string(),
        holes,
        sensors,
        about,
    })
}
