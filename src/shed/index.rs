use crate::shed::annotation::AnnotationGroups;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const RESERVED_TOP_KEYS: [&str; 4] = ["name", "holes", "sensors", "about"];
pub const RESERVED_HOLE_KEYS: [&str; 5] = ["boxes", "length", "annotations", "pole", "fence"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub dims: [u32; 2],
    #[serde(default)]
    pub leg: String,
}

impl ImageEntry {
    pub fn missing() -> Self {
        Self {
            dims: [0, 0],
            leg: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicMeta {
    pub dims: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depths: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxIndex {
    #[serde(skip)]
    pub name: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<[u32; 2]>,
    #[serde(default)]
    pub sensors: BTreeMap<String, ImageEntry>,
    #[serde(default)]
    pub results: BTreeMap<String, ImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HoleIndex {
    pub name: String,
    pub length: f64,
    pub annotations: AnnotationGroups,
    pub pole: Option<MosaicMeta>,
    pub fence: Option<MosaicMeta>,
    pub boxes: Vec<BoxIndex>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShedIndex {
    pub name: String,
    pub holes: Vec<HoleIndex>,
    pub sensors: BTreeMap<String, Vec<f64>>,
    pub about: String,
}

impl HoleIndex {
    pub fn box_names(&self) -> Vec<String> {
        self.boxes.iter().map(|b| b.name.clone()).collect()
    }

    pub fn get_box(&self, name: &str) -> Option<&BoxIndex> {
        self.boxes.iter().find(|b| b.name == name)
    }

    fn from_object(name: &str, obj: &Map<String, Value>) -> Result<Self, String> {
        let box_names: Vec<String> = optional(obj, "boxes")?.unwrap_or_default();
        let mut boxes = Vec::with_capacity(box_names.len());
        for box_name in box_names {
            let raw = obj
                .get(&box_name)
                .ok_or_else(|| format!("hole `{name}` lists box `{box_name}` without a subtree"))?;
            let mut entry: BoxIndex = serde_json::from_value(raw.clone())
                .map_err(|err| format!("box `{name}/{box_name}`: {err}"))?;
            entry.name = box_name;
            boxes.push(entry);
        }
        Ok(Self {
            name: name.to_string(),
            length: optional(obj, "length")?.unwrap_or(0.0),
            annotations: optional(obj, "annotations")?.unwrap_or_default(),
            pole: optional(obj, "pole")?,
            fence: optional(obj, "fence")?,
            boxes,
        })
    }
}

fn optional<T: for<'de> Deserialize<'de>>(
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|err| format!("field `{key}`: {err}")),
    }
}

impl ShedIndex {
    pub fn hole_names(&self) -> Vec<String> {
        self.holes.iter().map(|h| h.name.clone()).collect()
    }

    pub fn hole(&self, name: &str) -> Option<&HoleIndex> {
        self.holes.iter().find(|h| h.name == name)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Rebuild the typed tree from its JSON form. Keys not reachable from
    /// `holes` / `boxes` are ignored.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("index is not a JSON object")?;
        let name: String = optional(obj, "name")?.ok_or("index has no `name`")?;
        let hole_names: Vec<String> = optional(obj, "holes")?.ok_or("index has no `holes`")?;
        let mut holes = Vec::with_capacity(hole_names.len());
        for hole_name in hole_names {
            let subtree = obj
                .get(&hole_name)
                .and_then(Value::as_object)
                .ok_or_else(|| format!("hole `{hole_name}` has no subtree"))?;
            holes.push(HoleIndex::from_object(&hole_name, subtree)?);
        }
        Ok(Self {
            name,
            holes,
            sensors: optional(obj, "sensors")?.unwrap_or_default(),
            about: optional(obj, "about")?.unwrap_or_default(),
        })
    }
}

impl Serialize for HoleIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("boxes", &self.box_names())?;
        map.serialize_entry("length", &self.length)?;
        map.serialize_entry("annotations", &self.annotations)?;
        if let Some(pole) = &self.pole {
            map.serialize_entry("pole", pole)?;
        }
        if let Some(fence) = &self.fence {
            map.serialize_entry("fence", fence)?;
        }
        for entry in &self.boxes {
            map.serialize_entry(&entry.name, entry)?;
        }
        map.end()
    }
}

impl Serialize for ShedIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("holes", &self.hole_names())?;
        map.serialize_entry("sensors", &self.sensors)?;
        map.serialize_entry("about", &self.about)?;
        for hole in &self.holes {
            map.serialize_entry(&hole.name, hole)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ShedIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}

/// `{name, holes, <hole>: [box names]}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShedSummary {
    pub name: String,
    pub holes: Vec<(String, Vec<String>)>,
}

impl Serialize for ShedSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.holes.iter().map(|(h, _)| h).collect::<Vec<_>>();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("holes", &names)?;
        for (hole, boxes) in &self.holes {
            map.serialize_entry(hole, boxes)?;
        }
        map.end()
    }
}

#[cfg(test)]
pub(crate) mod sample {
    use super::*;
    use crate::shed::annotation::AnnotationRecord;

    pub fn index() -> ShedIndex {
        let mut sensors = BTreeMap::new();
        sensors.insert(
            "FENIX".to_string(),
            ImageEntry {
                dims: [40, 120],
                leg: String::new(),
            },
        );
        let mut results = BTreeMap::new();
        results.insert(
            "BR_Clays".to_string(),
            ImageEntry {
                dims: [40, 120],
                leg: "LEG_Clays".to_string(),
            },
        );
        let mut notes = BTreeMap::new();
        notes.insert(
            "note_Notes_0_100".to_string(),
            AnnotationRecord {
                name: "Top".into(),
                value: "Fresh core".into(),
                kind: "note".into(),
                start: 0.0,
                end: 1.0,
            },
        );
        let mut annotations = BTreeMap::new();
        annotations.insert("Notes".to_string(), notes);

        let mut wavelengths = BTreeMap::new();
        wavelengths.insert("FENIX".to_string(), vec![450.0, 1001.0, 2500.0]);

        ShedIndex {
            name: "eldorado".into(),
            holes: vec![HoleIndex {
                name: "H01".into(),
                length: 2.5,
                annotations,
                pole: Some(MosaicMeta {
                    dims: [30, 400],
                    depths: Some(vec![0.1235, 1.2346]),
                }),
                fence: None,
                boxes: vec![BoxIndex {
                    name: "b001".into(),
                    start: 0.0,
                    end: 1.23,
                    dims: Some([40, 120]),
                    sensors,
                    results,
                }],
            }],
            sensors: wavelengths,
            about: "# eldorado\n".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sample;
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_into_the_flat_index_shape() {
        let value = sample::index().to_value().expect("to value");
        assert_eq!(value["name"], "eldorado");
        assert_eq!(value["holes"], json!(["H01"]));
        assert_eq!(value["H01"]["boxes"], json!(["b001"]));
        assert_eq!(value["H01"]["b001"]["sensors"]["FENIX"], json!({"dims": [40, 120], "leg": ""}));
        assert_eq!(value["H01"]["b001"]["results"]["BR_Clays"]["leg"], "LEG_Clays");
        assert_eq!(value["H01"]["annotations"]["Notes"]["note_Notes_0_100"]["type"], "note");
        assert_eq!(value["H01"]["pole"]["dims"], json!([30, 400]));
        assert!(value["H01"].get("fence").is_none());
        assert_eq!(value["sensors"]["FENIX"], json!([450.0, 1001.0, 2500.0]));
    }

    #[test]
    fn from_value_rebuilds_the_typed_tree() {
        let index = sample::index();
        let value = index.to_value().expect("to value");
        let back = ShedIndex::from_value(&value).expect("from value");
        assert_eq!(back, index);
    }

    #[test]
    fn from_value_ignores_unlisted_keys() {
        let mut value = sample::index().to_value().expect("to value");
        value["test"] = json!(true);
        value["H01"]["extra"] = json!({"anything": 1});
        let back = ShedIndex::from_value(&value).expect("from value");
        assert_eq!(back, sample::index());
    }

    #[test]
    fn from_value_reports_missing_subtrees() {
        let value = json!({"name": "x", "holes": ["H01"]});
        let err = ShedIndex::from_value(&value).unwrap_err();
        assert!(err.contains("H01"));
        assert!(ShedIndex::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn summary_lists_boxes_per_hole() {
        let summary = ShedSummary {
            name: "eldorado".into(),
            holes: vec![("H01".into(), vec!["b001".into(), "b002".into()])],
        };
        let value = serde_json::to_value(&summary).expect("to value");
        assert_eq!(value, json!({"name": "eldorado", "holes": ["H01"], "H01": ["b001", "b002"]}));
    }
}
