use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    pub fn parse(raw: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut pending: Option<(String, String)> = None;

        for line in raw.lines() {
            if let Some((key, mut value)) = pending.take() {
                value.push('\n');
                value.push_str(line.trim());
                if line.contains('}') {
                    entries.push((key, value));
                } else {
                    pending = Some((key, value));
                }
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("envi") || trimmed.starts_with(';')
            {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            if key.is_empty() {
                continue;
            }
            if value.starts_with('{') && !value.contains('}') {
                pending = Some((key, value));
            } else {
                entries.push((key, value));
            }
        }
        // an unterminated list still yields what was read
        if let Some(entry) = pending {
            entries.push(entry);
        }

        let mut header = Self::default();
        for (key, value) in entries {
            header.insert(key, value);
        }
        header
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read header {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.trim().parse::<f64>().ok()
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        let raw = self.get(key)?.trim();
        raw.parse::<u32>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v as u32))
    }

    /// Parse a `{a, b, c}` value into numbers. Entries that fail to parse are dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<f64>> {
        let raw = self.get(key)?;
        let inner = raw.trim().trim_start_matches('{').trim_end_matches('}');
        Some(
            inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<f64>().ok())
                .collect(),
        )
    }

    pub fn wavelengths(&self) -> Option<Vec<f64>> {
        self.get_list("wavelength")
    }

    pub fn render(&self) -> String {
        let mut out = String::from("ENVI\n");
        for (key, value) in &self.entries {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars_and_multiline_lists() {
        let raw = "ENVI\nsamples = 120\nlines = 40\nwavelength = {450.2, 500.7,\n 550.1}\nstart = 1.5\n";
        let header = Header::parse(raw);
        assert_eq!(header.get_u32("samples"), Some(120));
        assert_eq!(header.get_u32("lines"), Some(40));
        assert_eq!(header.wavelengths(), Some(vec![450.2, 500.7, 550.1]));
        assert_eq!(header.get_f64("start"), Some(1.5));
    }

    #[test]
    fn later_keys_overwrite_earlier_ones_in_place() {
        let header = Header::parse("a = 1\nb = 2\na = 3\n");
        let keys = header.iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(header.get("a"), Some("3"));
    }

    #[test]
    fn ignores_lines_without_assignment() {
        let header = Header::parse("ENVI\n; comment\nnot a pair\nnote_Notes_0_100 = Hi,There\n");
        assert_eq!(header.get("note_Notes_0_100"), Some("Hi,There"));
        assert_eq!(header.iter().count(), 1);
    }

    #[test]
    fn render_round_trips_through_parse() {
        let mut header = Header::default();
        header.insert("samples", "10");
        header.insert("depths", "{0.1, 0.2}");
        let parsed = Header::parse(&header.render());
        assert_eq!(parsed, header);
    }
}
