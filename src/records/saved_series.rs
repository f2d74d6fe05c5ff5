use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Context, Result};
use crate::fetch::{SeriesRange, StatEntry, StatItem, StatsProvider};
use crate::utils::{list_json_files, sanitize_file_stem, FileEntry};

/// A named statistics query that can be re-run and charted later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSeries {
    pub name: String,
    pub provider: StatsProvider,
    pub entry: StatEntry,
    pub item: StatItem,
    pub range: SeriesRange,
}

/// Series saved during the current session, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct SeriesShelf {
    series: Vec<SavedSeries>,
}

impl SeriesShelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `saved`, replacing an existing series with the same name.
    pub fn add(&mut self, saved: SavedSeries) {
        match self.series.iter_mut().find(|s| s.name == saved.name) {
            Some(existing) => *existing = saved,
            None => self.series.push(saved),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<SavedSeries> {
        let index = self.series.iter().position(|s| s.name == name)?;
        Some(self.series.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&SavedSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedSeries> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Persist `saved` as `<slug>.json` inside `dir`.
pub fn save_series(dir: &Path, saved: &SavedSeries) -> Result<PathBuf> {
    let slug = sanitize_file_stem(&saved.name)
        .ok_or_else(|| AppError::missing("a series name with letters or digits"))?;
    fs::create_dir_all(dir).context("Failed to create saved series directory")?;

    let path = dir.join(format!("{}.json", slug));
    let json =
        serde_json::to_string_pretty(saved).context("Failed to serialize saved series")?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write saved series file {:?}", path))?;
    Ok(path)
}

pub fn load_series(path: &Path) -> Result<SavedSeries> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read saved series file {:?}", path))?;
    let saved = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse saved series file {:?}", path))?;
    Ok(saved)
}

pub fn list_saved(dir: &Path) -> Vec<FileEntry> {
    list_json_files(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(name: &str) -> SavedSeries {
        SavedSeries {
            name: name.to_string(),
            provider: StatsProvider::Ecos,
            entry: StatEntry {
                code: "722Y001".into(),
                name: "한국은행 기준금리".into(),
                cycle: "M".into(),
                ..StatEntry::default()
            },
            item: StatItem {
                code: "0101000".into(),
                name: "기준금리".into(),
                ..StatItem::default()
            },
            range: SeriesRange {
                cycle: "M".into(),
                start: "202001".into(),
                end: "202412".into(),
            },
        }
    }

    #[test]
    fn persists_and_reloads_under_slugged_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_series(dir.path(), &saved("기준금리 월별")).unwrap();
        assert!(path.ends_with("기준금리_월별.json"));

        let loaded = load_series(&path).unwrap();
        assert_eq!(loaded, saved("기준금리 월별"));
        assert_eq!(list_saved(dir.path()).len(), 1);
    }

    #[test]
    fn unsluggable_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save_series(dir.path(), &saved("??")),
            Err(AppError::MissingInput(_))
        ));
    }

    #[test]
    fn shelf_replaces_by_name() {
        let mut shelf = SeriesShelf::new();
        shelf.add(saved("a"));
        shelf.add(saved("b"));
        let mut updated = saved("a");
        updated.range.end = "202312".into();
        shelf.add(updated);

        assert_eq!(shelf.len(), 2);
        assert_eq!(shelf.get("a").map(|s| s.range.end.as_str()), Some("202312"));
        assert!(shelf.remove("b").is_some());
        assert!(shelf.get("b").is_none());
    }
}
