use std::fs;
use std::path::{Path, PathBuf};

/// A file found on disk, named by its stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Every `*.json` file directly inside `dir`, sorted by name. A missing
/// directory yields an empty list.
pub fn list_json_files(dir: impl AsRef<Path>) -> Vec<FileEntry> {
    let Ok(read_dir) = fs::read_dir(dir.as_ref()) else {
        return Vec::new();
    };

    let mut entries: Vec<FileEntry> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .filter_map(|path| {
            let name = path.file_stem()?.to_str()?.to_string();
            Some(FileEntry { name, path })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_json_stems_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_rate.json"), "{}").unwrap();
        fs::write(dir.path().join("a_cpi.json"), "{}").unwrap();
        fs::write(dir.path().join("trades.csv"), "x").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let names: Vec<String> = list_json_files(dir.path())
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["a_cpi", "b_rate"]);
        assert!(list_json_files(dir.path().join("missing")).is_empty());
    }
}
