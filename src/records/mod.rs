use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageSettings;
use crate::error::{Context, Result};
use crate::fetch::BatchRequest;
use crate::utils::FileEntry;

pub mod debug_log;
pub mod export;
pub mod saved_series;
pub mod trade_table;

pub use debug_log::DebugLog;
pub use saved_series::{SavedSeries, SeriesShelf};
pub use trade_table::{Category, SortOrder, TradeTable};

/// Facade that keeps export, debug and saved-series persistence isolated from the rest of the app.
#[derive(Debug, Clone)]
pub struct Records {
    export_dir: PathBuf,
    debug_dir: PathBuf,
    saved_series_dir: PathBuf,
}

impl Records {
    pub fn from_settings(storage: &StorageSettings) -> Self {
        Self::with_dirs(
            &storage.export_dir,
            &storage.debug_dir,
            &storage.saved_series_dir,
        )
    }

    pub fn with_dirs<E, D, S>(export_dir: E, debug_dir: D, saved_series_dir: S) -> Self
    where
        E: Into<PathBuf>,
        D: Into<PathBuf>,
        S: Into<PathBuf>,
    {
        Self {
            export_dir: export_dir.into(),
            debug_dir: debug_dir.into(),
            saved_series_dir: saved_series_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn saved_series_dir(&self) -> &Path {
        &self.saved_series_dir
    }

    /// Ensure the target directories exist before any persistence happens.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.export_dir, &self.debug_dir, &self.saved_series_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn debug_log(&self) -> DebugLog {
        DebugLog::new(&self.debug_dir)
    }

    pub fn export_table(&self, request: &BatchRequest, table: &TradeTable) -> Result<PathBuf> {
        export::export_table(&self.export_dir, request, table)
    }

    pub fn save_series(&self, saved: &SavedSeries) -> Result<PathBuf> {
        saved_series::save_series(&self.saved_series_dir, saved)
    }

    pub fn load_series<P: AsRef<Path>>(&self, path: P) -> Result<SavedSeries> {
        saved_series::load_series(path.as_ref())
    }

    pub fn list_saved_series(&self) -> Vec<FileEntry> {
        saved_series::list_saved(&self.saved_series_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_every_directory() {
        let root = tempfile::tempdir().unwrap();
        let records = Records::with_dirs(
            root.path().join("exports"),
            root.path().join("debug_logs"),
            root.path().join("saved_series"),
        );
        records.prepare().unwrap();
        assert!(records.export_dir().is_dir());
        assert!(records.saved_series_dir().is_dir());
        assert!(root.path().join("debug_logs").is_dir());
        assert!(records.list_saved_series().is_empty());
    }
}
