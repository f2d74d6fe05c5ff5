use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Context, Result};
use crate::fetch::BatchRequest;

use super::trade_table::TradeTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `apt_trade[_rent]_{lawd}_{from}_{to}.csv` for the query that produced a table.
pub fn export_file_name(request: &BatchRequest) -> String {
    let prefix = if request.include_rent {
        "apt_trade_rent"
    } else {
        "apt_trade"
    };
    let from = request.months.first().map(String::as_str).unwrap_or_default();
    let to = request.months.last().map(String::as_str).unwrap_or_default();
    format!("{}_{}_{}_{}.csv", prefix, request.regions.join("-"), from, to)
}

/// Write a header row plus `rows` as UTF-8 CSV with a byte-order mark.
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    file.write_all(UTF8_BOM)
        .with_context(|| format!("Failed to write export file {}", path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export the displayed rows of `table` into `dir`.
pub fn export_table(dir: &Path, request: &BatchRequest, table: &TradeTable) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_file_name(request));
    write_csv(&path, &table.headers(), &table.display_rows())?;
    info!("Exported {} rows to {}", table.visible_len(), path.display());
    Ok(path)
}
