use clap::{Parser, Subcommand};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::app::{SessionState, TradeForm};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetch::normalize::months_between;
use crate::fetch::{
    spawn_batch_fetch, FetchEvent, HttpPageSource, RegionClient, RegionEntry, RegionLevel,
    RegionSource,
};
use crate::records::{export, Records, TradeTable};

#[derive(Parser)]
#[command(name = "kr-data")]
#[command(about = "Browse Korean public data: administrative regions, apartment trades and statistics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON file overriding the built-in configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive browser (default)
    Tui,

    /// Fetch apartment trades for regions and months, then write a CSV
    Fetch {
        /// 5-digit LAWD codes, comma separated (e.g. 11110,11140)
        #[arg(short, long)]
        lawd: String,

        /// First month, YYYYMM
        #[arg(short, long)]
        from: String,

        /// Last month, YYYYMM
        #[arg(short, long)]
        to: String,

        /// Also fetch rent (jeonse/wolse) records
        #[arg(long)]
        rent: bool,

        /// Directory for the CSV; defaults to the configured export dir
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List provinces, or the children of a region code
    Regions {
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Print every month between two YYYYMM values, inclusive
    Months {
        #[arg(short, long)]
        from: String,

        #[arg(short, long)]
        to: String,
    },
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Commands::Tui))
    }
}

/// Headless batch fetch. Progress goes to stderr; returns the CSV path.
pub fn fetch_trades(
    config: Config,
    lawd: &str,
    from: &str,
    to: &str,
    rent: bool,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    let records = Records::from_settings(&config.storage);
    let export_dir = out.unwrap_or_else(|| config.storage.export_dir.clone());
    let write_debug = config.fetch.write_debug_artifacts;
    let session = SessionState::with_records(config, records.clone());

    let form = TradeForm {
        lawd_text: lawd.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        include_rent: rent,
    };
    let request = session.trade_request(&form)?;
    let source = HttpPageSource::new(session.config(), &request.service_key)?;
    let debug_log = if write_debug {
        records.prepare()?;
        Some(records.debug_log())
    } else {
        None
    };

    info!(
        "Fetching {} regions x {} months (rent: {})",
        request.regions.len(),
        request.months.len(),
        request.include_rent
    );
    let handle = spawn_batch_fetch(source, request.clone(), debug_log)?;
    let mut stderr = io::stderr();
    let outcome = loop {
        match handle.next_event() {
            Ok(FetchEvent::Progress { done, total }) => {
                let _ = write!(stderr, "\rProgress: {} / {}", done, total);
                let _ = stderr.flush();
            }
            other => break other,
        }
    };
    eprintln!();
    handle.join();

    let rows = match outcome? {
        FetchEvent::Finished(rows) => rows,
        FetchEvent::Failed(message) => return Err(AppError::message(message)),
        FetchEvent::Cancelled => return Err(AppError::Cancelled),
        FetchEvent::Progress { .. } => return Err(AppError::message("Batch ended without a result")),
    };
    if rows.is_empty() {
        return Err(AppError::message("No trades found for the requested range"));
    }

    let table = TradeTable::new(rows);
    eprintln!("Fetched {} rows", table.total_len());
    export::export_table(&export_dir, &request, &table)
}

/// Region level below `parent`: a 2-digit or shorter code is a province.
pub fn child_level(parent: Option<&str>) -> RegionLevel {
    match parent.map(str::trim) {
        None | Some("") => RegionLevel::Province,
        Some(code) if code.chars().count() <= 2 => RegionLevel::District,
        Some(_) => RegionLevel::Subdistrict,
    }
}

pub fn list_regions(config: &Config, parent: Option<&str>) -> Result<Vec<RegionEntry>> {
    let client = RegionClient::new(config)?;
    let level = child_level(parent);
    let parent = parent.map(|code| level.parent_key(code));
    client.lookup(level, parent.as_deref())
}

pub fn print_regions(entries: &[RegionEntry]) {
    for entry in entries {
        println!("{}\t{}", entry.code(), entry.name);
    }
}

pub fn list_months(from: &str, to: &str) -> Result<Vec<String>> {
    let months = months_between(from, to);
    if months.is_empty() {
        return Err(AppError::missing("--from and --to as valid YYYYMM months"));
    }
    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["kr-data"]).unwrap();
        assert!(cli.is_interactive());
        let cli = Cli::try_parse_from(["kr-data", "--config", "alt.json", "tui"]).unwrap();
        assert!(cli.is_interactive());
        assert_eq!(cli.config, Some(PathBuf::from("alt.json")));
    }

    #[test]
    fn fetch_arguments_parse() {
        let cli = Cli::try_parse_from([
            "kr-data", "fetch", "--lawd", "11110,11140", "--from", "202401", "--to", "202403",
            "--rent",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Fetch {
                lawd,
                from,
                to,
                rent,
                out,
            }) => {
                assert_eq!(lawd, "11110,11140");
                assert_eq!((from.as_str(), to.as_str()), ("202401", "202403"));
                assert!(rent);
                assert!(out.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn parent_code_length_picks_level() {
        assert_eq!(child_level(None), RegionLevel::Province);
        assert_eq!(child_level(Some("11")), RegionLevel::District);
        assert_eq!(child_level(Some("11110")), RegionLevel::Subdistrict);
    }

    #[test]
    fn months_are_inclusive_in_either_order() {
        let forward = list_months("202311", "202402").unwrap();
        assert_eq!(forward, vec!["202311", "202312", "202401", "202402"]);
        assert_eq!(list_months("202402", "202311").unwrap(), forward);
        assert!(matches!(
            list_months("202413", "202401"),
            Err(AppError::MissingInput(_))
        ));
    }

    #[test]
    fn headless_fetch_without_key_fails_before_network() {
        let mut config = Config::builtin();
        config.credentials.data_go_kr_key.clear();
        let dir = tempfile::tempdir().unwrap();
        config.storage.export_dir = dir.path().join("exports");
        config.storage.debug_dir = dir.path().join("debug");
        config.storage.saved_series_dir = dir.path().join("saved");
        let err = fetch_trades(config, "11110", "202401", "202401", false, None).unwrap_err();
        assert!(matches!(err, AppError::MissingInput(_)));
    }
}
