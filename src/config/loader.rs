use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{Context, Result};
use crate::fetch::request::expand_env_vars;

use super::{validator, Config, StatsEndpoint};

/// Default override file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kr-data.json";

/// Build the effective configuration: built-in defaults, optional JSON overrides,
/// then `${VAR}` expansion of credentials and validation.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::builtin();

    let candidate = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if candidate.exists() {
        let json = fs::read_to_string(&candidate)
            .with_context(|| format!("failed to read config file {}", candidate.display()))?;
        let raw: RawConfig = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config file {}", candidate.display()))?;
        raw.apply(&mut config);
        debug!("Applied configuration overrides from {}", candidate.display());
    } else if path.is_some() {
        warn!(
            "Config file {} not found; using built-in defaults",
            candidate.display()
        );
    }

    resolve_credentials(&mut config);
    validator::validate_config(&config)?;
    Ok(config)
}

fn resolve_credentials(config: &mut Config) {
    let creds = &mut config.credentials;
    for (label, value) in [
        ("vworld_key", &mut creds.vworld_key),
        ("data_go_kr_key", &mut creds.data_go_kr_key),
        ("ecos_key", &mut creds.ecos_key),
        ("index_key", &mut creds.index_key),
        ("kosis_key", &mut creds.kosis_key),
    ] {
        *value = match expand_env_vars(value) {
            Ok(expanded) => expanded.trim().to_string(),
            Err(err) => {
                debug!("Credential {label} left empty: {err}");
                String::new()
            }
        };
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    credentials: RawCredentials,
    regions: RawRegionEndpoints,
    trades: RawTradeEndpoints,
    stats: RawStatsEndpoints,
    fetch: RawFetchSettings,
    storage: RawStorageSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCredentials {
    vworld_key: Option<String>,
    data_go_kr_key: Option<String>,
    ecos_key: Option<String>,
    index_key: Option<String>,
    kosis_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRegionEndpoints {
    provinces: Option<String>,
    districts: Option<String>,
    subdistricts: Option<String>,
    page_rows: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTradeEndpoints {
    trade: Option<String>,
    rent: Option<String>,
    page_size: Option<usize>,
    headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStatsEndpoints {
    ecos: Option<StatsEndpoint>,
    index_portal: Option<StatsEndpoint>,
    kosis: Option<StatsEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFetchSettings {
    lookup_timeout_secs: Option<u64>,
    page_timeout_secs: Option<u64>,
    write_debug_artifacts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStorageSettings {
    export_dir: Option<PathBuf>,
    debug_dir: Option<PathBuf>,
    saved_series_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl RawConfig {
    fn apply(self, config: &mut Config) {
        let creds = &mut config.credentials;
        merge(&mut creds.vworld_key, self.credentials.vworld_key);
        merge(&mut creds.data_go_kr_key, self.credentials.data_go_kr_key);
        merge(&mut creds.ecos_key, self.credentials.ecos_key);
        merge(&mut creds.index_key, self.credentials.index_key);
        merge(&mut creds.kosis_key, self.credentials.kosis_key);

        let regions = &mut config.regions;
        merge(&mut regions.provinces, self.regions.provinces);
        merge(&mut regions.districts, self.regions.districts);
        merge(&mut regions.subdistricts, self.regions.subdistricts);
        merge(&mut regions.page_rows, self.regions.page_rows);

        let trades = &mut config.trades;
        merge(&mut trades.trade, self.trades.trade);
        merge(&mut trades.rent, self.trades.rent);
        merge(&mut trades.page_size, self.trades.page_size);
        if let Some(headers) = self.trades.headers {
            trades.headers.extend(headers);
        }

        merge(&mut config.stats.ecos, self.stats.ecos);
        merge(&mut config.stats.index_portal, self.stats.index_portal);
        merge(&mut config.stats.kosis, self.stats.kosis);

        let fetch = &mut config.fetch;
        merge(&mut fetch.lookup_timeout_secs, self.fetch.lookup_timeout_secs);
        merge(&mut fetch.page_timeout_secs, self.fetch.page_timeout_secs);
        merge(
            &mut fetch.write_debug_artifacts,
            self.fetch.write_debug_artifacts,
        );

        let storage = &mut config.storage;
        merge(&mut storage.export_dir, self.storage.export_dir);
        merge(&mut storage.debug_dir, self.storage.debug_dir);
        merge(&mut storage.saved_series_dir, self.storage.saved_series_dir);
        merge(&mut storage.log_dir, self.storage.log_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kr-data.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "credentials": {{ "data_go_kr_key": "abc%2Bdef" }},
                "trades": {{ "page_size": 500 }},
                "fetch": {{ "write_debug_artifacts": false }}
            }}"#
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.credentials.data_go_kr_key, "abc%2Bdef");
        assert_eq!(config.trades.page_size, 500);
        assert!(!config.fetch.write_debug_artifacts);
        assert_eq!(config.regions.page_rows, 200);
        assert!(config.trades.trade.contains("RTMSDataSvcAptTrade"));
    }

    #[test]
    fn unset_env_placeholder_becomes_empty_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kr-data.json");
        fs::write(
            &path,
            r#"{ "credentials": { "ecos_key": "${KR_DATA_TEST_SURELY_UNSET_VAR}" } }"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.credentials.ecos_key.is_empty());
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kr-data.json");
        fs::write(&path, r#"{ "trades": { "page_size": 0, "trade": "" } }"#).unwrap();

        let err = load_config(Some(&path)).unwrap_err().to_string();
        assert!(err.contains("page_size"));
        assert!(err.contains("trades.trade"));
    }
}
