use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod loader;
pub mod validator;

pub use loader::load_config;

/// Number of rows requested per trade page; a full page triggers the next one.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Access keys for the upstream portals. Values may still contain `${VAR}` until loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub vworld_key: String,
    pub data_go_kr_key: String,
    pub ecos_key: String,
    pub index_key: String,
    pub kosis_key: String,
}

/// Administrative-code lookup endpoints (vworld).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEndpoints {
    pub provinces: String,
    pub districts: String,
    pub subdistricts: String,
    pub page_rows: usize,
}

/// Apartment trade/rent endpoints (data.go.kr).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEndpoints {
    pub trade: String,
    pub rent: String,
    pub page_size: usize,
    pub headers: BTreeMap<String, String>,
}

/// Column conventions and base URLs for one statistics provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsEndpoint {
    pub base_url: String,
    pub catalog_path: String,
    pub items_path: String,
    pub series_path: String,
    pub time_column: String,
    pub value_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsEndpoints {
    pub ecos: StatsEndpoint,
    pub index_portal: StatsEndpoint,
    pub kosis: StatsEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    pub lookup_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub write_debug_artifacts: bool,
}

impl FetchSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub export_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub saved_series_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub regions: RegionEndpoints,
    pub trades: TradeEndpoints,
    pub stats: StatsEndpoints,
    pub fetch: FetchSettings,
    pub storage: StorageSettings,
}

impl Config {
    pub fn builtin() -> Self {
        let headers = BTreeMap::from([
            ("User-Agent".to_string(), BROWSER_USER_AGENT.to_string()),
            (
                "Accept".to_string(),
                "application/xml, text/xml, */*;q=0.01".to_string(),
            ),
        ]);

        Config {
            credentials: Credentials {
                vworld_key: "${VWORLD_KEY}".to_string(),
                data_go_kr_key: "${DATA_GO_KR_KEY}".to_string(),
                ecos_key: "${ECOS_KEY}".to_string(),
                index_key: "${INDEX_KEY}".to_string(),
                kosis_key: "${KOSIS_KEY}".to_string(),
            },
            regions: RegionEndpoints {
                provinces: "http://api.vworld.kr/ned/data/admCodeList".to_string(),
                districts: "http://api.vworld.kr/ned/data/admSiList".to_string(),
                subdistricts: "http://api.vworld.kr/ned/data/admDongList".to_string(),
                page_rows: 200,
            },
            trades: TradeEndpoints {
                trade: "https://apis.data.go.kr/1613000/RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade"
                    .to_string(),
                rent: "https://apis.data.go.kr/1613000/RTMSDataSvcAptRent/getRTMSDataSvcAptRent"
                    .to_string(),
                page_size: DEFAULT_PAGE_SIZE,
                headers,
            },
            stats: StatsEndpoints {
                ecos: StatsEndpoint {
                    base_url: "https://ecos.bok.or.kr/api".to_string(),
                    catalog_path: "StatisticTableList".to_string(),
                    items_path: "StatisticItemList".to_string(),
                    series_path: "StatisticSearch".to_string(),
                    time_column: "TIME".to_string(),
                    value_column: "DATA_VALUE".to_string(),
                },
                index_portal: StatsEndpoint {
                    base_url: "https://www.index.go.kr/unity/openApi".to_string(),
                    catalog_path: "sttsIxList.do".to_string(),
                    items_path: "sttsIxInfo.do".to_string(),
                    series_path: "sttsIxData.do".to_string(),
                    time_column: "prdDe".to_string(),
                    value_column: "value".to_string(),
                },
                kosis: StatsEndpoint {
                    base_url: "https://kosis.kr/openapi".to_string(),
                    catalog_path: "statisticsList.do".to_string(),
                    items_path: "statisticsData.do".to_string(),
                    series_path: "Param/statisticsParameterData.do".to_string(),
                    time_column: "PRD_DE".to_string(),
                    value_column: "DT".to_string(),
                },
            },
            fetch: FetchSettings {
                lookup_timeout_secs: 10,
                page_timeout_secs: 30,
                write_debug_artifacts: true,
            },
            storage: StorageSettings {
                export_dir: PathBuf::from("exports"),
                debug_dir: PathBuf::from("debug_logs"),
                saved_series_dir: PathBuf::from("saved_series"),
                log_dir: PathBuf::from("logs"),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}
