use std::collections::BTreeMap;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, Credentials, StatsEndpoint, StatsEndpoints};
use crate::error::{AppError, Context};

use super::decode::{self, json_rows, value_to_string};
use super::request::{build_client, ensure_key, join_path};
use super::FetchResult;

const ECOS_OK: &str = "INFO-000";
const ECOS_NO_DATA: &str = "INFO-200";
const KOSIS_NO_DATA: &str = "30";
const ECOS_PAGE: &str = "1000";
const ECOS_SERIES_PAGE: &str = "10000";
const XML_ROW_TAGS: &[&str] = &["item", "list", "row"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatsProvider {
    Ecos,
    IndexPortal,
    Kosis,
}

impl StatsProvider {
    pub const ALL: [StatsProvider; 3] = [
        StatsProvider::Ecos,
        StatsProvider::IndexPortal,
        StatsProvider::Kosis,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatsProvider::Ecos => "ECOS (Bank of Korea)",
            StatsProvider::IndexPortal => "e-나라지표",
            StatsProvider::Kosis => "KOSIS",
        }
    }

    pub fn endpoint(self, stats: &StatsEndpoints) -> &StatsEndpoint {
        match self {
            StatsProvider::Ecos => &stats.ecos,
            StatsProvider::IndexPortal => &stats.index_portal,
            StatsProvider::Kosis => &stats.kosis,
        }
    }

    pub fn key(self, credentials: &Credentials) -> &str {
        match self {
            StatsProvider::Ecos => &credentials.ecos_key,
            StatsProvider::IndexPortal => &credentials.index_key,
            StatsProvider::Kosis => &credentials.kosis_key,
        }
    }
}

/// A statistics table (or folder of tables) in a provider catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub code: String,
    pub name: String,
    pub cycle: String,
    pub org: String,
    #[serde(default)]
    pub has_children: bool,
}

/// A detail item inside a statistics table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatItem {
    pub code: String,
    pub name: String,
    pub cycle: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRange {
    pub cycle: String,
    pub start: String,
    pub end: String,
}

impl SeriesRange {
    /// Default range taken from the item's advertised coverage.
    pub fn from_item(item: &StatItem) -> Self {
        Self {
            cycle: item.cycle.clone(),
            start: item.start.clone(),
            end: item.end.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedSeries {
    pub name: String,
    pub unit: String,
    pub points: Vec<SeriesPoint>,
}

impl NamedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

type Row = BTreeMap<String, String>;

/// Read the first non-empty column among `candidates`, falling back to a
/// case-insensitive key match.
fn pick(row: &Row, candidates: &[&str]) -> String {
    for candidate in candidates {
        if let Some(value) = row.get(*candidate).filter(|v| !v.is_empty()) {
            return value.clone();
        }
    }
    for candidate in candidates {
        let lowered = candidate.to_lowercase();
        if let Some((_, value)) = row
            .iter()
            .find(|(key, value)| key.to_lowercase() == lowered && !value.is_empty())
        {
            return value.clone();
        }
    }
    String::new()
}

/// Parse a cell as a number; `-`, blanks and other non-numeric cells give `None`.
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Build series points from flat rows using the provider's time/value columns.
pub fn assemble_points(rows: &[Row], time_column: &str, value_column: &str) -> Vec<SeriesPoint> {
    rows.iter()
        .filter_map(|row| {
            let label = pick(row, &[time_column]);
            let value = parse_value(&pick(row, &[value_column]))?;
            if label.is_empty() {
                return None;
            }
            Some(SeriesPoint { label, value })
        })
        .collect()
}

/// Points from scraped HTML rows: first cell is the time label, last numeric cell the value.
pub fn points_from_html(html: &str) -> Vec<SeriesPoint> {
    decode::scrape_html_table(html)
        .into_iter()
        .filter_map(|cells| {
            let label = cells.first()?.clone();
            let value = cells.iter().skip(1).rev().find_map(|c| parse_value(c))?;
            Some(SeriesPoint { label, value })
        })
        .collect()
}

fn parse_json(body: &str, what: &str) -> FetchResult<Value> {
    let value = serde_json::from_str(body)
        .with_context(|| format!("{} response is not valid JSON", what))?;
    Ok(value)
}

fn ecos_rows(body: &str, path: &str) -> FetchResult<Vec<Row>> {
    let root = parse_json(body, "ECOS")?;
    let result = root
        .get("RESULT")
        .or_else(|| root.get(path).and_then(|v| v.get("RESULT")));
    if let Some(result) = result {
        let code = value_to_string(&result["CODE"]);
        if code == ECOS_NO_DATA {
            return Ok(Vec::new());
        }
        if code != ECOS_OK {
            return Err(AppError::api(code, value_to_string(&result["MESSAGE"])));
        }
    }
    Ok(root[path]["row"]
        .as_array()
        .map(|rows| json_rows(rows))
        .unwrap_or_default())
}

fn kosis_rows(body: &str) -> FetchResult<Vec<Row>> {
    let root = parse_json(body, "KOSIS")?;
    if let Some(err) = root.get("err") {
        let code = value_to_string(err);
        if code == KOSIS_NO_DATA {
            return Ok(Vec::new());
        }
        let message = root.get("errMsg").map(value_to_string).unwrap_or_default();
        return Err(AppError::api(code, message));
    }
    Ok(root.as_array().map(|rows| json_rows(rows)).unwrap_or_default())
}

fn index_rows(body: &str) -> FetchResult<Vec<Row>> {
    let doc = decode::parse_document(body)?;
    let envelope = decode::envelope(&doc);
    if envelope.is_error() {
        return Err(AppError::api(
            envelope.result_code.unwrap_or_default(),
            envelope.result_msg.unwrap_or_default(),
        ));
    }
    Ok(decode::collect_xml_rows(&doc, XML_ROW_TAGS))
}

pub fn parse_catalog(provider: StatsProvider, body: &str, path: &str) -> FetchResult<Vec<StatEntry>> {
    let entries = match provider {
        StatsProvider::Ecos => ecos_rows(body, path)?
            .iter()
            .map(|row| StatEntry {
                code: pick(row, &["STAT_CODE"]),
                name: pick(row, &["STAT_NAME"]),
                cycle: pick(row, &["CYCLE"]),
                org: pick(row, &["ORG_NAME"]),
                has_children: pick(row, &["SRCH_YN"]) == "N",
            })
            .collect::<Vec<_>>(),
        StatsProvider::Kosis => kosis_rows(body)?
            .iter()
            .map(|row| {
                let table = pick(row, &["TBL_ID"]);
                if table.is_empty() {
                    StatEntry {
                        code: pick(row, &["LIST_ID"]),
                        name: pick(row, &["LIST_NM"]),
                        has_children: true,
                        ..StatEntry::default()
                    }
                } else {
                    StatEntry {
                        code: table,
                        name: pick(row, &["TBL_NM"]),
                        cycle: pick(row, &["PRD_SE"]),
                        org: pick(row, &["ORG_ID"]),
                        has_children: false,
                    }
                }
            })
            .collect(),
        StatsProvider::IndexPortal => index_rows(body)?
            .iter()
            .map(|row| StatEntry {
                code: pick(row, &["ixCode", "idntfcId", "statsCode"]),
                name: pick(row, &["ixNm", "statsNm", "name"]),
                cycle: pick(row, &["prdSe", "period"]),
                org: pick(row, &["orgNm", "deptNm"]),
                has_children: false,
            })
            .collect(),
    };
    Ok(entries.into_iter().filter(|e| !e.code.is_empty()).collect())
}

pub fn parse_items(
    provider: StatsProvider,
    body: &str,
    path: &str,
    entry: &StatEntry,
) -> FetchResult<Vec<StatItem>> {
    let items = match provider {
        StatsProvider::Ecos => ecos_rows(body, path)?
            .iter()
            .map(|row| StatItem {
                code: pick(row, &["ITEM_CODE"]),
                name: pick(row, &["ITEM_NAME"]),
                cycle: pick(row, &["CYCLE"]),
                start: pick(row, &["START_TIME"]),
                end: pick(row, &["END_TIME"]),
                unit: pick(row, &["UNIT_NAME"]),
            })
            .collect::<Vec<_>>(),
        StatsProvider::Kosis => {
            let mut seen = Vec::new();
            let mut items = Vec::new();
            for row in kosis_rows(body)? {
                let code = pick(&row, &["ITM_ID"]);
                if code.is_empty() || seen.contains(&code) {
                    continue;
                }
                seen.push(code.clone());
                items.push(StatItem {
                    code,
                    name: pick(&row, &["ITM_NM"]),
                    cycle: entry.cycle.clone(),
                    unit: pick(&row, &["UNIT_NM"]),
                    ..StatItem::default()
                });
            }
            items
        }
        StatsProvider::IndexPortal => index_rows(body)?
            .iter()
            .map(|row| StatItem {
                code: pick(row, &["statsCode", "ixCode"]),
                name: pick(row, &["statsNm", "ixNm"]),
                cycle: pick(row, &["prdSe", "period"]),
                start: pick(row, &["strtPrdDe", "startPeriod"]),
                end: pick(row, &["endPrdDe", "endPeriod"]),
                unit: pick(row, &["unit", "unitNm"]),
            })
            .collect(),
    };
    Ok(items.into_iter().filter(|i| !i.code.is_empty()).collect())
}

/// Decode a series response. The indicator portal falls back to HTML table
/// scraping when its body is not well-formed XML.
pub fn parse_series(
    provider: StatsProvider,
    endpoint: &StatsEndpoint,
    body: &str,
    item: &StatItem,
) -> FetchResult<NamedSeries> {
    let (rows, fallback) = match provider {
        StatsProvider::Ecos => (ecos_rows(body, &endpoint.series_path)?, None),
        StatsProvider::Kosis => {
            let rows = kosis_rows(body)?;
            // Keep the first classification only so each period appears once.
            let first = rows.first().map(|row| pick(row, &["C1"]));
            let rows = rows
                .into_iter()
                .filter(|row| Some(pick(row, &["C1"])) == first)
                .collect();
            (rows, None)
        }
        StatsProvider::IndexPortal => match index_rows(body) {
            Ok(rows) => (rows, None),
            Err(AppError::Xml(err)) => {
                warn!("Indicator detail is not XML ({}), scraping HTML table", err);
                (Vec::new(), Some(points_from_html(body)))
            }
            Err(err) => return Err(err),
        },
    };

    let unit = rows
        .first()
        .map(|row| pick(row, &["UNIT_NAME", "UNIT_NM", "unit"]))
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| item.unit.clone());
    let points = fallback.unwrap_or_else(|| {
        assemble_points(&rows, &endpoint.time_column, &endpoint.value_column)
    });
    debug!("{} series {}: {} points", provider.label(), item.code, points.len());

    Ok(NamedSeries {
        name: item.name.clone(),
        unit,
        points,
    })
}

/// One client for all three statistics portals.
pub struct StatsClient {
    provider: StatsProvider,
    endpoint: StatsEndpoint,
    key: String,
    client: Client,
}

impl StatsClient {
    pub fn new(config: &Config, provider: StatsProvider) -> FetchResult<Self> {
        let key = ensure_key(provider.key(&config.credentials), provider.label())?.to_string();
        let client = build_client(config.fetch.lookup_timeout(), &BTreeMap::new())?;
        Ok(Self {
            provider,
            endpoint: provider.endpoint(&config.stats).clone(),
            key,
            client,
        })
    }

    pub fn provider(&self) -> StatsProvider {
        self.provider
    }

    /// Top-level catalog, or the children of a folder entry.
    pub fn catalog(&self, parent: Option<&StatEntry>) -> FetchResult<Vec<StatEntry>> {
        let path = &self.endpoint.catalog_path;
        let body = match self.provider {
            StatsProvider::Ecos => {
                let mut segments = self.ecos_prefix(path, ECOS_PAGE);
                if let Some(parent) = parent {
                    segments.push(parent.code.clone());
                }
                self.get(&self.ecos_url(&segments), &[])?
            }
            StatsProvider::Kosis => {
                let mut query = self.kosis_query("getList");
                query.push(("vwCd".to_string(), "MT_ZTITLE".to_string()));
                query.push((
                    "parentListId".to_string(),
                    parent.map(|p| p.code.clone()).unwrap_or_default(),
                ));
                self.get(&self.url(path), &query)?
            }
            StatsProvider::IndexPortal => {
                self.get(&self.url(path), &[("userId".to_string(), self.key.clone())])?
            }
        };
        parse_catalog(self.provider, &body, path)
    }

    pub fn items(&self, entry: &StatEntry) -> FetchResult<Vec<StatItem>> {
        let path = &self.endpoint.items_path;
        let body = match self.provider {
            StatsProvider::Ecos => {
                let mut segments = self.ecos_prefix(path, ECOS_PAGE);
                segments.push(entry.code.clone());
                self.get(&self.ecos_url(&segments), &[])?
            }
            StatsProvider::Kosis => {
                let mut query = self.kosis_query("getMeta");
                query.push(("type".to_string(), "ITM".to_string()));
                query.push(("orgId".to_string(), entry.org.clone()));
                query.push(("tblId".to_string(), entry.code.clone()));
                self.get(&self.url(path), &query)?
            }
            StatsProvider::IndexPortal => self.get(
                &self.url(path),
                &[
                    ("userId".to_string(), self.key.clone()),
                    ("ixCode".to_string(), entry.code.clone()),
                ],
            )?,
        };
        parse_items(self.provider, &body, path, entry)
    }

    pub fn series(
        &self,
        entry: &StatEntry,
        item: &StatItem,
        range: &SeriesRange,
    ) -> FetchResult<NamedSeries> {
        let path = &self.endpoint.series_path;
        let body = match self.provider {
            StatsProvider::Ecos => {
                let mut segments = self.ecos_prefix(path, ECOS_SERIES_PAGE);
                segments.extend([
                    entry.code.clone(),
                    range.cycle.clone(),
                    range.start.clone(),
                    range.end.clone(),
                    item.code.clone(),
                ]);
                self.get(&self.ecos_url(&segments), &[])?
            }
            StatsProvider::Kosis => {
                let mut query = self.kosis_query("getList");
                query.extend([
                    ("orgId".to_string(), entry.org.clone()),
                    ("tblId".to_string(), entry.code.clone()),
                    ("itmId".to_string(), item.code.clone()),
                    ("objL1".to_string(), "ALL".to_string()),
                    ("prdSe".to_string(), range.cycle.clone()),
                    ("startPrdDe".to_string(), range.start.clone()),
                    ("endPrdDe".to_string(), range.end.clone()),
                ]);
                self.get(&self.url(path), &query)?
            }
            StatsProvider::IndexPortal => self.get(
                &self.url(path),
                &[
                    ("userId".to_string(), self.key.clone()),
                    ("ixCode".to_string(), entry.code.clone()),
                    ("statsCode".to_string(), item.code.clone()),
                    ("period".to_string(), format!("{}:{}", range.start, range.end)),
                ],
            )?,
        };
        parse_series(self.provider, &self.endpoint, &body, item)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.base_url.trim_end_matches('/'), path)
    }

    fn ecos_prefix(&self, path: &str, rows: &str) -> Vec<String> {
        [path, self.key.as_str(), "json", "kr", "1", rows]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn ecos_url(&self, segments: &[String]) -> String {
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        join_path(&self.endpoint.base_url, &refs)
    }

    fn kosis_query(&self, method: &str) -> Vec<(String, String)> {
        vec![
            ("method".to_string(), method.to_string()),
            ("apiKey".to_string(), self.key.clone()),
            ("format".to_string(), "json".to_string()),
            ("jsonVD".to_string(), "Y".to_string()),
        ]
    }

    fn get(&self, url: &str, query: &[(String, String)]) -> FetchResult<String> {
        let body = self
            .client
            .get(url)
            .query(query)
            .send()
            .with_context(|| format!("{} request failed", self.provider.label()))?
            .error_for_status()
            .with_context(|| format!("{} returned error status", self.provider.label()))?
            .text()
            .with_context(|| format!("Failed to read {} response", self.provider.label()))?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_body_is_an_error() {
        let err = ecos_rows("<html>maintenance</html>", "StatisticSearch").unwrap_err();
        assert!(err.to_string().contains("ECOS response is not valid JSON"));
        assert_eq!(parse_json(r#"{"a":1}"#, "KOSIS").unwrap()["a"], 1);
    }

    fn item(name: &str) -> StatItem {
        StatItem {
            code: "X".to_string(),
            name: name.to_string(),
            ..StatItem::default()
        }
    }

    #[test]
    fn ecos_series_uses_time_and_value_columns() {
        let body = r#"{"StatisticSearch":{"list_total_count":3,"row":[
            {"TIME":"202401","DATA_VALUE":"3.5","UNIT_NAME":"%"},
            {"TIME":"202402","DATA_VALUE":"-"},
            {"TIME":"202403","DATA_VALUE":"1,234.5"}
        ]}}"#;
        let config = Config::builtin();
        let series =
            parse_series(StatsProvider::Ecos, &config.stats.ecos, body, &item("기준금리")).unwrap();
        assert_eq!(series.unit, "%");
        assert_eq!(
            series.points,
            vec![
                SeriesPoint { label: "202401".into(), value: 3.5 },
                SeriesPoint { label: "202403".into(), value: 1234.5 },
            ]
        );
    }

    #[test]
    fn ecos_no_data_is_empty_and_errors_are_api() {
        let config = Config::builtin();
        let empty = r#"{"RESULT":{"CODE":"INFO-200","MESSAGE":"해당하는 데이터가 없습니다."}}"#;
        let series = parse_series(StatsProvider::Ecos, &config.stats.ecos, empty, &item("a")).unwrap();
        assert!(series.is_empty());

        let bad = r#"{"RESULT":{"CODE":"INFO-100","MESSAGE":"인증키가 유효하지 않습니다."}}"#;
        assert!(matches!(
            parse_catalog(StatsProvider::Ecos, bad, "StatisticTableList"),
            Err(AppError::Api { code, .. }) if code == "INFO-100"
        ));
    }

    #[test]
    fn ecos_catalog_marks_folders() {
        let body = r#"{"StatisticTableList":{"row":[
            {"STAT_CODE":"0000000001","STAT_NAME":"1. 통화","CYCLE":null,"SRCH_YN":"N","ORG_NAME":null},
            {"STAT_CODE":"722Y001","STAT_NAME":"기준금리","CYCLE":"M","SRCH_YN":"Y","ORG_NAME":"한국은행"}
        ]}}"#;
        let entries = parse_catalog(StatsProvider::Ecos, body, "StatisticTableList").unwrap();
        assert!(entries[0].has_children);
        assert_eq!(entries[1].org, "한국은행");
        assert_eq!(entries[1].cycle, "M");
    }

    #[test]
    fn kosis_error_field_becomes_api_error() {
        let body = r#"{"err":"20","errMsg":"필수요청변수값이 누락되었습니다."}"#;
        assert!(matches!(
            parse_catalog(StatsProvider::Kosis, body, "statisticsList.do"),
            Err(AppError::Api { code, .. }) if code == "20"
        ));
    }

    #[test]
    fn kosis_items_are_deduplicated_and_series_keeps_first_class() {
        let entry = StatEntry {
            code: "DT_1".into(),
            cycle: "M".into(),
            ..StatEntry::default()
        };
        let meta = r#"[{"ITM_ID":"T1","ITM_NM":"지수"},{"ITM_ID":"T1","ITM_NM":"지수"},{"ITM_ID":"T2","ITM_NM":"증감률"}]"#;
        let items = parse_items(StatsProvider::Kosis, meta, "statisticsData.do", &entry).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].cycle, "M");

        let data = r#"[
            {"PRD_DE":"202401","DT":"101.2","C1":"0","UNIT_NM":"2020=100"},
            {"PRD_DE":"202401","DT":"99.0","C1":"1"},
            {"PRD_DE":"202402","DT":"101.9","C1":"0"}
        ]"#;
        let config = Config::builtin();
        let series = parse_series(StatsProvider::Kosis, &config.stats.kosis, data, &items[0]).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.unit, "2020=100");
    }

    #[test]
    fn index_portal_falls_back_to_html_table() {
        let html = "<html><body><table><tr><th>연도</th><th>실업률</th></tr>\
                    <tr><td>2022</td><td>2.9</td></tr><tr><td>2023</td><td>2.7</td></tr>\
                    </table><br></body></html>";
        let config = Config::builtin();
        let series =
            parse_series(StatsProvider::IndexPortal, &config.stats.index_portal, html, &item("실업률"))
                .unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[1].label, "2023");
        assert_eq!(series.points[1].value, 2.7);
    }

    #[test]
    fn index_portal_xml_rows() {
        let xml = "<response><list><row><prdDe>2021</prdDe><value>3.0</value></row>\
                   <row><prdDe>2022</prdDe><value>2.9</value></row></list></response>";
        let config = Config::builtin();
        let series =
            parse_series(StatsProvider::IndexPortal, &config.stats.index_portal, xml, &item("a"))
                .unwrap();
        assert_eq!(series.points.len(), 2);
    }

    #[test]
    fn non_numeric_values_are_skipped() {
        assert_eq!(parse_value(" 1,000 "), Some(1000.0));
        assert_eq!(parse_value("-"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("NaN"), None);
    }
}
