use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::{Config, RegionEndpoints};
use crate::error::Context;

use super::decode::collect_pairs;
use super::normalize::lawd_key;
use super::request::{build_client, ensure_key};
use super::FetchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionLevel {
    Province,
    District,
    Subdistrict,
}

impl RegionLevel {
    pub fn label(self) -> &'static str {
        match self {
            RegionLevel::Province => "시/도",
            RegionLevel::District => "시/군/구",
            RegionLevel::Subdistrict => "읍/면/동",
        }
    }

    pub fn child(self) -> Option<RegionLevel> {
        match self {
            RegionLevel::Province => Some(RegionLevel::District),
            RegionLevel::District => Some(RegionLevel::Subdistrict),
            RegionLevel::Subdistrict => None,
        }
    }

    /// Cache key for entries of this level below `parent_code`. Districts are
    /// keyed by the 2-digit province prefix, as the lookup API expects.
    pub fn parent_key(self, parent_code: &str) -> String {
        match self {
            RegionLevel::District => parent_code.trim().chars().take(2).collect(),
            _ => parent_code.trim().to_string(),
        }
    }

    fn name_keys(self) -> &'static [&'static str] {
        match self {
            RegionLevel::Province => &["admCodeNm"],
            RegionLevel::District | RegionLevel::Subdistrict => &["lowestAdmCodeNm", "admCodeNm"],
        }
    }
}

/// A region name with every code the lookup returned for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    pub name: String,
    pub codes: Vec<String>,
}

impl RegionEntry {
    /// The code used for queries; the first one returned.
    pub fn code(&self) -> &str {
        self.codes.first().map(String::as_str).unwrap_or_default()
    }
}

/// Parse an administrative-code response into sorted name → codes entries.
pub fn parse_regions(level: RegionLevel, body: &str) -> FetchResult<Vec<RegionEntry>> {
    let root: Value = serde_json::from_str(body)
        .with_context(|| format!("{} lookup response is not valid JSON", level.label()))?;
    Ok(group_entries(collect_pairs(&root, "admCode", level.name_keys())))
}

fn group_entries(pairs: Vec<(String, String)>) -> Vec<RegionEntry> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, code) in pairs {
        if name.is_empty() {
            continue;
        }
        grouped.entry(name).or_default().push(code);
    }
    grouped
        .into_iter()
        .map(|(name, codes)| RegionEntry { name, codes })
        .collect()
}

/// Lookup seam between the catalog and the administrative-code API.
pub trait RegionSource {
    fn lookup(&self, level: RegionLevel, parent: Option<&str>) -> FetchResult<Vec<RegionEntry>>;
}

pub struct RegionClient {
    client: Client,
    endpoints: RegionEndpoints,
    key: String,
}

impl RegionClient {
    pub fn new(config: &Config) -> FetchResult<Self> {
        let key = ensure_key(&config.credentials.vworld_key, "Region API key")?.to_string();
        let client = build_client(config.fetch.lookup_timeout(), &BTreeMap::new())?;
        Ok(Self {
            client,
            endpoints: config.regions.clone(),
            key,
        })
    }

    pub fn provinces(&self) -> FetchResult<Vec<RegionEntry>> {
        self.request(RegionLevel::Province, &self.endpoints.provinces, None)
    }

    /// Districts of a province; the API wants the 2-digit province prefix.
    pub fn districts(&self, province_code: &str) -> FetchResult<Vec<RegionEntry>> {
        let prefix: String = province_code.trim().chars().take(2).collect();
        self.request(RegionLevel::District, &self.endpoints.districts, Some(&prefix))
    }

    pub fn subdistricts(&self, district_code: &str) -> FetchResult<Vec<RegionEntry>> {
        self.request(
            RegionLevel::Subdistrict,
            &self.endpoints.subdistricts,
            Some(district_code.trim()),
        )
    }

    fn request(
        &self,
        level: RegionLevel,
        endpoint: &str,
        adm_code: Option<&str>,
    ) -> FetchResult<Vec<RegionEntry>> {
        let mut query = vec![
            ("key".to_string(), self.key.clone()),
            ("format".to_string(), "json".to_string()),
            ("numOfRows".to_string(), self.endpoints.page_rows.to_string()),
            ("pageNo".to_string(), "1".to_string()),
        ];
        if let Some(code) = adm_code {
            query.push(("admCode".to_string(), code.to_string()));
        }

        let body = self
            .client
            .get(endpoint)
            .query(&query)
            .send()
            .with_context(|| format!("{} lookup request failed", level.label()))?
            .error_for_status()
            .with_context(|| format!("{} lookup returned error status", level.label()))?
            .text()
            .with_context(|| format!("Failed to read {} lookup body", level.label()))?;

        let entries = parse_regions(level, &body)?;
        debug!("{} lookup returned {} names", level.label(), entries.len());
        Ok(entries)
    }
}

impl RegionSource for RegionClient {
    fn lookup(&self, level: RegionLevel, parent: Option<&str>) -> FetchResult<Vec<RegionEntry>> {
        match (level, parent) {
            (RegionLevel::Province, _) => self.provinces(),
            (RegionLevel::District, Some(code)) => self.districts(code),
            (RegionLevel::Subdistrict, Some(code)) => self.subdistricts(code),
            (_, None) => Ok(Vec::new()),
        }
    }
}

/// Session cache of region lookups, keyed by level and parent code.
#[derive(Debug, Default)]
pub struct RegionCatalog {
    cache: HashMap<(RegionLevel, String), Vec<RegionEntry>>,
}

impl RegionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, level: RegionLevel, parent: Option<&str>) -> Option<&[RegionEntry]> {
        self.cache
            .get(&(level, parent.unwrap_or_default().to_string()))
            .map(Vec::as_slice)
    }

    pub fn insert(&mut self, level: RegionLevel, parent: Option<&str>, entries: Vec<RegionEntry>) {
        self.cache
            .insert((level, parent.unwrap_or_default().to_string()), entries);
    }

    /// Return cached entries, asking `source` only on the first request.
    pub fn load(
        &mut self,
        source: &dyn RegionSource,
        level: RegionLevel,
        parent: Option<&str>,
    ) -> FetchResult<&[RegionEntry]> {
        let key = (level, parent.unwrap_or_default().to_string());
        if !self.cache.contains_key(&key) {
            let entries = source.lookup(level, parent)?;
            info!("Cached {} {} entries", entries.len(), level.label());
            self.cache.insert(key.clone(), entries);
        }
        Ok(self.cache.get(&key).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// The cascading selection made in the region picker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSelection {
    pub province: Option<RegionEntry>,
    pub district: Option<RegionEntry>,
    pub subdistrict: Option<RegionEntry>,
}

impl RegionSelection {
    pub fn is_empty(&self) -> bool {
        self.province.is_none() && self.district.is_none() && self.subdistrict.is_none()
    }

    pub fn select(&mut self, level: RegionLevel, entry: RegionEntry) {
        match level {
            RegionLevel::Province => {
                self.province = Some(entry);
                self.district = None;
                self.subdistrict = None;
            }
            RegionLevel::District => {
                self.district = Some(entry);
                self.subdistrict = None;
            }
            RegionLevel::Subdistrict => self.subdistrict = Some(entry),
        }
    }

    pub fn describe(&self) -> String {
        let parts: Vec<&str> = [&self.province, &self.district, &self.subdistrict]
            .into_iter()
            .flatten()
            .map(|entry| entry.name.as_str())
            .collect();
        if parts.is_empty() {
            "(none)".to_string()
        } else {
            parts.join(" > ")
        }
    }

    /// LAWD keys for a trade query. The most specific level wins; a province
    /// alone expands to every cached district beneath it.
    pub fn lawd_keys(&self, catalog: &RegionCatalog) -> Vec<String> {
        if let Some(entry) = self.subdistrict.as_ref().or(self.district.as_ref()) {
            return lawd_key(entry.code()).into_iter().collect();
        }

        let Some(province) = &self.province else {
            return Vec::new();
        };
        let prefix = RegionLevel::District.parent_key(province.code());
        let mut keys: Vec<String> = Vec::new();
        for district in catalog
            .cached(RegionLevel::District, Some(&prefix))
            .unwrap_or_default()
        {
            if let Some(key) = lawd_key(district.code()) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    const DISTRICTS: &str = r#"{"admVOList":{"admVOList":[
        {"admCode":"11140","lowestAdmCodeNm":"중구","admCodeNm":"서울특별시 중구"},
        {"admCode":"11110","lowestAdmCodeNm":"종로구","admCodeNm":"서울특별시 종로구"},
        {"admCode":"11111","lowestAdmCodeNm":"종로구"}
    ]}}"#;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl RegionSource for CountingSource {
        fn lookup(&self, level: RegionLevel, _: Option<&str>) -> FetchResult<Vec<RegionEntry>> {
            self.calls.set(self.calls.get() + 1);
            parse_regions(level, DISTRICTS)
        }
    }

    fn entry(name: &str, code: &str) -> RegionEntry {
        RegionEntry {
            name: name.to_string(),
            codes: vec![code.to_string()],
        }
    }

    #[test]
    fn groups_names_sorted_with_first_code_used() {
        let entries = parse_regions(RegionLevel::District, DISTRICTS).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["종로구", "중구"]);
        assert_eq!(entries[0].codes, vec!["11110", "11111"]);
        assert_eq!(entries[0].code(), "11110");
    }

    #[test]
    fn province_level_requires_adm_code_name() {
        let body = r#"[{"admCode":"11","admCodeNm":"서울특별시"},{"admCode":"26","lowestAdmCodeNm":"x"}]"#;
        let entries = parse_regions(RegionLevel::Province, body).unwrap();
        assert_eq!(entries, vec![entry("서울특별시", "11")]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_regions(RegionLevel::Province, "<html>").is_err());
    }

    #[test]
    fn catalog_queries_source_once_per_parent() {
        let source = CountingSource { calls: Cell::new(0) };
        let mut catalog = RegionCatalog::new();
        catalog.load(&source, RegionLevel::District, Some("11")).unwrap();
        let cached = catalog.load(&source, RegionLevel::District, Some("11")).unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn most_specific_level_wins() {
        let catalog = RegionCatalog::new();
        let mut selection = RegionSelection::default();
        selection.select(RegionLevel::Province, entry("서울특별시", "11"));
        selection.select(RegionLevel::District, entry("종로구", "11110"));
        assert_eq!(selection.lawd_keys(&catalog), vec!["11110"]);

        selection.select(RegionLevel::Subdistrict, entry("사직동", "1111010100"));
        assert_eq!(selection.lawd_keys(&catalog), vec!["11110"]);
        assert_eq!(selection.describe(), "서울특별시 > 종로구 > 사직동");
    }

    #[test]
    fn province_alone_expands_to_cached_districts() {
        let mut catalog = RegionCatalog::new();
        catalog.insert(
            RegionLevel::District,
            Some("11"),
            parse_regions(RegionLevel::District, DISTRICTS).unwrap(),
        );
        let mut selection = RegionSelection::default();
        selection.select(RegionLevel::Province, entry("서울특별시", "11"));
        assert_eq!(selection.lawd_keys(&catalog), vec!["11110", "11140"]);

        // Re-selecting the province clears the lower levels.
        selection.select(RegionLevel::District, entry("종로구", "11110"));
        selection.select(RegionLevel::Province, entry("부산광역시", "26"));
        assert!(selection.district.is_none());
        assert!(selection.lawd_keys(&catalog).is_empty());
    }
}
