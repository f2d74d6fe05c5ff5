use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetch::normalize::{months_between, parse_lawd_list};
use crate::fetch::{BatchRequest, NamedSeries, RegionCatalog, RegionSelection, TradeRecord};
use crate::records::{Records, SeriesShelf, TradeTable};
use crate::utils::current_year_month;

/// Fields of the trade search form, kept between visits to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeForm {
    /// Explicit LAWD codes; when blank the region selection is used.
    pub lawd_text: String,
    pub from: String,
    pub to: String,
    pub include_rent: bool,
}

impl Default for TradeForm {
    fn default() -> Self {
        let month = current_year_month();
        Self {
            lawd_text: String::new(),
            from: month.clone(),
            to: month,
            include_rent: false,
        }
    }
}

/// What happened to the results table after a batch finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Replaced(usize),
    Empty,
}

/// Session-wide data shared by every TUI flow.
pub struct SessionState {
    config: Config,
    records: Records,
    catalog: RegionCatalog,
    selection: RegionSelection,
    form: TradeForm,
    table: Option<TradeTable>,
    query: Option<BatchRequest>,
    shelf: SeriesShelf,
    chart_series: Vec<NamedSeries>,
    active_job: Option<String>,
}

impl SessionState {
    /// Build the session and make sure the storage directories exist.
    pub fn new(config: Config) -> Result<Self> {
        let records = Records::from_settings(&config.storage);
        records.prepare()?;
        Ok(Self::with_records(config, records))
    }

    pub fn with_records(config: Config, records: Records) -> Self {
        Self {
            config,
            records,
            catalog: RegionCatalog::new(),
            selection: RegionSelection::default(),
            form: TradeForm::default(),
            table: None,
            query: None,
            shelf: SeriesShelf::new(),
            chart_series: Vec::new(),
            active_job: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// Catalog and selection together, as the region picker edits both.
    pub fn regions_mut(&mut self) -> (&mut RegionCatalog, &mut RegionSelection) {
        (&mut self.catalog, &mut self.selection)
    }

    pub fn selection(&self) -> &RegionSelection {
        &self.selection
    }

    pub fn form(&self) -> &TradeForm {
        &self.form
    }

    pub fn set_form(&mut self, form: TradeForm) {
        self.form = form;
    }

    /// Turn a form into a validated batch request without touching the network.
    pub fn trade_request(&self, form: &TradeForm) -> Result<BatchRequest> {
        let key = self.config.credentials.data_go_kr_key.trim();
        if key.is_empty() {
            return Err(AppError::missing("data.go.kr service key"));
        }

        let regions = if form.lawd_text.trim().is_empty() {
            self.selection.lawd_keys(&self.catalog)
        } else {
            parse_lawd_list(&form.lawd_text)
        };
        if regions.is_empty() {
            return Err(AppError::missing(
                "select a region or enter 5-digit LAWD codes",
            ));
        }

        let months = months_between(&form.from, &form.to);
        if months.is_empty() {
            return Err(AppError::missing("a valid YYYYMM month range"));
        }

        Ok(BatchRequest::new(regions, months, key)
            .with_rent(form.include_rent)
            .with_page_size(self.config.trades.page_size))
    }

    pub fn table(&self) -> Option<&TradeTable> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut TradeTable> {
        self.table.as_mut()
    }

    pub fn query(&self) -> Option<&BatchRequest> {
        self.query.as_ref()
    }

    /// Replace the table with fresh rows. An empty result keeps the previous table.
    pub fn apply_results(&mut self, request: BatchRequest, rows: Vec<TradeRecord>) -> ApplyOutcome {
        if rows.is_empty() {
            return ApplyOutcome::Empty;
        }
        let count = rows.len();
        self.table = Some(TradeTable::new(rows));
        self.query = Some(request);
        ApplyOutcome::Replaced(count)
    }

    pub fn shelf(&self) -> &SeriesShelf {
        &self.shelf
    }

    pub fn shelf_mut(&mut self) -> &mut SeriesShelf {
        &mut self.shelf
    }

    pub fn chart_series(&self) -> &[NamedSeries] {
        &self.chart_series
    }

    /// Add a series to the chart, replacing one with the same name.
    pub fn push_chart_series(&mut self, series: NamedSeries) {
        self.chart_series.retain(|existing| existing.name != series.name);
        self.chart_series.push(series);
    }

    pub fn clear_chart(&mut self) {
        self.chart_series.clear();
    }

    pub fn active_job(&self) -> Option<&str> {
        self.active_job.as_deref()
    }

    /// Claim the single job slot; fails while another job is running.
    pub fn begin_job(&mut self, label: &str) -> Result<()> {
        if self.active_job.is_some() {
            return Err(AppError::JobInProgress);
        }
        self.active_job = Some(label.to_string());
        Ok(())
    }

    pub fn end_job(&mut self) {
        self.active_job = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{RegionEntry, RegionLevel, SaleRecord, SeriesPoint};

    fn session(key: &str) -> (tempfile::TempDir, SessionState) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::builtin();
        config.credentials.data_go_kr_key = key.to_string();
        let records = Records::with_dirs(
            dir.path().join("exports"),
            dir.path().join("debug"),
            dir.path().join("saved"),
        );
        (dir, SessionState::with_records(config, records))
    }

    fn form(lawd: &str, from: &str, to: &str) -> TradeForm {
        TradeForm {
            lawd_text: lawd.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            include_rent: true,
        }
    }

    fn row(name: &str) -> TradeRecord {
        TradeRecord::Sale(SaleRecord {
            apartment: name.to_string(),
            contract_date: "2024-01-05".to_string(),
            ..SaleRecord::default()
        })
    }

    #[test]
    fn trade_request_uses_typed_codes_and_month_range() {
        let (_dir, state) = session("abc%2B1");
        let request = state
            .trade_request(&form("11110, 11140", "202403", "202401"))
            .unwrap();
        assert_eq!(request.regions, vec!["11110", "11140"]);
        assert_eq!(request.months, vec!["202401", "202402", "202403"]);
        assert!(request.include_rent);
        assert_eq!(request.service_key, "abc%2B1");
    }

    #[test]
    fn trade_request_falls_back_to_region_selection() {
        let (_dir, mut state) = session("key");
        let (_, selection) = state.regions_mut();
        selection.select(
            RegionLevel::District,
            RegionEntry {
                name: "종로구".to_string(),
                codes: vec!["1111000000".to_string()],
            },
        );
        let request = state.trade_request(&form("", "202401", "202401")).unwrap();
        assert_eq!(request.regions, vec!["11110"]);
    }

    #[test]
    fn missing_key_or_region_is_rejected_before_any_request() {
        let (_dir, state) = session("");
        assert!(matches!(
            state.trade_request(&form("11110", "202401", "202401")),
            Err(AppError::MissingInput(_))
        ));

        let (_dir, state) = session("key");
        assert!(matches!(
            state.trade_request(&form("", "202401", "202401")),
            Err(AppError::MissingInput(_))
        ));
        assert!(matches!(
            state.trade_request(&form("11110", "2024", "202401")),
            Err(AppError::MissingInput(_))
        ));
    }

    #[test]
    fn empty_results_leave_previous_table_untouched() {
        let (_dir, mut state) = session("key");
        let first = BatchRequest::new(vec!["11110".into()], vec!["202401".into()], "key");
        assert_eq!(
            state.apply_results(first.clone(), vec![row("A"), row("B")]),
            ApplyOutcome::Replaced(2)
        );

        let second = BatchRequest::new(vec!["11140".into()], vec!["202402".into()], "key");
        assert_eq!(state.apply_results(second, Vec::new()), ApplyOutcome::Empty);
        assert_eq!(state.table().map(TradeTable::total_len), Some(2));
        assert_eq!(state.query(), Some(&first));
    }

    #[test]
    fn only_one_job_may_run_at_a_time() {
        let (_dir, mut state) = session("key");
        state.begin_job("trade batch").unwrap();
        assert!(matches!(
            state.begin_job("another"),
            Err(AppError::JobInProgress)
        ));
        assert_eq!(state.active_job(), Some("trade batch"));

        state.end_job();
        assert!(state.begin_job("another").is_ok());
    }

    #[test]
    fn chart_series_are_replaced_by_name() {
        let (_dir, mut state) = session("key");
        let series = |value: f64| NamedSeries {
            name: "CPI".to_string(),
            unit: String::new(),
            points: vec![SeriesPoint {
                label: "2024".to_string(),
                value,
            }],
        };
        state.push_chart_series(series(1.0));
        state.push_chart_series(series(2.0));
        assert_eq!(state.chart_series().len(), 1);
        assert_eq!(state.chart_series()[0].points[0].value, 2.0);

        state.clear_chart();
        assert!(state.chart_series().is_empty());
    }
}
