use log::{info, warn};

use crate::app::state::{ApplyOutcome, SessionState, TradeForm};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetch::{
    preview_url, spawn_batch_fetch, BatchRequest, HttpPageSource, RegionClient,
};
use crate::records::TradeTable;
use crate::ui::{
    run_fetch_progress, run_main_menu, run_region_picker, run_results_table, run_series_chart,
    run_stats_browser, run_trade_search, ChartExit, FetchOutcome, MenuAction, MenuContext,
    Notice, SearchAction, StatsOutcome,
};

/// Coordinates session state and TUI flows.
pub struct AppController {
    session: SessionState,
    notice: Option<Notice>,
}

/// Short human description of a batch query, e.g. `11110,11140 202401~202403 +rent`.
pub fn describe_query(request: &BatchRequest) -> String {
    let first = request.months.first().map(String::as_str).unwrap_or("?");
    let last = request.months.last().map(String::as_str).unwrap_or("?");
    format!(
        "{} {}~{}{}",
        request.regions.join(","),
        first,
        last,
        if request.include_rent { " +rent" } else { "" }
    )
}

impl AppController {
    pub fn new(config: Config) -> Result<Self> {
        let mut session = SessionState::new(config)?;
        restore_saved_series(&mut session);
        Ok(Self {
            session,
            notice: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        loop {
            let context = self.menu_context();
            let action = run_main_menu(&context, self.notice.as_ref())?;
            self.notice = None;

            match action {
                MenuAction::Regions => self.handle_regions()?,
                MenuAction::TradeSearch => self.handle_trade_search()?,
                MenuAction::Results => self.handle_results()?,
                MenuAction::Statistics => self.handle_statistics()?,
                MenuAction::Chart => self.handle_chart()?,
                MenuAction::Quit => return Ok(()),
            }
        }
    }

    fn menu_context(&self) -> MenuContext {
        MenuContext {
            region: self.session.selection().describe(),
            table_rows: self.session.table().map(TradeTable::total_len),
            chart_series: self.session.chart_series().len(),
            saved_series: self.session.shelf().len(),
        }
    }

    fn handle_regions(&mut self) -> Result<()> {
        let client = match RegionClient::new(self.session.config()) {
            Ok(client) => client,
            Err(err) => {
                warn!("Region lookup unavailable: {}", err);
                self.notice = Some(Notice::warning(err.to_string()));
                return Ok(());
            }
        };
        let (catalog, selection) = self.session.regions_mut();
        run_region_picker(&client, catalog, selection)?;
        info!("Region selection: {}", self.session.selection().describe());
        Ok(())
    }

    fn handle_trade_search(&mut self) -> Result<()> {
        let mut form: TradeForm = self.session.form().clone();
        let region = self.session.selection().describe();
        let action = {
            let session = &self.session;
            let preview = |form: &TradeForm| -> Result<String> {
                let request = session.trade_request(form)?;
                preview_url(session.config(), &request)
            };
            run_trade_search(&mut form, &region, &preview)?
        };
        self.session.set_form(form.clone());
        if action == SearchAction::Back {
            return Ok(());
        }

        let request = match self.session.trade_request(&form) {
            Ok(request) => request,
            Err(err) => {
                warn!("Trade search rejected: {}", err);
                self.notice = Some(Notice::warning(err.to_string()));
                return Ok(());
            }
        };
        self.fetch_trades(request)
    }

    fn fetch_trades(&mut self, request: BatchRequest) -> Result<()> {
        if let Err(err) = self.session.begin_job("trade batch") {
            self.notice = Some(Notice::warning(err.to_string()));
            return Ok(());
        }
        let outcome = self.execute_batch(&request);
        self.session.end_job();

        let description = describe_query(&request);
        match outcome {
            Ok(FetchOutcome::Finished(rows)) => match self.session.apply_results(request, rows) {
                ApplyOutcome::Replaced(count) => {
                    info!("Loaded {} trade rows for {}", count, description);
                    self.notice = Some(Notice::info(format!(
                        "Loaded {} rows for {}",
                        count, description
                    )));
                    return self.handle_results();
                }
                ApplyOutcome::Empty => {
                    self.notice = Some(Notice::info(format!(
                        "No trades found for {}; previous results kept",
                        description
                    )));
                }
            },
            Ok(FetchOutcome::Cancelled) | Err(AppError::Cancelled) => {
                self.notice = Some(Notice::info("Fetch cancelled."));
            }
            Ok(FetchOutcome::Failed(message)) => {
                self.notice = Some(Notice::error(format!("Fetch failed: {}", message)));
            }
            Err(err) => {
                warn!("Could not run trade batch: {}", err);
                self.notice = Some(Notice::error(format!("Fetch failed: {}", err)));
            }
        }
        Ok(())
    }

    fn execute_batch(&self, request: &BatchRequest) -> Result<FetchOutcome> {
        let config = self.session.config();
        let source = HttpPageSource::new(config, &request.service_key)?;
        let debug_log = config
            .fetch
            .write_debug_artifacts
            .then(|| self.session.records().debug_log());
        let handle = spawn_batch_fetch(source, request.clone(), debug_log)?;
        run_fetch_progress(handle, request.total_steps())
    }

    fn handle_results(&mut self) -> Result<()> {
        let Some(query) = self.session.query().cloned() else {
            self.notice = Some(Notice::info("No trade results yet. Run a trade search first."));
            return Ok(());
        };
        let records = self.session.records().clone();
        let description = describe_query(&query);
        let Some(table) = self.session.table_mut() else {
            return Ok(());
        };

        let export = |table: &TradeTable| records.export_table(&query, table);
        run_results_table(table, &description, &export)
    }

    fn handle_statistics(&mut self) -> Result<()> {
        let outcome = run_stats_browser(self.session.config(), self.session.shelf())?;
        let StatsOutcome::Loaded(saved, series) = outcome else {
            return Ok(());
        };

        match self.session.records().save_series(&saved) {
            Ok(path) => info!("Saved series query to {}", path.display()),
            Err(err) => warn!("Could not persist series {}: {}", saved.name, err),
        }
        self.notice = Some(Notice::info(format!(
            "Loaded {} ({} points). Open Chart to view.",
            saved.name,
            series.points.len()
        )));
        self.session.shelf_mut().add(saved);
        self.session.push_chart_series(series);
        Ok(())
    }

    fn handle_chart(&mut self) -> Result<()> {
        if run_series_chart(self.session.chart_series())? == ChartExit::Clear {
            self.session.clear_chart();
            self.notice = Some(Notice::info("Chart cleared."));
        }
        Ok(())
    }
}

/// Put series saved in earlier sessions back on the shelf. Unreadable files are skipped.
fn restore_saved_series(session: &mut SessionState) {
    let records = session.records().clone();
    for file in records.list_saved_series() {
        match records.load_series(&file.path) {
            Ok(saved) => session.shelf_mut().add(saved),
            Err(err) => warn!("Skipping saved series {}: {}", file.name, err),
        }
    }
}
