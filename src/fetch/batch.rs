use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use reqwest::blocking::Client;

use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, Context};
use crate::records::DebugLog;

use super::request::{build_client, decode_service_key, ensure_key, render_url};
use super::trades::{parse_page, TradeKind, TradeRecord};
use super::FetchResult;

/// A (regions × months) trade query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub regions: Vec<String>,
    pub months: Vec<String>,
    pub service_key: String,
    pub include_rent: bool,
    pub page_size: usize,
}

impl BatchRequest {
    pub fn new(regions: Vec<String>, months: Vec<String>, service_key: impl Into<String>) -> Self {
        Self {
            regions,
            months,
            service_key: service_key.into(),
            include_rent: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_rent(mut self, include_rent: bool) -> Self {
        self.include_rent = include_rent;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Progress denominator: one step per (region, month) pair.
    pub fn total_steps(&self) -> usize {
        self.regions.len() * self.months.len()
    }

    pub fn kinds(&self) -> &'static [TradeKind] {
        if self.include_rent {
            &[TradeKind::Sale, TradeKind::Rent]
        } else {
            &[TradeKind::Sale]
        }
    }

    pub fn validate(&self) -> FetchResult<()> {
        ensure_key(&self.service_key, "Service key")?;
        if self.regions.is_empty() {
            return Err(AppError::missing("select at least one region"));
        }
        if self.months.is_empty() {
            return Err(AppError::missing("a valid YYYYMM month range"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub kind: TradeKind,
    pub lawd: String,
    pub month: String,
    pub page: usize,
    pub rows: usize,
}

impl PageRequest {
    pub fn query(&self, service_key: &str) -> Vec<(String, String)> {
        vec![
            ("serviceKey".to_string(), service_key.to_string()),
            ("LAWD_CD".to_string(), self.lawd.clone()),
            ("DEAL_YMD".to_string(), self.month.clone()),
            ("pageNo".to_string(), self.page.to_string()),
            ("numOfRows".to_string(), self.rows.to_string()),
        ]
    }
}

/// Raw response of one page, kept for the debug artifacts.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where the batch worker gets its pages from.
pub trait PageSource {
    fn fetch(&self, request: &PageRequest) -> FetchResult<PageResponse>;
}

pub struct HttpPageSource {
    client: Client,
    trade_endpoint: String,
    rent_endpoint: String,
    service_key: String,
}

impl HttpPageSource {
    pub fn new(config: &Config, raw_key: &str) -> FetchResult<Self> {
        let key = ensure_key(raw_key, "Service key")?;
        let client = build_client(config.fetch.page_timeout(), &config.trades.headers)?;
        Ok(Self {
            client,
            trade_endpoint: config.trades.trade.clone(),
            rent_endpoint: config.trades.rent.clone(),
            service_key: decode_service_key(key),
        })
    }

    fn endpoint(&self, kind: TradeKind) -> &str {
        match kind {
            TradeKind::Sale => &self.trade_endpoint,
            TradeKind::Rent => &self.rent_endpoint,
        }
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&self, request: &PageRequest) -> FetchResult<PageResponse> {
        let endpoint = self.endpoint(request.kind);
        let response = self
            .client
            .get(endpoint)
            .query(&request.query(&self.service_key))
            .send()
            .with_context(|| {
                format!(
                    "{} request failed for {} {}",
                    request.kind.label(),
                    request.lawd,
                    request.month
                )
            })?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .with_context(|| format!("Failed to read response body from {}", url))?;

        Ok(PageResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

/// Shared cancellation flag, checked by the worker before every request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Progress { done: usize, total: usize },
    Finished(Vec<TradeRecord>),
    Failed(String),
    Cancelled,
}

/// Render the first URL the batch would request, with the key encoded once.
pub fn preview_url(config: &Config, request: &BatchRequest) -> FetchResult<String> {
    let key = decode_service_key(ensure_key(&request.service_key, "Service key")?);
    let (Some(lawd), Some(month)) = (request.regions.first(), request.months.first()) else {
        return Err(AppError::missing("at least one region and month"));
    };
    let page = PageRequest {
        kind: TradeKind::Sale,
        lawd: lawd.clone(),
        month: month.clone(),
        page: 1,
        rows: request.page_size,
    };
    render_url(&config.trades.trade, &page.query(&key))
}

/// Run a whole batch on the calling thread, reporting through `emit`.
///
/// Emits strictly increasing `Progress` events and then exactly one of
/// `Finished`, `Failed` or `Cancelled`.
pub fn run_batch(
    source: &dyn PageSource,
    request: &BatchRequest,
    cancel: &CancelToken,
    debug_log: Option<&DebugLog>,
    emit: &mut dyn FnMut(FetchEvent),
) {
    match collect_batch(source, request, cancel, debug_log, emit) {
        Ok(rows) => {
            info!("Batch finished with {} rows", rows.len());
            emit(FetchEvent::Finished(rows));
        }
        Err(AppError::Cancelled) => {
            info!("Batch cancelled");
            emit(FetchEvent::Cancelled);
        }
        Err(err) => {
            warn!("Batch failed: {}", err);
            emit(FetchEvent::Failed(err.to_string()));
        }
    }
}

fn collect_batch(
    source: &dyn PageSource,
    request: &BatchRequest,
    cancel: &CancelToken,
    debug_log: Option<&DebugLog>,
    emit: &mut dyn FnMut(FetchEvent),
) -> FetchResult<Vec<TradeRecord>> {
    let total = request.total_steps();
    let mut rows = Vec::new();
    let mut done = 0;

    for lawd in &request.regions {
        for month in &request.months {
            for kind in request.kinds() {
                fetch_pages(source, request, *kind, lawd, month, cancel, debug_log, &mut rows)?;
            }
            done += 1;
            emit(FetchEvent::Progress { done, total });
        }
    }

    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
fn fetch_pages(
    source: &dyn PageSource,
    request: &BatchRequest,
    kind: TradeKind,
    lawd: &str,
    month: &str,
    cancel: &CancelToken,
    debug_log: Option<&DebugLog>,
    rows: &mut Vec<TradeRecord>,
) -> FetchResult<()> {
    let mut page = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let page_request = PageRequest {
            kind,
            lawd: lawd.to_string(),
            month: month.to_string(),
            page,
            rows: request.page_size,
        };
        let response = source.fetch(&page_request)?;
        if let Some(log) = debug_log {
            log.record(&page_request, &response);
        }

        if !response.is_success() {
            return Err(AppError::message(format!(
                "HTTP {} from {}",
                response.status, response.url
            )));
        }

        let parsed = parse_page(kind, &response.body)?;
        debug!(
            "{} {} {} page {}: {} items",
            kind.label(),
            lawd,
            month,
            page,
            parsed.item_count
        );
        let full_page = parsed.item_count == request.page_size;
        rows.extend(parsed.items);

        if !full_page {
            return Ok(());
        }
        page += 1;
    }
}

/// Handle to a batch running on its own thread.
pub struct BatchHandle {
    pub events: Receiver<FetchEvent>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Block for the worker's next event. Fails with `AppError::Recv` once the
    /// worker has exited and every event has been drained.
    pub fn next_event(&self) -> FetchResult<FetchEvent> {
        Ok(self.events.recv()?)
    }

    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Batch worker panicked");
            }
        }
    }
}

/// Validate the request and start the worker thread.
pub fn spawn_batch_fetch<S>(
    source: S,
    request: BatchRequest,
    debug_log: Option<DebugLog>,
) -> FetchResult<BatchHandle>
where
    S: PageSource + Send + 'static,
{
    request.validate()?;
    info!(
        "Starting batch: {} regions × {} months (rent: {})",
        request.regions.len(),
        request.months.len(),
        request.include_rent
    );

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let (tx, rx) = mpsc::channel();

    let worker = thread::Builder::new()
        .name("trade-batch".to_string())
        .spawn(move || {
            let mut emit = |event: FetchEvent| {
                let _ = tx.send(event);
            };
            run_batch(
                &source,
                &request,
                &worker_cancel,
                debug_log.as_ref(),
                &mut emit,
            );
        })
        .context("Failed to spawn batch worker")?;

    Ok(BatchHandle {
        events: rx,
        cancel,
        worker: Some(worker),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::fetch::trades::tests::{page_xml, sale_item};

    /// Serves canned bodies and records every request it sees.
    struct ScriptedSource {
        calls: Arc<Mutex<Vec<PageRequest>>>,
        respond: Box<dyn Fn(&PageRequest) -> FetchResult<PageResponse> + Send>,
    }

    impl ScriptedSource {
        fn new(
            respond: impl Fn(&PageRequest) -> FetchResult<PageResponse> + Send + 'static,
        ) -> (Self, Arc<Mutex<Vec<PageRequest>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: calls.clone(),
                    respond: Box::new(respond),
                },
                calls,
            )
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch(&self, request: &PageRequest) -> FetchResult<PageResponse> {
            self.calls.lock().unwrap().push(request.clone());
            (self.respond)(request)
        }
    }

    fn ok(body: String) -> FetchResult<PageResponse> {
        Ok(PageResponse {
            url: "http://test".to_string(),
            status: 200,
            headers: Vec::new(),
            body,
        })
    }

    fn run(source: &ScriptedSource, request: &BatchRequest, cancel: &CancelToken) -> Vec<FetchEvent> {
        let mut events = Vec::new();
        run_batch(source, request, cancel, None, &mut |e| events.push(e));
        events
    }

    fn months(list: &[&str]) -> Vec<String> {
        list.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn two_month_scenario_reports_progress_then_rows() {
        let (source, calls) = ScriptedSource::new(|req| {
            let count = if req.month == "202401" { 3 } else { 2 };
            let items: Vec<String> = (0..count).map(|i| sale_item("A", i + 1, "1,000")).collect();
            ok(page_xml(&items))
        });
        let request = BatchRequest::new(vec!["11110".into()], months(&["202401", "202402"]), "key");
        let events = run(&source, &request, &CancelToken::new());

        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(events[0], FetchEvent::Progress { done: 1, total: 2 });
        assert_eq!(events[1], FetchEvent::Progress { done: 2, total: 2 });
        match &events[2] {
            FetchEvent::Finished(rows) => assert_eq!(rows.len(), 5),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn progress_denominator_is_regions_times_months() {
        let (source, _) = ScriptedSource::new(|_| ok(page_xml(&[])));
        let request = BatchRequest::new(
            vec!["11110".into(), "11140".into(), "26110".into()],
            months(&["202401", "202402"]),
            "key",
        );
        let events = run(&source, &request, &CancelToken::new());
        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::Progress { done, total } => Some((*done, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 6);
        assert!(progress.iter().all(|(_, total)| *total == 6));
        assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn full_page_requests_the_next_page() {
        let (source, calls) = ScriptedSource::new(|req| {
            let count = if req.page == 1 { 2 } else { 1 };
            let items: Vec<String> = (0..count).map(|i| sale_item("A", i + 1, "1")).collect();
            ok(page_xml(&items))
        });
        let request =
            BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key").with_page_size(2);
        let events = run(&source, &request, &CancelToken::new());

        let pages: Vec<usize> = calls.lock().unwrap().iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 2]);
        assert!(matches!(events.last(), Some(FetchEvent::Finished(rows)) if rows.len() == 3));
    }

    #[test]
    fn rent_flag_queries_both_endpoints_per_pair() {
        let (source, calls) = ScriptedSource::new(|req| match req.kind {
            TradeKind::Sale => ok(page_xml(&[sale_item("A", 1, "1")])),
            TradeKind::Rent => ok(page_xml(&[
                "<item><aptNm>B</aptNm><monthlyRent>50</monthlyRent></item>".to_string(),
            ])),
        });
        let request =
            BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key").with_rent(true);
        let events = run(&source, &request, &CancelToken::new());

        let kinds: Vec<TradeKind> = calls.lock().unwrap().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![TradeKind::Sale, TradeKind::Rent]);
        assert_eq!(events[0], FetchEvent::Progress { done: 1, total: 1 });
        match &events[1] {
            FetchEvent::Finished(rows) => {
                assert_eq!(rows[0].kind(), TradeKind::Sale);
                assert_eq!(rows[1].kind(), TradeKind::Rent);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn cancellation_stops_before_the_next_request() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let (source, calls) = ScriptedSource::new(move |_| {
            trigger.cancel();
            ok(page_xml(&[sale_item("A", 1, "1")]))
        });
        let request = BatchRequest::new(
            vec!["11110".into()],
            months(&["202401", "202402", "202403"]),
            "key",
        );
        let events = run(&source, &request, &cancel);

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(events.last(), Some(&FetchEvent::Cancelled));
        assert!(!events.iter().any(|e| matches!(e, FetchEvent::Finished(_))));
    }

    #[test]
    fn failure_aborts_without_partial_result() {
        let (source, calls) = ScriptedSource::new(|req| {
            if req.month == "202402" {
                Err(AppError::message("connection reset"))
            } else {
                ok(page_xml(&[sale_item("A", 1, "1")]))
            }
        });
        let request = BatchRequest::new(
            vec!["11110".into()],
            months(&["202401", "202402", "202403"]),
            "key",
        );
        let events = run(&source, &request, &CancelToken::new());

        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(events[0], FetchEvent::Progress { done: 1, total: 3 });
        assert!(matches!(&events[1], FetchEvent::Failed(msg) if msg.contains("connection reset")));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn http_error_status_fails_the_batch() {
        let (source, _) = ScriptedSource::new(|_| {
            Ok(PageResponse {
                url: "http://test".to_string(),
                status: 500,
                headers: Vec::new(),
                body: String::new(),
            })
        });
        let request = BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key");
        let events = run(&source, &request, &CancelToken::new());
        assert!(matches!(&events[0], FetchEvent::Failed(msg) if msg.contains("HTTP 500")));
    }

    #[test]
    fn spawn_rejects_missing_input_before_any_request() {
        let (source, calls) = ScriptedSource::new(|_| ok(page_xml(&[])));
        let request = BatchRequest::new(vec!["11110".into()], months(&["202401"]), "  ");
        assert!(matches!(
            spawn_batch_fetch(source, request, None),
            Err(AppError::MissingInput(_))
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn spawned_worker_delivers_events_over_channel() {
        let (source, _) = ScriptedSource::new(|_| ok(page_xml(&[sale_item("A", 1, "1")])));
        let request = BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key");
        let handle = spawn_batch_fetch(source, request, None).unwrap();

        let events: Vec<FetchEvent> = handle.events.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], FetchEvent::Finished(ref rows) if rows.len() == 1));
        handle.join();
    }

    #[test]
    fn next_event_reports_a_closed_channel() {
        let (source, _) = ScriptedSource::new(|_| ok(page_xml(&[])));
        let request = BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key");
        let handle = spawn_batch_fetch(source, request, None).unwrap();

        assert_eq!(
            handle.next_event().unwrap(),
            FetchEvent::Progress { done: 1, total: 1 }
        );
        assert!(matches!(handle.next_event().unwrap(), FetchEvent::Finished(_)));
        assert!(matches!(handle.next_event(), Err(AppError::Recv(_))));
        handle.join();
    }

    #[test]
    fn cancellation_is_checked_between_pages_of_one_month() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let (source, calls) = ScriptedSource::new(move |_| {
            trigger.cancel();
            ok(page_xml(&[sale_item("A", 1, "1")]))
        });
        let request =
            BatchRequest::new(vec!["11110".into()], months(&["202401"]), "key").with_page_size(1);
        let events = run(&source, &request, &cancel);

        let pages: Vec<usize> = calls.lock().unwrap().iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1]);
        assert_eq!(events, vec![FetchEvent::Cancelled]);
    }

    #[test]
    fn preview_renders_first_request() {
        let request = BatchRequest::new(
            vec!["11110".into(), "11140".into()],
            months(&["202401", "202402"]),
            "a%2Bb",
        );
        let url = preview_url(&Config::builtin(), &request).unwrap();
        assert!(url.contains("serviceKey=a%2Bb&LAWD_CD=11110&DEAL_YMD=202401&pageNo=1&numOfRows=1000"));
    }
}
