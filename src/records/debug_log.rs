use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, warn};

use crate::error::{Context, Result};
use crate::fetch::{PageRequest, PageResponse, TradeKind};

/// Writes raw page responses and their request metadata for troubleshooting.
#[derive(Debug, Clone)]
pub struct DebugLog {
    dir: PathBuf,
}

impl DebugLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Best-effort: failures are logged and otherwise ignored.
    pub fn record(&self, request: &PageRequest, response: &PageResponse) {
        match self.write(request, response) {
            Ok(path) => debug!("Saved raw response to {}", path.display()),
            Err(err) => warn!("Could not save debug artifact: {}", err),
        }
    }

    pub fn write(&self, request: &PageRequest, response: &PageResponse) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let stem = artifact_stem(request, &Local::now().format("%Y%m%d_%H%M%S%3f").to_string());
        let body_path = self.dir.join(format!("{stem}.xml"));
        fs::write(&body_path, &response.body)
            .with_context(|| format!("Failed to write {}", body_path.display()))?;

        let headers = response
            .headers
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        let meta = format!(
            "url: {}\nstatus: {}\nheaders: {}\n",
            response.url, response.status, headers
        );
        let meta_path = self.dir.join(format!("{stem}.meta.txt"));
        fs::write(&meta_path, meta)
            .with_context(|| format!("Failed to write {}", meta_path.display()))?;

        Ok(body_path)
    }
}

fn artifact_stem(request: &PageRequest, timestamp: &str) -> String {
    let kind = match request.kind {
        TradeKind::Sale => "",
        TradeKind::Rent => "rent_",
    };
    format!(
        "debug_response_{}{}_{}_p{}_{}",
        kind, request.lawd, request.month, request.page, timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_request(kind: TradeKind) -> PageRequest {
        PageRequest {
            kind,
            lawd: "11110".into(),
            month: "202401".into(),
            page: 2,
            rows: 1000,
        }
    }

    #[test]
    fn stem_names_region_month_and_page() {
        assert_eq!(
            artifact_stem(&page_request(TradeKind::Sale), "ts"),
            "debug_response_11110_202401_p2_ts"
        );
        assert_eq!(
            artifact_stem(&page_request(TradeKind::Rent), "ts"),
            "debug_response_rent_11110_202401_p2_ts"
        );
    }

    #[test]
    fn writes_body_and_meta_pair() {
        let dir = tempfile::tempdir().unwrap();
        let log = DebugLog::new(dir.path().join("debug_logs"));
        let response = PageResponse {
            url: "https://apis.data.go.kr/x?LAWD_CD=11110".into(),
            status: 200,
            headers: vec![("content-type".into(), "text/xml".into())],
            body: "<response/>".into(),
        };

        let body_path = log.write(&page_request(TradeKind::Sale), &response).unwrap();
        assert_eq!(fs::read_to_string(&body_path).unwrap(), "<response/>");

        let meta_path = body_path.with_extension("meta.txt");
        let meta = fs::read_to_string(meta_path).unwrap();
        assert!(meta.starts_with("url: https://apis.data.go.kr/x?LAWD_CD=11110\nstatus: 200\n"));
        assert!(meta.contains("content-type=text/xml"));
    }
}
