use crate::error::{AppError, Result};

use super::{Config, StatsEndpoint};

/// Validate the effective configuration and surface every problem at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    require_url("regions.provinces", &config.regions.provinces, &mut issues);
    require_url("regions.districts", &config.regions.districts, &mut issues);
    require_url(
        "regions.subdistricts",
        &config.regions.subdistricts,
        &mut issues,
    );
    if config.regions.page_rows == 0 {
        issues.push("regions.page_rows must be greater than zero".to_string());
    }

    require_url("trades.trade", &config.trades.trade, &mut issues);
    require_url("trades.rent", &config.trades.rent, &mut issues);
    if config.trades.page_size == 0 {
        issues.push("trades.page_size must be greater than zero".to_string());
    }

    validate_stats("stats.ecos", &config.stats.ecos, &mut issues);
    validate_stats("stats.index_portal", &config.stats.index_portal, &mut issues);
    validate_stats("stats.kosis", &config.stats.kosis, &mut issues);

    if config.fetch.lookup_timeout_secs == 0 {
        issues.push("fetch.lookup_timeout_secs must be greater than zero".to_string());
    }
    if config.fetch.page_timeout_secs == 0 {
        issues.push("fetch.page_timeout_secs must be greater than zero".to_string());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "configuration invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn require_url(field: &str, value: &str, issues: &mut Vec<String>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        issues.push(format!("{field} must not be empty"));
    } else if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        issues.push(format!("{field} must be an http(s) URL, got `{trimmed}`"));
    }
}

fn validate_stats(prefix: &str, endpoint: &StatsEndpoint, issues: &mut Vec<String>) {
    require_url(&format!("{prefix}.base_url"), &endpoint.base_url, issues);
    for (name, value) in [
        ("catalog_path", &endpoint.catalog_path),
        ("items_path", &endpoint.items_path),
        ("series_path", &endpoint.series_path),
        ("time_column", &endpoint.time_column),
        ("value_column", &endpoint.value_column),
    ] {
        if value.trim().is_empty() {
            issues.push(format!("{prefix}.{name} must not be empty"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        validate_config(&Config::builtin()).unwrap();
    }

    #[test]
    fn reports_all_issues_together() {
        let mut config = Config::builtin();
        config.regions.provinces = "ftp://example".to_string();
        config.stats.kosis.value_column.clear();
        config.fetch.page_timeout_secs = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("regions.provinces"));
        assert!(message.contains("stats.kosis.value_column"));
        assert!(message.contains("page_timeout_secs"));
    }
}
