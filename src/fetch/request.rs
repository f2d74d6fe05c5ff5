use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::error::{AppError, Context};

use super::FetchResult;

/// Build a blocking client with the given per-request timeout and default headers.
pub fn build_client(
    timeout: Duration,
    headers: &BTreeMap<String, String>,
) -> FetchResult<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .default_headers(build_headers(headers)?)
        .build()
        .context("Failed to construct HTTP client")?;
    Ok(client)
}

/// Percent-decode a credential once so the HTTP client does not encode it twice.
///
/// Keys copied from the portal are usually already encoded (`%2B`, `%3D`); decoded
/// keys pass through unchanged.
pub fn decode_service_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match urlencoding::decode(trimmed) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => trimmed.to_string(),
    }
}

/// Render the URL a GET with `query` would hit, for display purposes.
pub fn render_url(endpoint: &str, query: &[(String, String)]) -> FetchResult<String> {
    let url = Url::parse_with_params(endpoint, query)
        .with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
    Ok(url.to_string())
}

/// Join path segments onto a base URL, percent-encoding each segment.
pub fn join_path(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        let encoded: Cow<'_, str> = urlencoding::encode(segment);
        url.push_str(&encoded);
    }
    url
}

pub fn ensure_key<'a>(key: &'a str, label: &str) -> FetchResult<&'a str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing(format!("{label} is required")));
    }
    Ok(trimmed)
}

/// Replace every `${NAME}` in `value` with the environment variable `NAME`.
pub fn expand_env_vars(value: &str) -> FetchResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find('}')
            .ok_or_else(|| AppError::message(format!("Unterminated placeholder in {:?}", value)))?;
        let name = after[..close].trim();
        if name.is_empty() {
            return Err(AppError::message(format!("Empty placeholder in {:?}", value)));
        }
        let resolved = std::env::var(name)
            .with_context(|| format!("Environment variable {} is not set", name))?;
        out.push_str(&resolved);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn build_headers(headers: &BTreeMap<String, String>) -> FetchResult<HeaderMap> {
    headers
        .iter()
        .map(|(key, value)| -> FetchResult<(HeaderName, HeaderValue)> {
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("Bad header name {:?}", key))?;
            let value = HeaderValue::from_str(&expand_env_vars(value)?)
                .with_context(|| format!("Bad value for header {}", key))?;
            Ok((name, value))
        })
        .collect()
}
