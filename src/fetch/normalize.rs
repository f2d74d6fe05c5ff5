//! Normalisation helpers shared by the trade parsers and the search form.

use chrono::{Months, NaiveDate};

/// Keep only the ASCII digits of an amount such as `"12,500"`.
pub fn normalize_amount(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parse a normalised amount into an integer, `None` when empty.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let digits = normalize_amount(raw);
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Normalise `YY.MM.DD` / `YYYY.MM.DD` (with `.`, `-` or `/`) into `YYYY-MM-DD`.
///
/// Anything else is returned trimmed so the caller still sees the raw value.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let parts: Vec<&str> = trimmed.split(['.', '-', '/']).collect();
    if parts.len() != 3 {
        return trimmed.to_string();
    }

    let (year, month, day) = (parts[0], parts[1], parts[2]);
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(all_digits(year) && all_digits(month) && all_digits(day)) {
        return trimmed.to_string();
    }
    if !(year.len() == 2 || year.len() == 4) || month.len() > 2 || day.len() > 2 {
        return trimmed.to_string();
    }

    let (Ok(y), Ok(m), Ok(d)) = (
        year.parse::<u32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return trimmed.to_string();
    };

    let y = if year.len() == 2 { 2000 + y } else { y };
    format!("{:04}-{:02}-{:02}", y, m, d)
}

/// Build `YYYY-MM-DD` from the split deal-date fields of a trade item.
pub fn contract_date(year: &str, month: &str, day: &str) -> String {
    let pad = |value: &str| match value.trim().parse::<u32>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => value.trim().to_string(),
    };
    format!("{}-{}-{}", year.trim(), pad(month), pad(day))
}

/// Parse a `YYYY-MM-DD` contract date for ordering.
pub fn parse_contract_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// First day of the month named by a `YYYYMM` token.
fn parse_year_month(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{}01", trimmed), "%Y%m%d").ok()
}

/// Inclusive ascending list of `YYYYMM` tokens between two endpoints.
///
/// Endpoints are swapped when `from_ym > to_ym`; malformed input yields an empty list.
pub fn months_between(from_ym: &str, to_ym: &str) -> Vec<String> {
    let (Some(from), Some(to)) = (parse_year_month(from_ym), parse_year_month(to_ym)) else {
        return Vec::new();
    };
    let (start, end) = if from <= to { (from, to) } else { (to, from) };

    std::iter::successors(Some(start), |month| month.checked_add_months(Months::new(1)))
        .take_while(|month| *month <= end)
        .map(|month| month.format("%Y%m").to_string())
        .collect()
}

/// The 5-character LAWD key of a region code, if the code is long enough.
pub fn lawd_key(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.chars().count() < 5 {
        return None;
    }
    let key: String = trimmed.chars().take(5).collect();
    if key.chars().all(|c| c.is_ascii_digit()) {
        Some(key)
    } else {
        None
    }
}

/// Split a comma/space separated list of LAWD codes, dropping duplicates but keeping order.
pub fn parse_lawd_list(input: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for token in input.split([',', ' ', ';']) {
        if let Some(key) = lawd_key(token) {
            if !codes.contains(&key) {
                codes.push(key);
            }
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_two_and_four_digit_years() {
        assert_eq!(normalize_date("25.12.04"), "2025-12-04");
        assert_eq!(normalize_date("2019.3.7"), "2019-03-07");
        assert_eq!(normalize_date("2019-03-07"), "2019-03-07");
        assert_eq!(normalize_date("19/3/7"), "2019-03-07");
        assert_eq!(normalize_date(" 24.01.15 "), "2024-01-15");
    }

    #[test]
    fn unrecognised_dates_pass_through() {
        assert_eq!(normalize_date(""), "");
        assert_eq!(normalize_date("  "), "");
        assert_eq!(normalize_date("미등기"), "미등기");
        assert_eq!(normalize_date("2024.01"), "2024.01");
        assert_eq!(normalize_date("123.01.01"), "123.01.01");
    }

    #[test]
    fn amount_normalization_is_idempotent() {
        let once = normalize_amount(" 12,500 ");
        assert_eq!(once, "12500");
        assert_eq!(normalize_amount(&once), once);
        assert_eq!(parse_amount("1,000"), Some(1000));
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn months_between_swaps_reversed_endpoints() {
        let forward = months_between("202311", "202402");
        assert_eq!(forward, vec!["202311", "202312", "202401", "202402"]);
        assert_eq!(months_between("202402", "202311"), forward);
        assert_eq!(months_between("202401", "202401"), vec!["202401"]);
        assert_eq!(months_between("199912", "200001"), vec!["199912", "200001"]);
    }

    #[test]
    fn months_between_rejects_malformed_input() {
        assert!(months_between("2024", "202401").is_empty());
        assert!(months_between("202413", "202401").is_empty());
        assert!(months_between("abcdef", "202401").is_empty());
    }

    #[test]
    fn builds_zero_padded_contract_dates() {
        assert_eq!(contract_date("2024", "1", "5"), "2024-01-05");
        assert_eq!(contract_date("2024", "12", "25"), "2024-12-25");
    }

    #[test]
    fn lawd_key_takes_first_five_digits() {
        assert_eq!(lawd_key("1111010100").as_deref(), Some("11110"));
        assert_eq!(lawd_key("11"), None);
        assert_eq!(lawd_key("ab123"), None);
        assert_eq!(
            parse_lawd_list("11110, 11140;11110 2611010100"),
            vec!["11110", "11140", "26110"]
        );
    }
}
