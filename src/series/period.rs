use std::fmt;

/// Sampling frequency of a time label, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    Monthly,
    Quarterly,
    Annual,
}

impl Granularity {
    /// Axis step in months.
    pub fn step_months(self) -> i32 {
        match self {
            Granularity::Monthly => 1,
            Granularity::Quarterly => 3,
            Granularity::Annual => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Annual => "annual",
        }
    }
}

/// A parsed time label placed on a month-resolution axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub granularity: Granularity,
    pub year: i32,
    /// Month the period starts in; January for years, `3n - 2` for quarter `n`.
    pub month: u32,
}

impl Period {
    pub fn annual(year: i32) -> Self {
        Self {
            granularity: Granularity::Annual,
            year,
            month: 1,
        }
    }

    pub fn quarter(year: i32, quarter: u32) -> Self {
        Self {
            granularity: Granularity::Quarterly,
            year,
            month: 3 * quarter - 2,
        }
    }

    pub fn monthly(year: i32, month: u32) -> Self {
        Self {
            granularity: Granularity::Monthly,
            year,
            month,
        }
    }

    /// Months since year 0, the x coordinate used for plotting.
    pub fn index(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Annual => write!(f, "{}", self.year),
            Granularity::Quarterly => write!(f, "{}Q{}", self.year, (self.month + 2) / 3),
            Granularity::Monthly => write!(f, "{}-{:02}", self.year, self.month),
        }
    }
}

/// Format a month index at the given granularity.
pub fn format_index(index: i32, granularity: Granularity) -> String {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let period = Period {
        granularity,
        year,
        month: match granularity {
            Granularity::Annual => 1,
            Granularity::Quarterly => (month - 1) / 3 * 3 + 1,
            Granularity::Monthly => month,
        },
    };
    period.to_string()
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn month_in_range(month: u32) -> Option<u32> {
    (1..=12).contains(&month).then_some(month)
}

fn quarter_in_range(quarter: u32) -> Option<u32> {
    (1..=4).contains(&quarter).then_some(quarter)
}

/// Detect the granularity of a time label.
///
/// `YYYY` is annual; `YYYYQn`, `YYYY-Qn`, `YYYY Qn` and `YYYYn/4` are quarterly;
/// `YYYYMM`, `YYYY-MM`, `YYYY.MM`, `YYYY/MM` and `YYYYMMDD` are monthly.
pub fn parse_period(label: &str) -> Option<Period> {
    let label = label.trim();
    if label.len() < 4 || !label.is_char_boundary(4) {
        return None;
    }
    let (year_part, rest) = label.split_at(4);
    if !digits(year_part) {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;

    if rest.is_empty() {
        return Some(Period::annual(year));
    }

    let upper = rest.to_ascii_uppercase();
    let quarter_token = upper
        .strip_prefix("-Q")
        .or_else(|| upper.strip_prefix(" Q"))
        .or_else(|| upper.strip_prefix('Q'));
    if let Some(q) = quarter_token {
        if q.len() == 1 && digits(q) {
            return Some(Period::quarter(year, quarter_in_range(q.parse().ok()?)?));
        }
        return None;
    }
    if let Some(q) = upper.strip_suffix("/4") {
        if q.len() == 1 && digits(q) {
            return Some(Period::quarter(year, quarter_in_range(q.parse().ok()?)?));
        }
    }

    let month_token = match rest.chars().next() {
        Some('-' | '.' | '/') => &rest[1..],
        _ => rest,
    };
    let month_token = match month_token.len() {
        // YYYYMMDD: the day is ignored.
        4 if rest.len() == 4 && digits(month_token) => &month_token[..2],
        1 | 2 if digits(month_token) => month_token,
        _ => return None,
    };
    Some(Period::monthly(year, month_in_range(month_token.parse().ok()?)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_every_label_form() {
        assert_eq!(parse_period("2024"), Some(Period::annual(2024)));
        for label in ["2024Q2", "2024-Q2", "2024 Q2", "20242/4", "2024q2"] {
            assert_eq!(parse_period(label), Some(Period::quarter(2024, 2)), "{label}");
        }
        for label in ["202403", "2024-03", "2024.03", "2024/03", "20240315", "2024-3"] {
            assert_eq!(parse_period(label), Some(Period::monthly(2024, 3)), "{label}");
        }
    }

    #[test]
    fn rejects_unparseable_labels() {
        for label in ["", "24", "2024Q5", "202413", "2024-Q", "abcd", "2024년", "2024.03.01"] {
            assert_eq!(parse_period(label), None, "{label}");
        }
    }

    #[test]
    fn quarters_start_on_their_first_month() {
        assert_eq!(Period::quarter(2024, 3).month, 7);
        assert_eq!(Period::quarter(2024, 3).to_string(), "2024Q3");
        assert_eq!(
            Period::annual(2024).index(),
            Period::monthly(2024, 1).index()
        );
        assert_eq!(format_index(Period::monthly(2024, 8).index(), Granularity::Quarterly), "2024Q3");
    }
}
