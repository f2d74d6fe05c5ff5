use std::fmt;

use super::plot::PlotPoint;

/// Readout between two pinned points; the earlier one is the base.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub from: PlotPoint,
    pub to: PlotPoint,
    pub months: i32,
    pub change_pct: Option<f64>,
    pub cagr_pct: Option<f64>,
}

impl Comparison {
    pub fn years(&self) -> f64 {
        self.months as f64 / 12.0
    }

    pub fn difference(&self) -> f64 {
        self.to.y - self.from.y
    }
}

/// Elapsed time, percent change and CAGR between two points.
///
/// A zero or negative base gives `None` for both rates; CAGR also needs a
/// positive span and a non-negative end value.
pub fn compare(a: &PlotPoint, b: &PlotPoint) -> Comparison {
    let (from, to) = if b.x < a.x { (b, a) } else { (a, b) };
    let months = to.x - from.x;
    let years = months as f64 / 12.0;

    let change_pct = (from.y > 0.0).then(|| (to.y - from.y) / from.y * 100.0);
    let cagr_pct = (from.y > 0.0 && to.y >= 0.0 && years > 0.0)
        .then(|| ((to.y / from.y).powf(1.0 / years) - 1.0) * 100.0)
        .filter(|v| v.is_finite());

    Comparison {
        from: from.clone(),
        to: to.clone(),
        months,
        change_pct,
        cagr_pct,
    }
}

pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.2}%", v),
        None => "N/A".to_string(),
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} • {} months ({:.2}y) • Δ {:+.2} • change {} • CAGR {}",
            self.from.label,
            self.to.label,
            self.months,
            self.years(),
            self.difference(),
            format_pct(self.change_pct),
            format_pct(self.cagr_pct)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i32, y: f64, label: &str) -> PlotPoint {
        PlotPoint {
            x,
            y,
            label: label.to_string(),
        }
    }

    #[test]
    fn computes_change_and_cagr() {
        let a = point(2020 * 12, 100.0, "2020");
        let b = point(2022 * 12, 121.0, "2022");
        let result = compare(&b, &a);
        assert_eq!(result.from.label, "2020");
        assert_eq!(result.months, 24);
        assert!((result.change_pct.unwrap() - 21.0).abs() < 1e-9);
        assert!((result.cagr_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_base_or_span_is_not_available() {
        let zero = compare(&point(0, 0.0, "a"), &point(12, 5.0, "b"));
        assert_eq!(zero.change_pct, None);
        assert_eq!(zero.cagr_pct, None);

        let same_time = compare(&point(12, 2.0, "a"), &point(12, 3.0, "b"));
        assert!(same_time.change_pct.is_some());
        assert_eq!(same_time.cagr_pct, None);
        assert!(same_time.to_string().contains("CAGR N/A"));
    }
}
