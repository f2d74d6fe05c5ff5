use crate::fetch::NamedSeries;

use super::period::{format_index, parse_period, Granularity};

/// A single sample positioned on the shared month axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotPoint {
    pub x: i32,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub name: String,
    pub unit: String,
    pub granularity: Granularity,
    pub points: Vec<PlotPoint>,
}

impl PreparedSeries {
    /// Parse labels, drop the unparseable ones and order points by time.
    ///
    /// The series granularity is the coarsest one seen. `None` when no label parses.
    pub fn from_series(series: &NamedSeries) -> Option<Self> {
        let mut granularity = Granularity::Monthly;
        let mut points: Vec<PlotPoint> = Vec::with_capacity(series.points.len());
        for point in &series.points {
            let Some(period) = parse_period(&point.label) else {
                continue;
            };
            granularity = granularity.max(period.granularity);
            points.push(PlotPoint {
                x: period.index(),
                y: point.value,
                label: point.label.clone(),
            });
        }
        if points.is_empty() {
            return None;
        }
        points.sort_by_key(|p| p.x);

        Some(Self {
            name: series.name.clone(),
            unit: series.unit.clone(),
            granularity,
            points,
        })
    }
}

/// Value range of one series. Series 0 is the primary (left) axis; later
/// series get secondary axes offset to the right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueAxis {
    pub min: f64,
    pub max: f64,
    pub offset: usize,
}

impl ValueAxis {
    fn spanning(points: &[PlotPoint], offset: usize) -> Self {
        let min = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if (max - min).abs() < 1e-9 {
            let pad = if min.abs() < 1.0 { 1.0 } else { min.abs() * 0.05 };
            (min - pad, max + pad)
        } else {
            (min, max)
        };
        Self { min, max, offset }
    }

    pub fn is_primary(&self) -> bool {
        self.offset == 0
    }

    /// Evenly spaced tick values across the axis, ends included.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let count = count.max(2);
        let step = (self.max - self.min) / (count as f64 - 1.0);
        (0..count).map(|i| self.min + step * i as f64).collect()
    }
}

/// Time axis shared by every series, at the finest granularity present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    pub granularity: Granularity,
    pub start: i32,
    pub end: i32,
}

impl TimeAxis {
    /// Up to `max_ticks` labelled positions aligned to the axis granularity.
    pub fn ticks(&self, max_ticks: usize) -> Vec<(i32, String)> {
        let step = self.granularity.step_months();
        let slots = ((self.end - self.start) / step + 1).max(1) as usize;
        let stride = slots.div_ceil(max_ticks.max(1)).max(1) as i32;
        let mut ticks: Vec<(i32, String)> = (0..slots as i32)
            .step_by(stride as usize)
            .map(|slot| self.start + slot * step)
            .map(|x| (x, format_index(x, self.granularity)))
            .collect();
        if ticks.last().map(|(x, _)| *x) != Some(self.end) && ticks.len() < max_ticks.max(2) {
            ticks.push((self.end, format_index(self.end, self.granularity)));
        }
        ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
}

impl ChartKind {
    pub fn toggle(self) -> Self {
        match self {
            ChartKind::Line => ChartKind::Bar,
            ChartKind::Bar => ChartKind::Line,
        }
    }
}

/// Pixel rectangle the series are drawn into; `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub series: usize,
    pub point: usize,
}

/// Overlaid series sharing one time axis, each with its own value axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub series: Vec<PreparedSeries>,
    pub axes: Vec<ValueAxis>,
    pub time: TimeAxis,
    pub kind: ChartKind,
}

impl ChartModel {
    /// `None` when no series has a single parseable point.
    pub fn build(inputs: &[NamedSeries]) -> Option<Self> {
        let series: Vec<PreparedSeries> = inputs
            .iter()
            .filter_map(PreparedSeries::from_series)
            .collect();
        if series.is_empty() {
            return None;
        }

        let granularity = series
            .iter()
            .map(|s| s.granularity)
            .min()
            .unwrap_or(Granularity::Monthly);
        let xs = series.iter().flat_map(|s| s.points.iter().map(|p| p.x));
        let start = xs.clone().min().unwrap_or_default();
        let end = xs.max().unwrap_or_default();
        let axes = series
            .iter()
            .enumerate()
            .map(|(offset, s)| ValueAxis::spanning(&s.points, offset))
            .collect();

        Some(Self {
            series,
            axes,
            time: TimeAxis {
                granularity,
                start,
                end,
            },
            kind: ChartKind::default(),
        })
    }

    pub fn toggle_kind(&mut self) {
        self.kind = self.kind.toggle();
    }

    /// Map a point of series `index` into plot pixel coordinates.
    pub fn to_pixel(&self, plot: &PlotArea, index: usize, point: &PlotPoint) -> (f64, f64) {
        (self.x_pixel(plot, point.x), self.y_pixel(plot, index, point.y))
    }

    /// Horizontal pixel of a month index on the shared time axis.
    pub fn x_pixel(&self, plot: &PlotArea, x: i32) -> f64 {
        let span = (self.time.end - self.time.start) as f64;
        let fx = if span > 0.0 {
            (x - self.time.start) as f64 / span
        } else {
            0.5
        };
        plot.left + fx * plot.width
    }

    /// Vertical pixel of `value` on the value axis of series `index`.
    pub fn y_pixel(&self, plot: &PlotArea, index: usize, value: f64) -> f64 {
        let fy = self
            .axes
            .get(index)
            .map(|axis| (value - axis.min) / (axis.max - axis.min))
            .unwrap_or(0.0);
        plot.top + plot.height - fy * plot.height
    }

    /// Nearest plotted point to `(px, py)` across all series, within `radius` pixels.
    pub fn hit_test(&self, plot: &PlotArea, px: f64, py: f64, radius: f64) -> Option<Hit> {
        let mut best: Option<(f64, Hit)> = None;
        for (series_index, series) in self.series.iter().enumerate() {
            for (point_index, point) in series.points.iter().enumerate() {
                let (x, y) = self.to_pixel(plot, series_index, point);
                let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                if distance > radius {
                    continue;
                }
                if best.map(|(d, _)| distance < d).unwrap_or(true) {
                    best = Some((
                        distance,
                        Hit {
                            series: series_index,
                            point: point_index,
                        },
                    ));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    pub fn point(&self, hit: Hit) -> Option<&PlotPoint> {
        self.series.get(hit.series)?.points.get(hit.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SeriesPoint;

    fn named(name: &str, points: &[(&str, f64)]) -> NamedSeries {
        NamedSeries {
            name: name.to_string(),
            unit: String::new(),
            points: points
                .iter()
                .map(|(label, value)| SeriesPoint {
                    label: label.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    fn plot() -> PlotArea {
        PlotArea {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 50.0,
        }
    }

    #[test]
    fn series_granularity_is_coarsest_and_bad_labels_drop() {
        let prepared = PreparedSeries::from_series(&named(
            "mixed",
            &[("2024-01", 1.0), ("2023", 2.0), ("n/a", 3.0)],
        ))
        .unwrap();
        assert_eq!(prepared.granularity, Granularity::Annual);
        assert_eq!(prepared.points.len(), 2);
        assert_eq!(prepared.points[0].label, "2023");
        assert!(PreparedSeries::from_series(&named("bad", &[("x", 1.0)])).is_none());
    }

    #[test]
    fn unified_axis_uses_finest_granularity() {
        let model = ChartModel::build(&[
            named("annual", &[("2022", 10.0), ("2023", 12.0)]),
            named("monthly", &[("202301", 1.0), ("202306", 1.5)]),
            named("quarterly", &[("2023Q3", 100.0)]),
        ])
        .unwrap();
        assert_eq!(model.time.granularity, Granularity::Monthly);
        assert_eq!(model.time.start, 2022 * 12);
        assert_eq!(model.time.end, 2023 * 12 + 6);
        // Quarter 3 maps onto July.
        assert_eq!(model.series[2].points[0].x, 2023 * 12 + 6);
    }

    #[test]
    fn each_series_gets_its_own_axis() {
        let model = ChartModel::build(&[
            named("rate", &[("2023", 3.5), ("2024", 3.0)]),
            named("index", &[("2023", 100.0), ("2024", 120.0)]),
            named("flat", &[("2023", 5.0), ("2024", 5.0)]),
        ])
        .unwrap();
        assert!(model.axes[0].is_primary());
        assert_eq!((model.axes[1].min, model.axes[1].max), (100.0, 120.0));
        assert_eq!(model.axes[1].offset, 1);
        assert!(model.axes[2].min < 5.0 && model.axes[2].max > 5.0);
    }

    #[test]
    fn hit_test_finds_nearest_point_within_radius() {
        let model = ChartModel::build(&[
            named("a", &[("2020", 0.0), ("2022", 10.0)]),
            named("b", &[("2020", 50.0), ("2022", 40.0)]),
        ])
        .unwrap();
        let area = plot();

        // Top-right corner holds the max of both series.
        assert_eq!(
            model.hit_test(&area, 99.0, 1.0, 3.0),
            Some(Hit { series: 0, point: 1 })
        );
        assert_eq!(
            model.hit_test(&area, 1.0, 2.0, 3.0),
            Some(Hit { series: 1, point: 0 })
        );
        assert_eq!(model.hit_test(&area, 50.0, 25.0, 3.0), None);
    }

    #[test]
    fn time_ticks_cover_both_ends() {
        let axis = TimeAxis {
            granularity: Granularity::Annual,
            start: 2000 * 12,
            end: 2010 * 12,
        };
        let ticks = axis.ticks(4);
        assert_eq!(ticks.first().map(|t| t.1.as_str()), Some("2000"));
        assert!(ticks.len() <= 4);
    }

    #[test]
    fn chart_kind_toggles() {
        let mut model = ChartModel::build(&[named("a", &[("2020", 1.0)])]).unwrap();
        assert_eq!(model.kind, ChartKind::Line);
        model.toggle_kind();
        assert_eq!(model.kind, ChartKind::Bar);
    }
}
