use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine},
        Block, Borders,
    },
};
use unicode_width::UnicodeWidthStr;

use crate::series::{compare, ChartKind, ChartModel, Comparison, Hit, PlotArea};

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];
const LEFT_AXIS_WIDTH: u16 = 10;
const SECONDARY_AXIS_WIDTH: u16 = 10;
const TOP_MARGIN: u16 = 1;
const BOTTOM_MARGIN: u16 = 2;
const VALUE_TICKS: usize = 5;
const HIT_RADIUS: f64 = 2.5;

pub fn series_color(index: usize) -> Color {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

/// Hover target and up to two pinned points for the comparison readout.
#[derive(Debug, Default, Clone)]
pub struct ChartState {
    pub hover: Option<Hit>,
    pins: Vec<Hit>,
    plot: Option<PlotArea>,
}

impl ChartState {
    pub fn pins(&self) -> &[Hit] {
        &self.pins
    }

    /// Pin `hit`, or unpin it when already pinned. A third pin replaces the oldest.
    pub fn toggle_pin(&mut self, hit: Hit) {
        if let Some(pos) = self.pins.iter().position(|p| *p == hit) {
            self.pins.remove(pos);
            return;
        }
        if self.pins.len() == 2 {
            self.pins.remove(0);
        }
        self.pins.push(hit);
    }

    pub fn clear_pins(&mut self) {
        self.pins.clear();
    }

    /// Remember where the last frame put the plot, for mouse hit-testing.
    pub fn set_plot(&mut self, plot: PlotArea) {
        self.plot = Some(plot);
    }

    /// Update the hover target from a mouse position in terminal cells.
    pub fn hover_at(&mut self, model: &ChartModel, column: u16, row: u16) -> Option<Hit> {
        self.hover = self.plot.and_then(|plot| {
            model.hit_test(&plot, column as f64 + 0.5, row as f64 + 0.5, HIT_RADIUS)
        });
        self.hover
    }

    pub fn comparison(&self, model: &ChartModel) -> Option<Comparison> {
        let [a, b] = self.pins.as_slice() else {
            return None;
        };
        Some(compare(model.point(*a)?, model.point(*b)?))
    }
}

/// Compact tick label that fits the axis gutter.
pub fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e7 {
        format!("{:.2e}", value)
    } else if abs >= 1000.0 {
        format!("{:.0}", value)
    } else if abs >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Where the series are drawn inside `inner`, in terminal cells.
pub fn plot_area(inner: Rect, axes: usize) -> PlotArea {
    let secondary = axes.saturating_sub(1) as u16;
    let right = secondary.saturating_mul(SECONDARY_AXIS_WIDTH).max(1);
    PlotArea {
        left: (inner.x + LEFT_AXIS_WIDTH) as f64,
        top: (inner.y + TOP_MARGIN) as f64,
        width: inner
            .width
            .saturating_sub(LEFT_AXIS_WIDTH + right)
            .max(1) as f64,
        height: inner
            .height
            .saturating_sub(TOP_MARGIN + BOTTOM_MARGIN)
            .max(1) as f64,
    }
}

/// Cell coordinates (y down) to canvas coordinates (y up).
fn to_canvas(inner: Rect, (x, y): (f64, f64)) -> (f64, f64) {
    (x - inner.x as f64, (inner.y + inner.height) as f64 - y)
}

/// Draw every series over the shared time axis and return the plot area used.
pub fn render_series_chart(
    f: &mut Frame<'_>,
    area: Rect,
    model: &ChartModel,
    state: &ChartState,
    title: &str,
) -> PlotArea {
    let mut legend: Vec<Span> = vec![Span::raw(format!("{} ", title))];
    for (idx, series) in model.series.iter().enumerate() {
        legend.push(Span::styled(
            format!("■ {} ", series.name),
            Style::default().fg(series_color(idx)),
        ));
    }
    let block = Block::default().borders(Borders::ALL).title(Line::from(legend));
    let inner = block.inner(area);
    let plot = plot_area(inner, model.axes.len());

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, inner.width.max(1) as f64])
        .y_bounds([0.0, inner.height.max(1) as f64])
        .paint(|ctx| {
            draw_axes(ctx, inner, &plot, model);
            ctx.layer();
            draw_series(ctx, inner, &plot, model);
            ctx.layer();
            draw_markers(ctx, inner, &plot, model, state);
        });
    f.render_widget(canvas, area);
    plot
}

fn draw_axes(ctx: &mut Context<'_>, inner: Rect, plot: &PlotArea, model: &ChartModel) {
    let axis_color = Color::DarkGray;
    let bottom = plot.top + plot.height;
    let right = plot.left + plot.width;

    let (x1, y1) = to_canvas(inner, (plot.left, bottom));
    let (x2, y2) = to_canvas(inner, (right, bottom));
    ctx.draw(&CanvasLine {
        x1,
        y1,
        x2,
        y2,
        color: axis_color,
    });

    for axis in &model.axes {
        let axis_x = if axis.is_primary() {
            plot.left
        } else {
            right + ((axis.offset - 1) as u16 * SECONDARY_AXIS_WIDTH) as f64 + 1.0
        };
        let color = if axis.is_primary() {
            axis_color
        } else {
            series_color(axis.offset)
        };
        let (x1, y1) = to_canvas(inner, (axis_x, plot.top));
        let (x2, y2) = to_canvas(inner, (axis_x, bottom));
        ctx.draw(&CanvasLine {
            x1,
            y1,
            x2,
            y2,
            color,
        });

        for value in axis.ticks(VALUE_TICKS) {
            let label = format_value(value);
            let y = model.y_pixel(plot, axis.offset, value);
            let label_x = if axis.is_primary() {
                inner.x as f64
            } else {
                axis_x + 1.0
            };
            let (cx, cy) = to_canvas(inner, (label_x, y));
            ctx.print(
                cx,
                cy,
                Span::styled(label, Style::default().fg(series_color(axis.offset))),
            );
        }
    }

    let max_ticks = (plot.width / 9.0).floor().max(2.0) as usize;
    for (x, label) in model.time.ticks(max_ticks) {
        let half = UnicodeWidthStr::width(label.as_str()) as f64 / 2.0;
        let px = (model.x_pixel(plot, x) - half).max(inner.x as f64);
        let (cx, _) = to_canvas(inner, (px, bottom));
        ctx.print(cx, 0.0, Span::styled(label, Style::default().fg(Color::Gray)));
    }
}

fn draw_series(ctx: &mut Context<'_>, inner: Rect, plot: &PlotArea, model: &ChartModel) {
    let baseline = plot.top + plot.height;
    for (idx, series) in model.series.iter().enumerate() {
        let color = series_color(idx);
        let pixels: Vec<(f64, f64)> = series
            .points
            .iter()
            .map(|point| to_canvas(inner, model.to_pixel(plot, idx, point)))
            .collect();

        if idx == 0 && model.kind == ChartKind::Bar {
            let (_, base) = to_canvas(inner, (0.0, baseline));
            for (x, y) in &pixels {
                for dx in [-0.3, 0.0, 0.3] {
                    ctx.draw(&CanvasLine {
                        x1: x + dx,
                        y1: base,
                        x2: x + dx,
                        y2: *y,
                        color,
                    });
                }
            }
            continue;
        }

        if let [(x, y)] = pixels.as_slice() {
            ctx.draw(&CanvasLine {
                x1: *x,
                y1: *y,
                x2: *x,
                y2: *y,
                color,
            });
        }
        for pair in pixels.windows(2) {
            ctx.draw(&CanvasLine {
                x1: pair[0].0,
                y1: pair[0].1,
                x2: pair[1].0,
                y2: pair[1].1,
                color,
            });
        }
    }
}

fn draw_markers(
    ctx: &mut Context<'_>,
    inner: Rect,
    plot: &PlotArea,
    model: &ChartModel,
    state: &ChartState,
) {
    for hit in state.pins() {
        if let Some(point) = model.point(*hit) {
            let (x, y) = to_canvas(inner, model.to_pixel(plot, hit.series, point));
            ctx.print(x, y, Span::styled("◆", Style::default().fg(Color::White)));
        }
    }

    let Some(hit) = state.hover else {
        return;
    };
    let (Some(point), Some(series)) = (model.point(hit), model.series.get(hit.series)) else {
        return;
    };
    let (x, y) = to_canvas(inner, model.to_pixel(plot, hit.series, point));
    ctx.print(x, y, Span::styled("●", Style::default().fg(series_color(hit.series))));

    let tooltip = format!(
        " {} {} = {} {}",
        series.name,
        point.label,
        format_value(point.y),
        series.unit
    );
    let width = UnicodeWidthStr::width(tooltip.as_str()) as f64;
    let tip_x = if x + 1.0 + width > inner.width as f64 {
        (x - width - 1.0).max(0.0)
    } else {
        x + 1.0
    };
    let tip_y = (y + 1.0).min(inner.height as f64 - 1.0);
    ctx.print(
        tip_x,
        tip_y,
        Span::styled(
            tooltip.trim_end().to_string(),
            Style::default().fg(Color::Black).bg(Color::Gray),
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{NamedSeries, SeriesPoint};

    fn model() -> ChartModel {
        let series = NamedSeries {
            name: "CPI".to_string(),
            unit: "%".to_string(),
            points: ["2020", "2021", "2022"]
                .iter()
                .zip([100.0, 110.0, 121.0])
                .map(|(label, value)| SeriesPoint {
                    label: label.to_string(),
                    value,
                })
                .collect(),
        };
        ChartModel::build(&[series]).unwrap()
    }

    #[test]
    fn third_pin_replaces_the_oldest_and_repeat_unpins() {
        let mut state = ChartState::default();
        let hit = |point| Hit { series: 0, point };
        state.toggle_pin(hit(0));
        state.toggle_pin(hit(1));
        state.toggle_pin(hit(2));
        assert_eq!(state.pins(), &[hit(1), hit(2)]);

        state.toggle_pin(hit(2));
        assert_eq!(state.pins(), &[hit(1)]);
    }

    #[test]
    fn comparison_needs_two_pins() {
        let model = model();
        let mut state = ChartState::default();
        state.toggle_pin(Hit { series: 0, point: 2 });
        assert!(state.comparison(&model).is_none());

        state.toggle_pin(Hit { series: 0, point: 0 });
        let comparison = state.comparison(&model).unwrap();
        assert_eq!(comparison.months, 24);
        assert!((comparison.cagr_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn hover_uses_the_last_plot_area() {
        let model = model();
        let mut state = ChartState::default();
        assert_eq!(state.hover_at(&model, 10, 10), None);

        let plot = plot_area(Rect::new(0, 0, 80, 20), 1);
        state.set_plot(plot);
        let (x, y) = model.to_pixel(&plot, 0, &model.series[0].points[2]);
        let hit = state.hover_at(&model, x as u16, y as u16);
        assert_eq!(hit, Some(Hit { series: 0, point: 2 }));
    }

    #[test]
    fn plot_area_reserves_gutters_for_secondary_axes() {
        let inner = Rect::new(1, 1, 100, 30);
        let single = plot_area(inner, 1);
        let triple = plot_area(inner, 3);
        assert_eq!(single.left, 11.0);
        assert_eq!(single.width, 89.0);
        assert_eq!(triple.width, 70.0);
        assert_eq!(single.height, 27.0);
    }

    #[test]
    fn tick_labels_stay_compact() {
        assert_eq!(format_value(3.14159), "3.14");
        assert_eq!(format_value(123.46), "123.5");
        assert_eq!(format_value(98765.4), "98765");
        assert_eq!(format_value(123456789.0), "1.23e8");
    }
}
