use crossterm::event::{self, Event, KeyCode, MouseButton, MouseEventKind};
use ratatui::{prelude::*, widgets::*};
use std::time::Duration;

use crate::error::Result;
use crate::fetch::NamedSeries;
use crate::series::{ChartKind, ChartModel, Hit};
use crate::ui::components::chart::format_value;
use crate::ui::components::utils::{centered_rect, is_ctrl_c, split_vertical};
use crate::ui::components::{render_series_chart, ChartState};
use crate::ui::styles::help_style;
use crate::ui::TerminalGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExit {
    Back,
    Clear,
}

/// Move the keyboard hover along a series, or onto the first point.
fn step_hover(model: &ChartModel, hover: Option<Hit>, delta: isize) -> Option<Hit> {
    let Some(hit) = hover else {
        return model.series.first().map(|_| Hit {
            series: 0,
            point: 0,
        });
    };
    let len = model.series.get(hit.series)?.points.len() as isize;
    let point = (hit.point as isize + delta).clamp(0, len - 1) as usize;
    Some(Hit { point, ..hit })
}

/// Jump the keyboard hover to the nearest-in-time point of the next series.
fn next_series(model: &ChartModel, hover: Option<Hit>) -> Option<Hit> {
    let hit = hover?;
    let x = model.point(hit)?.x;
    let series = (hit.series + 1) % model.series.len();
    let point = model.series[series]
        .points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| (p.x - x).abs())
        .map(|(idx, _)| idx)?;
    Some(Hit { series, point })
}

fn readout(model: &ChartModel, state: &ChartState) -> Line<'static> {
    if let Some(comparison) = state.comparison(model) {
        return Line::from(vec![
            Span::styled("Compare ", Style::default().fg(Color::Green)),
            Span::raw(comparison.to_string()),
        ]);
    }
    if let Some((hit, point)) = state.hover.and_then(|h| model.point(h).map(|p| (h, p))) {
        let series = &model.series[hit.series];
        return Line::from(format!(
            "{} • {} = {} {} • {} pinned",
            series.name,
            point.label,
            format_value(point.y),
            series.unit,
            state.pins().len()
        ));
    }
    Line::from(format!(
        "{} series • {} axis • {} pinned",
        model.series.len(),
        model.time.granularity.label(),
        state.pins().len()
    ))
}

/// Overlay `series` on a shared time axis. Mouse movement shows a tooltip;
/// click or Space pins up to two points for a comparison readout.
pub fn run_series_chart(series: &[NamedSeries]) -> Result<ChartExit> {
    let mut guard = TerminalGuard::with_mouse()?;
    let mut model = ChartModel::build(series);
    let mut state = ChartState::default();

    loop {
        guard.terminal_mut().draw(|f| {
            let chunks = split_vertical(
                f.size(),
                &[
                    Constraint::Min(5),
                    Constraint::Length(1),
                    Constraint::Length(1),
                ],
            );
            let Some(model) = &model else {
                let area = centered_rect(60, 20, f.size());
                f.render_widget(Clear, area);
                f.render_widget(
                    Paragraph::new("No plottable series. Load one from Statistics first.")
                        .alignment(Alignment::Center)
                        .block(Block::default().borders(Borders::ALL).title("Chart")),
                    area,
                );
                return;
            };

            let kind = match model.kind {
                ChartKind::Line => "line",
                ChartKind::Bar => "bar",
            };
            let plot = render_series_chart(f, chunks[0], model, &state, &format!("[{}]", kind));
            state.set_plot(plot);
            f.render_widget(Paragraph::new(readout(model, &state)), chunks[1]);
            f.render_widget(
                Paragraph::new(
                    "mouse hover • click/Space pin • ←/→ step • Tab next series • b line/bar • c clear pins • X clear chart • Esc back",
                )
                .style(help_style()),
                chunks[2],
            );
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let input = event::read()?;
        let Some(current) = model.as_mut() else {
            if let Event::Key(k) = input {
                if k.code == KeyCode::Esc || is_ctrl_c(&k) || k.code == KeyCode::Char('q') {
                    break;
                }
            }
            continue;
        };

        match input {
            Event::Mouse(m) => match m.kind {
                MouseEventKind::Moved => {
                    state.hover_at(current, m.column, m.row);
                }
                MouseEventKind::Down(MouseButton::Left) => {
                    if let Some(hit) = state.hover_at(current, m.column, m.row) {
                        state.toggle_pin(hit);
                    }
                }
                _ => {}
            },
            Event::Key(k) => match k.code {
                _ if is_ctrl_c(&k) => break,
                KeyCode::Esc | KeyCode::Char('q') => break,
                KeyCode::Char('X') => {
                    guard.restore()?;
                    return Ok(ChartExit::Clear);
                }
                KeyCode::Char('b') => current.toggle_kind(),
                KeyCode::Char('c') => state.clear_pins(),
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if let Some(hit) = state.hover {
                        state.toggle_pin(hit);
                    }
                }
                KeyCode::Left | KeyCode::Char('h') => state.hover = step_hover(current, state.hover, -1),
                KeyCode::Right | KeyCode::Char('l') => state.hover = step_hover(current, state.hover, 1),
                KeyCode::Tab => {
                    state.hover = next_series(current, state.hover)
                        .or_else(|| step_hover(current, None, 0));
                }
                _ => {}
            },
            _ => {}
        }
    }

    guard.restore()?;
    Ok(ChartExit::Back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SeriesPoint;

    fn named(name: &str, labels: &[&str]) -> NamedSeries {
        NamedSeries {
            name: name.to_string(),
            unit: String::new(),
            points: labels
                .iter()
                .enumerate()
                .map(|(i, label)| SeriesPoint {
                    label: label.to_string(),
                    value: i as f64,
                })
                .collect(),
        }
    }

    #[test]
    fn keyboard_hover_steps_within_a_series() {
        let model = ChartModel::build(&[named("a", &["2020", "2021", "2022"])]).unwrap();
        let start = step_hover(&model, None, 1);
        assert_eq!(start, Some(Hit { series: 0, point: 0 }));
        let moved = step_hover(&model, start, 5);
        assert_eq!(moved, Some(Hit { series: 0, point: 2 }));
        assert_eq!(step_hover(&model, moved, -9), start);
    }

    #[test]
    fn tab_jumps_to_nearest_point_of_next_series() {
        let model = ChartModel::build(&[
            named("annual", &["2020", "2021", "2022"]),
            named("monthly", &["202001", "202107", "202112"]),
        ])
        .unwrap();
        let hover = Some(Hit { series: 0, point: 2 });
        assert_eq!(
            next_series(&model, hover),
            Some(Hit { series: 1, point: 2 })
        );
    }
}
