use crossterm::event::{self, Event, KeyCode};
use ratatui::{prelude::*, widgets::*};
use std::sync::mpsc::TryRecvError;
use std::time::Duration;

use crate::error::Result;
use crate::fetch::{BatchHandle, FetchEvent, TradeRecord};
use crate::ui::components::utils::{centered_rect, is_ctrl_c, split_vertical};
use crate::ui::styles::help_style;
use crate::ui::TerminalGuard;

/// How a batch ended, as seen from the progress screen.
#[derive(Debug)]
pub enum FetchOutcome {
    Finished(Vec<TradeRecord>),
    Failed(String),
    Cancelled,
}

/// Show worker progress until the batch finishes, fails or is cancelled with Esc.
pub fn run_fetch_progress(handle: BatchHandle, total_steps: usize) -> Result<FetchOutcome> {
    let mut guard = TerminalGuard::new()?;
    let mut done = 0usize;
    let mut total = total_steps;
    let mut cancelling = false;

    let outcome = loop {
        let mut finished = None;
        loop {
            match handle.events.try_recv() {
                Ok(FetchEvent::Progress { done: d, total: t }) => {
                    done = d;
                    total = t;
                }
                Ok(FetchEvent::Finished(rows)) => finished = Some(FetchOutcome::Finished(rows)),
                Ok(FetchEvent::Failed(message)) => finished = Some(FetchOutcome::Failed(message)),
                Ok(FetchEvent::Cancelled) => finished = Some(FetchOutcome::Cancelled),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if finished.is_none() {
                        finished = Some(FetchOutcome::Failed(
                            "Fetch worker stopped unexpectedly".to_string(),
                        ));
                    }
                    break;
                }
            }
            if finished.is_some() {
                break;
            }
        }
        if let Some(outcome) = finished {
            break outcome;
        }

        let ratio = if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };
        guard.terminal_mut().draw(|f| {
            let area = centered_rect(60, 25, f.size());
            f.render_widget(Clear, area);
            let title = if cancelling {
                "Cancelling…"
            } else {
                "Fetching trade records..."
            };
            let block = Block::default().borders(Borders::ALL).title(title);
            f.render_widget(block.clone(), area);
            let chunks = split_vertical(
                block.inner(area),
                &[
                    Constraint::Length(1),
                    Constraint::Length(1),
                    Constraint::Length(1),
                    Constraint::Length(1),
                ],
            );
            let status = if cancelling {
                "Waiting for the in-flight request to finish"
            } else {
                "One step per region and month"
            };
            f.render_widget(
                Paragraph::new(status).alignment(Alignment::Center),
                chunks[0],
            );
            f.render_widget(
                Gauge::default()
                    .gauge_style(Style::default().fg(Color::Cyan))
                    .ratio(ratio)
                    .label(""),
                chunks[1],
            );
            f.render_widget(
                Paragraph::new(format!(
                    "Progress: {} / {} ({:.0}%)",
                    done.min(total),
                    total,
                    ratio * 100.0
                ))
                .alignment(Alignment::Center),
                chunks[2],
            );
            f.render_widget(
                Paragraph::new("Esc to cancel")
                    .style(help_style())
                    .alignment(Alignment::Center),
                chunks[3],
            );
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(k) = event::read()? {
                if !cancelling && (k.code == KeyCode::Esc || is_ctrl_c(&k)) {
                    cancelling = true;
                    handle.cancel();
                }
            }
        }
    };

    guard.restore()?;
    handle.join();
    Ok(outcome)
}
