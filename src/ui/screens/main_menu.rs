use crossterm::event::{self, Event, KeyCode};
use ratatui::{prelude::*, widgets::*};
use std::time::Duration;

use crate::error::Result;
use crate::ui::components::utils::{is_ctrl_c, screen_chunks, wrap_next, wrap_prev};
use crate::ui::styles::{header_text, help_style, Notice};
use crate::ui::TerminalGuard;

/// Logical actions triggered from the main menu screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Regions,
    TradeSearch,
    Results,
    Statistics,
    Chart,
    Quit,
}

/// What the header shows about the current session.
#[derive(Debug, Clone, Default)]
pub struct MenuContext {
    pub region: String,
    pub table_rows: Option<usize>,
    pub chart_series: usize,
    pub saved_series: usize,
}

const ITEMS: [(&str, &str, MenuAction); 6] = [
    (
        "Regions",
        "Pick province / district / dong from vworld",
        MenuAction::Regions,
    ),
    (
        "Trade search",
        "Fetch apartment sale and rent records",
        MenuAction::TradeSearch,
    ),
    (
        "Results",
        "Filter, sort and export the last trade table",
        MenuAction::Results,
    ),
    (
        "Statistics",
        "Browse ECOS, indicator portal and KOSIS series",
        MenuAction::Statistics,
    ),
    ("Chart", "Overlay loaded series on one chart", MenuAction::Chart),
    ("Quit", "Exit kr-data", MenuAction::Quit),
];

pub fn run_main_menu(context: &MenuContext, notice: Option<&Notice>) -> Result<MenuAction> {
    let mut guard = TerminalGuard::new()?;
    let mut selected = 0usize;

    loop {
        guard.terminal_mut().draw(|f| {
            let chunks = screen_chunks(f.size(), 4);

            let rows = context
                .table_rows
                .map(|n| format!("{} rows", n))
                .unwrap_or_else(|| "none".to_string());
            let mut header = header_text("kr-data — Korean open data browser");
            header.lines.push(Line::from(format!(
                "Region: {} • Trades: {} • Chart: {} series • Saved: {}",
                context.region, rows, context.chart_series, context.saved_series
            )));
            if let Some(notice) = notice {
                header.lines.push(notice.line());
            }
            f.render_widget(Paragraph::new(header), chunks[0]);

            let list_items: Vec<ListItem> = ITEMS
                .iter()
                .enumerate()
                .map(|(i, (label, description, _))| {
                    let line = Line::from(vec![
                        Span::styled(
                            format!("{:<14}", label),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw("  "),
                        Span::styled(*description, Style::default().fg(Color::Gray)),
                    ]);
                    let mut item = ListItem::new(line);
                    if i == selected {
                        item = item.style(Style::default().add_modifier(Modifier::REVERSED));
                    }
                    item
                })
                .collect();
            let list = List::new(list_items).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Menu (↑/↓ or j/k)"),
            );
            f.render_widget(list, chunks[1]);

            let help = Paragraph::new("↑/↓ or j/k navigate • Enter select • Esc quit • Ctrl+C exit")
                .style(help_style());
            f.render_widget(help, chunks[2]);
        })?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(k) = event::read()? {
                match k.code {
                    _ if is_ctrl_c(&k) => {
                        guard.restore()?;
                        return Ok(MenuAction::Quit);
                    }
                    KeyCode::Up | KeyCode::Char('k') => selected = wrap_prev(selected, ITEMS.len()),
                    KeyCode::Down | KeyCode::Char('j') => {
                        selected = wrap_next(selected, ITEMS.len())
                    }
                    KeyCode::Enter => {
                        // Leave the alternate screen before returning so the caller can print freely.
                        guard.restore()?;
                        return Ok(ITEMS[selected].2);
                    }
                    KeyCode::Esc | KeyCode::Char('q') => {
                        guard.restore()?;
                        return Ok(MenuAction::Quit);
                    }
                    _ => {}
                }
            }
        }
    }
}
