use crossterm::event::{self, Event, KeyCode};
use ratatui::{prelude::*, widgets::*};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::fetch::Column;
use crate::records::TradeTable;
use crate::ui::components::utils::{is_ctrl_c, scroll_into_view, split_vertical};
use crate::ui::components::{
    build_table, column_widths, header_row, highlight_row, InputKind, TextInput,
};
use crate::ui::styles::{help_style, Notice};
use crate::ui::TerminalGuard;

const MAX_COLUMN_WIDTH: usize = 28;

/// Rows and widths derived from the table; rebuilt after every view change.
struct View {
    rows: Vec<Vec<String>>,
    widths: Vec<Constraint>,
}

impl View {
    fn of(table: &TradeTable) -> Self {
        let rows = table.display_rows();
        let widths = column_widths(&table.headers(), &rows, MAX_COLUMN_WIDTH);
        Self { rows, widths }
    }
}

fn width_of(constraint: &Constraint) -> u16 {
    match constraint {
        Constraint::Length(w) => *w,
        _ => 0,
    }
}

/// First column to draw so that `focus` is on screen.
fn column_window(widths: &[Constraint], offset: usize, focus: usize, available: u16) -> usize {
    let mut offset = offset.min(focus);
    loop {
        let used: u16 = widths[offset..=focus]
            .iter()
            .map(|w| width_of(w).saturating_add(1))
            .fold(0u16, u16::saturating_add);
        if used <= available || offset == focus {
            return offset;
        }
        offset += 1;
    }
}

fn marks(table: &TradeTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .map(|column| {
            let mut mark = String::new();
            if let Some((sorted, order)) = table.sort() {
                if sorted == *column {
                    mark.push_str(order.arrow());
                }
            }
            if table.filters().contains_key(column) {
                mark.push('*');
            }
            mark
        })
        .collect()
}

/// Interactive view over the trade table: filters, category toggle, sort and CSV export.
pub fn run_results_table(
    table: &mut TradeTable,
    query: &str,
    export: &dyn Fn(&TradeTable) -> Result<PathBuf>,
) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut view = View::of(table);
    let mut selected = 0usize;
    let mut offset = 0usize;
    let mut focus = 0usize;
    let mut col_offset = 0usize;
    let mut capacity = 1usize;
    let mut editing: Option<TextInput> = None;
    let mut notice: Option<Notice> = None;

    loop {
        let columns: Vec<Column> = table.columns().to_vec();
        let headers = table.headers();
        let total = view.rows.len();
        if total == 0 {
            selected = 0;
        } else if selected >= total {
            selected = total - 1;
        }

        let snapshot: &TradeTable = table;
        guard.terminal_mut().draw(|f| {
            let input_height = if editing.is_some() { 3 } else { 0 };
            let chunks = split_vertical(
                f.size(),
                &[
                    Constraint::Min(3),
                    Constraint::Length(input_height),
                    Constraint::Length(1),
                    Constraint::Length(1),
                ],
            );
            let table_area = chunks[0];

            capacity = (table_area.height.saturating_sub(3) as usize).max(1);
            offset = scroll_into_view(selected, offset, capacity);
            col_offset = column_window(
                &view.widths,
                col_offset,
                focus,
                table_area.width.saturating_sub(2),
            );

            let visible_end = (offset + capacity).min(total);
            let body: Vec<Row> = view.rows[offset..visible_end]
                .iter()
                .enumerate()
                .map(|(i, cells)| {
                    let row = Row::new(cells[col_offset..].iter().map(|c| Cell::from(c.as_str())));
                    if offset + i == selected {
                        highlight_row(row)
                    } else {
                        row
                    }
                })
                .collect();

            let header = header_row(
                &headers[col_offset..],
                &marks(snapshot)[col_offset..],
                Some(focus - col_offset),
            );
            let title = format!(
                "{} • {} / {} rows • Category: {} • Filters: {}",
                query,
                total,
                snapshot.total_len(),
                snapshot.category().label(),
                snapshot.filters().len()
            );
            f.render_widget(
                build_table(body, header, view.widths[col_offset..].to_vec(), title),
                table_area,
            );

            if let Some(input) = &editing {
                f.render_widget(input.widget(true), chunks[1]);
            }

            let status = match &notice {
                Some(notice) => notice.line(),
                None => Line::from(format!(
                    "Row {}/{} • Column: {}",
                    if total == 0 { 0 } else { selected + 1 },
                    total,
                    columns[focus].header()
                )),
            };
            f.render_widget(Paragraph::new(status), chunks[2]);

            let help = if editing.is_some() {
                "Type filter text • Enter apply • Esc cancel"
            } else {
                "←/→ column • / filter • t toggle filter from row • F clear filters • c category • s sort • S unsort • e export CSV • Esc back"
            };
            f.render_widget(Paragraph::new(help).style(help_style()), chunks[3]);
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(k) = event::read()? else {
            continue;
        };

        if let Some(input) = editing.as_mut() {
            match k.code {
                KeyCode::Enter => {
                    table.set_filter(columns[focus], input.value());
                    editing = None;
                    view = View::of(table);
                    selected = 0;
                }
                KeyCode::Esc => editing = None,
                KeyCode::Backspace => input.backspace(),
                KeyCode::Char(c) => {
                    input.push(c);
                }
                _ => {}
            }
            continue;
        }

        notice = None;
        let mut changed = false;
        match k.code {
            _ if is_ctrl_c(&k) => break,
            KeyCode::Esc | KeyCode::Char('q') => break,
            KeyCode::Down | KeyCode::Char('j') => {
                if total > 0 {
                    selected = (selected + 1) % total;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if total > 0 {
                    selected = selected.checked_sub(1).unwrap_or(total - 1);
                }
            }
            KeyCode::PageDown => selected = (selected + capacity).min(total.saturating_sub(1)),
            KeyCode::PageUp => selected = selected.saturating_sub(capacity),
            KeyCode::Home => selected = 0,
            KeyCode::End => selected = total.saturating_sub(1),
            KeyCode::Right | KeyCode::Char('l') => focus = (focus + 1).min(columns.len() - 1),
            KeyCode::Left | KeyCode::Char('h') => focus = focus.saturating_sub(1),
            KeyCode::Char('/') | KeyCode::Char('f') => {
                let current = table
                    .filters()
                    .get(&columns[focus])
                    .cloned()
                    .unwrap_or_default();
                editing = Some(
                    TextInput::new(columns[focus].header(), InputKind::Text, 64)
                        .with_value(&current),
                );
            }
            KeyCode::Char('t') => {
                let value = table
                    .visible_row(selected)
                    .map(|row| row.cell(columns[focus]).to_string())
                    .unwrap_or_default();
                table.toggle_filter(columns[focus], &value);
                changed = true;
            }
            KeyCode::Char('F') => {
                table.clear_filters();
                changed = true;
            }
            KeyCode::Char('c') => {
                table.cycle_category();
                changed = true;
            }
            KeyCode::Char('s') => {
                table.sort_by(columns[focus]);
                changed = true;
            }
            KeyCode::Char('S') => {
                table.clear_sort();
                changed = true;
            }
            KeyCode::Char('e') => {
                notice = Some(match export(table) {
                    Ok(path) => Notice::info(format!("Exported to {}", path.display())),
                    Err(err) => Notice::error(format!("Export failed: {}", err)),
                });
            }
            _ => {}
        }
        if changed {
            view = View::of(table);
            selected = 0;
            offset = 0;
        }
    }

    guard.restore()?;
    Ok(())
}
