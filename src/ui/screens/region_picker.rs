use crossterm::event::{self, Event, KeyCode};
use log::warn;
use ratatui::{prelude::*, widgets::*};
use std::time::Duration;

use crate::error::Result;
use crate::fetch::{RegionCatalog, RegionEntry, RegionLevel, RegionSelection, RegionSource};
use crate::ui::components::utils::{
    is_ctrl_c, screen_chunks, split_horizontal, wrap_next, wrap_prev,
};
use crate::ui::styles::{header_text, help_style, selection_style, Notice};
use crate::ui::TerminalGuard;

const LEVELS: [RegionLevel; 3] = [
    RegionLevel::Province,
    RegionLevel::District,
    RegionLevel::Subdistrict,
];

/// Parent cache key of each column, derived from the current selection.
fn column_parent(level: RegionLevel, selection: &RegionSelection) -> Option<Option<String>> {
    match level {
        RegionLevel::Province => Some(None),
        RegionLevel::District => selection
            .province
            .as_ref()
            .map(|p| Some(level.parent_key(p.code()))),
        RegionLevel::Subdistrict => selection
            .district
            .as_ref()
            .map(|d| Some(level.parent_key(d.code()))),
    }
}

fn column_entries<'a>(
    catalog: &'a RegionCatalog,
    selection: &RegionSelection,
    level: RegionLevel,
) -> &'a [RegionEntry] {
    match column_parent(level, selection) {
        Some(parent) => catalog.cached(level, parent.as_deref()).unwrap_or_default(),
        None => &[],
    }
}

fn load_column(
    source: &dyn RegionSource,
    catalog: &mut RegionCatalog,
    selection: &RegionSelection,
    level: RegionLevel,
) -> Option<Notice> {
    let parent = column_parent(level, selection)?;
    match catalog.load(source, level, parent.as_deref()) {
        Ok(entries) if entries.is_empty() => Some(Notice::info(format!(
            "No {} entries returned",
            level.label()
        ))),
        Ok(_) => None,
        Err(err) => {
            warn!("{} lookup failed: {}", level.label(), err);
            Some(Notice::error(format!("{} lookup failed: {}", level.label(), err)))
        }
    }
}

/// Cascading province → district → dong picker. Lookups are cached in `catalog`.
pub fn run_region_picker(
    source: &dyn RegionSource,
    catalog: &mut RegionCatalog,
    selection: &mut RegionSelection,
) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut focus = 0usize;
    let mut cursors = [0usize; 3];
    let mut notice: Option<Notice> = None;
    let mut loading: Option<RegionLevel> = Some(RegionLevel::Province);

    loop {
        guard.terminal_mut().draw(|f| {
            let chunks = screen_chunks(f.size(), 3);

            let mut header = header_text("Regions");
            header
                .lines
                .push(Line::from(format!("Selected: {}", selection.describe())));
            if let Some(notice) = &notice {
                header.lines.push(notice.line());
            } else if let Some(level) = loading {
                header
                    .lines
                    .push(Line::from(format!("Loading {}…", level.label())));
            }
            f.render_widget(Paragraph::new(header), chunks[0]);

            let columns = split_horizontal(
                chunks[1],
                &[
                    Constraint::Percentage(30),
                    Constraint::Percentage(35),
                    Constraint::Percentage(35),
                ],
            );
            for (idx, level) in LEVELS.iter().enumerate() {
                let entries = column_entries(catalog, selection, *level);
                let chosen = match level {
                    RegionLevel::Province => selection.province.as_ref(),
                    RegionLevel::District => selection.district.as_ref(),
                    RegionLevel::Subdistrict => selection.subdistrict.as_ref(),
                };
                let items: Vec<ListItem> = entries
                    .iter()
                    .map(|entry| {
                        let marker = if chosen == Some(entry) { "✓ " } else { "  " };
                        ListItem::new(format!("{}{}", marker, entry.name))
                    })
                    .collect();

                let mut block = Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} ({})", level.label(), entries.len()));
                if idx == focus {
                    block = block.border_style(selection_style());
                }
                let list = List::new(items)
                    .block(block)
                    .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
                let mut state = ListState::default();
                if !entries.is_empty() {
                    state.select(Some(cursors[idx].min(entries.len() - 1)));
                }
                f.render_stateful_widget(list, columns[idx], &mut state);
            }

            let help = Paragraph::new(
                "↑/↓ or j/k move • Enter/→ choose • ←/h back • x clear • r reload • Esc done",
            )
            .style(help_style());
            f.render_widget(help, chunks[2]);
        })?;

        if let Some(level) = loading.take() {
            notice = load_column(source, catalog, selection, level);
            continue;
        }

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(k) = event::read()? else {
            continue;
        };
        let level = LEVELS[focus];
        let len = column_entries(catalog, selection, level).len();
        match k.code {
            _ if is_ctrl_c(&k) => break,
            KeyCode::Esc | KeyCode::Char('q') => break,
            KeyCode::Up | KeyCode::Char('k') => cursors[focus] = wrap_prev(cursors[focus], len),
            KeyCode::Down | KeyCode::Char('j') => cursors[focus] = wrap_next(cursors[focus], len),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
                let Some(entry) = column_entries(catalog, selection, level)
                    .get(cursors[focus])
                    .cloned()
                else {
                    continue;
                };
                selection.select(level, entry);
                notice = None;
                if let Some(child) = level.child() {
                    focus += 1;
                    cursors[focus] = 0;
                    loading = Some(child);
                }
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => {
                focus = focus.saturating_sub(1);
            }
            KeyCode::Char('x') => {
                *selection = RegionSelection::default();
                focus = 0;
                cursors = [0; 3];
                notice = Some(Notice::info("Selection cleared"));
            }
            KeyCode::Char('r') => {
                catalog.clear();
                *selection = RegionSelection::default();
                focus = 0;
                cursors = [0; 3];
                loading = Some(RegionLevel::Province);
            }
            _ => {}
        }
    }

    guard.restore()?;
    Ok(())
}
