use crossterm::event::{self, Event, KeyCode};
use log::warn;
use ratatui::{prelude::*, widgets::*};
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{NamedSeries, SeriesRange, StatEntry, StatItem, StatsClient, StatsProvider};
use crate::records::{SavedSeries, SeriesShelf};
use crate::ui::components::utils::{is_ctrl_c, screen_chunks, split_vertical, wrap_next, wrap_prev};
use crate::ui::components::{InputKind, TextInput};
use crate::ui::styles::{header_text, help_style, Notice};
use crate::ui::TerminalGuard;
use crate::utils::ellipsize;

const MAX_NAME_CHARS: usize = 40;

/// A series the user asked to load, with the query that produced it.
#[derive(Debug)]
pub enum StatsOutcome {
    Loaded(SavedSeries, NamedSeries),
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Providers,
    Catalog,
    Items,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Catalog,
    Items,
    Series,
    Saved(usize),
}

struct Browser<'a> {
    config: &'a Config,
    shelf: &'a SeriesShelf,
    stage: Stage,
    client: Option<StatsClient>,
    trail: Vec<StatEntry>,
    entries: Vec<StatEntry>,
    entry: Option<StatEntry>,
    items: Vec<StatItem>,
    item: Option<StatItem>,
    range: [TextInput; 3],
    range_focus: usize,
    selected: usize,
    pending: Option<Pending>,
    notice: Option<Notice>,
}

impl<'a> Browser<'a> {
    fn new(config: &'a Config, shelf: &'a SeriesShelf) -> Self {
        Self {
            config,
            shelf,
            stage: Stage::Providers,
            client: None,
            trail: Vec::new(),
            entries: Vec::new(),
            entry: None,
            items: Vec::new(),
            item: None,
            range: [
                TextInput::new("Cycle (A/Q/M or provider code)", InputKind::Text, 8),
                TextInput::new("Start", InputKind::Text, 10),
                TextInput::new("End", InputKind::Text, 10),
            ],
            range_focus: 1,
            selected: 0,
            pending: None,
            notice: None,
        }
    }

    fn provider_label(&self) -> &'static str {
        self.client
            .as_ref()
            .map(|c| c.provider().label())
            .unwrap_or("Statistics")
    }

    fn len(&self) -> usize {
        match self.stage {
            Stage::Providers => StatsProvider::ALL.len() + self.shelf.len(),
            Stage::Catalog => self.entries.len(),
            Stage::Items => self.items.len(),
            Stage::Range => 0,
        }
    }

    fn breadcrumb(&self) -> String {
        let mut parts = vec![self.provider_label().to_string()];
        parts.extend(self.trail.iter().map(|e| e.name.clone()));
        if matches!(self.stage, Stage::Items | Stage::Range) {
            if let Some(entry) = &self.entry {
                parts.push(entry.name.clone());
            }
        }
        if self.stage == Stage::Range {
            if let Some(item) = &self.item {
                parts.push(item.name.clone());
            }
        }
        parts.join(" > ")
    }

    fn rows(&self) -> Vec<Line<'static>> {
        match self.stage {
            Stage::Providers => StatsProvider::ALL
                .iter()
                .map(|p| Line::from(format!("{:<20} browse catalog", p.label())))
                .chain(self.shelf.iter().map(|s| {
                    Line::from(vec![
                        Span::styled("saved  ", Style::default().fg(Color::Green)),
                        Span::raw(format!("{} ({})", s.name, s.provider.label())),
                    ])
                }))
                .collect(),
            Stage::Catalog => self
                .entries
                .iter()
                .map(|e| {
                    let marker = if e.has_children { "▸ " } else { "  " };
                    Line::from(vec![
                        Span::raw(marker),
                        Span::styled(
                            format!("{:<12}", e.code),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!(" {} ", ellipsize(&e.name, MAX_NAME_CHARS))),
                        Span::styled(e.cycle.clone(), Style::default().fg(Color::Gray)),
                    ])
                })
                .collect(),
            Stage::Items => self
                .items
                .iter()
                .map(|i| {
                    Line::from(vec![
                        Span::styled(
                            format!("{:<14}", i.code),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!(" {} ", ellipsize(&i.name, MAX_NAME_CHARS))),
                        Span::styled(
                            format!("[{}] {} ~ {} {}", i.cycle, i.start, i.end, i.unit),
                            Style::default().fg(Color::Gray),
                        ),
                    ])
                })
                .collect(),
            Stage::Range => Vec::new(),
        }
    }

    fn current_range(&self) -> SeriesRange {
        SeriesRange {
            cycle: self.range[0].value().trim().to_string(),
            start: self.range[1].value().trim().to_string(),
            end: self.range[2].value().trim().to_string(),
        }
    }

    fn enter(&mut self) {
        match self.stage {
            Stage::Providers => {
                let providers = StatsProvider::ALL.len();
                if self.selected >= providers {
                    self.pending = Some(Pending::Saved(self.selected - providers));
                    return;
                }
                let provider = StatsProvider::ALL[self.selected];
                match StatsClient::new(self.config, provider) {
                    Ok(client) => {
                        self.client = Some(client);
                        self.trail.clear();
                        self.pending = Some(Pending::Catalog);
                    }
                    Err(err) => self.notice = Some(Notice::warning(err.to_string())),
                }
            }
            Stage::Catalog => {
                let Some(entry) = self.entries.get(self.selected).cloned() else {
                    return;
                };
                if entry.has_children {
                    self.trail.push(entry);
                    self.pending = Some(Pending::Catalog);
                } else {
                    self.entry = Some(entry);
                    self.pending = Some(Pending::Items);
                }
            }
            Stage::Items => {
                let Some(item) = self.items.get(self.selected).cloned() else {
                    return;
                };
                let range = SeriesRange::from_item(&item);
                self.range[0].set(&range.cycle);
                self.range[1].set(&range.start);
                self.range[2].set(&range.end);
                self.range_focus = 1;
                self.item = Some(item);
                self.stage = Stage::Range;
            }
            Stage::Range => self.pending = Some(Pending::Series),
        }
    }

    /// Step back one level; `false` when already at the provider list.
    fn back(&mut self) -> bool {
        self.notice = None;
        self.selected = 0;
        match self.stage {
            Stage::Providers => return false,
            Stage::Catalog => {
                if self.trail.pop().is_some() {
                    self.pending = Some(Pending::Catalog);
                } else {
                    self.stage = Stage::Providers;
                    self.client = None;
                }
            }
            Stage::Items => self.stage = Stage::Catalog,
            Stage::Range => self.stage = Stage::Items,
        }
        true
    }

    fn run_pending(&mut self, pending: Pending) -> Option<StatsOutcome> {
        let result = match pending {
            Pending::Saved(index) => return self.load_saved(index),
            Pending::Catalog => self.load_catalog(),
            Pending::Items => self.load_items(),
            Pending::Series => return self.load_series(),
        };
        if let Err(err) = result {
            warn!("{} request failed: {}", self.provider_label(), err);
            self.notice = Some(Notice::error(err.to_string()));
        }
        None
    }

    fn load_catalog(&mut self) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let entries = client.catalog(self.trail.last())?;
        self.notice = entries
            .is_empty()
            .then(|| Notice::info("The catalog returned no entries"));
        self.entries = entries;
        self.stage = Stage::Catalog;
        self.selected = 0;
        Ok(())
    }

    fn load_items(&mut self) -> Result<()> {
        let (Some(client), Some(entry)) = (&self.client, &self.entry) else {
            return Ok(());
        };
        let items = client.items(entry)?;
        if items.is_empty() {
            self.notice = Some(Notice::info(format!("{} has no items", entry.name)));
            return Ok(());
        }
        self.items = items;
        self.stage = Stage::Items;
        self.selected = 0;
        self.notice = None;
        Ok(())
    }

    fn load_series(&mut self) -> Option<StatsOutcome> {
        let (Some(client), Some(entry), Some(item)) = (&self.client, &self.entry, &self.item)
        else {
            return None;
        };
        let saved = SavedSeries {
            name: format!("{} {}", entry.name, item.name).trim().to_string(),
            provider: client.provider(),
            entry: entry.clone(),
            item: item.clone(),
            range: self.current_range(),
        };
        self.fetch_saved(saved)
    }

    fn load_saved(&mut self, index: usize) -> Option<StatsOutcome> {
        let saved = self.shelf.iter().nth(index)?.clone();
        self.fetch_saved(saved)
    }

    fn fetch_saved(&mut self, saved: SavedSeries) -> Option<StatsOutcome> {
        let result = StatsClient::new(self.config, saved.provider)
            .and_then(|client| client.series(&saved.entry, &saved.item, &saved.range));
        match result {
            Ok(series) if series.is_empty() => {
                self.notice = Some(Notice::info(format!(
                    "No data points for {} in {} ~ {}",
                    saved.name, saved.range.start, saved.range.end
                )));
                None
            }
            Ok(series) => Some(StatsOutcome::Loaded(saved, series)),
            Err(err) => {
                warn!("Series request for {} failed: {}", saved.name, err);
                self.notice = Some(Notice::error(err.to_string()));
                None
            }
        }
    }
}

/// Browse provider catalogs down to one series. Lookups run on the UI thread
/// after a "Loading" frame is drawn.
pub fn run_stats_browser(config: &Config, shelf: &SeriesShelf) -> Result<StatsOutcome> {
    let mut guard = TerminalGuard::new()?;
    let mut browser = Browser::new(config, shelf);

    loop {
        let rows = browser.rows();
        guard.terminal_mut().draw(|f| {
            let chunks = screen_chunks(f.size(), 3);

            let mut header = header_text("Statistics");
            header.lines.push(Line::from(browser.breadcrumb()));
            if browser.pending.is_some() {
                header.lines.push(Line::from("Loading…"));
            } else if let Some(notice) = &browser.notice {
                header.lines.push(notice.line());
            }
            f.render_widget(Paragraph::new(header), chunks[0]);

            if browser.stage == Stage::Range {
                let parts = split_vertical(
                    chunks[1],
                    &[
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Min(0),
                    ],
                );
                for (idx, input) in browser.range.iter().enumerate() {
                    f.render_widget(input.widget(browser.range_focus == idx), parts[idx]);
                }
            } else {
                let items: Vec<ListItem> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, line)| {
                        let mut item = ListItem::new(line.clone());
                        if i == browser.selected {
                            item = item.style(Style::default().add_modifier(Modifier::REVERSED));
                        }
                        item
                    })
                    .collect();
                let mut state = ListState::default();
                state.select(Some(browser.selected));
                let title = match browser.stage {
                    Stage::Providers => "Providers and saved series".to_string(),
                    Stage::Catalog => format!("Catalog ({})", rows.len()),
                    _ => format!("Items ({})", rows.len()),
                };
                f.render_stateful_widget(
                    List::new(items).block(Block::default().borders(Borders::ALL).title(title)),
                    chunks[1],
                    &mut state,
                );
            }

            let help = match browser.stage {
                Stage::Range => "Tab/↑/↓ field • Enter load series • Esc back",
                _ => "↑/↓ or j/k navigate • Enter open • ←/Backspace up • Esc back",
            };
            f.render_widget(Paragraph::new(help).style(help_style()), chunks[2]);
        })?;

        if let Some(pending) = browser.pending.take() {
            if let Some(outcome) = browser.run_pending(pending) {
                guard.restore()?;
                return Ok(outcome);
            }
            continue;
        }

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(k) = event::read()? else {
            continue;
        };
        if is_ctrl_c(&k) {
            guard.restore()?;
            return Ok(StatsOutcome::Back);
        }

        if browser.stage == Stage::Range {
            let focus = browser.range_focus;
            match k.code {
                KeyCode::Esc => {
                    browser.back();
                }
                KeyCode::Enter => browser.enter(),
                KeyCode::Tab | KeyCode::Down => browser.range_focus = (focus + 1) % 3,
                KeyCode::BackTab | KeyCode::Up => browser.range_focus = (focus + 2) % 3,
                KeyCode::Backspace => browser.range[focus].backspace(),
                KeyCode::Char(c) => {
                    browser.range[focus].push(c);
                }
                _ => {}
            }
            continue;
        }

        let len = browser.len();
        match k.code {
            KeyCode::Up | KeyCode::Char('k') => browser.selected = wrap_prev(browser.selected, len),
            KeyCode::Down | KeyCode::Char('j') => {
                browser.selected = wrap_next(browser.selected, len)
            }
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => browser.enter(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace | KeyCode::Esc => {
                if !browser.back() {
                    guard.restore()?;
                    return Ok(StatsOutcome::Back);
                }
            }
            _ => {}
        }
    }
}
