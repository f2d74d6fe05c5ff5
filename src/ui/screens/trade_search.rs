use crossterm::event::{self, Event, KeyCode};
use ratatui::{prelude::*, widgets::*};
use std::time::Duration;

use crate::app::TradeForm;
use crate::error::Result;
use crate::ui::components::utils::{is_ctrl_c, split_vertical};
use crate::ui::components::{InputKind, TextInput};
use crate::ui::styles::{header_text, help_style, selection_style};
use crate::ui::TerminalGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAction {
    Submit,
    Back,
}

const FIELD_COUNT: usize = 4;
const RENT_FIELD: usize = 3;

/// Edit `form` in place. The preview closure renders the first request URL
/// or explains why the form cannot be submitted yet.
pub fn run_trade_search(
    form: &mut TradeForm,
    region: &str,
    preview: &dyn Fn(&TradeForm) -> Result<String>,
) -> Result<SearchAction> {
    let mut guard = TerminalGuard::new()?;
    let mut inputs = [
        TextInput::new("LAWD codes (blank = region selection)", InputKind::CodeList, 120)
            .with_value(&form.lawd_text),
        TextInput::new("From (YYYYMM)", InputKind::Digits, 6).with_value(&form.from),
        TextInput::new("To (YYYYMM)", InputKind::Digits, 6).with_value(&form.to),
    ];
    let mut focus = 0usize;

    loop {
        form.lawd_text = inputs[0].value().to_string();
        form.from = inputs[1].value().to_string();
        form.to = inputs[2].value().to_string();
        let preview_line = match preview(form) {
            Ok(url) => Line::from(vec![
                Span::styled("Final URL: ", Style::default().fg(Color::Green)),
                Span::raw(url),
            ]),
            Err(err) => Line::from(Span::styled(
                format!("Not ready: {}", err),
                Style::default().fg(Color::Yellow),
            )),
        };

        guard.terminal_mut().draw(|f| {
            let chunks = split_vertical(
                f.size(),
                &[
                    Constraint::Length(2),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Min(3),
                    Constraint::Length(1),
                ],
            );

            let mut header = header_text("Apartment trade search");
            header
                .lines
                .push(Line::from(format!("Region selection: {}", region)));
            f.render_widget(Paragraph::new(header), chunks[0]);

            for (idx, input) in inputs.iter().enumerate() {
                f.render_widget(input.widget(focus == idx), chunks[idx + 1]);
            }

            let checkbox = if form.include_rent { "[x]" } else { "[ ]" };
            let mut rent_block = Block::default().borders(Borders::ALL).title("Rent");
            if focus == RENT_FIELD {
                rent_block = rent_block.border_style(Style::default().fg(Color::Cyan));
            }
            let rent_style = if focus == RENT_FIELD {
                selection_style()
            } else {
                Style::default()
            };
            f.render_widget(
                Paragraph::new(Span::styled(
                    format!("{} also fetch 전월세 (rent) records", checkbox),
                    rent_style,
                ))
                .block(rent_block),
                chunks[4],
            );

            f.render_widget(
                Paragraph::new(preview_line.clone())
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title("Preview")),
                chunks[5],
            );

            let help = Paragraph::new(
                "Tab/↓ next • Shift+Tab/↑ prev • Space toggle rent • Enter fetch • Esc back",
            )
            .style(help_style());
            f.render_widget(help, chunks[6]);
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(k) = event::read()? else {
            continue;
        };
        match k.code {
            _ if is_ctrl_c(&k) => {
                guard.restore()?;
                return Ok(SearchAction::Back);
            }
            KeyCode::Esc => {
                guard.restore()?;
                return Ok(SearchAction::Back);
            }
            KeyCode::Enter => {
                guard.restore()?;
                return Ok(SearchAction::Submit);
            }
            KeyCode::Tab | KeyCode::Down => focus = (focus + 1) % FIELD_COUNT,
            KeyCode::BackTab | KeyCode::Up => focus = (focus + FIELD_COUNT - 1) % FIELD_COUNT,
            KeyCode::Char(' ') if focus == RENT_FIELD => form.include_rent = !form.include_rent,
            KeyCode::Backspace if focus < RENT_FIELD => inputs[focus].backspace(),
            KeyCode::Char(c) if focus < RENT_FIELD => {
                inputs[focus].push(c);
            }
            _ => {}
        }
    }
}
