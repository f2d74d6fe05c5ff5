use std::convert::TryFrom;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Row, Table},
};
use unicode_width::UnicodeWidthStr;

/// Widest cell per column (header included), padded and capped at `max`.
pub fn column_widths(headers: &[&str], rows: &[Vec<String>], max: usize) -> Vec<Constraint> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let data = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| UnicodeWidthStr::width(cell.as_str()))
                .max()
                .unwrap_or(0);
            let width = (UnicodeWidthStr::width(*header) + 2).max(data).min(max) + 1;
            Constraint::Length(u16::try_from(width).unwrap_or(u16::MAX))
        })
        .collect()
}

/// Yellow header row; `marks` carries the per-column suffix (sort arrow, filter flag).
pub fn header_row<'a>(headers: &[&str], marks: &[String], focused: Option<usize>) -> Row<'a> {
    let cells: Vec<Cell> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut content = (*header).to_string();
            if let Some(mark) = marks.get(idx).filter(|m| !m.is_empty()) {
                content.push(' ');
                content.push_str(mark);
            }
            let mut style = Style::default().fg(Color::Yellow);
            if focused == Some(idx) {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            Cell::from(content).style(style)
        })
        .collect();
    Row::new(cells)
}

pub fn build_table<'a>(
    rows: Vec<Row<'a>>,
    header: Row<'a>,
    widths: Vec<Constraint>,
    title: impl Into<String>,
) -> Table<'a> {
    Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title.into()))
        .column_spacing(1)
}

pub fn highlight_row(row: Row<'_>) -> Row<'_> {
    row.style(Style::default().add_modifier(Modifier::REVERSED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_account_for_wide_characters_and_cap() {
        let rows = vec![
            vec!["래미안".to_string(), "12".to_string()],
            vec!["A".to_string(), "1234567890123".to_string()],
        ];
        let widths = column_widths(&["아파트", "금액"], &rows, 10);
        assert_eq!(widths[0], Constraint::Length(9));
        assert_eq!(widths[1], Constraint::Length(11));
    }
}
