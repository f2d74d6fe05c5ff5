use ratatui::{prelude::*, widgets::*};

/// Which characters a text field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    /// Digits only, e.g. `YYYYMM`.
    Digits,
    /// Digits plus list separators, for LAWD code lists.
    CodeList,
}

impl InputKind {
    fn accepts(self, c: char) -> bool {
        match self {
            InputKind::Text => !c.is_control(),
            InputKind::Digits => c.is_ascii_digit(),
            InputKind::CodeList => c.is_ascii_digit() || matches!(c, ',' | ' ' | ';'),
        }
    }
}

/// Single-line text buffer edited at its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub label: &'static str,
    pub kind: InputKind,
    pub max_len: usize,
    value: String,
}

impl TextInput {
    pub fn new(label: &'static str, kind: InputKind, max_len: usize) -> Self {
        Self {
            label,
            kind,
            max_len,
            value: String::new(),
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.set(value);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: &str) {
        self.value = value
            .chars()
            .filter(|c| self.kind.accepts(*c))
            .take(self.max_len)
            .collect();
    }

    /// Returns `true` when the character was taken.
    pub fn push(&mut self, c: char) -> bool {
        if !self.kind.accepts(c) || self.value.chars().count() >= self.max_len {
            return false;
        }
        self.value.push(c);
        true
    }

    pub fn backspace(&mut self) {
        self.value.pop();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Bordered field; the focused one gets a cyan border and a trailing cursor.
    pub fn widget(&self, focused: bool) -> Paragraph<'_> {
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut content = self.value.clone();
        if focused {
            content.push('▏');
        }
        Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(self.label),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_field_rejects_letters_and_respects_length() {
        let mut input = TextInput::new("From", InputKind::Digits, 6);
        for c in "2024a0199".chars() {
            input.push(c);
        }
        assert_eq!(input.value(), "202401");
        input.backspace();
        assert_eq!(input.value(), "20240");
    }

    #[test]
    fn code_list_keeps_separators() {
        let input = TextInput::new("LAWD", InputKind::CodeList, 64).with_value("11110, 11140;x");
        assert_eq!(input.value(), "11110, 11140;");
    }

    #[test]
    fn text_field_takes_unicode() {
        let mut input = TextInput::new("Name", InputKind::Text, 10);
        assert!(input.push('소'));
        assert!(!input.push('\n'));
        assert_eq!(input.value(), "소");
    }
}
