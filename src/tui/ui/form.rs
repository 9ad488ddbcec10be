//! Labelled text-entry form.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use zeroize::Zeroize;

use crate::tui::styles::MedicalTheme;

/// Form field definition
#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub hint: &'static str,
    pub value: String,
    /// Rendered as asterisks
    pub secret: bool,
}

impl FormField {
    #[must_use]
    pub fn new(label: &'static str, hint: &'static str) -> Self {
        Self {
            label,
            hint,
            value: String::new(),
            secret: false,
        }
    }

    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// Form state
#[derive(Debug, Clone)]
pub struct FormState {
    pub title: String,
    pub fields: Vec<FormField>,
    pub selected_field: usize,
}

impl FormState {
    #[must_use]
    pub fn new(title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            fields,
            selected_field: 0,
        }
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.selected_field = (self.selected_field + 1) % self.fields.len();
        }
    }

    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len().saturating_sub(1);
        } else {
            self.selected_field -= 1;
        }
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.selected_field) {
            field.value.push(c);
        }
    }

    pub fn delete_char(&mut self) {
        if let Some(field) = self.fields.get_mut(self.selected_field) {
            field.value.pop();
        }
    }

    pub fn clear_field(&mut self) {
        if let Some(field) = self.fields.get_mut(self.selected_field) {
            field.value.zeroize();
        }
    }

    /// Field values in display order. Plain fields are trimmed; secret
    /// fields are returned exactly as typed, matching the login screen.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| {
                if f.secret {
                    f.value.clone()
                } else {
                    f.value.trim().to_string()
                }
            })
            .collect()
    }

    /// Wipe every secret field buffer.
    pub fn clear_sensitive(&mut self) {
        for field in self.fields.iter_mut().filter(|f| f.secret) {
            field.value.zeroize();
        }
    }
}

/// Render the form
pub fn render_form(f: &mut Frame, area: Rect, state: &FormState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Fields
            Constraint::Length(2), // Key hints
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled(state.title.as_str(), MedicalTheme::title()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(header, chunks[0]);

    render_fields(f, chunks[1], state);

    let hints = Paragraph::new(Line::from(vec![
        Span::styled("[Tab/↑↓] ", MedicalTheme::key_hint()),
        Span::styled("Navigate ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Submit ", MedicalTheme::key_desc()),
        Span::styled("[Del] ", MedicalTheme::key_hint()),
        Span::styled("Clear field ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("Back", MedicalTheme::key_desc()),
    ]))
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(hints, chunks[2]);
}

fn render_fields(f: &mut Frame, area: Rect, state: &FormState) {
    let constraints: Vec<Constraint> = state
        .fields
        .iter()
        .map(|_| Constraint::Length(3))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .horizontal_margin(2)
        .split(area);

    for (i, field) in state.fields.iter().enumerate() {
        let is_selected = i == state.selected_field;
        let (border_style, title_style) = if is_selected {
            (MedicalTheme::border_focused(), MedicalTheme::focused())
        } else {
            (MedicalTheme::border(), MedicalTheme::text_secondary())
        };

        let block = Block::default()
            .title(Span::styled(format!(" {} ", field.label), title_style))
            .borders(Borders::ALL)
            .border_style(border_style);

        let value = if field.value.is_empty() {
            Span::styled(field.hint, MedicalTheme::text_muted())
        } else if field.secret {
            Span::styled("*".repeat(field.value.chars().count()), MedicalTheme::text())
        } else {
            Span::styled(field.value.as_str(), MedicalTheme::text())
        };

        let content = Paragraph::new(Line::from(vec![
            Span::raw(" "),
            value,
            if is_selected {
                Span::styled("▌", MedicalTheme::cursor())
            } else {
                Span::raw("")
            },
        ]))
        .block(block);

        f.render_widget(content, chunks[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormState {
        FormState::new(
            "Change password",
            vec![
                FormField::new("Current", "").secret(),
                FormField::new("Note", "optional").with_value(" kept "),
            ],
        )
    }

    #[test]
    fn test_navigation_wraps() {
        let mut state = form();
        state.prev_field();
        assert_eq!(state.selected_field, 1);
        state.next_field();
        assert_eq!(state.selected_field, 0);
    }

    #[test]
    fn test_values_are_trimmed_and_secrets_wiped() {
        let mut state = form();
        for c in "hunter2".chars() {
            state.input_char(c);
        }
        assert_eq!(state.values(), vec!["hunter2".to_string(), "kept".to_string()]);

        state.clear_sensitive();
        assert!(state.fields[0].value.is_empty());
        assert_eq!(state.fields[1].value, " kept ");
    }

    #[test]
    fn test_secret_values_keep_surrounding_spaces() {
        let mut state = form();
        for c in " s3cret ".chars() {
            state.input_char(c);
        }
        assert_eq!(state.values()[0], " s3cret ");
        assert_eq!(state.values()[1], "kept");
    }
}
