//! Scrollable read-only text.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::tui::styles::MedicalTheme;

#[derive(Debug, Clone)]
pub struct ViewState {
    pub title: String,
    pub lines: Vec<String>,
    pub scroll: u16,
}

impl ViewState {
    /// A view of `lines`, or `empty` when there are none.
    #[must_use]
    pub fn new(title: impl Into<String>, lines: Vec<String>, empty: &str) -> Self {
        let lines = if lines.is_empty() {
            vec![empty.to_string()]
        } else {
            lines
        };
        Self {
            title: title.into(),
            lines,
            scroll: 0,
        }
    }

    pub fn scroll_down(&mut self, by: u16) {
        let max = u16::try_from(self.lines.len().saturating_sub(1)).unwrap_or(u16::MAX);
        self.scroll = self.scroll.saturating_add(by).min(max);
    }

    pub fn scroll_up(&mut self, by: u16) {
        self.scroll = self.scroll.saturating_sub(by);
    }
}

pub fn render_view(f: &mut Frame, area: Rect, state: &ViewState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(area);

    let text: Vec<Line> = state
        .lines
        .iter()
        .map(|l| {
            let style = if l.ends_with(':') {
                MedicalTheme::subtitle()
            } else if l.contains("LOW STOCK") {
                MedicalTheme::warning()
            } else {
                MedicalTheme::text()
            };
            Line::from(Span::styled(l.as_str(), style))
        })
        .collect();

    let body = Paragraph::new(text)
        .block(
            Block::default()
                .title(Span::styled(format!(" {} ", state.title), MedicalTheme::subtitle()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border()),
        )
        .wrap(Wrap { trim: false })
        .scroll((state.scroll, 0));
    f.render_widget(body, chunks[0]);

    let hints = Paragraph::new(Line::from(vec![
        Span::styled("[↑↓/PgUp/PgDn] ", MedicalTheme::key_hint()),
        Span::styled("Scroll ", MedicalTheme::key_desc()),
        Span::styled("[Esc/Enter] ", MedicalTheme::key_hint()),
        Span::styled("Back", MedicalTheme::key_desc()),
    ]))
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(hints, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_placeholder_and_scroll_bounds() {
        let mut view = ViewState::new("Appointments", Vec::new(), "No appointments.");
        assert_eq!(view.lines, vec!["No appointments.".to_string()]);
        view.scroll_down(5);
        assert_eq!(view.scroll, 0);

        let mut view = ViewState::new("Staff", vec!["a".into(), "b".into(), "c".into()], "");
        view.scroll_down(10);
        assert_eq!(view.scroll, 2);
        view.scroll_up(1);
        assert_eq!(view.scroll, 1);
    }
}
