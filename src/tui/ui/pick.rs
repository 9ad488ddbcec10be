//! Selectable list used by multi-step flows.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::tui::styles::MedicalTheme;

#[derive(Debug, Clone)]
pub struct PickState {
    pub title: String,
    pub items: Vec<String>,
    pub selected: usize,
}

impl PickState {
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            title: title.into(),
            items,
            selected: 0,
        }
    }

    pub fn next(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    pub fn prev(&mut self) {
        if self.selected == 0 {
            self.selected = self.items.len().saturating_sub(1);
        } else {
            self.selected -= 1;
        }
    }
}

pub fn render_pick(f: &mut Frame, area: Rect, state: &PickState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(area);

    let items: Vec<ListItem> = state
        .items
        .iter()
        .map(|item| ListItem::new(Line::from(Span::styled(format!(" {item}"), MedicalTheme::text()))))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(Span::styled(format!(" {} ", state.title), MedicalTheme::subtitle()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border_focused()),
        )
        .highlight_style(MedicalTheme::selected())
        .highlight_symbol("▶");

    let mut list_state = ListState::default().with_selected(Some(state.selected));
    f.render_stateful_widget(list, chunks[0], &mut list_state);

    let hints = Paragraph::new(Line::from(vec![
        Span::styled("[↑↓] ", MedicalTheme::key_hint()),
        Span::styled("Select ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Confirm ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
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
    fn test_selection_wraps() {
        let mut state = PickState::new("Slots", vec!["a".into(), "b".into(), "c".into()]);
        state.prev();
        assert_eq!(state.selected, 2);
        state.next();
        assert_eq!(state.selected, 0);

        let mut empty = PickState::new("None", Vec::new());
        empty.next();
        empty.prev();
        assert_eq!(empty.selected, 0);
    }
}
