//! Role menu view.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::tui::menu::MenuAction;
use crate::tui::styles::MedicalTheme;

pub fn render_menu(f: &mut Frame, area: Rect, role_title: &str, actions: &[MenuAction], selected: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(area);

    let items: Vec<ListItem> = actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {:>2}. ", i + 1), MedicalTheme::text_muted()),
                Span::styled(action.label(), MedicalTheme::text()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(Span::styled(format!(" {role_title} Menu "), MedicalTheme::subtitle()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border_focused()),
        )
        .highlight_style(MedicalTheme::selected());

    let mut state = ListState::default().with_selected(Some(selected));
    f.render_stateful_widget(list, chunks[0], &mut state);

    let hints = Paragraph::new(Line::from(vec![
        Span::styled("[↑↓] ", MedicalTheme::key_hint()),
        Span::styled("Navigate ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Open ", MedicalTheme::key_desc()),
        Span::styled("[Ctrl+S] ", MedicalTheme::key_hint()),
        Span::styled("Save ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("Logout ", MedicalTheme::key_desc()),
        Span::styled("[Ctrl+Q] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]))
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(hints, chunks[1]);
}
