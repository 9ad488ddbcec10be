//! UI module: View components for the TUI.

pub mod form;
pub mod login;
pub mod menu;
pub mod pick;
pub mod view;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::styles::{MedicalTheme, APP_NAME};

/// Outcome of the last action, shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Success(String),
    Error(String),
}

pub fn render_header(f: &mut Frame, area: Rect, who: Option<&str>) {
    let mut spans = vec![
        Span::styled(" ", MedicalTheme::header()),
        Span::styled(APP_NAME, MedicalTheme::header()),
        Span::styled(" │ Hospital Management System ", MedicalTheme::header()),
    ];
    if let Some(who) = who {
        spans.push(Span::styled(format!("│ {who} "), MedicalTheme::header()));
    }
    let header = Paragraph::new(Line::from(spans)).style(MedicalTheme::header());
    f.render_widget(header, area);
}

pub fn render_status(f: &mut Frame, area: Rect, status: Option<&Status>) {
    let line = match status {
        Some(Status::Info(msg)) => Line::from(Span::styled(msg.as_str(), MedicalTheme::info())),
        Some(Status::Success(msg)) => Line::from(vec![
            Span::styled("✓ ", MedicalTheme::success()),
            Span::styled(msg.as_str(), MedicalTheme::success()),
        ]),
        Some(Status::Error(msg)) => Line::from(vec![
            Span::styled("! ", MedicalTheme::danger()),
            Span::styled(msg.as_str(), MedicalTheme::danger()),
        ]),
        None => Line::from(Span::styled("Ready", MedicalTheme::text_muted())),
    };

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(MedicalTheme::border());
    f.render_widget(Paragraph::new(line).block(block), area);
}
