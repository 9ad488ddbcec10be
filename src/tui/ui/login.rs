//! Login screen.

use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use zeroize::Zeroize;

use crate::domain::Role;
use crate::tui::styles::{MedicalTheme, APP_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginFocus {
    #[default]
    HospitalId,
    Password,
}

/// Login form state.
#[derive(Debug, Default)]
pub struct LoginState {
    pub role_index: usize,
    pub hospital_id: String,
    pub password: String,
    pub focus: LoginFocus,
}

impl LoginState {
    #[must_use]
    pub fn role(&self) -> Role {
        Role::ALL[self.role_index % Role::ALL.len()]
    }

    pub fn next_role(&mut self) {
        self.role_index = (self.role_index + 1) % Role::ALL.len();
    }

    pub fn prev_role(&mut self) {
        self.role_index = (self.role_index + Role::ALL.len() - 1) % Role::ALL.len();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginFocus::HospitalId => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::HospitalId,
        };
    }

    pub fn input_char(&mut self, c: char) {
        match self.focus {
            LoginFocus::HospitalId => self.hospital_id.push(c),
            LoginFocus::Password => self.password.push(c),
        }
    }

    pub fn delete_char(&mut self) {
        match self.focus {
            LoginFocus::HospitalId => self.hospital_id.pop(),
            LoginFocus::Password => self.password.pop(),
        };
    }

    /// Wipe the password buffer and return focus to the password field.
    pub fn clear_password(&mut self) {
        self.password.zeroize();
        self.focus = LoginFocus::Password;
    }
}

impl Drop for LoginState {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

pub fn render_login(f: &mut Frame, area: Rect, state: &LoginState) {
    let [column] = Layout::horizontal([Constraint::Length(56)])
        .flex(Flex::Center)
        .areas(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3), // Title
            Constraint::Length(3), // Role
            Constraint::Length(3), // Hospital ID
            Constraint::Length(3), // Password
            Constraint::Length(2), // Hints
            Constraint::Min(0),
        ])
        .split(column);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(APP_NAME, MedicalTheme::subtitle())),
        Line::from(Span::styled("Hospital Management System", MedicalTheme::text_secondary())),
    ])
    .centered();
    f.render_widget(title, chunks[1]);

    let mut roles = vec![Span::raw(" ")];
    for (i, role) in Role::ALL.iter().enumerate() {
        let style = if i == state.role_index {
            MedicalTheme::selected()
        } else {
            MedicalTheme::text_secondary()
        };
        roles.push(Span::styled(format!(" {role} "), style));
        roles.push(Span::raw(" "));
    }
    f.render_widget(
        Paragraph::new(Line::from(roles)).block(
            Block::default()
                .title(Span::styled(" Role ", MedicalTheme::text_secondary()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border()),
        ),
        chunks[2],
    );

    let masked = "*".repeat(state.password.chars().count());
    render_input(
        f,
        chunks[3],
        "Hospital ID",
        &state.hospital_id,
        state.focus == LoginFocus::HospitalId,
    );
    render_input(
        f,
        chunks[4],
        "Password",
        &masked,
        state.focus == LoginFocus::Password,
    );

    let hints = Paragraph::new(Line::from(vec![
        Span::styled("[←→] ", MedicalTheme::key_hint()),
        Span::styled("Role ", MedicalTheme::key_desc()),
        Span::styled("[Tab] ", MedicalTheme::key_hint()),
        Span::styled("Field ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Login ", MedicalTheme::key_desc()),
        Span::styled("[Ctrl+Q] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]))
    .centered();
    f.render_widget(hints, chunks[5]);
}

fn render_input(f: &mut Frame, area: Rect, label: &str, value: &str, focused: bool) {
    let (border, title) = if focused {
        (MedicalTheme::border_focused(), MedicalTheme::focused())
    } else {
        (MedicalTheme::border(), MedicalTheme::text_secondary())
    };
    let content = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(value, MedicalTheme::text()),
        if focused {
            Span::styled("▌", MedicalTheme::cursor())
        } else {
            Span::raw("")
        },
    ]))
    .block(
        Block::default()
            .title(Span::styled(format!(" {label} "), title))
            .borders(Borders::ALL)
            .border_style(border),
    );
    f.render_widget(content, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_cycle_and_password_wipe() {
        let mut state = LoginState::default();
        assert_eq!(state.role(), Role::Administrator);
        state.prev_role();
        assert_eq!(state.role(), Role::Patient);
        state.next_role();
        state.next_role();
        assert_eq!(state.role(), Role::Doctor);

        state.input_char('D');
        state.toggle_focus();
        state.input_char('x');
        assert_eq!(state.hospital_id, "D");
        assert_eq!(state.password, "x");

        state.toggle_focus();
        state.clear_password();
        assert!(state.password.is_empty());
        assert_eq!(state.focus, LoginFocus::Password);
    }
}
