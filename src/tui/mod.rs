//! TUI module: Terminal User Interface using Ratatui.
//!
//! One screen per step of a role's workflow:
//! - Login and password change
//! - Role menus
//! - Forms, pick lists and scrollable views driven by the menu entries

mod app;
mod display;
mod input;
mod menu;
mod styles;
mod ui;

pub use app::App;
pub use menu::{actions, MenuAction};
pub use styles::MedicalTheme;
