//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (persistence, messaging).

mod notifier;
mod storage;

pub use notifier::{Notifier, Recipient};
pub use storage::{Schedules, Storage};
