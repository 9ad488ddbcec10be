//! Notification adapters.
//!
//! - [`LogNotifier`]: writes notifications to the log
//! - [`TelegramNotifier`]: posts them to a Telegram chat from a background thread

mod telegram;

pub use telegram::{parse_credentials, TelegramCredentials, TelegramNotifier};

use crate::ports::{Notifier, Recipient};

/// Notifier that only records a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: Recipient, message: &str) {
        tracing::info!(target: "wardbook::notify", %recipient, "{}", message);
    }
}
