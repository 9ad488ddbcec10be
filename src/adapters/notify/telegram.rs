//! Telegram Bot API notifier.
//!
//! Messages are queued on a channel and delivered by a dedicated worker
//! thread, so the caller never waits on the network. Delivery failures are
//! logged and otherwise ignored. Dropping the notifier drains the queue,
//! waiting at most [`SHUTDOWN_GRACE`] for the worker.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ports::{Notifier, Recipient};

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a dropped notifier waits for queued messages to go out.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const JOIN_POLL: Duration = Duration::from_millis(20);

/// Bot token and destination chat.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Parse the `bot_token|chat_id` credentials file format.
#[must_use]
pub fn parse_credentials(content: &str) -> Option<TelegramCredentials> {
    let (token, chat) = content.trim().split_once('|')?;
    let (token, chat) = (token.trim(), chat.trim());
    if token.is_empty() || chat.is_empty() || chat.contains('|') {
        return None;
    }
    Some(TelegramCredentials {
        bot_token: token.to_string(),
        chat_id: chat.to_string(),
    })
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Notifier that forwards messages to a Telegram chat.
pub struct TelegramNotifier {
    queue: Option<Mutex<Sender<String>>>,
    worker: Option<JoinHandle<()>>,
    /// Messages queued but not yet handed to the API.
    pending: Arc<AtomicUsize>,
    grace: Duration,
}

impl TelegramNotifier {
    /// Start a notifier from a credentials file.
    ///
    /// A missing or malformed file yields a notifier that drops every
    /// message with a warning.
    #[must_use]
    pub fn from_credentials_file(path: &Path) -> Self {
        let credentials = match std::fs::read_to_string(path) {
            Ok(content) => parse_credentials(&content),
            Err(e) => {
                tracing::warn!("Cannot read Telegram credentials {}: {}", path.display(), e);
                None
            }
        };

        match credentials {
            Some(credentials) => Self::start(credentials),
            None => {
                tracing::warn!("Telegram notifications disabled: no usable credentials");
                Self::disabled()
            }
        }
    }

    /// Spawn the delivery worker.
    #[must_use]
    pub fn start(credentials: TelegramCredentials) -> Self {
        let client = match reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build HTTP client: {}", e);
                return Self::disabled();
            }
        };
        let url = format!("{API_BASE}/bot{}/sendMessage", credentials.bot_token);

        Self::spawn(SHUTDOWN_GRACE, move |text| {
            let body = SendMessage {
                chat_id: &credentials.chat_id,
                text,
            };
            match client.post(&url).json(&body).send() {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("Telegram notification delivered");
                }
                Ok(resp) => {
                    tracing::warn!("Telegram rejected notification: HTTP {}", resp.status());
                }
                Err(e) => {
                    // reqwest errors embed the URL, which carries the token
                    tracing::warn!("Telegram delivery failed: {}", e.without_url());
                }
            }
        })
    }

    /// Run `deliver` on a worker thread for every queued message, until
    /// the notifier is dropped.
    fn spawn<F>(grace: Duration, mut deliver: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<String>();
        let pending = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pending);
        let spawned = thread::Builder::new()
            .name("telegram-notify".to_string())
            .spawn(move || {
                for text in rx {
                    deliver(&text);
                    counter.fetch_sub(1, Ordering::SeqCst);
                }
            });

        match spawned {
            Ok(handle) => Self {
                queue: Some(Mutex::new(tx)),
                worker: Some(handle),
                pending,
                grace,
            },
            Err(e) => {
                tracing::warn!("Failed to start Telegram worker: {}", e);
                Self::disabled()
            }
        }
    }

    /// A notifier that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            queue: None,
            worker: None,
            pending: Arc::new(AtomicUsize::new(0)),
            grace: SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, recipient: Recipient, message: &str) {
        let text = format!("[{recipient}] {message}");
        let Some(queue) = &self.queue else {
            tracing::warn!(%recipient, "Notification dropped: Telegram disabled");
            return;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        let sent = queue
            .lock()
            .map_err(|_| ())
            .and_then(|tx| tx.send(text).map_err(|_| ()));
        if sent.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(%recipient, "Notification dropped: Telegram worker stopped");
        }
    }
}

impl Drop for TelegramNotifier {
    fn drop(&mut self) {
        // Closing the channel ends the worker once the backlog is delivered
        drop(self.queue.take());
        let Some(worker) = self.worker.take() else {
            return;
        };

        let deadline = Instant::now() + self.grace;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL);
        }

        if worker.is_finished() {
            if worker.join().is_err() {
                tracing::warn!("Telegram worker panicked");
            }
        } else {
            let dropped = self.pending.load(Ordering::SeqCst);
            tracing::warn!(
                dropped,
                "Telegram worker still busy after {:?}; {} queued notification(s) dropped",
                self.grace,
                dropped
            );
        }
    }
}
