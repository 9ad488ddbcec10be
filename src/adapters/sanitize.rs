//! Log sanitization: redacts contact details and secrets from log output.
//!
//! Hospital logs mention patients and staff by hospital ID, which is fine,
//! but must never carry their contact details or credentials. The patterns
//! here cover:
//! - Email addresses and phone numbers
//! - Stored password hashes (base64 SHA-256)
//! - Telegram bot tokens, bare or inside an API URL
//! - `password=...` style key/value pairs
//!
//! [`SanitizingMakeWriter`] applies them to every formatted log line.

use std::io::Write;
use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

/// Longest input scanned in one call; the rest is cut off.
const MAX_SANITIZE_BYTES: usize = 16 * 1024;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    any: RegexSet,
    rules: Vec<Rule>,
}

/// Order matters: tokens before phones, since a token starts with digits.
const RULES: &[(&str, &str)] = &[
    (
        r"(?i)\bapi\.telegram\.org/bot[0-9]{6,12}:[A-Za-z0-9_-]{20,}",
        "api.telegram.org/bot[REDACTED-TOKEN]",
    ),
    (r"\b[0-9]{6,12}:[A-Za-z0-9_-]{30,}", "[REDACTED-TOKEN]"),
    (
        r"(?i)\b(?:password|passwd|pwd|secret|token)\b\s*[:=]\s*\S+",
        "[REDACTED-SECRET]",
    ),
    (r"[A-Za-z0-9+/]{43}=", "[REDACTED-HASH]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (r"(?:\+\d{1,3}[\s-]?)?\b\d{4}[\s-]?\d{4}\b", "[REDACTED-PHONE]"),
    (r"\(?\b\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4}\b", "[REDACTED-PHONE]"),
];

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let rules: Vec<Rule> = RULES
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|regex| Rule {
                    regex,
                    replacement,
                })
            })
            .collect();
        let any = RegexSet::new(rules.iter().map(|r| r.regex.as_str()))
            .unwrap_or_else(|_| RegexSet::empty());
        Patterns { any, rules }
    })
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Replace every sensitive match in `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, MAX_SANITIZE_BYTES)
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    if patterns.any.is_match(prefix) {
        for rule in &patterns.rules {
            if rule.regex.is_match(&result) {
                result = rule.regex.replace_all(&result, rule.replacement).into_owned();
            }
        }
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// A `tracing_subscriber` writer factory that sanitizes each log line before
/// it reaches the inner sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter that never emits a newline must not grow the buffer forever.
        if self.buffer.len() > MAX_SANITIZE_BYTES * 2 {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash_password;

    #[test]
    fn test_sanitize_email() {
        let sanitized = sanitize("Updated contact for P1001: alice.brown@example.com");
        assert!(sanitized.contains("[REDACTED-EMAIL]"));
        assert!(!sanitized.contains("alice.brown"));
        assert!(sanitized.contains("P1001"));
    }

    #[test]
    fn test_sanitize_phone() {
        let sanitized = sanitize("phone +65 9123 4567 saved");
        assert!(sanitized.contains("[REDACTED-PHONE]"));
        assert!(!sanitized.contains("9123"));
    }

    #[test]
    fn test_sanitize_password_hash() {
        let hash = hash_password("D001", "password");
        let sanitized = sanitize(&format!("user D001 hash {hash}"));
        assert!(sanitized.contains("[REDACTED-HASH]"));
        assert!(!sanitized.contains(&hash));
    }

    #[test]
    fn test_sanitize_bot_token() {
        let input = "POST https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw/sendMessage";
        let sanitized = sanitize(input);
        assert!(sanitized.contains("[REDACTED-TOKEN]"));
        assert!(!sanitized.contains("AAHdqTcv"));
    }

    #[test]
    fn test_sanitize_key_value_secret() {
        let sanitized = sanitize("login attempt password=hunter22");
        assert!(sanitized.contains("[REDACTED-SECRET]"));
        assert!(!sanitized.contains("hunter22"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let input = "Appointment 12 confirmed by D001";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_truncates_large_input() {
        let sanitized = sanitize_with_limit("é".repeat(20).as_str(), 7);
        assert!(sanitized.ends_with("[TRUNCATED]"));
    }

    #[test]
    fn test_writer_sanitizes_lines() {
        let mut out = Vec::new();
        {
            let mut writer = SanitizingWriter {
                inner: &mut out,
                buffer: Vec::new(),
            };
            writer
                .write_all(b"mail bob@example.org\npartial")
                .expect("Should write");
            writer.flush().expect("Should flush");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "mail [REDACTED-EMAIL]\npartial");
    }
}
