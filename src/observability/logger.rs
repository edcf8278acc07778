//! Structured JSON logger
//!
//! - One log line = one event
//! - Key order: event, severity, ts, then fields sorted by key
//! - Synchronous, no buffering
//! - INFO and below go to stdout, ERROR and above to stderr
//!
//! The minimum severity comes from `JOURNALSTORE_LOG` (`trace`, `info`,
//! `warn`, `error`, `fatal` or `off`) unless set with
//! [`Logger::set_min_severity`]. The default is `info`.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Environment variable consulted for the minimum severity.
pub const LOG_ENV_VAR: &str = "JOURNALSTORE_LOG";

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// The store cannot continue
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Severity::Trace),
            1 => Some(Severity::Info),
            2 => Some(Severity::Warn),
            3 => Some(Severity::Error),
            4 => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const THRESHOLD_UNSET: u8 = u8::MAX;
const THRESHOLD_OFF: u8 = 5;

static THRESHOLD: AtomicU8 = AtomicU8::new(THRESHOLD_UNSET);

/// Parses a `JOURNALSTORE_LOG` value into a threshold.
fn parse_threshold(value: &str) -> Option<u8> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Severity::Trace as u8),
        "info" => Some(Severity::Info as u8),
        "warn" | "warning" => Some(Severity::Warn as u8),
        "error" => Some(Severity::Error as u8),
        "fatal" => Some(Severity::Fatal as u8),
        "off" | "none" => Some(THRESHOLD_OFF),
        _ => None,
    }
}

fn threshold() -> u8 {
    let current = THRESHOLD.load(Ordering::Relaxed);
    if current != THRESHOLD_UNSET {
        return current;
    }
    let from_env = env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|v| parse_threshold(&v))
        .unwrap_or(Severity::Info as u8);
    // a concurrent set_min_severity wins over the environment
    match THRESHOLD.compare_exchange(THRESHOLD_UNSET, from_env, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => from_env,
        Err(set) => set,
    }
}

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Sets the lowest severity that is written. `None` silences logging.
    pub fn set_min_severity(severity: Option<Severity>) {
        let value = severity.map(|s| s as u8).unwrap_or(THRESHOLD_OFF);
        THRESHOLD.store(value, Ordering::Relaxed);
    }

    /// The lowest severity currently written, `None` if logging is off.
    pub fn min_severity() -> Option<Severity> {
        Severity::from_u8(threshold())
    }

    /// Whether an event at `severity` would be written.
    pub fn enabled(severity: Severity) -> bool {
        severity as u8 >= threshold()
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        if severity >= Severity::Error {
            Self::log_to_writer(severity, event, &ts, fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, &ts, fields, &mut io::stdout());
        }
    }

    fn render(severity: Severity, event: &str, ts: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(128);

        output.push_str("{\"event\":");
        output.push_str(&Value::from(event).to_string());
        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push_str("\",\"ts\":");
        output.push_str(&Value::from(ts).to_string());

        let mut sorted: Vec<_> = fields
            .iter()
            .filter(|(k, _)| !matches!(*k, "event" | "severity" | "ts"))
            .collect();
        sorted.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted {
            output.push(',');
            output.push_str(&Value::from(*key).to_string());
            output.push(':');
            output.push_str(&Value::from(*value).to_string());
        }

        output.push_str("}\n");
        output
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        ts: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let line = Self::render(severity, event, ts, fields);
        // one write per line; a failed log write is not worth failing the caller over
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Log at FATAL level
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

/// Render a log line with a fixed timestamp, for tests
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(severity, event, "2024-01-01T00:00:00.000Z", fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_log_json_format() {
        let output = capture_log(Severity::Warn, "PREPARED_RECORDS_PRESENT", &[("count", "2")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "PREPARED_RECORDS_PRESENT");
        assert_eq!(parsed["severity"], "WARN");
        assert_eq!(parsed["ts"], "2024-01-01T00:00:00.000Z");
        assert_eq!(parsed["count"], "2");
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let output1 = capture_log(Severity::Info, "TEST", &[("zebra", "1"), ("apple", "2"), ("mango", "3")]);
        let output2 = capture_log(Severity::Info, "TEST", &[("apple", "2"), ("mango", "3"), ("zebra", "1")]);
        assert_eq!(output1, output2);

        let apple = output1.find("apple").unwrap();
        let mango = output1.find("mango").unwrap();
        let zebra = output1.find("zebra").unwrap();
        assert!(apple < mango && mango < zebra);
        assert!(output1.find("\"event\"").unwrap() < output1.find("\"severity\"").unwrap());
    }

    #[test]
    fn test_log_escapes_special_chars() {
        let output = capture_log(Severity::Info, "TEST", &[("path", "C:\\store \"x\"\nnext")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["path"], "C:\\store \"x\"\nnext");
        assert_eq!(output.matches('\n').count(), 1);
    }

    #[test]
    fn test_reserved_keys_not_duplicated() {
        let output = capture_log(Severity::Info, "TEST", &[("event", "spoof")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "TEST");
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("WARN"), Some(Severity::Warn as u8));
        assert_eq!(parse_threshold(" off "), Some(THRESHOLD_OFF));
        assert_eq!(parse_threshold("loud"), None);
    }
}
