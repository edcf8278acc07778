//! Observability: structured logging, typed events and counters
//!
//! - One JSON line per event, written synchronously
//! - No background threads
//! - Observability never changes the outcome of a store operation
//!
//! ```ignore
//! use journalstore::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::RecoveryComplete, &[("records", "42")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_ENV_VAR};
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use scope::{ObservationScope, Phase, Timer, STORE_START};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::StoreStartBegin);
        log_event(Event::StoreStopComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("store_dir", "/tmp/test")]);
    }
}
