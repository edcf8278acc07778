//! Observable events
//!
//! Every lifecycle or anomaly the store reports is a variant here. The
//! string form is the `event` field of the emitted log line.

use std::fmt;

use super::logger::Severity;

/// Observable store and journal events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file read and validated
    ConfigLoaded,

    // Store lifecycle
    /// Store start-up begins
    StoreStartBegin,
    /// Store start-up complete, ready for operations
    StoreStartComplete,
    /// Store start-up failed
    StoreStartFailed,
    /// Store stop complete
    StoreStopComplete,

    // Recovery
    /// Journal load finished
    JournalLoaded,
    /// Index rebuilt from the journal
    RecoveryComplete,
    /// In-doubt transactions found during load
    PreparedRecordsPresent,
    /// Transactions with neither prepare nor outcome discarded
    FailedTransactionsDiscarded,

    // Operations
    /// Journal rejected a delete as invalid for its current state
    RemoveInvalidState,

    // Journal
    /// Journal scanned and open for appends
    JournalOpened,
    /// New segment file opened
    JournalSegmentRollover,
    /// Torn final frame truncated
    JournalTornTail,
    /// Damaged frame found during scan
    JournalCorruption,
    /// A write, flush or fsync failed; appends refused until restart
    JournalWriterFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::StoreStartBegin => "STORE_START_BEGIN",
            Event::StoreStartComplete => "STORE_START_COMPLETE",
            Event::StoreStartFailed => "STORE_START_FAILED",
            Event::StoreStopComplete => "STORE_STOP_COMPLETE",

            Event::JournalLoaded => "JOURNAL_LOADED",
            Event::RecoveryComplete => "RECOVERY_COMPLETE",
            Event::PreparedRecordsPresent => "PREPARED_RECORDS_PRESENT",
            Event::FailedTransactionsDiscarded => "FAILED_TRANSACTIONS_DISCARDED",

            Event::RemoveInvalidState => "REMOVE_INVALID_STATE",

            Event::JournalOpened => "JOURNAL_OPENED",
            Event::JournalSegmentRollover => "JOURNAL_SEGMENT_ROLLOVER",
            Event::JournalTornTail => "JOURNAL_TORN_TAIL",
            Event::JournalCorruption => "JOURNAL_CORRUPTION",
            Event::JournalWriterFailed => "JOURNAL_WRITER_FAILED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Event::JournalCorruption | Event::JournalWriterFailed | Event::StoreStartFailed
        )
    }

    /// Returns true if the event reports something the operator should see
    /// but that does not stop the store
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::PreparedRecordsPresent
                | Event::FailedTransactionsDiscarded
                | Event::RemoveInvalidState
                | Event::JournalTornTail
        )
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        if self.is_fatal() {
            Severity::Fatal
        } else if self.is_warning() {
            Severity::Warn
        } else {
            Severity::Info
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Event; 15] = [
        Event::ConfigLoaded,
        Event::StoreStartBegin,
        Event::StoreStartComplete,
        Event::StoreStartFailed,
        Event::StoreStopComplete,
        Event::JournalLoaded,
        Event::RecoveryComplete,
        Event::PreparedRecordsPresent,
        Event::FailedTransactionsDiscarded,
        Event::RemoveInvalidState,
        Event::JournalOpened,
        Event::JournalSegmentRollover,
        Event::JournalTornTail,
        Event::JournalCorruption,
        Event::JournalWriterFailed,
    ];

    #[test]
    fn test_all_events_have_string_representation() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_and_warning_disjoint() {
        for event in ALL {
            assert!(!(event.is_fatal() && event.is_warning()), "{}", event);
        }
    }

    #[test]
    fn test_severities() {
        assert_eq!(Event::JournalCorruption.severity(), Severity::Fatal);
        assert_eq!(Event::PreparedRecordsPresent.severity(), Severity::Warn);
        assert_eq!(Event::RemoveInvalidState.severity(), Severity::Warn);
        assert_eq!(Event::RecoveryComplete.severity(), Severity::Info);
        assert_eq!(Event::JournalWriterFailed.severity(), Severity::Fatal);
        assert_eq!(Event::JournalOpened.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::StoreStartBegin), "STORE_START_BEGIN");
        assert_eq!(format!("{}", Event::JournalTornTail), "JOURNAL_TORN_TAIL");
    }
}
