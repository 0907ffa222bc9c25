//! Append-only history log boundary.
//!
//! The core never owns persistence: it consumes `append` and `read_from` and
//! nothing else. Storage layout belongs entirely to the implementation behind
//! the trait (in-memory here, a JSONL file in the CLI crate, anything
//! durable elsewhere).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One applied operation. Sequence numbers are per-session, strictly
/// increasing, and start at 1. Legality failures never produce an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub session_id: Uuid,
    pub sequence: u64,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogError {
    pub message: String,
}

impl LogError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "history log: {}", self.message)
    }
}

/// The consumed log interface. Reads are replayable: a fresh `read_from`
/// always starts at the given offset, there is no cursor to resume.
pub trait HistoryLog {
    /// Append one event, returning its sequence number.
    fn append(&mut self, session_id: Uuid, operation: &str) -> Result<u64, LogError>;

    /// Ordered events with `sequence >= offset` for one session.
    fn read_from(&self, session_id: Uuid, offset: u64) -> Vec<HistoryEvent>;
}

/// In-memory log, the default for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: HashMap<Uuid, Vec<HistoryEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryLog for MemoryLog {
    fn append(&mut self, session_id: Uuid, operation: &str) -> Result<u64, LogError> {
        let events = self.events.entry(session_id).or_default();
        let sequence = events.len() as u64 + 1;
        events.push(HistoryEvent {
            session_id,
            sequence,
            operation: operation.to_string(),
        });
        Ok(sequence)
    }

    fn read_from(&self, session_id: Uuid, offset: u64) -> Vec<HistoryEvent> {
        let Some(events) = self.events.get(&session_id) else {
            return Vec::new();
        };
        events
            .iter()
            .filter(|e| e.sequence >= offset)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_start_at_one_and_increase() {
        let mut log = MemoryLog::new();
        let id = Uuid::new_v4();
        assert_eq!(log.append(id, "zero"), Ok(1));
        assert_eq!(log.append(id, "succ"), Ok(2));
        assert_eq!(log.append(id, "succ"), Ok(3));
    }

    #[test]
    fn sessions_are_independent() {
        let mut log = MemoryLog::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        log.append(a, "zero").expect("append");
        log.append(b, "true").expect("append");
        assert_eq!(log.append(a, "succ"), Ok(2));
        assert_eq!(log.append(b, "not"), Ok(2));
        assert_eq!(log.read_from(a, 1).len(), 2);
        assert_eq!(log.read_from(b, 1).len(), 2);
    }

    #[test]
    fn read_from_respects_offset_and_is_replayable() {
        let mut log = MemoryLog::new();
        let id = Uuid::new_v4();
        for op in ["zero", "succ", "dup", "add"] {
            log.append(id, op).expect("append");
        }

        let tail = log.read_from(id, 3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].operation, "dup");
        assert_eq!(tail[0].sequence, 3);

        // A second read starts fresh at the offset.
        assert_eq!(log.read_from(id, 3), tail);
        assert!(log.read_from(id, 5).is_empty());
        assert!(log.read_from(Uuid::new_v4(), 1).is_empty());
    }
}
