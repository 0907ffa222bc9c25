//! Typed stack machine: one session, guarded dispatch, event-sourced state.
//!
//! `dispatch` is the only way a stack mutates. The legality gate makes an
//! illegal request a committed no-op: no stack change, no version bump, no
//! event. A successful apply, the event append, and the version bump commit
//! together — if the append fails the session is left exactly as it was.

use crate::history::{HistoryEvent, HistoryLog, LogError};
use crate::registry::Registry;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One independent stack-machine instance. `version` equals the number of
/// successfully applied operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub version: u64,
    pub stack: Vec<Value>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            stack: Vec::new(),
        }
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            stack: Vec::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The operation was applied; the event is committed. Carries the new
    /// stack snapshot.
    Applied { stack: Vec<Value> },
    /// The legality predicate failed: nothing changed, nothing was logged.
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Name absent from the registry — a programmer or config error, never
    /// silently recovered.
    UnknownOperation(String),
    /// The history append failed; the session was left untouched.
    Log(LogError),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::UnknownOperation(name) => {
                write!(f, "unknown operation '{name}'")
            }
            DispatchError::Log(err) => write!(f, "{err}"),
        }
    }
}

impl From<LogError> for DispatchError {
    fn from(value: LogError) -> Self {
        DispatchError::Log(value)
    }
}

/// Apply one named operation to the session under the registry's legality
/// gate, appending exactly one event on success.
pub fn dispatch(
    registry: &Registry,
    session: &mut Session,
    log: &mut dyn HistoryLog,
    name: &str,
) -> Result<DispatchOutcome, DispatchError> {
    let Some(op) = registry.get(name) else {
        return Err(DispatchError::UnknownOperation(name.to_string()));
    };

    if !(op.legal)(&session.stack) {
        return Ok(DispatchOutcome::Rejected);
    }

    // Apply to a scratch copy first so a failed append leaves the session
    // untouched.
    let mut next = session.stack.clone();
    (op.apply)(&mut next);

    log.append(session.id, op.name)?;
    session.stack = next;
    session.version += 1;

    Ok(DispatchOutcome::Applied {
        stack: session.stack.clone(),
    })
}

/// Reconstruct a session from its event history.
///
/// Events must be in sequence order, as `read_from` returns them. Events
/// naming operations outside the registry are skipped; the replayed version
/// counts only applied events.
pub fn replay(registry: &Registry, id: Uuid, events: &[HistoryEvent]) -> Session {
    let mut session = Session::with_id(id);
    for event in events {
        let Some(op) = registry.get(&event.operation) else {
            continue;
        };
        if (op.legal)(&session.stack) {
            (op.apply)(&mut session.stack);
            session.version += 1;
        }
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryLog;

    fn fixture() -> (Registry, Session, MemoryLog) {
        (Registry::new(), Session::new(), MemoryLog::new())
    }

    #[test]
    fn zero_succ_succ_dup_add_yields_four() {
        let (registry, mut session, mut log) = fixture();
        for op in ["zero", "succ", "succ", "dup", "add"] {
            let outcome = dispatch(&registry, &mut session, &mut log, op).expect("dispatch");
            assert!(matches!(outcome, DispatchOutcome::Applied { .. }), "{op}");
        }
        assert_eq!(session.stack, vec![Value::Int(4)]);
        assert_eq!(session.version, 5);
        assert_eq!(log.read_from(session.id, 1).len(), 5);
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let (registry, mut session, mut log) = fixture();
        let err = dispatch(&registry, &mut session, &mut log, "frobnicate");
        assert_eq!(
            err,
            Err(DispatchError::UnknownOperation("frobnicate".to_string()))
        );
        assert_eq!(session.version, 0);
    }

    #[test]
    fn rejected_dispatch_changes_nothing() {
        let (registry, mut session, mut log) = fixture();
        let outcome = dispatch(&registry, &mut session, &mut log, "add").expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert_eq!(session.version, 0);
        assert!(session.stack.is_empty());
        assert!(log.read_from(session.id, 1).is_empty());
    }

    #[test]
    fn div_with_zero_divisor_is_rejected_whatever_the_numerator() {
        let (registry, mut session, mut log) = fixture();
        for op in ["zero", "succ", "succ", "succ", "zero"] {
            dispatch(&registry, &mut session, &mut log, op).expect("dispatch");
        }
        let before = session.clone();

        let outcome = dispatch(&registry, &mut session, &mut log, "div").expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert_eq!(session, before);
    }

    #[test]
    fn applied_outcome_carries_the_new_snapshot() {
        let (registry, mut session, mut log) = fixture();
        let outcome = dispatch(&registry, &mut session, &mut log, "zero").expect("dispatch");
        assert_eq!(
            outcome,
            DispatchOutcome::Applied {
                stack: vec![Value::Int(0)]
            }
        );
    }

    #[test]
    fn replay_reconstructs_state_and_version() {
        let (registry, mut session, mut log) = fixture();
        for op in ["zero", "succ", "dup", "mul", "to_float"] {
            dispatch(&registry, &mut session, &mut log, op).expect("dispatch");
        }

        let rebuilt = replay(&registry, session.id, &log.read_from(session.id, 1));
        assert_eq!(rebuilt, session);
    }

    #[test]
    fn replay_skips_unknown_operations() {
        let registry = Registry::new();
        let id = Uuid::new_v4();
        let events = vec![
            HistoryEvent {
                session_id: id,
                sequence: 1,
                operation: "zero".to_string(),
            },
            HistoryEvent {
                session_id: id,
                sequence: 2,
                operation: "bogus".to_string(),
            },
            HistoryEvent {
                session_id: id,
                sequence: 3,
                operation: "succ".to_string(),
            },
        ];
        let session = replay(&registry, id, &events);
        assert_eq!(session.stack, vec![Value::Int(1)]);
        assert_eq!(session.version, 2);
    }
}
