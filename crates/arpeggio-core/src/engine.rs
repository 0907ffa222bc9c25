//! Session-scoped keyboard engine.
//!
//! `Keyboard` owns one session's pipeline: matcher → dispatch → frequency
//! rebuild → code rebuild, one key event at a time with no suspension point.
//! Registry and alphabet are instance-local (no globals), so independent
//! sessions can run side by side and share nothing mutable.

use crate::frequency;
use crate::history::{HistoryEvent, HistoryLog};
use crate::huffman::{self, CodeError, CodeMap};
use crate::machine::{self, DispatchError, DispatchOutcome, Session};
use crate::matcher::{InputMatcher, MatchStep};
use crate::registry::Registry;
use crate::value::Value;
use uuid::Uuid;

/// Result of one dispatch through the engine: the machine outcome plus what
/// happened to the code rebuild. When `rebuild_error` is set the previous
/// code map stays in force — stale, but never corrupted.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub rebuild_error: Option<CodeError>,
}

/// Result of one key press.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Symbol outside the alphabet; pending buffer untouched.
    UnknownKey(char),
    /// Valid proper prefix; waiting for more symbols.
    Buffering,
    /// The rejected buffer; matcher reset.
    InvalidPrefix(String),
    /// A code matched and the operation was dispatched.
    Dispatched {
        operation: String,
        report: DispatchReport,
    },
}

/// One row of the rendered keyboard table.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRow {
    pub key: String,
    pub operation: String,
    pub weight: u64,
}

pub struct Keyboard<L: HistoryLog> {
    registry: Registry,
    alphabet: Vec<char>,
    session: Session,
    log: L,
    code_map: CodeMap,
    matcher: InputMatcher,
}

impl<L: HistoryLog> Keyboard<L> {
    /// Fresh session over an empty stack.
    pub fn new(alphabet: Vec<char>, log: L) -> Result<Self, CodeError> {
        Self::start(Session::new(), alphabet, log)
    }

    /// Rebuild a session's stack from its event history, then resume it.
    pub fn resume(id: Uuid, alphabet: Vec<char>, log: L) -> Result<Self, CodeError> {
        let registry = Registry::new();
        let session = machine::replay(&registry, id, &log.read_from(id, 1));
        Self::start_with(registry, session, alphabet, log)
    }

    fn start(session: Session, alphabet: Vec<char>, log: L) -> Result<Self, CodeError> {
        Self::start_with(Registry::new(), session, alphabet, log)
    }

    fn start_with(
        registry: Registry,
        session: Session,
        alphabet: Vec<char>,
        log: L,
    ) -> Result<Self, CodeError> {
        let mut keyboard = Self {
            registry,
            alphabet,
            session,
            log,
            code_map: CodeMap::default(),
            matcher: InputMatcher::new(),
        };
        // The initial build must succeed: a session with no valid code map
        // cannot accept key input at all.
        if let Some(err) = keyboard.rebuild() {
            return Err(err);
        }
        Ok(keyboard)
    }

    /// Process one key press: match, dispatch on an exact hit, rebuild.
    pub fn key(&mut self, symbol: char) -> Result<KeyOutcome, DispatchError> {
        match self.matcher.press(symbol, &self.alphabet, &self.code_map) {
            MatchStep::UnknownKey(c) => Ok(KeyOutcome::UnknownKey(c)),
            MatchStep::Buffering => Ok(KeyOutcome::Buffering),
            MatchStep::InvalidPrefix(buffer) => Ok(KeyOutcome::InvalidPrefix(buffer)),
            MatchStep::Matched(operation) => {
                let report = self.dispatch(&operation)?;
                Ok(KeyOutcome::Dispatched { operation, report })
            }
        }
    }

    /// The external dispatch entry point (replay drivers use this directly).
    /// Repeating an operation reapplies it; this is not idempotent.
    pub fn dispatch(&mut self, name: &str) -> Result<DispatchReport, DispatchError> {
        let outcome = machine::dispatch(&self.registry, &mut self.session, &mut self.log, name)?;
        let rebuild_error = match outcome {
            DispatchOutcome::Applied { .. } => self.rebuild(),
            // Nothing changed, the map in force is still consistent.
            DispatchOutcome::Rejected => None,
        };
        Ok(DispatchReport {
            outcome,
            rebuild_error,
        })
    }

    /// Recompute frequency table and code map against the live stack. On
    /// failure the previous map is retained and the error returned.
    fn rebuild(&mut self) -> Option<CodeError> {
        let events = self.log.read_from(self.session.id, 1);
        let table = frequency::count(&self.registry, &events);
        let legal = frequency::filter_legal(&self.registry, &table, &self.session.stack);
        match huffman::build_code_map(&legal, &self.alphabet) {
            Ok(map) => {
                self.code_map = map;
                None
            }
            Err(err) => Some(err),
        }
    }

    // ─── rendering boundary ──────────────────────────────────────────────────

    /// Live stack snapshot, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.session.stack
    }

    /// Keyboard table rows, heaviest first (the view's preference order),
    /// key order breaking ties.
    pub fn code_rows(&self) -> Vec<CodeRow> {
        let mut rows: Vec<CodeRow> = self
            .code_map
            .iter()
            .map(|(key, entry)| CodeRow {
                key: key.to_string(),
                operation: entry.operation.clone(),
                weight: entry.weight,
            })
            .collect();
        rows.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.key.cmp(&b.key)));
        rows
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn code_map(&self) -> &CodeMap {
        &self.code_map
    }

    /// Pending (unmatched) key buffer.
    pub fn buffer(&self) -> &str {
        self.matcher.buffer()
    }

    pub fn history(&self) -> Vec<HistoryEvent> {
        self.log.read_from(self.session.id, 1)
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}
