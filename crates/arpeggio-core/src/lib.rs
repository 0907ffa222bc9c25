//! Arpeggio core crate.
//!
//! A stack-based calculator driven through a handful of physical keys: every
//! currently-legal operation is assigned a short key sequence by a radix-N
//! Huffman code rebuilt after each command, so frequent commands get cheaper
//! over a session's lifetime.
//!
//! Layering, leaves first:
//!
//! - `value` + `registry`: the typed stack values and the fixed operation
//!   catalog with per-operation legality predicates.
//! - `history` + `machine`: the consumed append-only log boundary and the
//!   guarded dispatch that is the only way session state mutates.
//! - `frequency` + `huffman`: history counts filtered to the live legal set,
//!   encoded into a prefix-free key-sequence map.
//! - `matcher` + `engine`: incremental key matching and the per-session
//!   pipeline (match → dispatch → rebuild) that ties it all together.
//!
//! The critical design rule is that dispatch commits atomically (stack,
//! version, and event together or not at all) and that the code map in force
//! is always the one built from the state right after the latest dispatch.

pub mod engine;
pub mod frequency;
pub mod history;
pub mod huffman;
pub mod machine;
pub mod matcher;
pub mod registry;
pub mod value;

pub use engine::{CodeRow, DispatchReport, KeyOutcome, Keyboard};
pub use frequency::{count, filter_legal, FrequencyTable, LegalWeightedSet};
pub use history::{HistoryEvent, HistoryLog, LogError, MemoryLog};
pub use huffman::{
    build_code_map, build_code_tree, encoding_map, CodeEntry, CodeError, CodeMap, CodeNode,
};
pub use machine::{dispatch, replay, DispatchError, DispatchOutcome, Session};
pub use matcher::{InputMatcher, MatchStep};
pub use registry::{Op, Registry};
pub use value::Value;
