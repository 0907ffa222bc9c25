//! Frequency model: history events → per-operation counts → the weighted set
//! of currently-legal operations.

use crate::history::HistoryEvent;
use crate::registry::Registry;
use crate::value::Value;
use std::collections::BTreeMap;

/// Count per registered operation. Every registered operation has an entry,
/// zero included, whatever its current legality.
pub type FrequencyTable = BTreeMap<String, u64>;

/// The slice of a `FrequencyTable` restricted to currently-legal operations.
pub type LegalWeightedSet = BTreeMap<String, u64>;

/// Tally events into a table seeded with every registered operation at 0.
/// Events naming operations outside the registry are ignored.
pub fn count(registry: &Registry, events: &[HistoryEvent]) -> FrequencyTable {
    let mut table: FrequencyTable = registry.names().map(|n| (n.to_string(), 0)).collect();
    for event in events {
        if let Some(n) = table.get_mut(event.operation.as_str()) {
            *n += 1;
        }
    }
    table
}

/// Keep operations whose legality predicate holds against the stack, counts
/// carried over unchanged (zeros included). Illegal operations are dropped
/// entirely, not zeroed.
pub fn filter_legal(
    registry: &Registry,
    table: &FrequencyTable,
    stack: &[Value],
) -> LegalWeightedSet {
    table
        .iter()
        .filter(|(name, _)| {
            registry
                .get(name)
                .is_some_and(|op| (op.legal)(stack))
        })
        .map(|(name, n)| (name.clone(), *n))
        .collect()
}
