//! Lifecycle-phase reduction.
//!
//! Tools that log every transition of an entity (`Creating`, `Created`,
//! `Starting`, `Started`) are collapsed to one row per entity holding the
//! most advanced phase observed. Phase ordering is supplied by the caller
//! through `Ord`.

use std::collections::HashMap;
use std::hash::Hash;

/// Collapse `(key, phase)` events to one entry per key, keeping the greatest phase.
///
/// Entries come back in order of each key's first appearance.
pub fn reduce_phases<K, P, I>(events: I) -> Vec<(K, P)>
where
    K: Eq + Hash + Clone,
    P: Ord + Copy,
    I: IntoIterator<Item = (K, P)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut reduced: Vec<(K, P)> = Vec::new();

    for (key, phase) in events {
        match index.get(&key) {
            Some(&slot) => {
                if phase > reduced[slot].1 {
                    reduced[slot].1 = phase;
                }
            }
            None => {
                index.insert(key.clone(), reduced.len());
                reduced.push((key, phase));
            }
        }
    }

    reduced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Step {
        Creating,
        Created,
        Started,
    }

    #[test]
    fn test_keeps_most_advanced_phase_once() {
        let events = vec![
            ("api", Step::Creating),
            ("db", Step::Creating),
            ("api", Step::Created),
            ("api", Step::Started),
            ("db", Step::Created),
        ];
        let reduced = reduce_phases(events);
        assert_eq!(reduced, vec![("api", Step::Started), ("db", Step::Created)]);
    }

    #[test]
    fn test_out_of_order_events_do_not_regress() {
        let reduced = reduce_phases(vec![("api", Step::Started), ("api", Step::Creating)]);
        assert_eq!(reduced, vec![("api", Step::Started)]);
    }

    #[test]
    fn test_empty_input() {
        let reduced: Vec<(&str, Step)> = reduce_phases(Vec::new());
        assert!(reduced.is_empty());
    }
}
