//! Window-scoped holder ledger
//!
//! Accumulated value received per address inside a time window after
//! creation. Rebuilt for every analysis and never persisted; it is not a
//! lifetime balance.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::types::{Address, HolderShare, TransferEvent};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolderLedger {
    received: BTreeMap<Address, f64>,
}

impl HolderLedger {
    /// Credit every event with `timestamp <= creation_time + window` to its recipient
    pub fn build(events: &[TransferEvent], creation_time: DateTime<Utc>, window: Duration) -> Self {
        let cutoff = creation_time
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut received: BTreeMap<Address, f64> = BTreeMap::new();

        for event in events.iter().filter(|e| e.timestamp <= cutoff) {
            *received.entry(event.to.clone()).or_insert(0.0) += event.value;
        }

        Self { received }
    }

    pub fn get(&self, address: &Address) -> Option<f64> {
        self.received.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }

    /// Largest `n` accumulations, amount descending, ties by address ascending
    pub fn top(&self, n: usize) -> Vec<HolderShare> {
        let mut holders: Vec<(&Address, f64)> = self.received.iter().map(|(a, v)| (a, *v)).collect();
        holders.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });

        holders
            .into_iter()
            .take(n)
            .map(|(address, amount)| HolderShare {
                address: address.clone(),
                amount,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_window_is_inclusive() {
        let events = vec![
            TransferEvent::new("m", "a", 10.0, at(86_400), 1),
            TransferEvent::new("m", "b", 10.0, at(86_401), 2),
        ];
        let ledger = HolderLedger::build(&events, at(0), Duration::hours(24));
        assert_eq!(ledger.get(&Address::from("a")), Some(10.0));
        assert_eq!(ledger.get(&Address::from("b")), None);
    }

    #[test]
    fn test_accumulates_per_recipient() {
        let events = vec![
            TransferEvent::new("m", "a", 1.5, at(10), 1),
            TransferEvent::new("x", "a", 2.5, at(20), 2),
        ];
        let ledger = HolderLedger::build(&events, at(0), Duration::hours(24));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&Address::from("a")), Some(4.0));
    }

    #[test]
    fn test_top_breaks_ties_by_address() {
        let events = vec![
            TransferEvent::new("m", "c", 5.0, at(1), 1),
            TransferEvent::new("m", "a", 5.0, at(2), 2),
            TransferEvent::new("m", "b", 9.0, at(3), 3),
        ];
        let ledger = HolderLedger::build(&events, at(0), Duration::hours(24));
        let top: Vec<String> = ledger.top(2).into_iter().map(|h| h.address.to_string()).collect();
        assert_eq!(top, vec!["b", "a"]);
    }
}
