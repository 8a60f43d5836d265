//! Early dump detection
//!
//! The sender's window ledger accumulation stands in for its balance at
//! the time of sale. This is an approximation: a holder that bought again
//! after the concentration window is still judged against its early
//! accumulation.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::ledger::HolderLedger;
use crate::models::types::{Address, TransferEvent};

/// Per-sender value dumped before `creation_time + window` (strict bound).
///
/// A sale counts when it exceeds `fraction` of the sender's ledger amount.
/// Senders absent from the ledger cannot be evaluated and are skipped.
pub fn detect_dumps(
    events: &[TransferEvent],
    creation_time: DateTime<Utc>,
    window: Duration,
    ledger: &HolderLedger,
    fraction: f64,
) -> BTreeMap<Address, f64> {
    let cutoff = creation_time
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut dumps: BTreeMap<Address, f64> = BTreeMap::new();

    for event in events.iter().filter(|e| e.timestamp < cutoff) {
        let Some(held) = ledger.get(&event.from) else {
            continue;
        };
        if event.value > fraction * held {
            *dumps.entry(event.from.clone()).or_insert(0.0) += event.value;
        }
    }

    if !dumps.is_empty() {
        debug!("📉 {} addresses dumped within {} days", dumps.len(), window.num_days());
    }
    dumps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn setup(sale_at: i64, sale_value: f64) -> BTreeMap<Address, f64> {
        let events = vec![
            TransferEvent::new("m", "a", 100.0, at(60), 1),
            TransferEvent::new("a", "dex", sale_value, at(sale_at), 2),
        ];
        let ledger = HolderLedger::build(&events, at(0), Duration::hours(24));
        detect_dumps(&events, at(0), Duration::days(7), &ledger, 0.5)
    }

    #[test]
    fn test_sale_above_half_is_dump() {
        let dumps = setup(3_600, 60.0);
        assert_eq!(dumps.get(&Address::from("a")), Some(&60.0));
    }

    #[test]
    fn test_sale_at_half_is_not_dump() {
        assert!(setup(3_600, 50.0).is_empty());
    }

    #[test]
    fn test_window_upper_bound_is_strict() {
        assert!(setup(7 * 86_400, 90.0).is_empty());
        assert_eq!(setup(7 * 86_400 - 1, 90.0).len(), 1);
    }

    #[test]
    fn test_unbounded_window_saturates() {
        let events = vec![
            TransferEvent::new("m", "a", 100.0, at(60), 1),
            TransferEvent::new("a", "dex", 90.0, at(400 * 86_400), 2),
        ];
        let ledger = HolderLedger::build(&events, at(0), Duration::MAX);
        let dumps = detect_dumps(&events, at(0), Duration::MAX, &ledger, 0.5);
        assert_eq!(dumps.get(&Address::from("a")), Some(&90.0));
    }

    #[test]
    fn test_unknown_sender_is_skipped() {
        let events = vec![TransferEvent::new("stranger", "dex", 1_000.0, at(10), 1)];
        let ledger = HolderLedger::build(&events, at(0), Duration::hours(24));
        let dumps = detect_dumps(&events, at(0), Duration::days(7), &ledger, 0.5);
        assert!(dumps.is_empty());
    }
}
