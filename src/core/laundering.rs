//! Laundering detector
//!
//! Signals: large transfer, blacklist hit, high-frequency trading, mixer pattern.
//! Every fired condition appends its own signal; duplicates are expected.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::config::LargeTransferPolicy;
use crate::models::types::{Address, Evidence, RiskSignal, SignalKind, TransferEvent};

/// Read-only label sets for one analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelSnapshot {
    #[serde(default)]
    pub blacklist: BTreeSet<Address>,
    /// Lower-cased mixer service labels or addresses
    #[serde(default)]
    pub mixer_labels: BTreeSet<String>,
}

impl LabelSnapshot {
    pub fn new(
        blacklist: impl IntoIterator<Item = Address>,
        mixer_labels: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            blacklist: blacklist.into_iter().collect(),
            mixer_labels: mixer_labels.into_iter().map(|l| l.to_lowercase()).collect(),
        }
    }

    /// Lower-case labels that were deserialized verbatim
    pub fn normalized(self) -> Self {
        Self::new(self.blacklist, self.mixer_labels)
    }

    pub fn is_blacklisted(&self, address: &Address) -> bool {
        self.blacklist.contains(address)
    }

    /// First event label or counterparty matching a known mixer
    pub fn mixer_match(&self, event: &TransferEvent) -> Option<String> {
        event
            .labels
            .iter()
            .map(|l| l.to_lowercase())
            .chain([event.from.as_str().to_lowercase(), event.to.as_str().to_lowercase()])
            .find(|candidate| self.mixer_labels.contains(candidate))
    }
}

/// High-frequency thresholds
#[derive(Debug, Clone, Copy)]
pub struct FrequencyRule {
    /// Strictly more events than this are required
    pub min_events: usize,
    pub max_gap: Duration,
}

/// Minimum gap between chronologically consecutive events
pub fn min_consecutive_gap(events: &[TransferEvent]) -> Option<Duration> {
    let mut timestamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
    timestamps.sort();
    timestamps.windows(2).map(|w| w[1] - w[0]).min()
}

/// One aggregate signal over the whole event set, never per pair
pub fn detect_high_frequency(events: &[TransferEvent], rule: FrequencyRule) -> Option<RiskSignal> {
    if events.len() <= rule.min_events {
        return None;
    }
    let gap = min_consecutive_gap(events)?;
    (gap < rule.max_gap).then(|| {
        RiskSignal::new(
            SignalKind::HighFrequencyTrading,
            Evidence::Frequency {
                count: events.len(),
                min_gap_secs: gap.num_seconds(),
            },
        )
    })
}

pub fn detect_laundering(
    events: &[TransferEvent],
    total_supply_transferred: f64,
    labels: &LabelSnapshot,
    policy: LargeTransferPolicy,
    frequency: FrequencyRule,
) -> Vec<RiskSignal> {
    let threshold = policy.threshold(total_supply_transferred);
    let mut signals = Vec::new();

    for event in events {
        if event.value > threshold {
            signals.push(RiskSignal::new(SignalKind::LargeTransfer, Evidence::transfer(event)));
        }
        if labels.is_blacklisted(&event.from) || labels.is_blacklisted(&event.to) {
            signals.push(RiskSignal::new(SignalKind::BlacklistHit, Evidence::transfer(event)));
        }
        if let Some(label) = labels.mixer_match(event) {
            signals.push(RiskSignal::new(
                SignalKind::MixerPattern,
                Evidence::Mixer {
                    label,
                    from: event.from.clone(),
                    to: event.to.clone(),
                    value: event.value,
                },
            ));
        }
    }

    signals.extend(detect_high_frequency(events, frequency));
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn rule() -> FrequencyRule {
        FrequencyRule {
            min_events: 20,
            max_gap: Duration::seconds(60),
        }
    }

    fn spaced(count: usize, gap: i64) -> Vec<TransferEvent> {
        (0..count)
            .map(|i| TransferEvent::new("a", "b", 1.0, at(i as i64 * gap), i as u64))
            .collect()
    }

    #[test]
    fn test_high_frequency_needs_more_than_min_events() {
        assert!(detect_high_frequency(&spaced(20, 10), rule()).is_none());
        let signal = detect_high_frequency(&spaced(21, 10), rule()).unwrap();
        assert_eq!(
            signal.evidence,
            Evidence::Frequency {
                count: 21,
                min_gap_secs: 10
            }
        );
    }

    #[test]
    fn test_high_frequency_gap_is_strict() {
        assert!(detect_high_frequency(&spaced(30, 60), rule()).is_none());
        assert!(detect_high_frequency(&spaced(30, 59), rule()).is_some());
    }

    #[test]
    fn test_gap_uses_chronological_order() {
        let mut events = spaced(25, 3_600);
        // Out-of-order event 30s after the first one
        events.push(TransferEvent::new("a", "b", 1.0, at(30), 99));
        assert!(detect_high_frequency(&events, rule()).is_some());
    }

    #[test]
    fn test_blacklist_hit_carries_tx_hash() {
        let labels = LabelSnapshot::new([Address::from("bad")], Vec::<String>::new());
        let events = vec![TransferEvent::new("bad", "b", 5.0, at(0), 1).with_tx_hash("0xabc")];
        let signals = detect_laundering(&events, 1_000.0, &labels, LargeTransferPolicy::SupplyFraction(0.1), rule());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::BlacklistHit);
        match &signals[0].evidence {
            Evidence::Transfer { tx_hash, .. } => assert_eq!(tx_hash.as_deref(), Some("0xabc")),
            other => panic!("unexpected evidence {:?}", other),
        }
    }

    #[test]
    fn test_large_transfer_policies() {
        let labels = LabelSnapshot::default();
        let events = vec![TransferEvent::new("a", "b", 150_000.0, at(0), 1)];

        let absolute = detect_laundering(&events, 150_000.0, &labels, LargeTransferPolicy::Absolute(100_000.0), rule());
        assert_eq!(absolute.len(), 1);
        assert_eq!(absolute[0].kind, SignalKind::LargeTransfer);

        // 150k is the entire supply proxy: above 10%
        let fraction = detect_laundering(&events, 150_000.0, &labels, LargeTransferPolicy::SupplyFraction(0.10), rule());
        assert_eq!(fraction.len(), 1);

        let quiet = detect_laundering(&events, 10_000_000.0, &labels, LargeTransferPolicy::SupplyFraction(0.10), rule());
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_mixer_matches_labels_case_insensitively() {
        let labels = LabelSnapshot::new(Vec::<Address>::new(), ["Tornado.Cash".to_string()]);
        let labelled = TransferEvent::new("a", "b", 1.0, at(0), 1).with_labels(vec!["TORNADO.cash".to_string()]);
        let plain = TransferEvent::new("a", "b", 1.0, at(5), 2);
        let signals = detect_laundering(&[labelled, plain], 1e9, &labels, LargeTransferPolicy::Absolute(1e9), rule());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::MixerPattern);
        assert_eq!(signals[0].severity, crate::models::types::Severity::High);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let labels = LabelSnapshot::new([Address::from("bad")], Vec::<String>::new());
        let events = vec![
            TransferEvent::new("bad", "b", 1.0, at(0), 1),
            TransferEvent::new("c", "bad", 1.0, at(3_600), 2),
        ];
        let signals = detect_laundering(&events, 1e9, &labels, LargeTransferPolicy::Absolute(1e9), rule());
        assert_eq!(signals.len(), 2);
    }
}
