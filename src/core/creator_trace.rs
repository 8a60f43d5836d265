//! Creator-fund tracer
//!
//! Single hop only: recipients' onward transfers are not followed.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    Address, CreatorTrace, CreatorTransfer, Degradation, RelatedAddress, TransferEvent,
};

/// First observed on-chain activity of an address
pub trait FirstUseLookup {
    fn first_use(&self, address: &Address) -> AppResult<DateTime<Utc>>;
}

impl FirstUseLookup for BTreeMap<Address, DateTime<Utc>> {
    fn first_use(&self, address: &Address) -> AppResult<DateTime<Utc>> {
        self.get(address)
            .copied()
            .ok_or_else(|| AppError::lookup_unavailable(format!("no first use for {}", address)))
    }
}

/// Transfers sent by the mint sentinel or by the creator, in event order
pub fn creator_origin_transfers(
    events: &[TransferEvent],
    creator: &Address,
    mint_sentinel: &Address,
) -> Vec<CreatorTransfer> {
    events
        .iter()
        .filter(|e| &e.from == mint_sentinel || &e.from == creator)
        .map(|e| CreatorTransfer {
            sender: e.from.clone(),
            recipient: e.to.clone(),
            amount: e.value,
            timestamp: e.timestamp,
        })
        .collect()
}

/// Trace creator-origin transfers and resolve each recipient's first use.
///
/// Recipients whose first use cannot be resolved are left out of the
/// related-address map and reported once as a degradation. When a recipient
/// received several transfers the latest one sets its amount.
pub fn trace_creator_funds(
    events: &[TransferEvent],
    creator: &Address,
    mint_sentinel: &Address,
    lookup: &impl FirstUseLookup,
) -> (CreatorTrace, Vec<Degradation>) {
    let transfers = creator_origin_transfers(events, creator, mint_sentinel);
    let mut related_addresses = BTreeMap::new();
    let mut unresolved = BTreeSet::new();
    let mut degradations = Vec::new();

    for transfer in &transfers {
        if unresolved.contains(&transfer.recipient) {
            continue;
        }
        match lookup.first_use(&transfer.recipient) {
            Ok(first_use) => {
                related_addresses.insert(
                    transfer.recipient.clone(),
                    RelatedAddress {
                        amount: transfer.amount,
                        first_use,
                    },
                );
            }
            Err(e) => {
                debug!("First use unavailable for {}: {}", transfer.recipient, e);
                unresolved.insert(transfer.recipient.clone());
                degradations.push(Degradation::FirstUseUnavailable {
                    address: transfer.recipient.clone(),
                });
            }
        }
    }

    (
        CreatorTrace {
            transfers,
            related_addresses,
        },
        degradations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn events() -> Vec<TransferEvent> {
        vec![
            TransferEvent::new("0x0", "creator", 1_000.0, at(0), 1),
            TransferEvent::new("creator", "x", 300.0, at(10), 2),
            TransferEvent::new("x", "y", 100.0, at(20), 3),
            TransferEvent::new("creator", "x", 200.0, at(30), 4),
            TransferEvent::new("creator", "z", 50.0, at(40), 5),
        ]
    }

    #[test]
    fn test_selects_sentinel_and_creator_senders() {
        let transfers = creator_origin_transfers(&events(), &Address::from("creator"), &Address::from("0x0"));
        assert_eq!(transfers.len(), 4);
        assert!(transfers.iter().all(|t| t.sender.as_str() != "x"));
    }

    #[test]
    fn test_related_addresses_last_transfer_wins() {
        let mut first_use = BTreeMap::new();
        first_use.insert(Address::from("creator"), at(-100));
        first_use.insert(Address::from("x"), at(5));
        let (trace, degradations) =
            trace_creator_funds(&events(), &Address::from("creator"), &Address::from("0x0"), &first_use);

        assert_eq!(trace.related_addresses[&Address::from("x")].amount, 200.0);
        assert_eq!(trace.related_addresses[&Address::from("x")].first_use, at(5));
        assert!(!trace.related_addresses.contains_key(&Address::from("z")));
        assert_eq!(
            degradations,
            vec![Degradation::FirstUseUnavailable {
                address: Address::from("z")
            }]
        );
    }
}
