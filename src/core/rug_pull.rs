//! Rug-pull indicators: creator balance drain and large withdrawal

use std::collections::BTreeMap;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Address, CreatorTransfer, Evidence, RiskSignal, SignalKind};

/// Current native-unit balance of an address
pub trait BalanceLookup {
    fn balance(&self, address: &Address) -> AppResult<f64>;
}

impl BalanceLookup for BTreeMap<Address, f64> {
    fn balance(&self, address: &Address) -> AppResult<f64> {
        self.get(address)
            .copied()
            .ok_or_else(|| AppError::lookup_unavailable(format!("no balance for {}", address)))
    }
}

/// Drain fires when the observed balance is below `threshold`
pub fn detect_balance_drain(balance: f64, threshold: f64) -> Option<RiskSignal> {
    (balance < threshold).then(|| {
        RiskSignal::new(
            SignalKind::BalanceDrain,
            Evidence::Balance { balance, threshold },
        )
    })
}

/// Creator-sent transfers larger than `fraction` of the reference total.
///
/// The reference is the value minted by the sentinel. When nothing was
/// minted in the supplied events it falls back to the sum of every
/// creator-origin transfer.
pub fn detect_large_withdrawals(
    creator: &Address,
    mint_sentinel: &Address,
    transfers: &[CreatorTransfer],
    fraction: f64,
) -> Vec<RiskSignal> {
    let minted: f64 = transfers
        .iter()
        .filter(|t| &t.sender == mint_sentinel)
        .map(|t| t.amount)
        .sum();
    let reference_total = if minted > 0.0 {
        minted
    } else {
        transfers.iter().map(|t| t.amount).sum()
    };

    transfers
        .iter()
        .filter(|t| &t.sender == creator && &t.sender != mint_sentinel)
        .filter(|t| t.amount > fraction * reference_total)
        .map(|t| {
            RiskSignal::new(
                SignalKind::LargeWithdrawal,
                Evidence::Withdrawal {
                    recipient: t.recipient.clone(),
                    value: t.amount,
                    reference_total,
                },
            )
        })
        .collect()
}

/// Both indicators; a missing balance only suppresses the drain check
pub fn detect_rug_pull(
    creator: &Address,
    mint_sentinel: &Address,
    balance: Option<f64>,
    transfers: &[CreatorTransfer],
    drain_threshold: f64,
    withdrawal_fraction: f64,
) -> Vec<RiskSignal> {
    let mut signals: Vec<RiskSignal> = balance
        .and_then(|b| detect_balance_drain(b, drain_threshold))
        .into_iter()
        .collect();
    signals.extend(detect_large_withdrawals(
        creator,
        mint_sentinel,
        transfers,
        withdrawal_fraction,
    ));
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn transfer(sender: &str, recipient: &str, amount: f64) -> CreatorTransfer {
        CreatorTransfer {
            sender: Address::from(sender),
            recipient: Address::from(recipient),
            amount,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_drain_threshold_is_strict() {
        assert!(detect_balance_drain(0.009, 0.01).is_some());
        assert!(detect_balance_drain(0.01, 0.01).is_none());
    }

    #[test]
    fn test_withdrawal_against_minted_supply() {
        let creator = Address::from("creator");
        let sentinel = Address::from("0x0");
        let fires = vec![transfer("0x0", "creator", 1_000.0), transfer("creator", "x", 600.0)];
        let quiet = vec![transfer("0x0", "creator", 1_000.0), transfer("creator", "x", 400.0)];

        let signals = detect_large_withdrawals(&creator, &sentinel, &fires, 0.5);
        assert_eq!(signals.len(), 1);
        assert_eq!(
            signals[0].evidence,
            Evidence::Withdrawal {
                recipient: Address::from("x"),
                value: 600.0,
                reference_total: 1_000.0
            }
        );
        assert!(detect_large_withdrawals(&creator, &sentinel, &quiet, 0.5).is_empty());
    }

    #[test]
    fn test_withdrawal_without_mint_uses_creator_total() {
        let creator = Address::from("creator");
        let sentinel = Address::from("0x0");
        let transfers = vec![transfer("creator", "x", 70.0), transfer("creator", "y", 30.0)];
        let signals = detect_large_withdrawals(&creator, &sentinel, &transfers, 0.5);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::LargeWithdrawal);
    }

    #[test]
    fn test_missing_balance_only_skips_drain() {
        let creator = Address::from("creator");
        let sentinel = Address::from("0x0");
        let transfers = vec![transfer("0x0", "creator", 10.0), transfer("creator", "x", 9.0)];
        let signals = detect_rug_pull(&creator, &sentinel, None, &transfers, 0.01, 0.5);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::LargeWithdrawal);

        let signals = detect_rug_pull(&creator, &sentinel, Some(0.0), &transfers, 0.01, 0.5);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].kind, SignalKind::BalanceDrain);
    }
}
