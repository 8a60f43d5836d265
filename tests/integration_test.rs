//! Integration tests for the audit engine

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ruster_audit::models::types::{Evidence, SignalKind};
use ruster_audit::{
    Address, AuditBundle, AuditFinding, AuditInput, ChainId, CreationInfo, Degradation,
    LabelSnapshot, PrefetchedLookups, RawAmount, RawTimestamp, RawTransfer,
};

const T0: i64 = 1_700_000_000;
const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;
const ZERO: &str = "0x0000000000000000000000000000000000000000";
const CREATOR: &str = "0xc0ffee0000000000000000000000000000000001";

fn transfer(from: &str, to: &str, value: f64, offset: i64) -> RawTransfer {
    RawTransfer {
        from: from.to_string(),
        to: to.to_string(),
        value: RawAmount::Number(value),
        timestamp: RawTimestamp::Unix(T0 + offset),
        ordinal: offset.max(0) as u64,
        tx_hash: None,
        labels: vec![],
    }
}

fn bundle(events: Vec<RawTransfer>) -> AuditBundle {
    AuditBundle {
        input: AuditInput {
            chain: ChainId::Ethereum,
            contract_address: Address::from("0xtoken"),
            creation: CreationInfo {
                creator: Address::from(CREATOR),
                creation_time: Utc.timestamp_opt(T0, 0).unwrap(),
                genesis_ordinal: 0,
            },
            total_supply_transferred: None,
            events,
            code_vulnerabilities: vec![],
        },
        lookups: PrefetchedLookups::default(),
        labels: LabelSnapshot::default(),
        config: None,
    }
}

fn audit(events: Vec<RawTransfer>) -> AuditFinding {
    bundle(events).run().unwrap()
}

fn high_frequency(finding: &AuditFinding) -> Option<usize> {
    finding.laundering.iter().find_map(|s| match (&s.kind, &s.evidence) {
        (SignalKind::HighFrequencyTrading, Evidence::Frequency { count, .. }) => Some(*count),
        _ => None,
    })
}

fn has_large_withdrawal(finding: &AuditFinding) -> bool {
    finding.rug_pull.iter().any(|s| s.kind == SignalKind::LargeWithdrawal)
}

// ============================================
// Example scenarios
// ============================================

#[test]
fn test_empty_event_list() {
    let finding = audit(vec![]);

    assert_eq!(finding.concentration.concentration, 0.0);
    assert_eq!(finding.concentration.total_transferred, 0.0);
    assert!(finding.concentration.top_holders.is_empty());
    assert!(finding.dumps.is_empty());
    assert!(finding.laundering.is_empty());
    assert!(finding.creator_trace.transfers.is_empty());
    assert!(!finding.suspicious);
}

#[test]
fn test_single_holder_is_fully_concentrated() {
    let events = (0..5)
        .map(|i| transfer("0xdistributor", "0xwhale", 20.0, i * HOUR))
        .collect();
    let finding = audit(events);

    assert_eq!(finding.concentration.total_transferred, 100.0);
    assert_eq!(finding.concentration.concentration, 100.0);
    assert_eq!(finding.concentration.top_holders.len(), 1);
    assert_eq!(finding.concentration.top_holders[0].address, Address::from("0xwhale"));
    assert_eq!(finding.concentration.top_holders[0].amount, 100.0);
    assert!(finding.suspicious);
}

#[test]
fn test_high_frequency_scenarios() {
    let fast: Vec<_> = (0..25).map(|i| transfer("0xa", "0xb", 1.0, i * 10)).collect();
    assert_eq!(high_frequency(&audit(fast)), Some(25));

    let slow: Vec<_> = (0..20).map(|i| transfer("0xa", "0xb", 1.0, i * HOUR)).collect();
    assert_eq!(high_frequency(&audit(slow)), None);
}

#[test]
fn test_large_withdrawal_against_mint() {
    let mint = transfer(ZERO, CREATOR, 1000.0, 0);

    let finding = audit(vec![mint.clone(), transfer(CREATOR, "0xx", 600.0, HOUR)]);
    assert!(has_large_withdrawal(&finding));

    let finding = audit(vec![mint, transfer(CREATOR, "0xx", 400.0, HOUR)]);
    assert!(!has_large_withdrawal(&finding));
}

#[test]
fn test_negative_value_is_dropped() {
    let events = vec![
        transfer("0xa", "0xb", 10.0, 0),
        transfer("0xa", "0xc", -5.0, 60),
        transfer("0xa", "0xd", 30.0, 120),
    ];
    let finding = audit(events);

    assert_eq!(finding.concentration.total_transferred, 40.0);
    assert!(finding
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::MalformedEvent { index: 1, .. })));
}

// ============================================
// Properties
// ============================================

#[test]
fn test_concentration_is_bounded() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let events = (0..rng.gen_range(0..40))
            .map(|i| {
                let to = format!("0xholder{}", rng.gen_range(0..12));
                transfer("0xsrc", &to, rng.gen_range(0.0..500.0), i * rng.gen_range(1..(2 * DAY / 40)))
            })
            .collect();
        let finding = audit(events);
        let c = finding.concentration.concentration;
        assert!((0.0..=100.0).contains(&c), "concentration {} out of range", c);
    }
}

#[test]
fn test_top_holders_break_ties_by_address() {
    let events = ["0xf", "0xe", "0xd", "0xc", "0xb", "0xa"]
        .iter()
        .enumerate()
        .map(|(i, to)| transfer("0xsrc", to, 10.0, i as i64))
        .collect::<Vec<_>>();

    let first = audit(events.clone());
    let second = audit(events);
    let holders: Vec<&str> = first
        .concentration
        .top_holders
        .iter()
        .map(|h| h.address.as_str())
        .collect();

    assert_eq!(holders, vec!["0xa", "0xb", "0xc", "0xd", "0xe"]);
    assert_eq!(first.concentration, second.concentration);
}

#[test]
fn test_dump_window_upper_bound_is_strict() {
    let at_bound = audit(vec![
        transfer("0xsrc", "0xholder", 10.0, 0),
        transfer("0xholder", "0xdex", 6.0, 7 * DAY),
    ]);
    assert!(at_bound.dumps.is_empty());

    let inside = audit(vec![
        transfer("0xsrc", "0xholder", 10.0, 0),
        transfer("0xholder", "0xdex", 6.0, 7 * DAY - 1),
    ]);
    assert_eq!(inside.dumps.get(&Address::from("0xholder")), Some(&6.0));
}

#[test]
fn test_high_frequency_survives_removing_unrelated_event() {
    // Only events 0 and 1 are close together
    let mut events: Vec<_> = (0..23).map(|i| transfer("0xa", "0xb", 1.0, (i + 1) * HOUR)).collect();
    events.insert(0, transfer("0xa", "0xb", 1.0, HOUR - 5));
    assert_eq!(high_frequency(&audit(events.clone())), Some(24));

    events.remove(10);
    assert_eq!(high_frequency(&audit(events)), Some(23));
}

#[test]
fn test_suspicious_is_monotonic_in_creator_transfers() {
    let base: Vec<_> = (0..10)
        .map(|i| transfer("0xsrc", &format!("0xholder{}", i), 100.0, i * HOUR))
        .collect();
    assert!(!audit(base.clone()).suspicious);

    let mut with_creator = base;
    with_creator.push(transfer(CREATOR, "0xfriend", 60.0, 2 * DAY));
    assert!(audit(with_creator).suspicious);
}

#[test]
fn test_suspicious_is_monotonic_in_concentration() {
    let base: Vec<_> = (0..10)
        .map(|i| transfer("0xsrc", &format!("0xholder{}", i), 100.0, i * HOUR))
        .collect();
    let before = audit(base.clone());
    assert_eq!(before.concentration.concentration, 50.0);
    assert!(!before.suspicious);

    // One more early buy by an existing holder lifts the top 5 past half
    let mut concentrated = base;
    concentrated.push(transfer("0xsrc", "0xholder0", 100.0, 10 * HOUR));
    let after = audit(concentrated);
    assert!(after.concentration.concentration > 50.0);
    assert!(after.suspicious);
}

#[test]
fn test_pipeline_is_idempotent() {
    let events = vec![
        transfer(ZERO, CREATOR, 1000.0, 0),
        transfer(CREATOR, "0xx", 600.0, 60),
        transfer("0xx", "0xy", 400.0, 2 * HOUR),
        transfer("0xy", "0xz", 300.0, 3 * DAY),
    ];

    let first = serde_json::to_string(&audit(events.clone())).unwrap();
    let second = serde_json::to_string(&audit(events)).unwrap();
    assert_eq!(first, second);
}

// ============================================
// Bundle format
// ============================================

#[test]
fn test_bundle_from_json() {
    let raw = serde_json::json!({
        "input": {
            "chain": "solana",
            "contract_address": "Mint1111111111111111111111111111111111111111",
            "creation": {
                "creator": "Creator11111111111111111111111111111111111",
                "creation_time": "2024-01-01T00:00:00Z",
                "genesis_ordinal": 1
            },
            "events": [
                {"from": "11111111111111111111111111111111", "to": "Creator11111111111111111111111111111111111",
                 "value": "1000000", "timestamp": "2024-01-01T00:00:00Z", "ordinal": 1},
                {"from": "Creator11111111111111111111111111111111111", "to": "Mixer1111",
                 "value": 150000, "timestamp": 1704070800, "ordinal": 2, "tx_hash": "sig2",
                 "labels": ["Tornado Cash"]}
            ],
            "code_vulnerabilities": [{"type": "reentrancy", "function": "withdraw"}]
        },
        "lookups": {
            "balances": {"Creator11111111111111111111111111111111111": 0.5}
        },
        "labels": {"mixer_labels": ["tornado cash"]}
    });

    let bundle: AuditBundle = serde_json::from_value(raw).unwrap();
    let finding = bundle.run().unwrap();

    assert_eq!(finding.creation_time_utc, "2024-01-01 00:00:00 UTC");
    assert_eq!(finding.code_vulnerabilities.len(), 1);
    // 150 000 is above Solana's absolute large-transfer threshold
    assert!(finding.laundering.iter().any(|s| s.kind == SignalKind::LargeTransfer));
    assert!(finding.laundering.iter().any(|s| s.kind == SignalKind::MixerPattern));
    assert!(finding.rug_pull.iter().any(|s| s.kind == SignalKind::BalanceDrain));
    assert!(!finding.compliance_issues.is_empty());
}
