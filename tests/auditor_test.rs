//! Live pipeline tests against an in-memory chain source

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ruster_audit::models::types::{CodeVulnerability, SignalKind};
use ruster_audit::{
    audit_with_source, Address, AppError, AppResult, ChainId, ChainSource, CreationInfo,
    Degradation, ErrorCode, HeuristicsConfig, HeuristicsEngine, LabelSnapshot, RawAmount,
    RawTimestamp, RawTransfer,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const T0: i64 = 1_700_000_000;
const ZERO: &str = "0x0000000000000000000000000000000000000000";
const TOKEN: &str = "0x00000000000000000000000000000000000000aa";
const CREATOR: &str = "0x00000000000000000000000000000000000000c0";

fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0).unwrap()
}

fn transfer(from: &str, to: &str, value: f64, offset: i64) -> RawTransfer {
    RawTransfer {
        from: from.to_string(),
        to: to.to_string(),
        value: RawAmount::Number(value),
        timestamp: RawTimestamp::Unix(T0 + offset),
        ordinal: offset as u64,
        tx_hash: Some(format!("0xtx{}", offset)),
        labels: vec![],
    }
}

struct MockSource {
    creation: Result<CreationInfo, ErrorCode>,
    transfers: Vec<RawTransfer>,
    balance: Option<f64>,
    first_use: BTreeMap<Address, DateTime<Utc>>,
    requested_cap: AtomicUsize,
    first_use_calls: AtomicUsize,
}

impl MockSource {
    fn new(transfers: Vec<RawTransfer>) -> Self {
        Self {
            creation: Ok(CreationInfo {
                creator: Address::from(CREATOR),
                creation_time: at(0),
                genesis_ordinal: 0,
            }),
            transfers,
            balance: Some(5.0),
            first_use: BTreeMap::new(),
            requested_cap: AtomicUsize::new(0),
            first_use_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainSource for MockSource {
    fn chain(&self) -> ChainId {
        ChainId::Ethereum
    }

    async fn fetch_creation_info(&self, _contract: &Address) -> AppResult<CreationInfo> {
        self.creation
            .clone()
            .map_err(|code| AppError::new(code, "mock creation failure"))
    }

    async fn fetch_transfers(
        &self,
        _contract: &Address,
        _creation: &CreationInfo,
        max_events: usize,
    ) -> AppResult<Vec<RawTransfer>> {
        self.requested_cap.store(max_events, Ordering::SeqCst);
        Ok(self.transfers.iter().take(max_events).cloned().collect())
    }

    async fn fetch_balance(&self, address: &Address) -> AppResult<f64> {
        self.balance
            .ok_or_else(|| AppError::lookup_unavailable(format!("no balance for {}", address)))
    }

    async fn fetch_first_use(&self, address: &Address) -> AppResult<Option<DateTime<Utc>>> {
        self.first_use_calls.fetch_add(1, Ordering::SeqCst);
        self.first_use
            .get(address)
            .copied()
            .map(Some)
            .ok_or_else(|| AppError::rpc_timeout("mock first-use timeout"))
    }
}

fn engine() -> HeuristicsEngine {
    HeuristicsEngine::new(HeuristicsConfig::default()).unwrap()
}

fn contract() -> Address {
    Address::from(TOKEN)
}

#[tokio::test]
async fn test_live_audit_traces_creator_funds() {
    let mut source = MockSource::new(vec![
        transfer(ZERO, CREATOR, 1000.0, 0),
        transfer(CREATOR, "0xfriend", 600.0, 60),
        transfer(CREATOR, "0xstranger", 50.0, 120),
    ]);
    source.balance = Some(0.001);
    source.first_use.insert(Address::from(CREATOR), at(-86_400));
    source.first_use.insert(Address::from("0xfriend"), at(30));

    let finding = audit_with_source(&source, &contract(), &engine(), &LabelSnapshot::default(), vec![])
        .await
        .unwrap();

    // creator (mint recipient), friend, stranger
    assert_eq!(source.first_use_calls.load(Ordering::SeqCst), 3);
    let related = &finding.creator_trace.related_addresses;
    assert_eq!(related[&Address::from("0xfriend")].amount, 600.0);
    assert_eq!(related[&Address::from("0xfriend")].first_use, at(30));
    assert!(!related.contains_key(&Address::from("0xstranger")));
    assert!(finding.degradations.contains(&Degradation::FirstUseUnavailable {
        address: Address::from("0xstranger")
    }));

    assert!(finding.rug_pull.iter().any(|s| s.kind == SignalKind::BalanceDrain));
    assert!(finding.rug_pull.iter().any(|s| s.kind == SignalKind::LargeWithdrawal));
    assert!(finding.suspicious);
}

#[tokio::test]
async fn test_creation_failure_is_fatal() {
    let mut source = MockSource::new(vec![]);
    source.creation = Err(ErrorCode::RpcTimeout);

    let err = audit_with_source(&source, &contract(), &engine(), &LabelSnapshot::default(), vec![])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CreationInfoUnavailable);
    assert!(err.code.is_fatal());
}

#[tokio::test]
async fn test_missing_balance_degrades() {
    let mut source = MockSource::new(vec![transfer("0xa", "0xb", 1.0, 0)]);
    source.balance = None;

    let finding = audit_with_source(&source, &contract(), &engine(), &LabelSnapshot::default(), vec![])
        .await
        .unwrap();
    assert!(finding.degradations.contains(&Degradation::BalanceUnavailable {
        address: Address::from(CREATOR)
    }));
    assert!(!finding.rug_pull.iter().any(|s| s.kind == SignalKind::BalanceDrain));
}

#[tokio::test]
async fn test_fetch_cap_reports_truncation() {
    let source = MockSource::new((0..10).map(|i| transfer("0xa", "0xb", 1.0, i * 60)).collect());
    let engine = HeuristicsEngine::new(HeuristicsConfig {
        max_events: 3,
        ..HeuristicsConfig::default()
    })
    .unwrap();

    let finding = audit_with_source(&source, &contract(), &engine, &LabelSnapshot::default(), vec![])
        .await
        .unwrap();

    assert_eq!(source.requested_cap.load(Ordering::SeqCst), 4);
    assert_eq!(finding.concentration.total_transferred, 3.0);
    assert!(finding
        .degradations
        .contains(&Degradation::EventsTruncated { supplied: 4, kept: 3 }));
}

#[tokio::test]
async fn test_code_vulnerabilities_pass_through() {
    let source = MockSource::new(vec![]);
    let vulns = vec![CodeVulnerability {
        kind: "reentrancy".to_string(),
        function: Some("withdraw".to_string()),
        description: None,
    }];

    let finding = audit_with_source(&source, &contract(), &engine(), &LabelSnapshot::default(), vulns.clone())
        .await
        .unwrap();
    assert_eq!(finding.code_vulnerabilities, vulns);
}

#[tokio::test]
async fn test_blacklist_hit_from_live_events() {
    let source = MockSource::new(vec![transfer("0xa", "0xbad", 1.0, 0)]);
    let labels = LabelSnapshot::new([Address::from("0xbad")], Vec::<String>::new());

    let finding = audit_with_source(&source, &contract(), &engine(), &labels, vec![])
        .await
        .unwrap();
    assert!(finding.laundering.iter().any(|s| s.kind == SignalKind::BlacklistHit));
    assert_eq!(finding.chain, ChainId::Ethereum);
}
