//! Type definitions for the audit engine
//! Event model, risk signals and the `AuditFinding` aggregate

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::risk_score::RiskScore;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    get_chain_name, get_default_token_decimals, get_mint_sentinel, get_native_decimals,
    get_native_symbol, CHAIN_ID_ARBITRUM, CHAIN_ID_AVALANCHE, CHAIN_ID_BASE, CHAIN_ID_BSC,
    CHAIN_ID_ETHEREUM, CHAIN_ID_FANTOM, CHAIN_ID_OPTIMISM, CHAIN_ID_POLYGON, CHAIN_ID_SOLANA,
};

// ============================================
// ADDRESSES & CHAINS
// ============================================

/// Chain-scoped address. Equality is exact string match; callers normalize.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Chain family: decides how events are sourced, never how they are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Account-style chains with ERC-20 `Transfer` logs
    Evm,
    /// Ledger-style chain with SPL token instructions
    Solana,
}

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainId {
    Ethereum,
    BinanceSmartChain,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Base,
    Fantom,
    Solana,
}

impl ChainId {
    /// Every supported chain
    pub const ALL: [ChainId; 9] = [
        ChainId::Ethereum,
        ChainId::BinanceSmartChain,
        ChainId::Polygon,
        ChainId::Arbitrum,
        ChainId::Optimism,
        ChainId::Avalanche,
        ChainId::Base,
        ChainId::Fantom,
        ChainId::Solana,
    ];

    /// Numeric id (EVM chain id, custom id for Solana)
    pub fn id(&self) -> u64 {
        match self {
            Self::Ethereum => CHAIN_ID_ETHEREUM,
            Self::BinanceSmartChain => CHAIN_ID_BSC,
            Self::Polygon => CHAIN_ID_POLYGON,
            Self::Arbitrum => CHAIN_ID_ARBITRUM,
            Self::Optimism => CHAIN_ID_OPTIMISM,
            Self::Avalanche => CHAIN_ID_AVALANCHE,
            Self::Base => CHAIN_ID_BASE,
            Self::Fantom => CHAIN_ID_FANTOM,
            Self::Solana => CHAIN_ID_SOLANA,
        }
    }

    /// Get chain from numeric ID
    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Self::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    pub fn name(&self) -> &'static str {
        get_chain_name(self.id())
    }

    pub fn symbol(&self) -> &'static str {
        get_native_symbol(self.id())
    }

    pub fn native_decimals(&self) -> u8 {
        get_native_decimals(self.id())
    }

    pub fn token_decimals(&self) -> u8 {
        get_default_token_decimals(self.id())
    }

    /// Genesis sender of minted tokens on this chain
    pub fn mint_sentinel(&self) -> Address {
        Address::from(get_mint_sentinel(self.id()))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.symbol())
    }
}

impl FromStr for ChainId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let chain = match s.trim().to_lowercase().as_str() {
            "eth" | "ethereum" | "1" => Self::Ethereum,
            "bsc" | "bnb" | "binance_smart_chain" | "56" => Self::BinanceSmartChain,
            "poly" | "polygon" | "matic" | "137" => Self::Polygon,
            "arb" | "arbitrum" | "42161" => Self::Arbitrum,
            "op" | "optimism" | "10" => Self::Optimism,
            "avax" | "avalanche" | "43114" => Self::Avalanche,
            "base" | "8453" => Self::Base,
            "ftm" | "fantom" | "250" => Self::Fantom,
            "sol" | "solana" | "900" => Self::Solana,
            other => return Err(AppError::unsupported_chain(other)),
        };
        Ok(chain)
    }
}

// ============================================
// EVENTS
// ============================================

/// A validated token transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    /// Token units, always >= 0
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// Block number or slot
    pub ordinal: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Counterparty/service labels attached by the event source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl TransferEvent {
    pub fn new(
        from: impl Into<Address>,
        to: impl Into<Address>,
        value: f64,
        timestamp: DateTime<Utc>,
        ordinal: u64,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value,
            timestamp,
            ordinal,
            tx_hash: None,
            labels: Vec::new(),
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Amount as received from a source: JSON number or decimal string.
///
/// Anything else lands in `Other` so one bad record cannot fail a whole batch;
/// validation turns it into a `MalformedEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for RawAmount {
    fn default() -> Self {
        Self::Other(serde_json::Value::Null)
    }
}

/// Timestamp as received from a source: Unix seconds (integer or fractional) or RFC 3339
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Unix(i64),
    Fractional(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for RawTimestamp {
    fn default() -> Self {
        Self::Other(serde_json::Value::Null)
    }
}

/// Un-validated transfer as supplied by event sources and API callers.
///
/// Every field deserializes leniently: wrong types become empty values that
/// `validate` rejects, instead of a parse error for the enclosing batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransfer {
    #[serde(default, deserialize_with = "lenient::string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub to: String,
    #[serde(default)]
    pub value: RawAmount,
    #[serde(default)]
    pub timestamp: RawTimestamp,
    #[serde(default, deserialize_with = "lenient::ordinal")]
    pub ordinal: u64,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tx_hash: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::labels",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub labels: Vec<String>,
}

/// Field deserializers that never fail on a well-formed JSON value
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::RawTransfer;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn ordinal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Ok(Value::deserialize(deserializer)?.as_u64().unwrap_or_default())
    }

    pub fn labels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Event list where a non-object entry becomes an empty (malformed) transfer
    pub fn events<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RawTransfer>, D::Error> {
        Ok(Vec::<Value>::deserialize(deserializer)?
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect())
    }
}

impl From<TransferEvent> for RawTransfer {
    fn from(event: TransferEvent) -> Self {
        Self {
            from: event.from.0,
            to: event.to.0,
            value: RawAmount::Number(event.value),
            timestamp: RawTimestamp::Unix(event.timestamp.timestamp()),
            ordinal: event.ordinal,
            tx_hash: event.tx_hash,
            labels: event.labels,
        }
    }
}

impl RawTransfer {
    /// Validate into a `TransferEvent`; failures carry `EVENT_MALFORMED`
    pub fn validate(self) -> AppResult<TransferEvent> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(AppError::malformed_event("empty sender or recipient"));
        }

        let value = match &self.value {
            RawAmount::Number(v) => *v,
            RawAmount::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| AppError::malformed_event(format!("unparseable value '{}'", s)))?,
            RawAmount::Other(v) => {
                return Err(AppError::malformed_event(format!("unsupported value {}", v)))
            }
        };
        if !value.is_finite() {
            return Err(AppError::malformed_event("non-finite value"));
        }
        if value < 0.0 {
            return Err(AppError::malformed_event(format!("negative value {}", value)));
        }

        let timestamp = match &self.timestamp {
            RawTimestamp::Unix(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .ok_or_else(|| AppError::malformed_event(format!("timestamp {} out of range", secs)))?,
            RawTimestamp::Fractional(secs) => fractional_timestamp(*secs)?,
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| AppError::malformed_event(format!("unparseable timestamp '{}'", s)))?,
            RawTimestamp::Other(v) => {
                return Err(AppError::malformed_event(format!("unsupported timestamp {}", v)))
            }
        };

        Ok(TransferEvent {
            from: Address(self.from),
            to: Address(self.to),
            value,
            timestamp,
            ordinal: self.ordinal,
            tx_hash: self.tx_hash,
            labels: self.labels,
        })
    }
}

/// Unix seconds with a fractional part, kept to nanosecond precision
fn fractional_timestamp(secs: f64) -> AppResult<DateTime<Utc>> {
    let whole = secs.floor();
    if !secs.is_finite() || whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return Err(AppError::malformed_event(format!("timestamp {} out of range", secs)));
    }
    let nanos = (((secs - whole) * 1e9) as u32).min(999_999_999);
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(|| AppError::malformed_event(format!("timestamp {} out of range", secs)))
}

/// Token facts the heuristics are evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub creator: Address,
    pub creation_time: DateTime<Utc>,
    pub genesis_ordinal: u64,
    /// Sum of all transfer values seen; a denominator, not the authoritative supply
    pub total_supply_transferred: f64,
}

impl TokenMetadata {
    /// Build metadata, deriving the supply proxy from the events
    pub fn from_events(info: &CreationInfo, events: &[TransferEvent]) -> Self {
        Self {
            creator: info.creator.clone(),
            creation_time: info.creation_time,
            genesis_ordinal: info.genesis_ordinal,
            total_supply_transferred: events.iter().map(|e| e.value).sum(),
        }
    }
}

/// Output of the resolution collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationInfo {
    pub creator: Address,
    pub creation_time: DateTime<Utc>,
    pub genesis_ordinal: u64,
}

// ============================================
// SIGNALS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟡",
            Severity::Medium => "🟠",
            Severity::High => "🔴",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    LargeTransfer,
    BlacklistHit,
    HighFrequencyTrading,
    MixerPattern,
    BalanceDrain,
    LargeWithdrawal,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::LargeTransfer => "large_transfer",
            SignalKind::BlacklistHit => "blacklist_hit",
            SignalKind::HighFrequencyTrading => "high_frequency_trading",
            SignalKind::MixerPattern => "mixer_pattern",
            SignalKind::BalanceDrain => "balance_drain",
            SignalKind::LargeWithdrawal => "large_withdrawal",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            SignalKind::LargeTransfer => Severity::Medium,
            SignalKind::BlacklistHit => Severity::High,
            SignalKind::HighFrequencyTrading => Severity::Medium,
            SignalKind::MixerPattern => Severity::High,
            SignalKind::BalanceDrain => Severity::Medium,
            SignalKind::LargeWithdrawal => Severity::High,
        }
    }
}

/// Structured evidence carried by a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    Transfer {
        from: Address,
        to: Address,
        value: f64,
        ordinal: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tx_hash: Option<String>,
    },
    Frequency {
        count: usize,
        min_gap_secs: i64,
    },
    Balance {
        balance: f64,
        threshold: f64,
    },
    Withdrawal {
        recipient: Address,
        value: f64,
        reference_total: f64,
    },
    Mixer {
        label: String,
        from: Address,
        to: Address,
        value: f64,
    },
}

impl Evidence {
    pub(crate) fn transfer(event: &TransferEvent) -> Self {
        Evidence::Transfer {
            from: event.from.clone(),
            to: event.to.clone(),
            value: event.value,
            ordinal: event.ordinal,
            tx_hash: event.tx_hash.clone(),
        }
    }
}

/// Immutable risk signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub kind: SignalKind,
    pub severity: Severity,
    pub evidence: Evidence,
}

impl RiskSignal {
    pub fn new(kind: SignalKind, evidence: Evidence) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            evidence,
        }
    }

    pub fn description(&self) -> String {
        match &self.evidence {
            Evidence::Transfer { from, to, value, tx_hash, .. } => match tx_hash {
                Some(hash) => format!("{}: {} -> {} ({:.4}) tx {}", self.kind.as_str(), from, to, value, hash),
                None => format!("{}: {} -> {} ({:.4})", self.kind.as_str(), from, to, value),
            },
            Evidence::Frequency { count, min_gap_secs } => {
                format!("{}: {} events, min gap {}s", self.kind.as_str(), count, min_gap_secs)
            }
            Evidence::Balance { balance, threshold } => {
                format!("{}: creator balance {:.6} < {:.6}", self.kind.as_str(), balance, threshold)
            }
            Evidence::Withdrawal { recipient, value, reference_total } => format!(
                "{}: {:.4} to {} exceeds half of {:.4}",
                self.kind.as_str(),
                value,
                recipient,
                reference_total
            ),
            Evidence::Mixer { label, value, .. } => {
                format!("{}: '{}' ({:.4})", self.kind.as_str(), label, value)
            }
        }
    }
}

// ============================================
// REPORTS
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderShare {
    pub address: Address,
    pub amount: f64,
}

/// Early-holder concentration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationReport {
    pub total_transferred: f64,
    /// Percent in [0, 100]
    pub concentration: f64,
    pub top_holders: Vec<HolderShare>,
}

/// Creator-origin transfer as seen by the tracer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorTransfer {
    pub sender: Address,
    pub recipient: Address,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedAddress {
    pub amount: f64,
    pub first_use: DateTime<Utc>,
}

/// Single-hop trace of creator funds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorTrace {
    pub transfers: Vec<CreatorTransfer>,
    pub related_addresses: BTreeMap<Address, RelatedAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ComplianceIssue {
    DistributionFairness { concentration: f64 },
    SuspiciousTransactionActivity { signal_count: usize },
}

impl ComplianceIssue {
    pub fn description(&self) -> String {
        match self {
            ComplianceIssue::DistributionFairness { concentration } => format!(
                "Token distribution within 24h is overly concentrated ({:.2}%), fairness concern",
                concentration
            ),
            ComplianceIssue::SuspiciousTransactionActivity { signal_count } => format!(
                "Suspicious transaction activity ({} laundering signals)",
                signal_count
            ),
        }
    }
}

/// Static-analysis finding, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVulnerability {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Non-fatal condition that reduced the evidence available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Degradation {
    MalformedEvent { index: usize, reason: String },
    EventsTruncated { supplied: usize, kept: usize },
    BalanceUnavailable { address: Address },
    FirstUseUnavailable { address: Address },
}

impl Degradation {
    pub fn description(&self) -> String {
        match self {
            Degradation::MalformedEvent { index, reason } => {
                format!("event #{} dropped: {}", index, reason)
            }
            Degradation::EventsTruncated { supplied, kept } => {
                format!("history truncated to {} of {} events; metrics favour early activity", kept, supplied)
            }
            Degradation::BalanceUnavailable { address } => {
                format!("balance of {} unavailable; drain check skipped", address)
            }
            Degradation::FirstUseUnavailable { address } => {
                format!("first use of {} unavailable; omitted from related addresses", address)
            }
        }
    }
}

/// Result of one audit run. Owned by the caller; the engine keeps nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub chain: ChainId,
    pub contract_address: Address,
    pub creator: Address,
    pub creation_time: DateTime<Utc>,
    /// `YYYY-MM-DD HH:MM:SS UTC`
    pub creation_time_utc: String,
    pub code_vulnerabilities: Vec<CodeVulnerability>,
    pub concentration: ConcentrationReport,
    pub dumps: BTreeMap<Address, f64>,
    pub creator_trace: CreatorTrace,
    pub rug_pull: Vec<RiskSignal>,
    pub laundering: Vec<RiskSignal>,
    pub compliance_issues: Vec<ComplianceIssue>,
    pub suspicious: bool,
    pub risk_score: RiskScore,
    pub degradations: Vec<Degradation>,
}

impl AuditFinding {
    /// Pretty print the finding
    pub fn summary(&self) -> String {
        let mut output = format!(
            "\n{} Audit: {} on {} | Score: {}/100\n",
            if self.suspicious { "🚨 SUSPICIOUS" } else { "✅ NOT FLAGGED" },
            self.contract_address,
            self.chain,
            self.risk_score.total
        );
        output.push_str(&format!("   Creator: {}\n", self.creator));
        output.push_str(&format!("   Created: {}\n", self.creation_time_utc));
        output.push_str(&format!(
            "   Concentration (24h, top {}): {:.2}% of {:.4}\n",
            self.concentration.top_holders.len(),
            self.concentration.concentration,
            self.concentration.total_transferred
        ));
        output.push_str(&format!("   Dumping addresses (7d): {}\n", self.dumps.len()));

        let signals: Vec<&RiskSignal> = self.rug_pull.iter().chain(self.laundering.iter()).collect();
        if !signals.is_empty() {
            output.push_str("   Signals:\n");
            for signal in signals {
                output.push_str(&format!("     {} {}\n", signal.severity.emoji(), signal.description()));
            }
        }
        for issue in &self.compliance_issues {
            output.push_str(&format!("   Compliance: {}\n", issue.description()));
        }
        for degradation in &self.degradations {
            output.push_str(&format!("   ⚠️ {}\n", degradation.description()));
        }

        output
    }
}
