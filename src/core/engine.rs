//! Heuristics engine
//!
//! Pure batch computation over one immutable event list. No I/O, no clock:
//! the same input always yields the same `AuditFinding`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::compliance::{compliance_issues, is_suspicious};
use crate::core::concentration::analyze_concentration;
use crate::core::creator_trace::{trace_creator_funds, FirstUseLookup};
use crate::core::dumps::detect_dumps;
use crate::core::laundering::{detect_laundering, FrequencyRule, LabelSnapshot};
use crate::core::ledger::HolderLedger;
use crate::core::risk_score::RiskScoreBuilder;
use crate::core::rug_pull::{detect_rug_pull, BalanceLookup};
use crate::models::config::HeuristicsConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    Address, AuditFinding, ChainId, CodeVulnerability, CreationInfo, Degradation, RawTransfer,
    TokenMetadata, TransferEvent,
};

/// Normalized facts for one audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInput {
    pub chain: ChainId,
    pub contract_address: Address,
    pub creation: CreationInfo,
    /// Supply proxy; derived from the kept events when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply_transferred: Option<f64>,
    #[serde(deserialize_with = "crate::models::types::lenient::events")]
    pub events: Vec<RawTransfer>,
    #[serde(default)]
    pub code_vulnerabilities: Vec<CodeVulnerability>,
}

/// Balance and first-use answers gathered before the engine runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrefetchedLookups {
    #[serde(default)]
    pub balances: BTreeMap<Address, f64>,
    #[serde(default)]
    pub first_use: BTreeMap<Address, DateTime<Utc>>,
}

impl BalanceLookup for PrefetchedLookups {
    fn balance(&self, address: &Address) -> AppResult<f64> {
        self.balances.balance(address)
    }
}

impl FirstUseLookup for PrefetchedLookups {
    fn first_use(&self, address: &Address) -> AppResult<DateTime<Utc>> {
        self.first_use.first_use(address)
    }
}

/// Self-contained audit bundle, as read by the CLI and `POST /v1/audit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditBundle {
    pub input: AuditInput,
    #[serde(default)]
    pub lookups: PrefetchedLookups,
    #[serde(default)]
    pub labels: LabelSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HeuristicsConfig>,
}

impl AuditBundle {
    /// Run the bundle through an engine built from its own config (or defaults)
    pub fn run(self) -> AppResult<AuditFinding> {
        let engine = HeuristicsEngine::new(self.config.unwrap_or_default())?;
        engine.analyze(self.input, &self.labels.normalized(), &self.lookups, &self.lookups)
    }
}

/// Validated and capped events plus what was lost on the way
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEvents {
    pub events: Vec<TransferEvent>,
    pub degradations: Vec<Degradation>,
}

pub struct HeuristicsEngine {
    config: HeuristicsConfig,
}

impl HeuristicsEngine {
    pub fn new(config: HeuristicsConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HeuristicsConfig {
        &self.config
    }

    /// Drop malformed events, order by (timestamp, ordinal) and keep the earliest `max_events`.
    ///
    /// An event that would push the running total past `f64::MAX` is dropped
    /// as malformed, so every sum the detectors take stays finite.
    pub fn prepare_events(&self, raw: Vec<RawTransfer>) -> PreparedEvents {
        let mut degradations = Vec::new();
        let mut indexed = Vec::with_capacity(raw.len());

        for (index, transfer) in raw.into_iter().enumerate() {
            match transfer.validate() {
                Ok(event) => indexed.push((index, event)),
                Err(e) => {
                    warn!("⚠️ Dropping event #{}: {}", index, e);
                    degradations.push(Degradation::MalformedEvent {
                        index,
                        reason: e.message,
                    });
                }
            }
        }

        indexed.sort_by(|(_, a), (_, b)| a.timestamp.cmp(&b.timestamp).then(a.ordinal.cmp(&b.ordinal)));

        let mut running_total = 0.0_f64;
        let mut events = Vec::with_capacity(indexed.len());
        for (index, event) in indexed {
            let next = running_total + event.value;
            if !next.is_finite() {
                warn!("⚠️ Dropping event #{}: value {} overflows the total", index, event.value);
                degradations.push(Degradation::MalformedEvent {
                    index,
                    reason: format!("value {} overflows the running total", event.value),
                });
                continue;
            }
            running_total = next;
            events.push(event);
        }

        let supplied = events.len();
        if supplied > self.config.max_events {
            events.truncate(self.config.max_events);
            warn!("✂️ Truncated {} events to the earliest {}", supplied, self.config.max_events);
            degradations.push(Degradation::EventsTruncated {
                supplied,
                kept: self.config.max_events,
            });
        }

        PreparedEvents { events, degradations }
    }

    /// Run every detector and assemble the finding.
    ///
    /// Fails only on fatal conditions; everything else is recorded as a degradation.
    pub fn analyze(
        &self,
        input: AuditInput,
        labels: &LabelSnapshot,
        balances: &impl BalanceLookup,
        first_use: &impl FirstUseLookup,
    ) -> AppResult<AuditFinding> {
        if input.creation.creator.is_empty() {
            return Err(AppError::creation_info_unavailable(format!(
                "no creator for {}",
                input.contract_address
            )));
        }

        let chain = input.chain;
        let PreparedEvents {
            events,
            mut degradations,
        } = self.prepare_events(input.events);

        let mut metadata = TokenMetadata::from_events(&input.creation, &events);
        if let Some(total) = input.total_supply_transferred {
            metadata.total_supply_transferred = total;
        }
        let creator = metadata.creator.clone();
        let sentinel = chain.mint_sentinel();

        info!(
            "🔍 Auditing {} on {} ({} events)",
            input.contract_address,
            chain.name(),
            events.len()
        );

        // Concentration & dumps share the window ledger
        let ledger = HolderLedger::build(&events, metadata.creation_time, self.config.concentration_window());
        let concentration = analyze_concentration(&events, &ledger, self.config.top_holders);
        let dumps = detect_dumps(
            &events,
            metadata.creation_time,
            self.config.dump_window(),
            &ledger,
            self.config.dump_fraction,
        );

        // Creator funds
        let (creator_trace, trace_degradations) =
            trace_creator_funds(&events, &creator, &sentinel, first_use);
        degradations.extend(trace_degradations);

        let balance = match balances.balance(&creator) {
            Ok(balance) => Some(balance),
            Err(e) => {
                debug!("Creator balance unavailable: {}", e);
                degradations.push(Degradation::BalanceUnavailable {
                    address: creator.clone(),
                });
                None
            }
        };
        let rug_pull = detect_rug_pull(
            &creator,
            &sentinel,
            balance,
            &creator_trace.transfers,
            self.config.drain_threshold(chain),
            self.config.large_withdrawal_fraction,
        );

        let laundering = detect_laundering(
            &events,
            metadata.total_supply_transferred,
            labels,
            self.config.large_transfer_policy(chain),
            FrequencyRule {
                min_events: self.config.high_frequency_min_events,
                max_gap: self.config.high_frequency_max_gap(),
            },
        );

        // Join
        let compliance_issues = compliance_issues(
            concentration.concentration,
            &laundering,
            self.config.fairness_concentration,
        );
        let suspicious = is_suspicious(
            concentration.concentration,
            &creator_trace.transfers,
            concentration.total_transferred,
            self.config.suspicious_concentration,
            self.config.creator_transfer_fraction,
        );

        let dumped: f64 = dumps.values().sum();
        let largest_creator_transfer = creator_trace
            .transfers
            .iter()
            .map(|t| t.amount)
            .fold(0.0, f64::max);
        let risk_score = RiskScoreBuilder::new()
            .with_concentration(concentration.concentration)
            .with_dumps(dumped, concentration.total_transferred, dumps.len())
            .with_creator_share(largest_creator_transfer, concentration.total_transferred)
            .with_rug_pull(&rug_pull)
            .with_laundering(&laundering)
            .with_degradations(degradations.len())
            .build();

        info!(
            "{} {} | concentration {:.2}% | {} rug-pull, {} laundering signals | score {}",
            if suspicious { "🚨" } else { "✅" },
            input.contract_address,
            concentration.concentration,
            rug_pull.len(),
            laundering.len(),
            risk_score.total
        );

        Ok(AuditFinding {
            chain,
            contract_address: input.contract_address,
            creator,
            creation_time: metadata.creation_time,
            creation_time_utc: metadata.creation_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            code_vulnerabilities: input.code_vulnerabilities,
            concentration,
            dumps,
            creator_trace,
            rug_pull,
            laundering,
            compliance_issues,
            suspicious,
            risk_score,
            degradations,
        })
    }
}
