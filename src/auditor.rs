//! Live audit pipeline
//!
//! Resolve chain -> creation info -> transfers -> lookups -> engine.
//! All network access happens here; the engine only sees prefetched answers.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::creator_trace::creator_origin_transfers;
use crate::core::engine::{AuditInput, HeuristicsEngine, PrefetchedLookups};
use crate::core::laundering::LabelSnapshot;
use crate::models::config::AppConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Address, AuditFinding, ChainFamily, ChainId, CodeVulnerability};
use crate::providers::evm::EvmSource;
use crate::providers::labels::load_labels;
use crate::providers::resolver::{ChainResolver, ResolvedTarget};
use crate::providers::rpc::RpcManager;
use crate::providers::solana::SolanaSource;
use crate::providers::source::ChainSource;

/// Concurrent first-use lookups per audit
const LOOKUP_CONCURRENCY: usize = 8;

/// Thread-safe statistics
#[derive(Default)]
struct AuditorStats {
    audits_run: AtomicU64,
    suspicious: AtomicU64,
    failed: AtomicU64,
    total_latency_ms: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditorStatsSnapshot {
    pub audits_run: u64,
    pub suspicious: u64,
    pub failed: u64,
    pub avg_latency_ms: u64,
}

pub struct Auditor {
    rpc: RpcManager,
    labels: LabelSnapshot,
    engine: HeuristicsEngine,
    stats: Arc<AuditorStats>,
}

impl Auditor {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let labels = load_labels(config.labels_path.as_deref())?;
        let engine = HeuristicsEngine::new(config.heuristics.clone())?;
        Ok(Self::with_parts(RpcManager::new(config), labels, engine))
    }

    pub fn with_parts(rpc: RpcManager, labels: LabelSnapshot, engine: HeuristicsEngine) -> Self {
        Self {
            rpc,
            labels,
            engine,
            stats: Arc::new(AuditorStats::default()),
        }
    }

    pub fn engine(&self) -> &HeuristicsEngine {
        &self.engine
    }

    pub fn labels(&self) -> &LabelSnapshot {
        &self.labels
    }

    /// Event source for a configured chain
    pub fn source_for(&self, chain: ChainId) -> AppResult<Arc<dyn ChainSource>> {
        let provider = self
            .rpc
            .get(chain)
            .ok_or_else(|| AppError::unsupported_chain(format!("{} (no RPC configured)", chain.name())))?
            .clone();

        Ok(match chain.family() {
            ChainFamily::Evm => Arc::new(EvmSource::new(chain, provider)),
            ChainFamily::Solana => Arc::new(SolanaSource::new(provider)),
        })
    }

    pub async fn resolve(&self, input: &str, address: Option<&str>) -> AppResult<ResolvedTarget> {
        ChainResolver::new(&self.rpc).resolve(input, address).await
    }

    /// Resolve `input` and audit the resulting contract
    pub async fn audit(
        &self,
        input: &str,
        address: Option<&str>,
        code_vulnerabilities: Vec<CodeVulnerability>,
    ) -> AppResult<AuditFinding> {
        let target = self.resolve(input, address).await?;
        self.audit_target(&target, code_vulnerabilities).await
    }

    pub async fn audit_target(
        &self,
        target: &ResolvedTarget,
        code_vulnerabilities: Vec<CodeVulnerability>,
    ) -> AppResult<AuditFinding> {
        let start = Instant::now();
        let source = self.source_for(target.chain)?;
        let result = audit_with_source(
            source.as_ref(),
            &target.contract,
            &self.engine,
            &self.labels,
            code_vulnerabilities,
        )
        .await;

        let latency_ms = start.elapsed().as_millis() as u64;
        self.stats.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        match &result {
            Ok(finding) => {
                self.stats.audits_run.fetch_add(1, Ordering::Relaxed);
                if finding.suspicious {
                    self.stats.suspicious.fetch_add(1, Ordering::Relaxed);
                }
                info!("⏱️ Live audit of {} finished in {}ms", target.contract, latency_ms);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!("❌ Live audit of {} failed: {}", target.contract, e);
            }
        }
        result
    }

    pub fn stats(&self) -> AuditorStatsSnapshot {
        let audits_run = self.stats.audits_run.load(Ordering::Relaxed);
        let failed = self.stats.failed.load(Ordering::Relaxed);
        let attempts = audits_run + failed;
        let total_latency = self.stats.total_latency_ms.load(Ordering::Relaxed);
        AuditorStatsSnapshot {
            audits_run,
            suspicious: self.stats.suspicious.load(Ordering::Relaxed),
            failed,
            avg_latency_ms: if attempts > 0 { total_latency / attempts } else { 0 },
        }
    }
}

/// Run one audit against an arbitrary event source.
///
/// Creation-info failures are fatal. Balance and first-use failures only
/// leave gaps that the engine reports as degradations.
pub async fn audit_with_source(
    source: &dyn ChainSource,
    contract: &Address,
    engine: &HeuristicsEngine,
    labels: &LabelSnapshot,
    code_vulnerabilities: Vec<CodeVulnerability>,
) -> AppResult<AuditFinding> {
    let chain = source.chain();

    let creation = source.fetch_creation_info(contract).await.map_err(|e| {
        if e.code.is_fatal() {
            e
        } else {
            AppError::creation_info_unavailable(format!("creation info for {}: {}", contract, e))
        }
    })?;
    info!("🧬 {} on {}: creator {}", contract, chain.name(), creation.creator);

    // One past the cap so the engine can tell the list was cut
    let max_events = engine.config().max_events;
    let events = source
        .fetch_transfers(contract, &creation, max_events.saturating_add(1))
        .await?;
    debug!("Fetched {} raw transfers", events.len());

    let prepared = engine.prepare_events(events.clone());
    let recipients: BTreeSet<Address> =
        creator_origin_transfers(&prepared.events, &creation.creator, &chain.mint_sentinel())
            .into_iter()
            .map(|t| t.recipient)
            .collect();

    let creator = creation.creator.clone();
    let balance_lookup = async {
        match source.fetch_balance(&creator).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("⚠️ Balance of {} unavailable: {}", creator, e);
                None
            }
        }
    };
    let first_use_lookup = stream::iter(recipients)
        .map(|address| async move {
            let first_use = source.fetch_first_use(&address).await;
            (address, first_use)
        })
        .buffer_unordered(LOOKUP_CONCURRENCY)
        .collect::<Vec<_>>();

    let (balance, first_uses) = tokio::join!(balance_lookup, first_use_lookup);

    let mut lookups = PrefetchedLookups::default();
    if let Some(balance) = balance {
        lookups.balances.insert(creator, balance);
    }
    let mut first_use = BTreeMap::new();
    for (address, result) in first_uses {
        match result {
            Ok(Some(ts)) => {
                first_use.insert(address, ts);
            }
            Ok(None) => debug!("No history for {}", address),
            Err(e) => warn!("⚠️ First use of {} unavailable: {}", address, e),
        }
    }
    lookups.first_use = first_use;

    let input = AuditInput {
        chain,
        contract_address: contract.clone(),
        creation,
        total_supply_transferred: None,
        events,
        code_vulnerabilities,
    };
    engine.analyze(input, labels, &lookups, &lookups)
}
