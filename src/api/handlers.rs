//! API Request Handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::types::*;
use crate::auditor::Auditor;
use crate::core::engine::AuditBundle;
use crate::models::errors::AppError;
use crate::models::types::AuditFinding;
use crate::providers::resolver::{classify_input, normalize_address, InputKind, ResolvedTarget};
use crate::utils::cache::AuditCache;

/// Shared application state
pub struct AppState {
    pub auditor: Arc<Auditor>,
    pub cache: Arc<AuditCache>,
    pub start_time: Instant,
    audits_served: AtomicU64,
    suspicious: AtomicU64,
    failed: AtomicU64,
}

impl AppState {
    pub fn new(auditor: Auditor) -> Self {
        Self {
            auditor: Arc::new(auditor),
            cache: Arc::new(AuditCache::new()),
            start_time: Instant::now(),
            audits_served: AtomicU64::new(0),
            suspicious: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn record(&self, result: &Result<AuditFinding, AppError>) {
        match result {
            Ok(finding) => {
                self.audits_served.fetch_add(1, Ordering::Relaxed);
                if finding.suspicious {
                    self.suspicious.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn error_response(err: &AppError, start: Instant) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::error(ApiError::from(err), elapsed_ms(start))))
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Offline Audit
// ============================================

/// Audit caller-supplied facts. No network access.
pub async fn audit(
    State(state): State<Arc<AppState>>,
    Json(bundle): Json<AuditBundle>,
) -> ApiResult<AuditFinding> {
    let start = Instant::now();
    let contract = bundle.input.contract_address.clone();

    let result = bundle.run();
    state.record(&result);

    match result {
        Ok(finding) => {
            info!(
                "🔎 Audit {} | suspicious={} | score={} | {:.2}ms",
                contract,
                finding.suspicious,
                finding.risk_score.total,
                elapsed_ms(start)
            );
            Ok(Json(ApiResponse::success(finding, elapsed_ms(start))))
        }
        Err(e) => {
            warn!("❌ Audit {} failed: {}", contract, e);
            Err(error_response(&e, start))
        }
    }
}

// ============================================
// Live Audit
// ============================================

/// Chain and address known up front skip resolution entirely
fn explicit_target(req: &LiveAuditRequest) -> Option<ResolvedTarget> {
    let chain = req.chain?;
    let address = req.contract_address.clone().or_else(|| match classify_input(&req.input) {
        InputKind::EvmAddress(a) | InputKind::SolanaAddress(a) => Some(a),
        _ => None,
    })?;
    Some(ResolvedTarget {
        chain,
        contract: normalize_address(&address),
    })
}

pub async fn audit_live(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LiveAuditRequest>,
) -> ApiResult<AuditFinding> {
    let start = Instant::now();

    if req.input.trim().is_empty() {
        state.failed.fetch_add(1, Ordering::Relaxed);
        return Err(error_response(&AppError::bad_request("input must not be empty"), start));
    }

    let target = match explicit_target(&req) {
        Some(target) => target,
        None => state
            .auditor
            .resolve(&req.input, req.contract_address.as_deref())
            .await
            .map_err(|e| {
                state.failed.fetch_add(1, Ordering::Relaxed);
                warn!("❌ Resolution failed: {}", e);
                error_response(&e, start)
            })?,
    };

    if let Some(finding) = state.cache.get(target.chain, target.contract.as_str()) {
        state.record(&Ok(finding.clone()));
        return Ok(Json(ApiResponse::success(finding, elapsed_ms(start))));
    }

    let result = state.auditor.audit_target(&target, req.code_vulnerabilities).await;
    state.record(&result);

    match result {
        Ok(finding) => {
            state.cache.set(target.chain, target.contract.as_str(), finding.clone());
            Ok(Json(ApiResponse::success(finding, elapsed_ms(start))))
        }
        Err(e) => Err(error_response(&e, start)),
    }
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let cache_stats = state.cache.stats();

    info!(
        "📊 Cache Stats: {} entries, {:.1}% hit rate ({} hits / {} misses)",
        cache_stats.entries, cache_stats.hit_rate, cache_stats.hits, cache_stats.misses
    );

    let data = StatsData {
        audits_served: state.audits_served.load(Ordering::Relaxed),
        suspicious_findings: state.suspicious.load(Ordering::Relaxed),
        failed_audits: state.failed.load(Ordering::Relaxed),
        live: state.auditor.stats(),
        cache: cache_stats,
        uptime_seconds: state.uptime_seconds(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
