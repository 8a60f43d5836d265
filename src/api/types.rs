//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::auditor::AuditorStatsSnapshot;
use crate::models::errors::AppError;
use crate::models::types::{ChainId, CodeVulnerability};
use crate::utils::cache::CacheStats;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
    pub request_id: String,
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
            request_id: new_request_id(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
            request_id: new_request_id(),
        }
    }
}

/// API Error, `code` is an `ErrorCode` string
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            code: "API_UNAUTHORIZED".to_string(),
            message: "Invalid API key".to_string(),
            details: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "API_RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: err.code.is_fatal().then(|| "fatal: no partial finding produced".to_string()),
        }
    }
}

// ============================================
// Live Audit
// ============================================

#[derive(Debug, Deserialize)]
pub struct LiveAuditRequest {
    /// Contract address, or contract source text
    pub input: String,
    /// Deployed address when `input` is source text
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Skip chain probing when known
    #[serde(default)]
    pub chain: Option<ChainId>,
    /// Static-analysis findings passed through to the result
    #[serde(default)]
    pub code_vulnerabilities: Vec<CodeVulnerability>,
}

// ============================================
// Stats
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub audits_served: u64,
    pub suspicious_findings: u64,
    pub failed_audits: u64,
    pub live: AuditorStatsSnapshot,
    pub cache: CacheStats,
    pub uptime_seconds: u64,
    pub api_version: String,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
