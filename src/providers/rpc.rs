//! RPC Client Module - Multi-Chain JSON-RPC
//!
//! 1. Explicit endpoints from `AppConfig` (no env reads here)
//! 2. Primary endpoint with fallback to public RPCs
//! 3. Exponential backoff retry with jitter (1s→2s→4s→...)
//! 4. User-Agent header & API key masking in logs
//! 5. Gzip compression for large log/transaction responses
//! 6. Batch requests (max 50 per batch)
//! 7. Concurrent request handling with tokio::spawn

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::AppConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::ChainId;
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

// ============================================
// RETRY CONSTANTS
// ============================================

/// Maximum batch size (50 for reliability)
pub const MAX_BATCH_SIZE: usize = 50;

/// Base retry delay in milliseconds
pub const BASE_RETRY_MS: u64 = 1000;

/// Maximum retry delay in milliseconds
pub const MAX_RETRY_MS: u64 = 16000;

/// Maximum attempts per endpoint: 1s→2s→4s→8s
pub const MAX_RETRIES: u32 = 5;

/// Jitter percentage for retry delay
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// Backoff delay before `attempt` (1-based retries), jittered ±20%
pub fn backoff_delay_ms(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_MS.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let capped_delay = base_delay.min(MAX_RETRY_MS);
    let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
    let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    (capped_delay as i64 + jitter).max(100) as u64
}

/// Batch JSON-RPC response item
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponseItem<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
    pub id: u64,
}

/// RPC Provider with retry logic and fallback support
#[derive(Clone)]
pub struct RpcProvider {
    /// Primary RPC URL
    primary_url: String,
    /// Fallback RPC URL (public)
    fallback_url: Option<String>,
    /// HTTP client with custom headers (gzip enabled)
    client: reqwest::Client,
    /// Network name for logging
    network_name: String,
    max_retries: u32,
}

impl RpcProvider {
    pub fn new(
        network_name: impl Into<String>,
        primary_url: impl Into<String>,
        fallback_url: Option<String>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        Ok(Self {
            primary_url: primary_url.into(),
            fallback_url,
            client: Self::build_client(timeout_secs)?,
            network_name: network_name.into(),
            max_retries: MAX_RETRIES,
        })
    }

    /// Provider for a configured chain
    pub fn for_chain(config: &AppConfig, chain: ChainId) -> AppResult<Self> {
        let primary = config.rpc_url(chain).ok_or_else(|| {
            AppError::new(
                ErrorCode::RpcNoEndpoints,
                format!("No RPC endpoint configured for {}", chain.name()),
            )
        })?;
        let fallback = config
            .fallback_url(chain)
            .filter(|f| *f != primary)
            .map(String::from);
        Self::new(chain.name(), primary, fallback, config.rpc_timeout_secs)
    }

    /// Limit attempts per endpoint (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Build HTTP client with custom headers (gzip compression)
    fn build_client(timeout_secs: u64) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| AppError::rpc_connection_failed(format!("Failed to build HTTP client: {}", e)))
    }

    /// Execute JSON-RPC call with retry logic and fallback
    pub async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AppResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let primary_error = match self.call_with_retry(&self.primary_url, &payload).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("⚠️ Primary RPC failed on {} ({}): {}", self.network_name, method, e);
                e
            }
        };

        // RPC-level errors are answers, not outages: don't repeat them on the fallback
        if primary_error.code == ErrorCode::RpcError {
            return Err(primary_error);
        }

        if let Some(ref fallback) = self.fallback_url {
            info!("🔄 Trying fallback RPC for {}", self.network_name);
            match self.call_with_retry(fallback, &payload).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("⚠️ Fallback RPC also failed: {}", e);
                    return Err(e);
                }
            }
        }

        Err(primary_error)
    }

    /// Execute call with exponential backoff; only retryable errors are retried
    async fn call_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> AppResult<T> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay_ms(attempt);
                debug!("⏳ Retry {}/{} after {}ms", attempt + 1, self.max_retries, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.execute_call::<T>(url, payload).await {
                Ok(result) => return Ok(result),
                Err(e) if e.code.is_retryable() => {
                    if e.code == ErrorCode::RpcRateLimited {
                        warn!(
                            "⏳ Rate limited (HTTP 429), backing off (attempt {}/{})",
                            attempt + 1,
                            self.max_retries
                        );
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::rpc_connection_failed(format!("No attempt made against {}", self.network_name))
        }))
    }

    /// Execute single RPC call
    async fn execute_call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> AppResult<T> {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::rpc_rate_limited());
        }
        if status.is_server_error() {
            return Err(AppError::rpc_connection_failed(format!("HTTP error: {}", status)));
        }
        if !status.is_success() {
            return Err(AppError::rpc_error(format!("HTTP error: {}", status)));
        }

        let json: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::invalid_response(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = json.error {
            return Err(error.into());
        }

        json.result
            .ok_or_else(|| AppError::invalid_response("No result in response"))
    }

    /// Get RPC URL (masked for logging)
    pub fn masked_url(&self) -> String {
        mask_url(&self.primary_url)
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    // ============================================
    // BATCH REQUESTS
    // ============================================

    /// Execute batch JSON-RPC calls (max 50 per batch), results in request order
    pub async fn batch_call<T: for<'de> Deserialize<'de>>(
        &self,
        requests: Vec<(&str, serde_json::Value)>,
    ) -> AppResult<Vec<AppResult<T>>> {
        if requests.is_empty() {
            return Ok(vec![]);
        }

        let mut all_results = Vec::with_capacity(requests.len());

        for chunk in requests.chunks(MAX_BATCH_SIZE) {
            let batch_payload: Vec<serde_json::Value> = chunk
                .iter()
                .enumerate()
                .map(|(idx, (method, params))| {
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "method": method,
                        "params": params,
                        "id": idx + 1
                    })
                })
                .collect();

            let results = self.execute_batch::<T>(&batch_payload).await?;
            all_results.extend(results);
        }

        Ok(all_results)
    }

    /// Execute batch request with retry
    async fn execute_batch<T: for<'de> Deserialize<'de>>(
        &self,
        batch_payload: &[serde_json::Value],
    ) -> AppResult<Vec<AppResult<T>>> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_delay_ms(attempt))).await;
            }

            let resp = match self.client.post(&self.primary_url).json(batch_payload).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(AppError::from(e));
                    continue;
                }
            };

            let status = resp.status();
            if status.as_u16() == 429 {
                last_error = Some(AppError::rpc_rate_limited());
                continue;
            }
            if !status.is_success() {
                last_error = Some(AppError::rpc_connection_failed(format!("HTTP error: {}", status)));
                continue;
            }

            let mut batch_response: Vec<BatchResponseItem<T>> = resp.json().await.map_err(|e| {
                AppError::invalid_response(format!("Failed to parse batch response: {}", e))
            })?;
            // Servers may answer out of order
            batch_response.sort_by_key(|item| item.id);

            let results = batch_response
                .into_iter()
                .map(|item| match (item.error, item.result) {
                    (Some(error), _) => Err(error.into()),
                    (None, Some(result)) => Ok(result),
                    (None, None) => Err(AppError::invalid_response(format!(
                        "No result in response for id {}",
                        item.id
                    ))),
                })
                .collect();

            return Ok(results);
        }

        Err(last_error.unwrap_or_else(|| AppError::rpc_connection_failed("Batch request failed")))
    }

    // ============================================
    // CONCURRENT REQUESTS
    // ============================================

    /// Execute multiple calls concurrently, results in request order
    pub async fn concurrent_calls<T: for<'de> Deserialize<'de> + Send + 'static>(
        &self,
        requests: Vec<(&str, serde_json::Value)>,
    ) -> Vec<AppResult<T>> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|(method, params)| {
                let provider = self.clone();
                let method = method.to_string();
                tokio::spawn(async move { provider.call::<T>(&method, params).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(AppError::internal(format!("Task join error: {}", e)))),
            }
        }
        results
    }
}

/// Hide API keys embedded in provider URLs
pub fn mask_url(url: &str) -> String {
    match url.split_once("/v2/") {
        Some((base, _)) => format!("{}/v2/***HIDDEN***", base),
        None => url.to_string(),
    }
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Rate limit error (HTTP 429 equivalent or code -32005)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }

    /// Method not found (code -32601)
    pub fn is_method_not_found(&self) -> bool {
        self.code == -32601
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        if err.is_rate_limit() {
            AppError::rpc_rate_limited()
        } else {
            AppError::rpc_error(format!("RPC error: {} (code: {})", err.message, err.code))
        }
    }
}

/// Providers for every configured chain
pub struct RpcManager {
    providers: BTreeMap<ChainId, RpcProvider>,
}

impl RpcManager {
    pub fn new(config: &AppConfig) -> Self {
        let mut providers = BTreeMap::new();

        for chain in ChainId::ALL {
            match RpcProvider::for_chain(config, chain) {
                Ok(provider) => {
                    info!("✅ Initialized RPC for {} ({})", chain.name(), provider.masked_url());
                    providers.insert(chain, provider);
                }
                Err(e) => {
                    warn!("⚠️ Failed to initialize RPC for {}: {}", chain.name(), e);
                }
            }
        }

        Self { providers }
    }

    pub fn get(&self, chain: ChainId) -> Option<&RpcProvider> {
        self.providers.get(&chain)
    }

    /// Configured EVM chains in probing order
    pub fn evm_chains(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.providers
            .keys()
            .copied()
            .filter(|c| c.family() == crate::models::types::ChainFamily::Evm)
    }

    pub fn is_supported(&self, chain: ChainId) -> bool {
        self.providers.contains_key(&chain)
    }
}
