//! Configuration module for Ruster Audit
//!
//! Thresholds and windows live here and in utils/constants.rs only.
//! Detector code receives a `HeuristicsConfig`; nothing reads globals.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ChainFamily, ChainId};
use crate::utils::constants::{
    build_alchemy_url, get_public_rpc_fallback, get_rpc_env_key, CONCENTRATION_WINDOW_HOURS,
    CREATOR_TRANSFER_FRACTION, DEFAULT_MAX_EVENTS, DEFAULT_RPC_TIMEOUT_SECS, DUMP_FRACTION,
    DUMP_WINDOW_DAYS, EVM_DRAIN_THRESHOLD, EVM_LARGE_TRANSFER_FRACTION, FAIRNESS_CONCENTRATION_PCT,
    HIGH_FREQUENCY_MAX_GAP_SECS, HIGH_FREQUENCY_MIN_EVENTS, LARGE_WITHDRAWAL_FRACTION,
    MAX_CONCENTRATION_WINDOW_HOURS, MAX_DUMP_WINDOW_DAYS, MAX_HIGH_FREQUENCY_GAP_SECS,
    SOLANA_DRAIN_THRESHOLD, SOLANA_LARGE_TRANSFER_ABSOLUTE, SUSPICIOUS_CONCENTRATION_PCT,
    TOP_HOLDER_COUNT,
};

/// How a chain defines a "large" transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum LargeTransferPolicy {
    /// Fixed token amount
    Absolute(f64),
    /// Fraction of `total_supply_transferred`
    SupplyFraction(f64),
}

impl LargeTransferPolicy {
    /// Resolve the threshold a transfer must exceed
    pub fn threshold(&self, total_supply_transferred: f64) -> f64 {
        match self {
            Self::Absolute(amount) => *amount,
            Self::SupplyFraction(fraction) => fraction * total_supply_transferred,
        }
    }

    fn default_for(chain: ChainId) -> Self {
        match chain.family() {
            ChainFamily::Solana => Self::Absolute(SOLANA_LARGE_TRANSFER_ABSOLUTE),
            ChainFamily::Evm => Self::SupplyFraction(EVM_LARGE_TRANSFER_FRACTION),
        }
    }
}

/// Tunables for every heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub concentration_window_hours: i64,
    pub dump_window_days: i64,
    pub top_holders: usize,
    pub dump_fraction: f64,
    pub large_withdrawal_fraction: f64,
    pub suspicious_concentration: f64,
    pub fairness_concentration: f64,
    pub creator_transfer_fraction: f64,
    /// Strictly more events than this are required
    pub high_frequency_min_events: usize,
    pub high_frequency_max_gap_secs: i64,
    pub large_transfer: BTreeMap<ChainId, LargeTransferPolicy>,
    pub default_large_transfer: LargeTransferPolicy,
    /// Native-unit balance below which the creator counts as drained
    pub drain_threshold: BTreeMap<ChainId, f64>,
    pub max_events: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        let large_transfer = ChainId::ALL
            .into_iter()
            .map(|chain| (chain, LargeTransferPolicy::default_for(chain)))
            .collect();
        let drain_threshold = ChainId::ALL
            .into_iter()
            .map(|chain| {
                let threshold = match chain.family() {
                    ChainFamily::Solana => SOLANA_DRAIN_THRESHOLD,
                    ChainFamily::Evm => EVM_DRAIN_THRESHOLD,
                };
                (chain, threshold)
            })
            .collect();

        Self {
            concentration_window_hours: CONCENTRATION_WINDOW_HOURS,
            dump_window_days: DUMP_WINDOW_DAYS,
            top_holders: TOP_HOLDER_COUNT,
            dump_fraction: DUMP_FRACTION,
            large_withdrawal_fraction: LARGE_WITHDRAWAL_FRACTION,
            suspicious_concentration: SUSPICIOUS_CONCENTRATION_PCT,
            fairness_concentration: FAIRNESS_CONCENTRATION_PCT,
            creator_transfer_fraction: CREATOR_TRANSFER_FRACTION,
            high_frequency_min_events: HIGH_FREQUENCY_MIN_EVENTS,
            high_frequency_max_gap_secs: HIGH_FREQUENCY_MAX_GAP_SECS,
            large_transfer,
            default_large_transfer: LargeTransferPolicy::SupplyFraction(EVM_LARGE_TRANSFER_FRACTION),
            drain_threshold,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl HeuristicsConfig {
    /// Bounded by `validate`; out-of-range values saturate instead of panicking
    pub fn concentration_window(&self) -> Duration {
        Duration::try_hours(self.concentration_window_hours).unwrap_or(Duration::MAX)
    }

    pub fn dump_window(&self) -> Duration {
        Duration::try_days(self.dump_window_days).unwrap_or(Duration::MAX)
    }

    pub fn high_frequency_max_gap(&self) -> Duration {
        Duration::try_seconds(self.high_frequency_max_gap_secs).unwrap_or(Duration::MAX)
    }

    /// Large-transfer policy for a chain (logged, never implicit)
    pub fn large_transfer_policy(&self, chain: ChainId) -> LargeTransferPolicy {
        let policy = self
            .large_transfer
            .get(&chain)
            .copied()
            .unwrap_or(self.default_large_transfer);
        debug!("📏 Large-transfer policy for {}: {:?}", chain.name(), policy);
        policy
    }

    pub fn drain_threshold(&self, chain: ChainId) -> f64 {
        self.drain_threshold.get(&chain).copied().unwrap_or(match chain.family() {
            ChainFamily::Solana => SOLANA_DRAIN_THRESHOLD,
            ChainFamily::Evm => EVM_DRAIN_THRESHOLD,
        })
    }

    /// Reject values that would make the heuristics meaningless
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_CONCENTRATION_WINDOW_HOURS).contains(&self.concentration_window_hours) {
            return Err(AppError::invalid_config(format!(
                "concentration_window_hours must be within 1..={}",
                MAX_CONCENTRATION_WINDOW_HOURS
            )));
        }
        if !(1..=MAX_DUMP_WINDOW_DAYS).contains(&self.dump_window_days) {
            return Err(AppError::invalid_config(format!(
                "dump_window_days must be within 1..={}",
                MAX_DUMP_WINDOW_DAYS
            )));
        }
        if !(1..=MAX_HIGH_FREQUENCY_GAP_SECS).contains(&self.high_frequency_max_gap_secs) {
            return Err(AppError::invalid_config(format!(
                "high_frequency_max_gap_secs must be within 1..={}",
                MAX_HIGH_FREQUENCY_GAP_SECS
            )));
        }
        if self.top_holders == 0 {
            return Err(AppError::invalid_config("top_holders must be at least 1"));
        }
        if self.max_events == 0 {
            return Err(AppError::invalid_config("max_events must be at least 1"));
        }
        let fractions = [
            self.dump_fraction,
            self.large_withdrawal_fraction,
            self.creator_transfer_fraction,
        ];
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(AppError::invalid_config("fractions must be finite and non-negative"));
        }
        if ![self.suspicious_concentration, self.fairness_concentration]
            .iter()
            .all(|pct| pct.is_finite())
        {
            return Err(AppError::invalid_config("concentration cutoffs must be finite"));
        }
        Ok(())
    }
}

/// Runtime configuration for binaries: endpoints plus heuristics
#[derive(Clone)]
pub struct AppConfig {
    /// Resolved RPC endpoint per chain
    pub rpc_urls: BTreeMap<ChainId, String>,
    /// Public fallback endpoint per chain
    pub fallback_urls: BTreeMap<ChainId, String>,
    /// Alchemy key, needed for `alchemy_getAssetTransfers`. Never logged.
    pub alchemy_key: Option<String>,
    pub labels_path: Option<PathBuf>,
    pub rpc_timeout_secs: u64,
    pub heuristics: HeuristicsConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("chains", &self.rpc_urls.keys().collect::<Vec<_>>())
            .field("alchemy_key", &self.alchemy_key.as_ref().map(|_| "***"))
            .field("labels_path", &self.labels_path)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("heuristics", &self.heuristics)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_urls: BTreeMap::new(),
            fallback_urls: BTreeMap::new(),
            alchemy_key: None,
            labels_path: None,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            heuristics: HeuristicsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get Alchemy API key from environment. Key is NEVER logged.
    fn alchemy_key_from_env() -> Option<String> {
        if let Ok(key) = std::env::var("ALCHEMY_API_KEY") {
            if !key.is_empty() && key != "YOUR_API_KEY" {
                info!("🔑 ALCHEMY_API_KEY configured (key hidden for security)");
                return Some(key);
            }
        }

        // Fallback: extract from ETH_HTTP_URL
        std::env::var("ETH_HTTP_URL")
            .ok()
            .and_then(|url| url.split("/v2/").nth(1).map(|s| s.to_string()))
            .filter(|k| !k.is_empty() && k != "YOUR_API_KEY")
    }

    /// Build from environment: `<CHAIN>_HTTP_URL`, then Alchemy, then public fallback
    pub fn from_env() -> AppResult<Self> {
        let alchemy_key = Self::alchemy_key_from_env();
        let mut rpc_urls = BTreeMap::new();
        let mut fallback_urls = BTreeMap::new();

        for chain in ChainId::ALL {
            let id = chain.id();
            let fallback = get_public_rpc_fallback(id).map(String::from);
            let url = get_rpc_env_key(id)
                .and_then(|key| std::env::var(key).ok())
                .filter(|url| !url.is_empty())
                .or_else(|| alchemy_key.as_ref().and_then(|k| build_alchemy_url(id, k)))
                .or_else(|| fallback.clone());

            match url {
                Some(url) => {
                    rpc_urls.insert(chain, url);
                }
                None => warn!("⚠️ No RPC endpoint for {}", chain.name()),
            }
            if let Some(fallback) = fallback {
                fallback_urls.insert(chain, fallback);
            }
        }

        let mut heuristics = HeuristicsConfig::default();
        if let Ok(raw) = std::env::var("RUSTER_MAX_EVENTS") {
            heuristics.max_events = raw
                .trim()
                .parse()
                .map_err(|_| AppError::invalid_config(format!("RUSTER_MAX_EVENTS='{}' is not a count", raw)))?;
        }
        heuristics.validate()?;

        let rpc_timeout_secs = match std::env::var("RUSTER_RPC_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::invalid_config(format!("RUSTER_RPC_TIMEOUT_SECS='{}' is not a number", raw)))?,
            Err(_) => DEFAULT_RPC_TIMEOUT_SECS,
        };

        let config = Self {
            rpc_urls,
            fallback_urls,
            alchemy_key,
            labels_path: std::env::var("RUSTER_LABELS_PATH").ok().map(PathBuf::from),
            rpc_timeout_secs,
            heuristics,
        };
        info!(
            "⚙️ Configured {} chains, max_events={}",
            config.rpc_urls.len(),
            config.heuristics.max_events
        );
        Ok(config)
    }

    pub fn rpc_url(&self, chain: ChainId) -> Option<&str> {
        self.rpc_urls.get(&chain).map(String::as_str)
    }

    pub fn fallback_url(&self, chain: ChainId) -> Option<&str> {
        self.fallback_urls.get(&chain).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;

    #[test]
    fn test_default_policies() {
        let config = HeuristicsConfig::default();
        assert_eq!(
            config.large_transfer_policy(ChainId::Solana),
            LargeTransferPolicy::Absolute(100_000.0)
        );
        assert_eq!(
            config.large_transfer_policy(ChainId::Base),
            LargeTransferPolicy::SupplyFraction(0.10)
        );
        assert_eq!(config.drain_threshold(ChainId::Solana), 1.0);
        assert_eq!(config.drain_threshold(ChainId::Ethereum), 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_threshold() {
        assert_eq!(LargeTransferPolicy::Absolute(5.0).threshold(1000.0), 5.0);
        assert_eq!(LargeTransferPolicy::SupplyFraction(0.1).threshold(1000.0), 100.0);
    }

    #[test]
    fn test_partial_override_deserializes() {
        let config: HeuristicsConfig = serde_json::from_str(r#"{"max_events": 10}"#).unwrap();
        assert_eq!(config.max_events, 10);
        assert_eq!(config.top_holders, 5);
    }

    #[test]
    fn test_policy_map_override() {
        let json = r#"{"large_transfer": {"ethereum": {"mode": "absolute", "value": 42.0}}}"#;
        let config: HeuristicsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.large_transfer_policy(ChainId::Ethereum),
            LargeTransferPolicy::Absolute(42.0)
        );
        // Chains missing from an override map fall back to the default policy
        assert_eq!(
            config.large_transfer_policy(ChainId::Solana),
            LargeTransferPolicy::SupplyFraction(0.10)
        );
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = HeuristicsConfig {
            max_events: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_windows() {
        let oversized = [
            HeuristicsConfig {
                dump_window_days: 200_000_000,
                ..Default::default()
            },
            HeuristicsConfig {
                concentration_window_hours: i64::MAX,
                ..Default::default()
            },
            HeuristicsConfig {
                high_frequency_max_gap_secs: i64::MAX,
                ..Default::default()
            },
            HeuristicsConfig {
                high_frequency_max_gap_secs: -1,
                ..Default::default()
            },
        ];
        for config in oversized {
            let err = config.validate().unwrap_err();
            assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
        }
    }

    #[test]
    fn test_window_accessors_saturate() {
        let config = HeuristicsConfig {
            dump_window_days: i64::MAX,
            high_frequency_max_gap_secs: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.dump_window(), Duration::MAX);
        assert_eq!(config.high_frequency_max_gap(), Duration::MAX);
    }

    #[test]
    fn test_app_config_debug_hides_key() {
        let config = AppConfig {
            alchemy_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
