//! Constants Module - Single Source of Truth
//!
//! Chain metadata, sentinels, RPC fallbacks and the default heuristic
//! thresholds. Other modules read their defaults from here; nothing in
//! `core` hardcodes a number that belongs in configuration.

use alloy_primitives::U256;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RusterAudit";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "RusterAudit/0.1.0";

// ============================================
// RPC CONSTANTS
// ============================================

/// Default timeout for RPC requests (seconds)
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Default cache TTL for live audits (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Page size for `getSignaturesForAddress`
pub const SOLANA_SIGNATURE_PAGE: usize = 1000;

/// Upper bound on signature pages walked when searching for the oldest one
pub const SOLANA_MAX_SIGNATURE_PAGES: usize = 20;

// ============================================
// CHAIN IDS - Single Source of Truth
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// BNB Smart Chain
pub const CHAIN_ID_BSC: u64 = 56;
/// Polygon
pub const CHAIN_ID_POLYGON: u64 = 137;
/// Arbitrum One
pub const CHAIN_ID_ARBITRUM: u64 = 42161;
/// Optimism
pub const CHAIN_ID_OPTIMISM: u64 = 10;
/// Avalanche C-Chain
pub const CHAIN_ID_AVALANCHE: u64 = 43114;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;
/// Fantom Opera
pub const CHAIN_ID_FANTOM: u64 = 250;
/// Solana (non-EVM, custom id)
pub const CHAIN_ID_SOLANA: u64 = 900;

/// All supported EVM chain IDs, in resolver probe order
pub const SUPPORTED_EVM_CHAIN_IDS: [u64; 8] = [
    CHAIN_ID_ETHEREUM,
    CHAIN_ID_BSC,
    CHAIN_ID_POLYGON,
    CHAIN_ID_AVALANCHE,
    CHAIN_ID_ARBITRUM,
    CHAIN_ID_OPTIMISM,
    CHAIN_ID_FANTOM,
    CHAIN_ID_BASE,
];

// ============================================
// SENTINEL ADDRESSES
// ============================================

/// EVM zero address, the sender of every ERC-20 mint
pub const EVM_ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Solana system program id, used as the genesis sender of mints
pub const SOLANA_SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";

/// SPL Token program
pub const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL Token-2022 program
pub const SPL_TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

// ============================================
// HEURISTIC DEFAULTS
// ============================================

/// Concentration window after creation (hours)
pub const CONCENTRATION_WINDOW_HOURS: i64 = 24;

/// Dump detection window after creation (days)
pub const DUMP_WINDOW_DAYS: i64 = 7;

/// Number of top holders used for concentration
pub const TOP_HOLDER_COUNT: usize = 5;

/// A sale above this fraction of the sender's window ledger is a dump
pub const DUMP_FRACTION: f64 = 0.5;

/// A creator withdrawal above this fraction of creator-origin value is large
pub const LARGE_WITHDRAWAL_FRACTION: f64 = 0.5;

/// Concentration (%) above which the audit is suspicious
pub const SUSPICIOUS_CONCENTRATION_PCT: f64 = 50.0;

/// Concentration (%) above which distribution fairness is a compliance issue
pub const FAIRNESS_CONCENTRATION_PCT: f64 = 70.0;

/// Creator-origin transfer share of total transferred that is suspicious
pub const CREATOR_TRANSFER_FRACTION: f64 = 0.05;

/// High-frequency trading needs strictly more events than this
pub const HIGH_FREQUENCY_MIN_EVENTS: usize = 20;

/// High-frequency trading needs a consecutive gap below this (seconds)
pub const HIGH_FREQUENCY_MAX_GAP_SECS: i64 = 60;

/// Largest accepted concentration window (hours)
pub const MAX_CONCENTRATION_WINDOW_HOURS: i64 = 24 * 365;

/// Largest accepted dump window (days)
pub const MAX_DUMP_WINDOW_DAYS: i64 = 3650;

/// Largest accepted high-frequency gap (seconds)
pub const MAX_HIGH_FREQUENCY_GAP_SECS: i64 = 86_400;

/// Upstream truncation cap on supplied events
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// EVM large transfer: fraction of the supply proxy
pub const EVM_LARGE_TRANSFER_FRACTION: f64 = 0.10;

/// Solana large transfer: absolute token units
pub const SOLANA_LARGE_TRANSFER_ABSOLUTE: f64 = 100_000.0;

/// EVM creator balance drain threshold (native units)
pub const EVM_DRAIN_THRESHOLD: f64 = 0.01;

/// Solana creator balance drain threshold (SOL)
pub const SOLANA_DRAIN_THRESHOLD: f64 = 1.0;

/// Default mixer / obfuscation service labels
pub const DEFAULT_MIXER_LABELS: [&str; 6] = [
    "tornado cash",
    "tornado.cash",
    "mixer",
    "sinbad",
    "blender.io",
    "railgun",
];

// ============================================
// PUBLIC RPC FALLBACKS
// ============================================

/// Get public RPC fallback URL for a chain
pub fn get_public_rpc_fallback(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("https://eth.llamarpc.com"),
        CHAIN_ID_BSC => Some("https://bsc-dataseed.binance.org"),
        CHAIN_ID_POLYGON => Some("https://polygon-rpc.com"),
        CHAIN_ID_ARBITRUM => Some("https://arb1.arbitrum.io/rpc"),
        CHAIN_ID_OPTIMISM => Some("https://mainnet.optimism.io"),
        CHAIN_ID_AVALANCHE => Some("https://api.avax.network/ext/bc/C/rpc"),
        CHAIN_ID_BASE => Some("https://mainnet.base.org"),
        CHAIN_ID_FANTOM => Some("https://rpc.ftm.tools"),
        CHAIN_ID_SOLANA => Some("https://api.mainnet-beta.solana.com"),
        _ => None,
    }
}

/// Get Alchemy subdomain for a chain
pub fn get_alchemy_subdomain(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("eth-mainnet"),
        CHAIN_ID_BSC => Some("bnb-mainnet"),
        CHAIN_ID_POLYGON => Some("polygon-mainnet"),
        CHAIN_ID_ARBITRUM => Some("arb-mainnet"),
        CHAIN_ID_OPTIMISM => Some("opt-mainnet"),
        CHAIN_ID_AVALANCHE => Some("avax-mainnet"),
        CHAIN_ID_BASE => Some("base-mainnet"),
        CHAIN_ID_FANTOM => Some("fantom-mainnet"),
        CHAIN_ID_SOLANA => Some("solana-mainnet"),
        _ => None,
    }
}

/// Build Alchemy URL for a chain
pub fn build_alchemy_url(chain_id: u64, api_key: &str) -> Option<String> {
    get_alchemy_subdomain(chain_id)
        .map(|subdomain| format!("https://{}.g.alchemy.com/v2/{}", subdomain, api_key))
}

/// Environment variable holding an explicit RPC URL for a chain
pub fn get_rpc_env_key(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("ETH_HTTP_URL"),
        CHAIN_ID_BSC => Some("BSC_HTTP_URL"),
        CHAIN_ID_POLYGON => Some("POLYGON_HTTP_URL"),
        CHAIN_ID_ARBITRUM => Some("ARBITRUM_HTTP_URL"),
        CHAIN_ID_OPTIMISM => Some("OPTIMISM_HTTP_URL"),
        CHAIN_ID_AVALANCHE => Some("AVALANCHE_HTTP_URL"),
        CHAIN_ID_BASE => Some("BASE_HTTP_URL"),
        CHAIN_ID_FANTOM => Some("FANTOM_HTTP_URL"),
        CHAIN_ID_SOLANA => Some("SOLANA_HTTP_URL"),
        _ => None,
    }
}

// ============================================
// CHAIN METADATA
// ============================================

/// Get chain name
pub fn get_chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_ETHEREUM => "Ethereum",
        CHAIN_ID_BSC => "BNB Smart Chain",
        CHAIN_ID_POLYGON => "Polygon",
        CHAIN_ID_ARBITRUM => "Arbitrum One",
        CHAIN_ID_OPTIMISM => "Optimism",
        CHAIN_ID_AVALANCHE => "Avalanche C-Chain",
        CHAIN_ID_BASE => "Base",
        CHAIN_ID_FANTOM => "Fantom",
        CHAIN_ID_SOLANA => "Solana",
        _ => "Unknown",
    }
}

/// Get native token symbol
pub fn get_native_symbol(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_BSC => "BNB",
        CHAIN_ID_POLYGON => "MATIC",
        CHAIN_ID_AVALANCHE => "AVAX",
        CHAIN_ID_FANTOM => "FTM",
        CHAIN_ID_SOLANA => "SOL",
        _ => "ETH",
    }
}

/// Decimals of the native token (wei / lamports)
pub fn get_native_decimals(chain_id: u64) -> u8 {
    match chain_id {
        CHAIN_ID_SOLANA => 9,
        _ => 18,
    }
}

/// Default decimals assumed for the audited token
pub fn get_default_token_decimals(chain_id: u64) -> u8 {
    match chain_id {
        CHAIN_ID_SOLANA => 6,
        _ => 18,
    }
}

/// Mint sentinel: the genesis sender of newly created tokens
pub fn get_mint_sentinel(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_SOLANA => SOLANA_SYSTEM_PROGRAM,
        _ => EVM_ZERO_ADDRESS,
    }
}

// ============================================
// CONVERSION UTILITIES
// ============================================

/// Scale a raw integer amount by `decimals` into token units
#[inline]
pub fn scale_amount(raw: U256, decimals: u8) -> f64 {
    f64::from(raw) / 10f64.powi(decimals as i32)
}

/// Check if address looks like Solana (base58, 32-44 chars, no 0x prefix)
pub fn is_solana_address(address: &str) -> bool {
    !address.starts_with("0x")
        && address.len() >= 32
        && address.len() <= 44
        && address.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Check if address looks like an EVM address (0x + 40 hex chars)
pub fn is_evm_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}
