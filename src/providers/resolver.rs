//! Chain resolution
//!
//! Classifies raw user input (contract source or address) and, for bare
//! addresses, probes the configured networks until one of them knows it.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::rpc::RpcManager;
use super::solana::SolanaSource;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Address, ChainId};
use crate::utils::constants::{is_evm_address, is_solana_address};

/// What a piece of raw input looks like before any network probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    SoliditySource,
    SolanaSource,
    EvmAddress(String),
    SolanaAddress(String),
    Unknown,
}

/// Resolved audit target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub chain: ChainId,
    pub contract: Address,
}

/// EVM addresses compare lower-cased; base58 is case-sensitive and kept as is
pub fn normalize_address(raw: &str) -> Address {
    let trimmed = raw.trim();
    if is_evm_address(trimmed) {
        Address::new(trimmed.to_lowercase())
    } else {
        Address::new(trimmed)
    }
}

pub fn classify_input(input: &str) -> InputKind {
    let trimmed = input.trim();

    if trimmed.contains("pragma solidity") {
        return InputKind::SoliditySource;
    }
    if trimmed.contains("use solana_program") || trimmed.contains("use anchor_lang") {
        return InputKind::SolanaSource;
    }
    if is_evm_address(trimmed) {
        return InputKind::EvmAddress(trimmed.to_lowercase());
    }
    if is_solana_address(trimmed) {
        return InputKind::SolanaAddress(trimmed.to_string());
    }
    InputKind::Unknown
}

pub struct ChainResolver<'a> {
    rpc: &'a RpcManager,
}

impl<'a> ChainResolver<'a> {
    pub fn new(rpc: &'a RpcManager) -> Self {
        Self { rpc }
    }

    /// Resolve chain and contract address.
    ///
    /// Source text only names the chain, so it must come with `address`.
    pub async fn resolve(&self, input: &str, address: Option<&str>) -> AppResult<ResolvedTarget> {
        let address = address.map(str::trim).filter(|a| !a.is_empty());

        match classify_input(input) {
            InputKind::SoliditySource => self.from_source(ChainId::Ethereum, address),
            InputKind::SolanaSource => self.from_source(ChainId::Solana, address),
            InputKind::EvmAddress(addr) => {
                let chain = self.probe_evm(&addr).await?;
                Ok(ResolvedTarget {
                    chain,
                    contract: Address::new(addr),
                })
            }
            InputKind::SolanaAddress(addr) => {
                self.probe_solana(&addr).await?;
                Ok(ResolvedTarget {
                    chain: ChainId::Solana,
                    contract: Address::new(addr),
                })
            }
            InputKind::Unknown => {
                let preview: String = input.trim().chars().take(48).collect();
                Err(AppError::unsupported_chain(format!("unrecognised input '{}'", preview)))
            }
        }
    }

    fn from_source(&self, chain: ChainId, address: Option<&str>) -> AppResult<ResolvedTarget> {
        let address = address.ok_or_else(|| {
            AppError::creation_info_unavailable(format!(
                "{} source given without a deployed contract address",
                chain.name()
            ))
        })?;
        if !self.rpc.is_supported(chain) {
            return Err(AppError::unsupported_chain(format!("{} (no RPC configured)", chain.name())));
        }
        info!("🧭 Source classified as {}", chain.name());
        Ok(ResolvedTarget {
            chain,
            contract: normalize_address(address),
        })
    }

    /// First configured EVM chain where the address holds code
    async fn probe_evm(&self, address: &str) -> AppResult<ChainId> {
        for chain in self.rpc.evm_chains() {
            let Some(provider) = self.rpc.get(chain) else {
                continue;
            };
            let code: AppResult<Value> = provider
                .call("eth_getCode", serde_json::json!([address, "latest"]))
                .await;
            match code {
                Ok(code) if !is_empty_code(&code) => {
                    info!("🧭 {} found on {}", address, chain.name());
                    return Ok(chain);
                }
                Ok(_) => debug!("No code for {} on {}", address, chain.name()),
                Err(e) => warn!("⚠️ eth_getCode failed on {}: {}", chain.name(), e),
            }
        }
        Err(AppError::unsupported_chain(format!("{} has no code on any configured EVM chain", address)))
    }

    async fn probe_solana(&self, address: &str) -> AppResult<()> {
        let provider = self
            .rpc
            .get(ChainId::Solana)
            .ok_or_else(|| AppError::unsupported_chain("Solana (no RPC configured)"))?;

        match SolanaSource::new(provider.clone()).account_exists(address).await {
            Ok(true) => {
                info!("🧭 {} found on Solana", address);
                Ok(())
            }
            Ok(false) => Err(AppError::unsupported_chain(format!("{} not found on Solana", address))),
            Err(e) => {
                warn!("⚠️ getAccountInfo failed: {}", e);
                Err(AppError::unsupported_chain(format!("{} could not be probed on Solana", address)))
            }
        }
    }
}

/// `eth_getCode` results that mean "no contract"
pub fn is_empty_code(code: &Value) -> bool {
    code.as_str().map_or(true, |c| c == "0x" || c.is_empty())
}
