//! EVM event source
//!
//! ERC-20 `Transfer` logs via `eth_getLogs`, block timestamps via batched
//! `eth_getBlockByNumber`, creation info and first use via
//! `alchemy_getAssetTransfers`.
//!
//! All addresses are emitted lower-case so they compare exactly.

use alloy_primitives::{Address as EvmAddress, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::rpc::RpcProvider;
use super::source::ChainSource;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    Address, ChainId, CreationInfo, RawAmount, RawTimestamp, RawTransfer,
};
use crate::utils::constants::{scale_amount, EVM_ZERO_ADDRESS};

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
    function decimals() external view returns (uint8);
}

/// Blocks per `eth_getLogs` request (public RPCs reject wide ranges)
pub const LOG_BLOCK_SPAN: u64 = 5_000;

/// Upper bound on `eth_getLogs` requests per audit
pub const MAX_LOG_REQUESTS: usize = 200;

// ============================================
// RPC RESPONSE TYPES
// ============================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub block_timestamp: Option<String>,
}

/// Entry of `alchemy_getAssetTransfers`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfer {
    pub block_num: String,
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfersResponse {
    pub transfers: Vec<AssetTransfer>,
    pub page_key: Option<String>,
}

// ============================================
// DECODING HELPERS
// ============================================

/// Parse a `0x`-prefixed quantity
pub fn parse_hex_u64(value: &str) -> AppResult<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|_| AppError::invalid_response(format!("invalid hex quantity '{}'", value)))
}

pub fn parse_hex_u256(value: &str) -> AppResult<U256> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|_| AppError::invalid_response(format!("invalid hex amount '{}'", value)))
}

pub fn format_address(address: &EvmAddress) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn unix_to_utc(secs: u64) -> AppResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .ok_or_else(|| AppError::invalid_response(format!("timestamp {} out of range", secs)))
}

/// A decoded `Transfer` log before timestamps are attached
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTransfer {
    pub from: String,
    pub to: String,
    pub value: U256,
    pub block_number: u64,
    pub tx_hash: Option<String>,
}

/// Decode a raw log into a transfer; logs of other shapes yield an error
pub fn decode_transfer_log(log: &RpcLog) -> AppResult<DecodedTransfer> {
    let topics = log
        .topics
        .iter()
        .map(|t| B256::from_str(t))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::invalid_response(format!("invalid topic: {}", e)))?;
    let data = hex::decode(log.data.trim_start_matches("0x"))
        .map_err(|e| AppError::invalid_response(format!("invalid log data: {}", e)))?;

    let event = Transfer::decode_raw_log(topics, &data, true)
        .map_err(|e| AppError::invalid_response(format!("not an ERC-20 Transfer: {}", e)))?;

    Ok(DecodedTransfer {
        from: format_address(&event.from),
        to: format_address(&event.to),
        value: event.value,
        block_number: parse_hex_u64(&log.block_number)?,
        tx_hash: log.transaction_hash.clone(),
    })
}

// ============================================
// EVM SOURCE
// ============================================

pub struct EvmSource {
    chain: ChainId,
    provider: RpcProvider,
}

impl EvmSource {
    pub fn new(chain: ChainId, provider: RpcProvider) -> Self {
        Self { chain, provider }
    }

    async fn block_number(&self) -> AppResult<u64> {
        let latest: String = self.provider.call("eth_blockNumber", serde_json::json!([])).await?;
        parse_hex_u64(&latest)
    }

    /// `decimals()` of the token, chain default when the call fails
    async fn token_decimals(&self, contract: &Address) -> u8 {
        let data = format!("0x{}", hex::encode(decimalsCall {}.abi_encode()));
        let params = serde_json::json!([{ "to": contract.as_str(), "data": data }, "latest"]);

        let decoded = match self.provider.call::<String>("eth_call", params).await {
            Ok(raw) => hex::decode(raw.trim_start_matches("0x"))
                .ok()
                .and_then(|bytes| decimalsCall::abi_decode_returns(&bytes, true).ok())
                .map(|ret| ret._0),
            Err(e) => {
                debug!("decimals() failed for {}: {}", contract, e);
                None
            }
        };
        decoded.unwrap_or_else(|| {
            warn!("⚠️ Using default {} decimals for {}", self.chain.token_decimals(), contract);
            self.chain.token_decimals()
        })
    }

    /// Timestamps for a set of blocks, one batch request per 50 blocks
    async fn block_timestamps(&self, blocks: &BTreeSet<u64>) -> AppResult<BTreeMap<u64, DateTime<Utc>>> {
        let ordered: Vec<u64> = blocks.iter().copied().collect();
        let requests: Vec<(&str, serde_json::Value)> = ordered
            .iter()
            .map(|b| ("eth_getBlockByNumber", serde_json::json!([format!("0x{:x}", b), false])))
            .collect();

        let results = self.provider.batch_call::<RpcBlock>(requests).await?;
        let mut timestamps = BTreeMap::new();
        for (block, result) in ordered.into_iter().zip(results) {
            match result {
                Ok(rpc_block) => {
                    timestamps.insert(block, unix_to_utc(parse_hex_u64(&rpc_block.timestamp)?)?);
                }
                Err(e) => warn!("⚠️ Block {} timestamp unavailable: {}", block, e),
            }
        }
        Ok(timestamps)
    }

    /// First asset transfer matching `filter`, ascending from genesis
    async fn first_asset_transfer(&self, filter: serde_json::Value) -> AppResult<Option<AssetTransfer>> {
        let mut params = serde_json::json!({
            "fromBlock": "0x0",
            "toBlock": "latest",
            "order": "asc",
            "maxCount": "0x1",
            "withMetadata": true,
            "excludeZeroValue": false,
        });
        if let (Some(target), Some(extra)) = (params.as_object_mut(), filter.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }

        let response: AssetTransfersResponse = self
            .provider
            .call("alchemy_getAssetTransfers", serde_json::json!([params]))
            .await?;
        Ok(response.transfers.into_iter().next())
    }

    async fn transfer_time(&self, transfer: &AssetTransfer) -> AppResult<DateTime<Utc>> {
        if let Some(ts) = transfer.metadata.as_ref().and_then(|m| m.block_timestamp.as_deref()) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
                return Ok(parsed.with_timezone(&Utc));
            }
        }
        let block = parse_hex_u64(&transfer.block_num)?;
        let timestamps = self.block_timestamps(&BTreeSet::from([block])).await?;
        timestamps
            .get(&block)
            .copied()
            .ok_or_else(|| AppError::invalid_response(format!("no timestamp for block {}", block)))
    }
}

#[async_trait]
impl ChainSource for EvmSource {
    fn chain(&self) -> ChainId {
        self.chain
    }

    /// First mint from the zero address; creator is the sender of that transaction
    async fn fetch_creation_info(&self, contract: &Address) -> AppResult<CreationInfo> {
        let mint = self
            .first_asset_transfer(serde_json::json!({
                "fromAddress": EVM_ZERO_ADDRESS,
                "contractAddresses": [contract.as_str()],
                "category": ["erc20"],
            }))
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("mint lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::creation_info_unavailable(format!("no mint found for {}", contract))
            })?;

        let tx: Option<RpcTransaction> = self
            .provider
            .call("eth_getTransactionByHash", serde_json::json!([mint.hash]))
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("mint transaction lookup failed: {}", e)))?;
        let tx = tx.ok_or_else(|| {
            AppError::creation_info_unavailable(format!("mint transaction {} not found", mint.hash))
        })?;

        let creation_time = self
            .transfer_time(&mint)
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("creation time unavailable: {}", e)))?;

        let info = CreationInfo {
            creator: Address::new(tx.from.to_lowercase()),
            creation_time,
            genesis_ordinal: parse_hex_u64(&mint.block_num)?,
        };
        info!(
            "🧬 {} created by {} at block {}",
            contract, info.creator, info.genesis_ordinal
        );
        Ok(info)
    }

    async fn fetch_transfers(
        &self,
        contract: &Address,
        creation: &CreationInfo,
        max_events: usize,
    ) -> AppResult<Vec<RawTransfer>> {
        let latest = self.block_number().await?;
        let topic = format!("0x{}", hex::encode(Transfer::SIGNATURE_HASH.as_slice()));
        let mut decoded = Vec::new();
        let mut from_block = creation.genesis_ordinal;
        let mut requests = 0;

        // Earliest first, stop once the cap is reached
        while from_block <= latest && decoded.len() < max_events && requests < MAX_LOG_REQUESTS {
            let to_block = (from_block + LOG_BLOCK_SPAN - 1).min(latest);
            let params = serde_json::json!([{
                "address": contract.as_str(),
                "topics": [topic],
                "fromBlock": format!("0x{:x}", from_block),
                "toBlock": format!("0x{:x}", to_block),
            }]);
            let logs: Vec<RpcLog> = self.provider.call("eth_getLogs", params).await?;
            requests += 1;

            for log in &logs {
                match decode_transfer_log(log) {
                    Ok(transfer) => decoded.push(transfer),
                    Err(e) => debug!("Skipping log: {}", e),
                }
            }
            from_block = to_block + 1;
        }
        if requests == MAX_LOG_REQUESTS && from_block <= latest {
            warn!("⚠️ Log scan for {} stopped at block {}", contract, from_block);
        }
        decoded.truncate(max_events);

        let decimals = self.token_decimals(contract).await;
        let blocks: BTreeSet<u64> = decoded.iter().map(|t| t.block_number).collect();
        let timestamps = self.block_timestamps(&blocks).await?;

        let transfers: Vec<RawTransfer> = decoded
            .into_iter()
            .filter_map(|t| {
                // A missing block timestamp makes the event unusable
                let timestamp = timestamps.get(&t.block_number)?;
                Some(RawTransfer {
                    from: t.from,
                    to: t.to,
                    value: RawAmount::Number(scale_amount(t.value, decimals)),
                    timestamp: RawTimestamp::Unix(timestamp.timestamp()),
                    ordinal: t.block_number,
                    tx_hash: t.tx_hash,
                    labels: Vec::new(),
                })
            })
            .collect();

        info!(
            "📥 {} transfers for {} on {} ({} log requests)",
            transfers.len(),
            contract,
            self.chain.name(),
            requests
        );
        Ok(transfers)
    }

    async fn fetch_balance(&self, address: &Address) -> AppResult<f64> {
        let raw: String = self
            .provider
            .call("eth_getBalance", serde_json::json!([address.as_str(), "latest"]))
            .await
            .map_err(|e| AppError::lookup_unavailable(format!("balance of {}: {}", address, e)))?;
        Ok(scale_amount(parse_hex_u256(&raw)?, self.chain.native_decimals()))
    }

    async fn fetch_first_use(&self, address: &Address) -> AppResult<Option<DateTime<Utc>>> {
        let categories = serde_json::json!(["external", "erc20"]);
        let (sent, received) = tokio::join!(
            self.first_asset_transfer(serde_json::json!({
                "fromAddress": address.as_str(),
                "category": categories.clone(),
            })),
            self.first_asset_transfer(serde_json::json!({
                "toAddress": address.as_str(),
                "category": categories,
            })),
        );

        let mut earliest: Option<DateTime<Utc>> = None;
        for result in [sent, received] {
            let transfer = match result {
                Ok(Some(transfer)) => transfer,
                Ok(None) => continue,
                Err(e) if e.code == ErrorCode::RpcError => {
                    return Err(AppError::lookup_unavailable(format!("first use of {}: {}", address, e)))
                }
                Err(e) => return Err(e),
            };
            let time = self.transfer_time(&transfer).await?;
            earliest = Some(earliest.map_or(time, |current| current.min(time)));
        }
        Ok(earliest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_address(addr: &str) -> String {
        format!("0x{:0>64}", addr.trim_start_matches("0x"))
    }

    #[test]
    fn test_transfer_topic() {
        assert_eq!(
            format!("0x{}", hex::encode(Transfer::SIGNATURE_HASH.as_slice())),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_transfer_log() {
        let log = RpcLog {
            topics: vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".to_string(),
                pad_address("0x0000000000000000000000000000000000000000"),
                pad_address("0xAbCdEf0000000000000000000000000000000001"),
            ],
            data: format!("0x{:064x}", 1_000_000u64),
            block_number: "0x10".to_string(),
            transaction_hash: Some("0xfeed".to_string()),
            log_index: Some("0x0".to_string()),
        };
        let decoded = decode_transfer_log(&log).unwrap();
        assert_eq!(decoded.from, EVM_ZERO_ADDRESS);
        assert_eq!(decoded.to, "0xabcdef0000000000000000000000000000000001");
        assert_eq!(decoded.value, U256::from(1_000_000u64));
        assert_eq!(decoded.block_number, 16);
        assert_eq!(scale_amount(decoded.value, 6), 1.0);
    }

    #[test]
    fn test_decode_rejects_foreign_event() {
        let log = RpcLog {
            topics: vec![format!("0x{:064x}", 1u8)],
            data: "0x".to_string(),
            block_number: "0x1".to_string(),
            transaction_hash: None,
            log_index: None,
        };
        assert!(decode_transfer_log(&log).is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u64("0x1b4").unwrap(), 436);
        assert_eq!(parse_hex_u256("0x").unwrap(), U256::ZERO);
        assert_eq!(parse_hex_u256("0xde0b6b3a7640000").unwrap(), U256::from(10u64.pow(18)));
        assert!(parse_hex_u64("0xzz").is_err());
    }
}
