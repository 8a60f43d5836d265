//! Solana event source
//!
//! SPL token activity is read from `jsonParsed` transactions:
//! `transfer`, `transferChecked`, `mintTo`, `mintToChecked`.
//! Mints are attributed to the system program as genesis sender.
//! Token accounts are mapped back to their owner wallets through the
//! transaction's token balances so creator-origin checks compare wallets.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::rpc::RpcProvider;
use super::source::ChainSource;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    Address, ChainId, CreationInfo, RawAmount, RawTimestamp, RawTransfer,
};
use crate::utils::constants::{
    scale_amount, SOLANA_MAX_SIGNATURE_PAGES, SOLANA_SIGNATURE_PAGE, SOLANA_SYSTEM_PROGRAM,
};

/// Entry of `getSignaturesForAddress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub err: Option<Value>,
    pub block_time: Option<i64>,
}

// ============================================
// PARSING
// ============================================

fn account_key(keys: &[Value], index: usize) -> Option<String> {
    let key = keys.get(index)?;
    key.get("pubkey")
        .and_then(Value::as_str)
        .or_else(|| key.as_str())
        .map(String::from)
}

/// Token account -> (owner wallet, mint), from pre and post token balances
fn token_account_owners(tx: &Value) -> BTreeMap<String, (String, String)> {
    let keys = tx
        .pointer("/transaction/message/accountKeys")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut owners = BTreeMap::new();

    for field in ["/meta/preTokenBalances", "/meta/postTokenBalances"] {
        let Some(balances) = tx.pointer(field).and_then(Value::as_array) else {
            continue;
        };
        for balance in balances {
            let index = balance.get("accountIndex").and_then(Value::as_u64);
            let owner = balance.get("owner").and_then(Value::as_str);
            let mint = balance.get("mint").and_then(Value::as_str);
            if let (Some(index), Some(owner), Some(mint)) = (index, owner, mint) {
                if let Some(account) = account_key(&keys, index as usize) {
                    owners.insert(account, (owner.to_string(), mint.to_string()));
                }
            }
        }
    }
    owners
}

/// Outer instructions, each followed by its inner instructions
fn ordered_instructions(tx: &Value) -> Vec<&Value> {
    let outer = tx
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array);
    let inner = tx.pointer("/meta/innerInstructions").and_then(Value::as_array);
    let mut ordered = Vec::new();

    for (i, instruction) in outer.into_iter().flatten().enumerate() {
        ordered.push(instruction);
        for group in inner.into_iter().flatten() {
            if group.get("index").and_then(Value::as_u64) == Some(i as u64) {
                if let Some(list) = group.get("instructions").and_then(Value::as_array) {
                    ordered.extend(list.iter());
                }
            }
        }
    }
    ordered
}

fn raw_amount(info: &Value) -> Option<u64> {
    info.get("amount")
        .or_else(|| info.pointer("/tokenAmount/amount"))
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
}

/// SPL transfers and mints of `mint` inside one parsed transaction
pub fn extract_spl_transfers(tx: &Value, signature: &str, mint: &str, decimals: u8) -> Vec<RawTransfer> {
    let Some(block_time) = tx.get("blockTime").and_then(Value::as_i64) else {
        return Vec::new();
    };
    let slot = tx.get("slot").and_then(Value::as_u64).unwrap_or_default();
    let owners = token_account_owners(tx);
    let owner_of = |account: &str| -> String {
        owners
            .get(account)
            .map(|(owner, _)| owner.clone())
            .unwrap_or_else(|| account.to_string())
    };
    let mint_of = |account: &str| owners.get(account).map(|(_, m)| m.as_str());

    let mut transfers = Vec::new();
    for instruction in ordered_instructions(tx) {
        let program = instruction.get("program").and_then(Value::as_str).unwrap_or_default();
        if program != "spl-token" && program != "spl-token-2022" {
            continue;
        }
        let kind = instruction.pointer("/parsed/type").and_then(Value::as_str).unwrap_or_default();
        let Some(info) = instruction.pointer("/parsed/info") else {
            continue;
        };
        let field = |name: &str| info.get(name).and_then(Value::as_str);
        let Some(amount) = raw_amount(info) else {
            continue;
        };

        let (from, to) = match kind {
            "transfer" | "transferChecked" => {
                let (Some(source), Some(destination)) = (field("source"), field("destination")) else {
                    continue;
                };
                let instruction_mint = field("mint").or_else(|| mint_of(source)).or_else(|| mint_of(destination));
                if instruction_mint.is_some_and(|m| m != mint) {
                    continue;
                }
                let sender = field("authority")
                    .or_else(|| field("multisigAuthority"))
                    .map(String::from)
                    .unwrap_or_else(|| owner_of(source));
                (sender, owner_of(destination))
            }
            "mintTo" | "mintToChecked" => {
                if field("mint") != Some(mint) {
                    continue;
                }
                let Some(account) = field("account") else {
                    continue;
                };
                (SOLANA_SYSTEM_PROGRAM.to_string(), owner_of(account))
            }
            _ => continue,
        };

        transfers.push(RawTransfer {
            from,
            to,
            value: RawAmount::Number(scale_amount(U256::from(amount), decimals)),
            timestamp: RawTimestamp::Unix(block_time),
            ordinal: slot,
            tx_hash: Some(signature.to_string()),
            labels: Vec::new(),
        });
    }
    transfers
}

// ============================================
// SOLANA SOURCE
// ============================================

pub struct SolanaSource {
    provider: RpcProvider,
}

impl SolanaSource {
    pub fn new(provider: RpcProvider) -> Self {
        Self { provider }
    }

    async fn signatures_page(&self, address: &str, before: Option<&str>) -> AppResult<Vec<SignatureInfo>> {
        let mut options = serde_json::json!({ "limit": SOLANA_SIGNATURE_PAGE });
        if let Some(before) = before {
            options["before"] = Value::String(before.to_string());
        }
        self.provider
            .call("getSignaturesForAddress", serde_json::json!([address, options]))
            .await
    }

    /// Signatures newest-first, paged up to the configured page limit
    async fn signatures(&self, address: &str, stop_at_first_page: bool) -> AppResult<Vec<SignatureInfo>> {
        let mut all = Vec::new();
        let mut before: Option<String> = None;

        for page in 0..SOLANA_MAX_SIGNATURE_PAGES {
            let batch = self.signatures_page(address, before.as_deref()).await?;
            let exhausted = batch.len() < SOLANA_SIGNATURE_PAGE;
            before = batch.last().map(|s| s.signature.clone());
            all.extend(batch);
            if exhausted || stop_at_first_page {
                break;
            }
            if page + 1 == SOLANA_MAX_SIGNATURE_PAGES {
                warn!("⚠️ Signature history of {} exceeds {} pages", address, SOLANA_MAX_SIGNATURE_PAGES);
            }
        }
        Ok(all)
    }

    async fn oldest_signature(&self, address: &str) -> AppResult<Option<SignatureInfo>> {
        Ok(self.signatures(address, false).await?.pop())
    }

    async fn transaction(&self, signature: &str) -> AppResult<Option<Value>> {
        let params = serde_json::json!([
            signature,
            {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0}
        ]);
        self.provider.call("getTransaction", params).await
    }

    async fn mint_decimals(&self, mint: &str) -> u8 {
        let supply: AppResult<Value> = self.provider.call("getTokenSupply", serde_json::json!([mint])).await;
        match supply {
            Ok(value) => value
                .pointer("/value/decimals")
                .and_then(Value::as_u64)
                .map(|d| d as u8)
                .unwrap_or_else(|| ChainId::Solana.token_decimals()),
            Err(e) => {
                debug!("getTokenSupply failed for {}: {}", mint, e);
                ChainId::Solana.token_decimals()
            }
        }
    }

    /// Whether the account exists (used by chain resolution)
    pub async fn account_exists(&self, address: &str) -> AppResult<bool> {
        let result: Value = self
            .provider
            .call("getAccountInfo", serde_json::json!([address, {"encoding": "jsonParsed"}]))
            .await?;
        Ok(result.get("value").is_some_and(|v| !v.is_null()))
    }
}

#[async_trait]
impl ChainSource for SolanaSource {
    fn chain(&self) -> ChainId {
        ChainId::Solana
    }

    /// Creator is the fee payer of the mint's oldest transaction
    async fn fetch_creation_info(&self, contract: &Address) -> AppResult<CreationInfo> {
        let exists = self
            .account_exists(contract.as_str())
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("account lookup failed: {}", e)))?;
        if !exists {
            return Err(AppError::creation_info_unavailable(format!("account {} not found", contract)));
        }

        let oldest = self
            .oldest_signature(contract.as_str())
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("signature lookup failed: {}", e)))?
            .ok_or_else(|| AppError::creation_info_unavailable(format!("no history for {}", contract)))?;

        let tx = self
            .transaction(&oldest.signature)
            .await
            .map_err(|e| AppError::creation_info_unavailable(format!("transaction lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::creation_info_unavailable(format!("transaction {} not found", oldest.signature))
            })?;

        let keys = tx
            .pointer("/transaction/message/accountKeys")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let creator = account_key(&keys, 0)
            .ok_or_else(|| AppError::creation_info_unavailable("creation transaction has no fee payer"))?;
        let block_time = tx
            .get("blockTime")
            .and_then(Value::as_i64)
            .or(oldest.block_time)
            .ok_or_else(|| AppError::creation_info_unavailable("creation block time unknown"))?;
        let creation_time = Utc
            .timestamp_opt(block_time, 0)
            .single()
            .ok_or_else(|| AppError::creation_info_unavailable(format!("invalid block time {}", block_time)))?;

        info!("🧬 {} created by {} at slot {}", contract, creator, oldest.slot);
        Ok(CreationInfo {
            creator: Address::new(creator),
            creation_time,
            genesis_ordinal: oldest.slot,
        })
    }

    async fn fetch_transfers(
        &self,
        contract: &Address,
        _creation: &CreationInfo,
        max_events: usize,
    ) -> AppResult<Vec<RawTransfer>> {
        let mint = contract.as_str();
        let mut signatures = self.signatures(mint, false).await?;
        signatures.retain(|s| s.err.is_none());
        signatures.reverse();

        let decimals = self.mint_decimals(mint).await;
        let mut transfers = Vec::new();

        // Oldest first, batches of 50 transactions until the cap is reached
        for chunk in signatures.chunks(super::rpc::MAX_BATCH_SIZE) {
            if transfers.len() >= max_events {
                break;
            }
            let requests: Vec<(&str, Value)> = chunk
                .iter()
                .map(|s| {
                    (
                        "getTransaction",
                        serde_json::json!([s.signature, {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0}]),
                    )
                })
                .collect();
            let results = self.provider.batch_call::<Value>(requests).await?;

            for (sig, result) in chunk.iter().zip(results) {
                match result {
                    Ok(tx) => transfers.extend(extract_spl_transfers(&tx, &sig.signature, mint, decimals)),
                    Err(e) => warn!("⚠️ Transaction {} unavailable: {}", sig.signature, e),
                }
            }
        }
        transfers.truncate(max_events);

        info!(
            "📥 {} SPL transfers for {} from {} signatures",
            transfers.len(),
            mint,
            signatures.len()
        );
        Ok(transfers)
    }

    async fn fetch_balance(&self, address: &Address) -> AppResult<f64> {
        let result: Value = self
            .provider
            .call("getBalance", serde_json::json!([address.as_str()]))
            .await
            .map_err(|e| AppError::lookup_unavailable(format!("balance of {}: {}", address, e)))?;
        let lamports = result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| AppError::invalid_response("getBalance returned no value"))?;
        Ok(scale_amount(U256::from(lamports), ChainId::Solana.native_decimals()))
    }

    async fn fetch_first_use(&self, address: &Address) -> AppResult<Option<DateTime<Utc>>> {
        let Some(oldest) = self.oldest_signature(address.as_str()).await? else {
            return Ok(None);
        };
        let block_time = match oldest.block_time {
            Some(t) => Some(t),
            None => self
                .transaction(&oldest.signature)
                .await?
                .and_then(|tx| tx.get("blockTime").and_then(Value::as_i64)),
        };
        Ok(block_time.and_then(|t| Utc.timestamp_opt(t, 0).single()))
    }
}
