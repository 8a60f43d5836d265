//! Chain event-source capability
//!
//! One implementation per chain family. The engine only ever sees the
//! uniform `RawTransfer` shape these produce.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::errors::AppResult;
use crate::models::types::{Address, ChainId, CreationInfo, RawTransfer};

#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Chain this source reads from
    fn chain(&self) -> ChainId;

    /// Creator, creation time and genesis ordinal of a token contract
    async fn fetch_creation_info(&self, contract: &Address) -> AppResult<CreationInfo>;

    /// Token transfers from genesis onward, earliest first, at most `max_events`
    async fn fetch_transfers(
        &self,
        contract: &Address,
        creation: &CreationInfo,
        max_events: usize,
    ) -> AppResult<Vec<RawTransfer>>;

    /// Current native-unit balance
    async fn fetch_balance(&self, address: &Address) -> AppResult<f64>;

    /// First observed activity; `None` when the address has no history
    async fn fetch_first_use(&self, address: &Address) -> AppResult<Option<DateTime<Utc>>>;
}
