//! Ruster Audit Library
//!
//! Token fraud-risk heuristics over transfer history:
//! - Holder concentration in the first 24 hours
//! - Dumping by early holders within 7 days
//! - Creator fund tracing, rug-pull and laundering signals
//! - Compliance issues and a final suspicion verdict
//!
//! `core` is pure and synchronous. `providers` and `auditor` fetch the
//! facts it needs from EVM and Solana JSON-RPC endpoints.

pub mod api;
pub mod auditor;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use auditor::{audit_with_source, Auditor};
pub use crate::core::engine::{AuditBundle, AuditInput, HeuristicsEngine, PrefetchedLookups};
pub use crate::core::laundering::LabelSnapshot;
pub use crate::core::risk_score::{RiskComponents, RiskScore};
pub use models::config::{AppConfig, HeuristicsConfig, LargeTransferPolicy};
pub use models::errors::{AppError, AppResult, ErrorCode};
pub use models::types::{
    Address, AuditFinding, ChainFamily, ChainId, CreationInfo, Degradation, RawAmount,
    RawTimestamp, RawTransfer, RiskSignal, SignalKind, TransferEvent,
};
pub use providers::source::ChainSource;
