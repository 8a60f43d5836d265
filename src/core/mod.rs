//! Core Module - Fraud-risk heuristics
//!
//! Pure, synchronous detectors over validated transfer events.
//! Chain I/O lives in `providers`; this module never touches the network.

pub mod compliance;
pub mod concentration;
pub mod creator_trace;
pub mod dumps;
pub mod engine;
pub mod laundering;
pub mod ledger;
pub mod risk_score;
pub mod rug_pull;

pub use creator_trace::FirstUseLookup;
pub use engine::*;
pub use laundering::LabelSnapshot;
pub use ledger::HolderLedger;
pub use risk_score::*;
pub use rug_pull::BalanceLookup;
