//! Utils Module - Helper Functions & Shared Utilities
//!
//! Chain constants, unit scaling and the live audit cache.

pub mod cache;
pub mod constants;

pub use cache::{AuditCache, CacheStats};
pub use constants::*;
