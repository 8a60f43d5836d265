//! Providers Module - External Data Sources
//!
//! Chain I/O: JSON-RPC transport, per-family event sources,
//! chain resolution and the label collaborator.

pub mod evm;
pub mod labels;
pub mod resolver;
pub mod rpc;
pub mod solana;
pub mod source;

pub use evm::EvmSource;
pub use labels::{default_labels, load_labels};
pub use resolver::{classify_input, normalize_address, ChainResolver, InputKind, ResolvedTarget};
pub use rpc::{RpcManager, RpcProvider};
pub use solana::SolanaSource;
pub use source::ChainSource;
