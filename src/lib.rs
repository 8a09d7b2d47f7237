//! # defi-engine
//!
//! Ledger-resident DeFi protocol engine: constant-product AMM, yield
//! farming, flash loans, and a lock/release cross-chain bridge behind a
//! single transactional facade.
//!
//! Every mutating entry point is atomic: it either commits all of its
//! balance moves, protocol state changes, and events, or rolls back to
//! the pre-call state and returns an error.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: assets, ledger, events, hashing, clock
//! - **amm** — Constant-product pools, swap math, share accounting
//! - **farm** — Yield farms with lazy reward accumulation
//! - **loan** — Flash-loan borrower contract
//! - **bridge** — Cross-chain transfer records and signature quorums
//! - **engine** — The transactional facade tying it all together
//! - **simulation** — Random scenario generation and replay

pub mod amm;
pub mod bridge;
pub mod core;
pub mod engine;
pub mod farm;
pub mod loan;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::amm::pool::{LiquidityPool, PoolId};
    pub use crate::bridge::transfer::CrossChainTransfer;
    pub use crate::bridge::verifier::{SignatureVerifier, ThresholdVerifier, ValidatorSignature};
    pub use crate::core::asset::{AccountId, ChainId, TokenId};
    pub use crate::core::error::EngineError;
    pub use crate::core::event::{EngineEvent, EventRecord};
    pub use crate::core::ledger::{AssetLedger, InMemoryLedger};
    pub use crate::engine::{DefiEngine, EngineConfig};
    pub use crate::farm::{FarmId, YieldFarm};
    pub use crate::loan::{FlashBorrower, FlashLoanReceipt};
}
