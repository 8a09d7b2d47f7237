//! Single-transaction uncollateralized loans.

use crate::core::asset::TokenId;
use crate::core::error::EngineError;
use crate::engine::DefiEngine;
use serde::{Deserialize, Serialize};

/// Callback contract for flash-loan borrowers.
///
/// The engine transfers the principal to the borrower's account, then
/// hands control here. Implementations are untrusted: they may fail, may
/// try to re-enter engine entry points (rejected by the reentrancy
/// guard), and are expected to have returned principal plus fee to the
/// engine's custody account — via the ledger — by the time this returns.
/// Anything short of that voids the whole loan.
pub trait FlashBorrower {
    fn execute_operation(
        &mut self,
        engine: &mut DefiEngine,
        token: &TokenId,
        amount: u128,
        fee: u128,
        data: &[u8],
    ) -> Result<(), EngineError>;
}

/// Outcome of a completed flash loan. Transient: nothing about the loan
/// is persisted beyond the operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLoanReceipt {
    pub token: TokenId,
    pub amount: u128,
    pub fee: u128,
}
