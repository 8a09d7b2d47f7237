use crate::core::asset::{ChainId, TokenId};
use crate::core::ledger::LedgerError;
use thiserror::Error;

/// Errors returned by protocol engine entry points.
///
/// Every variant is fail-closed: the operation that produced it has been
/// rolled back in full, and no event was emitted. Retry policy belongs to
/// the caller, never to the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("pool already exists for this token pair and fee")]
    PoolExists,
    #[error("unknown pool")]
    UnknownPool,
    #[error("pool is inactive")]
    PoolInactive,
    #[error("token {0} is not part of this pool")]
    TokenNotInPool(TokenId),
    #[error("insufficient shares: have {available}, need {required}")]
    InsufficientShares { available: u128, required: u128 },
    #[error("slippage exceeded: amount out {amount_out} below minimum {min_amount_out}")]
    SlippageExceeded {
        amount_out: u128,
        min_amount_out: u128,
    },
    #[error("deposit ratio mismatch: {required} of token B required, {provided} provided")]
    RatioMismatch { required: u128, provided: u128 },
    #[error("unknown farm")]
    UnknownFarm,
    #[error("farm reward period has ended")]
    FarmEnded,
    #[error("insufficient stake: have {available}, need {required}")]
    InsufficientStake { available: u128, required: u128 },
    #[error("unauthorized: caller is not the engine admin")]
    Unauthorized,
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
    #[error("replay detected: transfer or message already processed")]
    ReplayDetected,
    #[error("validator signature quorum not met")]
    SignatureQuorumNotMet,
    #[error("reentrant call rejected: an engine operation is already in progress")]
    ReentrancyDetected,
    #[error("flash loan repayment shortfall: expected {expected}, custody holds {actual}")]
    RepaymentShortfall { expected: u128, actual: u128 },
    #[error("engine is paused")]
    EnginePaused,
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AccountId;

    #[test]
    fn test_ledger_error_converts() {
        fn fails() -> Result<(), EngineError> {
            Err(LedgerError::InsufficientBalance {
                token: TokenId::new("USDC"),
                holder: AccountId::new("alice"),
                available: 1,
                required: 2,
            })?;
            Ok(())
        }
        assert!(matches!(fails(), Err(EngineError::Ledger(_))));
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let err = EngineError::RepaymentShortfall {
            expected: 1_010,
            actual: 1_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("1010"));
        assert!(msg.contains("1000"));
    }
}
