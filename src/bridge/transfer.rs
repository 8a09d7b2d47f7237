use crate::core::asset::{AccountId, ChainId, TokenId};
use crate::core::hash::Digest32;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A recorded outbound transfer: tokens locked in custody awaiting
/// release on the target chain.
///
/// State machine: locked → completed, one-way and terminal. The only
/// path back is the privileged emergency override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossChainTransfer {
    pub id: u64,
    pub source_chain: ChainId,
    pub target_chain: ChainId,
    pub token: TokenId,
    pub amount: u128,
    pub sender: AccountId,
    pub recipient: AccountId,
    /// Content-derived hash relayers attest to off-ledger.
    pub lock_hash: Digest32,
    pub completed: bool,
}

impl CrossChainTransfer {
    /// The identifying hash emitted at lock time, bound to every field
    /// of the transfer plus its timestamp.
    pub fn derive_lock_hash(
        source_chain: ChainId,
        target_chain: ChainId,
        sender: &AccountId,
        recipient: &AccountId,
        token: &TokenId,
        amount: u128,
        timestamp: u64,
    ) -> Digest32 {
        Digest32::of_parts(&[
            &source_chain.value().to_be_bytes(),
            &target_chain.value().to_be_bytes(),
            sender.as_str().as_bytes(),
            recipient.as_str().as_bytes(),
            token.as_str().as_bytes(),
            &amount.to_be_bytes(),
            &timestamp.to_be_bytes(),
        ])
    }

    /// Digest a release authorization is signed over.
    pub fn release_digest(
        source_chain: ChainId,
        token: &TokenId,
        amount: u128,
        recipient: &AccountId,
        transfer_id: u64,
    ) -> Digest32 {
        Digest32::of_parts(&[
            &source_chain.value().to_be_bytes(),
            token.as_str().as_bytes(),
            &amount.to_be_bytes(),
            recipient.as_str().as_bytes(),
            &transfer_id.to_be_bytes(),
        ])
    }
}

/// Per-counterpart-chain bridge accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeChainState {
    /// Tokens currently held in custody for this chain.
    pub total_locked: HashMap<TokenId, u128>,
    /// Inbound transfer ids already released (replay protection).
    pub processed_transfers: HashSet<u64>,
    /// Relayed message hashes already handled (replay protection).
    pub processed_messages: HashSet<Digest32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_hash_binds_every_field() {
        let base = || {
            CrossChainTransfer::derive_lock_hash(
                ChainId::new(1),
                ChainId::new(2),
                &AccountId::new("alice"),
                &AccountId::new("bob"),
                &TokenId::new("USDC"),
                1_000,
                1_700_000_000,
            )
        };
        assert_eq!(base(), base());

        let different_amount = CrossChainTransfer::derive_lock_hash(
            ChainId::new(1),
            ChainId::new(2),
            &AccountId::new("alice"),
            &AccountId::new("bob"),
            &TokenId::new("USDC"),
            1_001,
            1_700_000_000,
        );
        assert_ne!(base(), different_amount);

        let different_time = CrossChainTransfer::derive_lock_hash(
            ChainId::new(1),
            ChainId::new(2),
            &AccountId::new("alice"),
            &AccountId::new("bob"),
            &TokenId::new("USDC"),
            1_000,
            1_700_000_001,
        );
        assert_ne!(base(), different_time);
    }

    #[test]
    fn test_release_digest_deterministic() {
        let a = CrossChainTransfer::release_digest(
            ChainId::new(7),
            &TokenId::new("USDC"),
            500,
            &AccountId::new("bob"),
            42,
        );
        let b = CrossChainTransfer::release_digest(
            ChainId::new(7),
            &TokenId::new("USDC"),
            500,
            &AccountId::new("bob"),
            42,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_chain_state_replay_set() {
        let mut state = BridgeChainState::default();
        assert!(state.processed_transfers.insert(42));
        assert!(!state.processed_transfers.insert(42));
    }
}
