use super::DefiEngine;
use crate::bridge::transfer::CrossChainTransfer;
use crate::bridge::verifier::ValidatorSignature;
use crate::core::asset::{AccountId, ChainId, TokenId};
use crate::core::error::EngineError;
use crate::core::event::EngineEvent;
use crate::core::hash::Digest32;
use crate::core::ledger::AssetLedger;
use log::{debug, info, warn};

impl DefiEngine {
    /// Lock tokens in custody for release on `target_chain`.
    ///
    /// Returns the sequential transfer id and the content-derived lock
    /// hash relayers attest to. Locks stay available even while paused
    /// so in-flight cross-chain flows can settle.
    pub fn lock_tokens_for_bridge(
        &mut self,
        caller: &AccountId,
        target_chain: ChainId,
        token: &TokenId,
        amount: u128,
        recipient: &AccountId,
    ) -> Result<(u64, Digest32), EngineError> {
        let token = token.clone();
        self.run(false, |engine| {
            if !engine.supported_chains.contains(&target_chain) {
                return Err(EngineError::UnsupportedChain(target_chain));
            }
            if token.is_zero() || recipient.is_zero() {
                return Err(EngineError::InvalidParameter(
                    "token and recipient must be non-zero".into(),
                ));
            }
            if amount < engine.config.min_bridge_amount {
                return Err(EngineError::InvalidParameter(format!(
                    "amount {} below bridge minimum {}",
                    amount, engine.config.min_bridge_amount
                )));
            }

            let custody = engine.config.custody_account.clone();
            engine.ledger.transfer(&token, caller, &custody, amount)?;

            let state = engine.chain_state.entry(target_chain).or_default();
            let locked = state.total_locked.entry(token.clone()).or_insert(0);
            *locked = locked
                .checked_add(amount)
                .ok_or(EngineError::ArithmeticOverflow("bridge lock total"))?;

            let transfer_id = engine.next_transfer_id;
            engine.next_transfer_id += 1;
            let lock_hash = CrossChainTransfer::derive_lock_hash(
                engine.config.local_chain,
                target_chain,
                caller,
                recipient,
                &token,
                amount,
                engine.unix_now(),
            );
            engine.transfers.insert(
                transfer_id,
                CrossChainTransfer {
                    id: transfer_id,
                    source_chain: engine.config.local_chain,
                    target_chain,
                    token: token.clone(),
                    amount,
                    sender: caller.clone(),
                    recipient: recipient.clone(),
                    lock_hash,
                    completed: false,
                },
            );

            engine.emit(EngineEvent::TransferLocked {
                transfer_id,
                target_chain,
                token,
                amount,
                sender: caller.clone(),
                recipient: recipient.clone(),
                lock_hash,
            });
            info!("transfer {} locked for {}", transfer_id, target_chain);
            Ok((transfer_id, lock_hash))
        })
    }

    /// Release custody-held tokens to `recipient`, authorized by a
    /// validator quorum over the release digest.
    ///
    /// `transfer_id` identifies the inbound transfer on `source_chain`;
    /// each id is released at most once per source chain.
    pub fn release_tokens_from_bridge(
        &mut self,
        source_chain: ChainId,
        token: &TokenId,
        amount: u128,
        recipient: &AccountId,
        transfer_id: u64,
        signatures: &[ValidatorSignature],
    ) -> Result<(), EngineError> {
        let token = token.clone();
        self.run(false, |engine| {
            if !engine.supported_chains.contains(&source_chain) {
                return Err(EngineError::UnsupportedChain(source_chain));
            }
            if amount == 0 {
                return Err(EngineError::InvalidParameter(
                    "release amount must be positive".into(),
                ));
            }
            {
                let state = engine.chain_state.entry(source_chain).or_default();
                if state.processed_transfers.contains(&transfer_id) {
                    warn!("replayed release of transfer {} from {}", transfer_id, source_chain);
                    return Err(EngineError::ReplayDetected);
                }
            }

            let digest = CrossChainTransfer::release_digest(
                source_chain,
                &token,
                amount,
                recipient,
                transfer_id,
            );
            if !engine.verifier.verify(&digest, signatures) {
                return Err(EngineError::SignatureQuorumNotMet);
            }

            let state = engine.chain_state.entry(source_chain).or_default();
            state.processed_transfers.insert(transfer_id);
            if let Some(locked) = state.total_locked.get_mut(&token) {
                *locked = locked.saturating_sub(amount);
            }

            let custody = engine.config.custody_account.clone();
            engine.ledger.transfer(&token, &custody, recipient, amount)?;

            // If this releases a transfer we locked ourselves (round
            // trip through the counterpart chain), close out the record.
            // Each chain numbers its transfers independently, so the id
            // alone is not enough: the record must also have been locked
            // toward the chain this release came from.
            if let Some(transfer) = engine.transfers.get_mut(&transfer_id) {
                if transfer.target_chain == source_chain
                    && transfer.token == token
                    && transfer.amount == amount
                {
                    transfer.completed = true;
                }
            }

            engine.emit(EngineEvent::TransferReleased {
                transfer_id,
                source_chain,
                token,
                amount,
                recipient: recipient.clone(),
            });
            info!("transfer {} from {} released", transfer_id, source_chain);
            Ok(())
        })
    }

    /// Accept an arbitrary cross-chain message once, gated by the same
    /// validator quorum as token releases. Returns the message hash.
    pub fn relay_message(
        &mut self,
        source_chain: ChainId,
        sender: &AccountId,
        payload: &[u8],
        signatures: &[ValidatorSignature],
    ) -> Result<Digest32, EngineError> {
        self.run(false, |engine| {
            if !engine.supported_chains.contains(&source_chain) {
                return Err(EngineError::UnsupportedChain(source_chain));
            }
            let message_hash = Digest32::of_parts(&[
                &source_chain.value().to_be_bytes(),
                sender.as_str().as_bytes(),
                payload,
            ]);
            let state = engine.chain_state.entry(source_chain).or_default();
            if state.processed_messages.contains(&message_hash) {
                return Err(EngineError::ReplayDetected);
            }
            if !engine.verifier.verify(&message_hash, signatures) {
                return Err(EngineError::SignatureQuorumNotMet);
            }
            let state = engine.chain_state.entry(source_chain).or_default();
            state.processed_messages.insert(message_hash);

            engine.emit(EngineEvent::MessageRelayed {
                source_chain,
                sender: sender.clone(),
                message_hash,
            });
            debug!("message {} from {} relayed", message_hash, source_chain);
            Ok(message_hash)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::verifier::ThresholdVerifier;
    use crate::core::clock::ManualClock;
    use crate::engine::EngineConfig;

    const KEY_A: &[u8] = b"validator-a-key";
    const KEY_B: &[u8] = b"validator-b-key";

    fn setup() -> (DefiEngine, AccountId, TokenId) {
        let mut verifier = ThresholdVerifier::new(2);
        verifier.register_validator("val-a", KEY_A.to_vec());
        verifier.register_validator("val-b", KEY_B.to_vec());
        let mut engine = DefiEngine::with_parts(
            EngineConfig::default(),
            Box::new(verifier),
            Box::new(ManualClock::starting_at(1_700_000_000)),
        );
        let admin = engine.config().admin.clone();
        engine.add_supported_chain(&admin, ChainId::new(2)).unwrap();

        let token = TokenId::new("USDC");
        let alice = AccountId::new("alice");
        engine.ledger_mut().mint(&token, &alice, 10_000).unwrap();
        (engine, alice, token)
    }

    fn quorum(digest: &Digest32) -> Vec<ValidatorSignature> {
        vec![
            ValidatorSignature {
                validator: "val-a".into(),
                signature: ThresholdVerifier::sign(KEY_A, digest),
            },
            ValidatorSignature {
                validator: "val-b".into(),
                signature: ThresholdVerifier::sign(KEY_B, digest),
            },
        ]
    }

    #[test]
    fn test_lock_moves_funds_and_records_transfer() {
        let (mut engine, alice, token) = setup();
        let bob = AccountId::new("bob");
        let (id, hash) = engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 1_000, &bob)
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(engine.ledger().balance_of(&token, &alice), 9_000);
        assert_eq!(
            engine.ledger().balance_of(&token, engine.custody_account()),
            1_000
        );
        assert_eq!(engine.locked_for_chain(ChainId::new(2), &token), 1_000);

        let transfer = engine.transfer(id).unwrap();
        assert_eq!(transfer.lock_hash, hash);
        assert!(!transfer.completed);

        // Ids are sequential.
        let (id2, _) = engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 500, &bob)
            .unwrap();
        assert_eq!(id2, 2);
    }

    #[test]
    fn test_lock_unsupported_chain() {
        let (mut engine, alice, token) = setup();
        let bob = AccountId::new("bob");
        assert!(matches!(
            engine.lock_tokens_for_bridge(&alice, ChainId::new(9), &token, 100, &bob),
            Err(EngineError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_lock_below_minimum() {
        let (mut engine, alice, token) = setup();
        let admin = engine.config().admin.clone();
        engine.set_min_bridge_amount(&admin, 500).unwrap();
        let bob = AccountId::new("bob");
        assert!(engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 499, &bob)
            .is_err());
    }

    #[test]
    fn test_release_with_quorum() {
        let (mut engine, alice, token) = setup();
        // Fund custody as if the counterpart chain locked for us.
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 2_000, &alice, 77);
        engine
            .release_tokens_from_bridge(
                ChainId::new(2),
                &token,
                2_000,
                &alice,
                77,
                &quorum(&digest),
            )
            .unwrap();
        assert_eq!(engine.ledger().balance_of(&token, &alice), 12_000);
    }

    #[test]
    fn test_release_replay_rejected() {
        let (mut engine, alice, token) = setup();
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1_000, &alice, 5);
        let sigs = quorum(&digest);
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, 5, &sigs)
            .unwrap();
        assert!(matches!(
            engine.release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, 5, &sigs),
            Err(EngineError::ReplayDetected)
        ));
        // Only the first release paid out.
        assert_eq!(engine.ledger().balance_of(&token, &alice), 11_000);
    }

    #[test]
    fn test_release_quorum_not_met() {
        let (mut engine, alice, token) = setup();
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1_000, &alice, 5);
        let one_sig = vec![ValidatorSignature {
            validator: "val-a".into(),
            signature: ThresholdVerifier::sign(KEY_A, &digest),
        }];
        assert!(matches!(
            engine.release_tokens_from_bridge(
                ChainId::new(2),
                &token,
                1_000,
                &alice,
                5,
                &one_sig
            ),
            Err(EngineError::SignatureQuorumNotMet)
        ));
        // A failed release leaves no replay record; a valid retry works.
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, 5, &quorum(&digest))
            .unwrap();
    }

    #[test]
    fn test_release_signature_over_wrong_digest() {
        let (mut engine, alice, token) = setup();
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        // Quorum signed for a different amount.
        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1, &alice, 5);
        assert!(matches!(
            engine.release_tokens_from_bridge(
                ChainId::new(2),
                &token,
                1_000,
                &alice,
                5,
                &quorum(&digest)
            ),
            Err(EngineError::SignatureQuorumNotMet)
        ));
    }

    #[test]
    fn test_release_marks_round_trip_complete() {
        let (mut engine, alice, token) = setup();
        let bob = AccountId::new("bob");
        let (id, _) = engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 1_000, &bob)
            .unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1_000, &alice, id);
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, id, &quorum(&digest))
            .unwrap();
        assert!(engine.transfer(id).unwrap().completed);
        assert_eq!(engine.locked_for_chain(ChainId::new(2), &token), 0);
    }

    #[test]
    fn test_release_from_other_chain_leaves_outbound_record_open() {
        let (mut engine, alice, token) = setup();
        let admin = engine.config().admin.clone();
        engine.add_supported_chain(&admin, ChainId::new(3)).unwrap();
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        // Outbound lock toward chain 2; chain 3 happens to use the same
        // transfer id for an unrelated inbound release.
        let bob = AccountId::new("bob");
        let (id, _) = engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 1_000, &bob)
            .unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(3), &token, 1_000, &alice, id);
        engine
            .release_tokens_from_bridge(ChainId::new(3), &token, 1_000, &alice, id, &quorum(&digest))
            .unwrap();
        assert!(!engine.transfer(id).unwrap().completed);

        // The genuine round trip through chain 2 still closes it.
        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1_000, &alice, id);
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, id, &quorum(&digest))
            .unwrap();
        assert!(engine.transfer(id).unwrap().completed);
    }

    #[test]
    fn test_relay_message_once() {
        let (mut engine, alice, _) = setup();
        let payload = b"rebalance:USDC:500";
        let digest = Digest32::of_parts(&[
            &ChainId::new(2).value().to_be_bytes(),
            alice.as_str().as_bytes(),
            payload,
        ]);
        let sigs = quorum(&digest);
        let hash = engine
            .relay_message(ChainId::new(2), &alice, payload, &sigs)
            .unwrap();
        assert_eq!(hash, digest);
        assert!(matches!(
            engine.relay_message(ChainId::new(2), &alice, payload, &sigs),
            Err(EngineError::ReplayDetected)
        ));
    }

    #[test]
    fn test_bridge_live_while_paused() {
        let (mut engine, alice, token) = setup();
        let admin = engine.config().admin.clone();
        engine.pause(&admin).unwrap();
        let bob = AccountId::new("bob");
        engine
            .lock_tokens_for_bridge(&alice, ChainId::new(2), &token, 100, &bob)
            .unwrap();
    }

    #[test]
    fn test_override_transfer_status_reopens_replay_slot() {
        let (mut engine, alice, token) = setup();
        let admin = engine.config().admin.clone();
        let custody = engine.custody_account().clone();
        engine.ledger_mut().mint(&token, &custody, 5_000).unwrap();

        let digest =
            CrossChainTransfer::release_digest(ChainId::new(2), &token, 1_000, &alice, 9);
        let sigs = quorum(&digest);
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, 9, &sigs)
            .unwrap();

        engine
            .override_transfer_status(&admin, ChainId::new(2), 9, false)
            .unwrap();
        engine
            .release_tokens_from_bridge(ChainId::new(2), &token, 1_000, &alice, 9, &sigs)
            .unwrap();
        assert_eq!(engine.ledger().balance_of(&token, &alice), 12_000);
    }
}
