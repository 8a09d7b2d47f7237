//! Cross-chain bridge example: lock tokens for a remote chain, then
//! release an inbound transfer under a validator quorum.
//!
//! The "remote chain" here is simulated by signing the release digest
//! with the registered validator keys directly.

use defi_engine::bridge::transfer::CrossChainTransfer;
use defi_engine::bridge::verifier::{ThresholdVerifier, ValidatorSignature};
use defi_engine::core::asset::{AccountId, ChainId, TokenId};
use defi_engine::core::ledger::AssetLedger;
use defi_engine::engine::{DefiEngine, EngineConfig};

const VALIDATORS: [(&str, &[u8]); 3] = [
    ("val-1", b"validator-1-secret"),
    ("val-2", b"validator-2-secret"),
    ("val-3", b"validator-3-secret"),
];

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  defi-engine: Bridge Round Trip Example  ║");
    println!("╚══════════════════════════════════════════╝\n");

    // Two-of-three validator quorum.
    let mut verifier = ThresholdVerifier::new(2);
    for (name, key) in VALIDATORS {
        verifier.register_validator(name, key.to_vec());
    }
    let mut engine = DefiEngine::with_parts(
        EngineConfig::default(),
        Box::new(verifier),
        Box::new(defi_engine::core::clock::SystemClock),
    );

    let admin = engine.config().admin.clone();
    let polygon = ChainId::new(137);
    engine.add_supported_chain(&admin, polygon).unwrap();

    let usdc = TokenId::new("USDC");
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    engine.ledger_mut().mint(&usdc, &alice, 100_000).unwrap();

    // --- Outbound: lock for release on the remote chain ---
    println!("━━━ Outbound: Lock ━━━\n");

    let (transfer_id, lock_hash) = engine
        .lock_tokens_for_bridge(&alice, polygon, &usdc, 25_000, &bob)
        .unwrap();
    println!("Transfer id:   {}", transfer_id);
    println!("Lock hash:     {}", lock_hash);
    println!("Alice balance: {}", engine.ledger().balance_of(&usdc, &alice));
    println!("Locked for {}: {}\n", polygon, engine.locked_for_chain(polygon, &usdc));

    // --- Inbound: quorum-authorized release ---
    println!("━━━ Inbound: Release ━━━\n");

    let digest = CrossChainTransfer::release_digest(polygon, &usdc, 25_000, &alice, transfer_id);
    let signatures: Vec<ValidatorSignature> = VALIDATORS
        .iter()
        .take(2)
        .map(|(name, key)| ValidatorSignature {
            validator: (*name).to_string(),
            signature: ThresholdVerifier::sign(key, &digest),
        })
        .collect();

    engine
        .release_tokens_from_bridge(polygon, &usdc, 25_000, &alice, transfer_id, &signatures)
        .unwrap();
    println!("Alice balance: {}", engine.ledger().balance_of(&usdc, &alice));
    println!("Completed:     {}\n", engine.transfer(transfer_id).unwrap().completed);

    // --- Replay: the same release is rejected ---
    println!("━━━ Replay Attempt ━━━\n");

    let replay = engine.release_tokens_from_bridge(
        polygon, &usdc, 25_000, &alice, transfer_id, &signatures,
    );
    println!("Second release: {:?}", replay.unwrap_err());
}
