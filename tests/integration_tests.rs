use defi_engine::bridge::transfer::CrossChainTransfer;
use defi_engine::bridge::verifier::{ThresholdVerifier, ValidatorSignature};
use defi_engine::core::asset::{AccountId, ChainId, TokenId};
use defi_engine::core::clock::ManualClock;
use defi_engine::core::error::EngineError;
use defi_engine::core::event::EngineEvent;
use defi_engine::core::ledger::AssetLedger;
use defi_engine::engine::{DefiEngine, EngineConfig};
use defi_engine::loan::FlashBorrower;

const VALIDATOR_KEYS: [(&str, &[u8]); 3] = [
    ("val-1", b"key-1"),
    ("val-2", b"key-2"),
    ("val-3", b"key-3"),
];

fn engine_with_quorum(quorum: usize) -> (DefiEngine, ManualClock) {
    let mut verifier = ThresholdVerifier::new(quorum);
    for (name, key) in VALIDATOR_KEYS {
        verifier.register_validator(name, key.to_vec());
    }
    let clock = ManualClock::starting_at(1_700_000_000);
    let engine = DefiEngine::with_parts(
        EngineConfig::default(),
        Box::new(verifier),
        Box::new(clock.clone()),
    );
    (engine, clock)
}

fn sign_all(digest: &defi_engine::core::hash::Digest32) -> Vec<ValidatorSignature> {
    VALIDATOR_KEYS
        .iter()
        .map(|(name, key)| ValidatorSignature {
            validator: (*name).to_string(),
            signature: ThresholdVerifier::sign(key, digest),
        })
        .collect()
}

/// Full pipeline: pool → liquidity → swap → farm → claim → exit.
#[test]
fn full_pipeline_amm_and_farm() {
    let (mut engine, clock) = engine_with_quorum(2);
    let admin = engine.config().admin.clone();
    let alice = AccountId::new("alice");
    let tok_a = TokenId::new("TOKA");
    let tok_b = TokenId::new("TOKB");
    let rwd = TokenId::new("RWD");

    engine.ledger_mut().mint(&tok_a, &alice, 10_000).unwrap();
    engine.ledger_mut().mint(&tok_b, &alice, 10_000).unwrap();
    engine.ledger_mut().mint(&rwd, &admin, 1_000_000).unwrap();

    // Pool with the documented worked example: 30 bps fee, symmetric
    // opening deposit of 1000/1000.
    let pool_id = engine
        .create_pool(&admin, tok_a.clone(), tok_b.clone(), 30)
        .unwrap();
    let shares = engine.add_liquidity(&alice, &pool_id, 1_000, 1_000).unwrap();
    assert_eq!(shares, 1_000);

    let out = engine.swap(&alice, &pool_id, &tok_a, 100, 0).unwrap();
    assert_eq!(out, 90);
    let pool = engine.pool(&pool_id).unwrap();
    assert_eq!(pool.reserve_a(), 1_100);
    assert_eq!(pool.reserve_b(), 910);
    assert!(pool.k().unwrap() >= 1_000 * 1_000);

    // Stake the LP-ish position value into a farm paying 10 RWD/s.
    let farm_id = engine
        .create_farm(&admin, tok_a.clone(), rwd.clone(), 10, 1_000)
        .unwrap();
    engine.stake(&alice, &farm_id, 500).unwrap();
    clock.advance(100);
    assert_eq!(engine.claim_rewards(&alice, &farm_id).unwrap(), 1_000);
    engine.unstake(&alice, &farm_id, 500).unwrap();

    // Exit the pool entirely.
    let (back_a, back_b) = engine.remove_liquidity(&alice, &pool_id, shares).unwrap();
    assert_eq!((back_a, back_b), (1_100, 910));
    assert_eq!(engine.shares_of(&alice, &pool_id), 0);

    // Every successful operation emitted exactly one event.
    let kinds: Vec<_> = engine.events().iter().map(|r| &r.event).collect();
    assert_eq!(kinds.len(), 8);
    assert!(matches!(kinds[0], EngineEvent::PoolCreated { .. }));
    assert!(matches!(kinds[2], EngineEvent::SwapExecuted { .. }));
    assert!(matches!(kinds[7], EngineEvent::LiquidityRemoved { .. }));
}

/// Token supply is conserved across the whole pipeline: the engine
/// moves balances, it never creates or destroys them.
#[test]
fn engine_conserves_token_supply() {
    let (mut engine, _) = engine_with_quorum(1);
    let admin = engine.config().admin.clone();
    let alice = AccountId::new("alice");
    let tok_a = TokenId::new("TOKA");
    let tok_b = TokenId::new("TOKB");

    engine.ledger_mut().mint(&tok_a, &alice, 50_000).unwrap();
    engine.ledger_mut().mint(&tok_b, &alice, 50_000).unwrap();
    let supply_a = engine.ledger().total_supply(&tok_a);
    let supply_b = engine.ledger().total_supply(&tok_b);

    let pool_id = engine
        .create_pool(&admin, tok_a.clone(), tok_b.clone(), 30)
        .unwrap();
    engine.add_liquidity(&alice, &pool_id, 10_000, 10_000).unwrap();
    engine.swap(&alice, &pool_id, &tok_a, 1_000, 0).unwrap();
    engine.swap(&alice, &pool_id, &tok_b, 2_500, 0).unwrap();
    engine.remove_liquidity(&alice, &pool_id, 4_000).unwrap();

    assert_eq!(engine.ledger().total_supply(&tok_a), supply_a);
    assert_eq!(engine.ledger().total_supply(&tok_b), supply_b);
}

struct SkimmingBorrower {
    skim: u128,
}

impl FlashBorrower for SkimmingBorrower {
    fn execute_operation(
        &mut self,
        engine: &mut DefiEngine,
        token: &TokenId,
        amount: u128,
        fee: u128,
        _data: &[u8],
    ) -> Result<(), EngineError> {
        let me = AccountId::new("flash-trader");
        let custody = engine.custody_account().clone();
        let repay = (amount + fee).saturating_sub(self.skim);
        engine
            .ledger_mut()
            .transfer(token, &me, &custody, repay)
            .map_err(EngineError::from)
    }
}

struct SwapReentrantBorrower {
    pool_id: defi_engine::amm::pool::PoolId,
    repay: bool,
}

impl FlashBorrower for SwapReentrantBorrower {
    fn execute_operation(
        &mut self,
        engine: &mut DefiEngine,
        token: &TokenId,
        amount: u128,
        fee: u128,
        _data: &[u8],
    ) -> Result<(), EngineError> {
        let me = AccountId::new("flash-trader");
        let attempt = engine.swap(&me, &self.pool_id, token, amount, 0);
        assert!(matches!(attempt, Err(EngineError::ReentrancyDetected)));
        if self.repay {
            let custody = engine.custody_account().clone();
            engine.ledger_mut().transfer(token, &me, &custody, amount + fee)?;
        }
        Ok(())
    }
}

/// A borrower that repays short voids the loan; balances and engine
/// tables come back bit-for-bit.
#[test]
fn flash_loan_shortfall_is_fully_rolled_back() {
    let (mut engine, _) = engine_with_quorum(1);
    let token = TokenId::new("USDC");
    let custody = engine.custody_account().clone();
    let trader = AccountId::new("flash-trader");
    engine.ledger_mut().mint(&token, &custody, 1_000_000).unwrap();
    engine.ledger_mut().mint(&token, &trader, 1_000).unwrap();

    let before_events = engine.events().len();
    let err = engine
        .flash_loan(&trader, &token, 500_000, b"", &mut SkimmingBorrower { skim: 100 })
        .unwrap_err();
    assert!(matches!(err, EngineError::RepaymentShortfall { .. }));
    assert_eq!(engine.ledger().balance_of(&token, &custody), 1_000_000);
    assert_eq!(engine.ledger().balance_of(&token, &trader), 1_000);
    assert_eq!(engine.events().len(), before_events);

    // The same borrower paying in full succeeds. 9 bps of 500_000 = 450.
    let receipt = engine
        .flash_loan(&trader, &token, 500_000, b"", &mut SkimmingBorrower { skim: 0 })
        .unwrap();
    assert_eq!(receipt.fee, 450);
    assert_eq!(engine.ledger().balance_of(&token, &trader), 550);
}

/// Re-entering the engine from inside a flash-loan callback is rejected,
/// and the rejection alone does not void a loan that still repays.
#[test]
fn flash_loan_reentrancy_rejected_but_loan_can_still_settle() {
    let (mut engine, _) = engine_with_quorum(1);
    let admin = engine.config().admin.clone();
    let token = TokenId::new("USDC");
    let other = TokenId::new("WETH");
    let trader = AccountId::new("flash-trader");

    engine.ledger_mut().mint(&token, &admin, 10_000).unwrap();
    engine.ledger_mut().mint(&other, &admin, 10_000).unwrap();
    let custody = engine.custody_account().clone();
    engine.ledger_mut().mint(&token, &custody, 100_000).unwrap();
    engine.ledger_mut().mint(&token, &trader, 100).unwrap();

    let pool_id = engine
        .create_pool(&admin, token.clone(), other.clone(), 30)
        .unwrap();
    engine.add_liquidity(&admin, &pool_id, 5_000, 5_000).unwrap();

    // Repaying borrower: the blocked swap is just an error it absorbs.
    engine
        .flash_loan(
            &trader,
            &token,
            10_000,
            b"",
            &mut SwapReentrantBorrower { pool_id, repay: true },
        )
        .unwrap();

    // Non-repaying borrower: the loan itself then fails and unwinds.
    let err = engine
        .flash_loan(
            &trader,
            &token,
            10_000,
            b"",
            &mut SwapReentrantBorrower { pool_id, repay: false },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::RepaymentShortfall { .. }));
    let pool = engine.pool(&pool_id).unwrap();
    assert_eq!((pool.reserve_a(), pool.reserve_b()), (5_000, 5_000));
}

/// Bridge round trip with a two-of-three validator quorum, including
/// replay rejection.
#[test]
fn bridge_lock_release_and_replay() {
    let (mut engine, _) = engine_with_quorum(2);
    let admin = engine.config().admin.clone();
    let remote = ChainId::new(137);
    engine.add_supported_chain(&admin, remote).unwrap();

    let token = TokenId::new("USDC");
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    engine.ledger_mut().mint(&token, &alice, 10_000).unwrap();

    let (transfer_id, lock_hash) = engine
        .lock_tokens_for_bridge(&alice, remote, &token, 4_000, &bob)
        .unwrap();
    assert_eq!(engine.ledger().balance_of(&token, &alice), 6_000);
    assert_eq!(engine.locked_for_chain(remote, &token), 4_000);
    assert_eq!(engine.transfer(transfer_id).unwrap().lock_hash, lock_hash);

    // Counterpart chain releases the same transfer back to alice.
    let digest =
        CrossChainTransfer::release_digest(remote, &token, 4_000, &alice, transfer_id);
    let sigs = sign_all(&digest);
    engine
        .release_tokens_from_bridge(remote, &token, 4_000, &alice, transfer_id, &sigs)
        .unwrap();
    assert_eq!(engine.ledger().balance_of(&token, &alice), 10_000);
    assert!(engine.transfer(transfer_id).unwrap().completed);

    // Replay: rejected, not a single token moves.
    let err = engine
        .release_tokens_from_bridge(remote, &token, 4_000, &alice, transfer_id, &sigs)
        .unwrap_err();
    assert!(matches!(err, EngineError::ReplayDetected));
    assert_eq!(engine.ledger().balance_of(&token, &alice), 10_000);

    // One short of quorum never releases.
    let digest2 = CrossChainTransfer::release_digest(remote, &token, 100, &alice, 999);
    let one = sign_all(&digest2)[..1].to_vec();
    assert!(matches!(
        engine.release_tokens_from_bridge(remote, &token, 100, &alice, 999, &one),
        Err(EngineError::SignatureQuorumNotMet)
    ));
}

/// Pause gates trading paths only; exits, farm settlement and the
/// bridge stay live, and unpause restores everything.
#[test]
fn pause_gates_trading_paths_only() {
    let (mut engine, _) = engine_with_quorum(1);
    let admin = engine.config().admin.clone();
    let alice = AccountId::new("alice");
    let tok_a = TokenId::new("TOKA");
    let tok_b = TokenId::new("TOKB");
    engine.ledger_mut().mint(&tok_a, &alice, 10_000).unwrap();
    engine.ledger_mut().mint(&tok_b, &alice, 10_000).unwrap();

    let pool_id = engine
        .create_pool(&admin, tok_a.clone(), tok_b.clone(), 30)
        .unwrap();
    engine.add_liquidity(&alice, &pool_id, 1_000, 1_000).unwrap();

    engine.pause(&admin).unwrap();
    assert!(matches!(
        engine.swap(&alice, &pool_id, &tok_a, 100, 0),
        Err(EngineError::EnginePaused)
    ));
    assert!(matches!(
        engine.add_liquidity(&alice, &pool_id, 100, 100),
        Err(EngineError::EnginePaused)
    ));
    assert!(matches!(
        engine.remove_liquidity(&alice, &pool_id, 100),
        Err(EngineError::EnginePaused)
    ));

    engine.unpause(&admin).unwrap();
    engine.swap(&alice, &pool_id, &tok_a, 100, 0).unwrap();
}

/// Privileged calls reject everyone but the configured admin.
#[test]
fn admin_surface_rejects_non_admin() {
    let (mut engine, _) = engine_with_quorum(1);
    let mallory = AccountId::new("mallory");
    let token = TokenId::new("USDC");

    assert!(matches!(
        engine.pause(&mallory),
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        engine.create_pool(&mallory, TokenId::new("A"), TokenId::new("B"), 30),
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        engine.add_supported_chain(&mallory, ChainId::new(2)),
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        engine.emergency_withdraw(&mallory, &token, 1, &mallory),
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        engine.set_flash_fee_bps(&mallory, 0),
        Err(EngineError::Unauthorized)
    ));
}

/// Failed operations leave no events behind; successful ones append
/// exactly at commit.
#[test]
fn events_only_on_commit() {
    let (mut engine, _) = engine_with_quorum(1);
    let admin = engine.config().admin.clone();
    let alice = AccountId::new("alice");
    let tok_a = TokenId::new("TOKA");
    let tok_b = TokenId::new("TOKB");
    engine.ledger_mut().mint(&tok_a, &alice, 1_000).unwrap();
    engine.ledger_mut().mint(&tok_b, &alice, 1_000).unwrap();

    let pool_id = engine
        .create_pool(&admin, tok_a.clone(), tok_b.clone(), 30)
        .unwrap();
    engine.add_liquidity(&alice, &pool_id, 500, 500).unwrap();
    let committed = engine.events().len();

    // Slippage guard trips after the math ran; nothing may remain.
    assert!(matches!(
        engine.swap(&alice, &pool_id, &tok_a, 100, u128::MAX),
        Err(EngineError::SlippageExceeded { .. })
    ));
    assert_eq!(engine.events().len(), committed);

    let drained = engine.drain_events();
    assert_eq!(drained.len(), committed);
    assert!(engine.events().is_empty());
}
