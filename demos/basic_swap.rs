//! Basic AMM example: create a pool, provide liquidity, trade, exit.
//!
//! Demonstrates constant-product pricing and proportional share
//! accounting against an in-memory ledger.

use defi_engine::core::asset::{AccountId, TokenId};
use defi_engine::engine::{DefiEngine, EngineConfig};

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  defi-engine: Basic Swap Example         ║");
    println!("╚══════════════════════════════════════════╝\n");

    let mut engine = DefiEngine::new(EngineConfig::default());
    let admin = engine.config().admin.clone();
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    let usdc = TokenId::new("USDC");
    let weth = TokenId::new("WETH");

    engine.ledger_mut().mint(&usdc, &alice, 1_000_000).unwrap();
    engine.ledger_mut().mint(&weth, &alice, 1_000).unwrap();
    engine.ledger_mut().mint(&usdc, &bob, 50_000).unwrap();

    // --- Scenario 1: Seed a 30 bps pool ---
    println!("━━━ Scenario 1: Provide Liquidity ━━━\n");

    let pool_id = engine
        .create_pool(&admin, usdc.clone(), weth.clone(), 30)
        .unwrap();
    let shares = engine
        .add_liquidity(&alice, &pool_id, 500_000, 500)
        .unwrap();

    let pool = engine.pool(&pool_id).unwrap();
    println!("Pool:            {}", pool_id);
    println!("Reserves:        {} USDC / {} WETH", pool.reserve_a(), pool.reserve_b());
    println!("Alice's shares:  {}", shares);
    println!("Spot price:      {:.2} USDC per WETH\n", 1.0 / pool.spot_price());

    // --- Scenario 2: Bob swaps USDC for WETH ---
    println!("━━━ Scenario 2: Swap ━━━\n");

    let out = engine.swap(&bob, &pool_id, &usdc, 10_000, 0).unwrap();
    let pool = engine.pool(&pool_id).unwrap();
    println!("Bob sold:        10000 USDC");
    println!("Bob received:    {} WETH", out);
    println!("Reserves now:    {} USDC / {} WETH", pool.reserve_a(), pool.reserve_b());
    println!("k before/after:  250000000 → {}\n", pool.k().unwrap());

    // --- Scenario 3: Alice exits with the accumulated fees ---
    println!("━━━ Scenario 3: Exit ━━━\n");

    let (back_usdc, back_weth) = engine.remove_liquidity(&alice, &pool_id, shares).unwrap();
    println!("Alice withdrew:  {} USDC / {} WETH", back_usdc, back_weth);
    println!("(deposited 500000 / 500; the USDC surplus is Bob's trade flow)\n");

    println!("Events emitted: {}", engine.events().len());
    for record in engine.events() {
        println!("  {}", serde_json::to_string(&record.event).unwrap());
    }
}
