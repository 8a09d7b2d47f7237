use super::DefiEngine;
use crate::amm::pool::{LiquidityPool, PoolId, MAX_FEE_BPS};
use crate::core::asset::{AccountId, TokenId};
use crate::core::error::EngineError;
use crate::core::event::EngineEvent;
use crate::core::ledger::AssetLedger;
use log::{debug, info};

impl DefiEngine {
    /// Register a new pool for `(token_a, token_b)` at `fee_bps`.
    ///
    /// Privileged setup call. The pool id is the deterministic hash of
    /// the tuple, so re-creating the same pool fails with `PoolExists`.
    pub fn create_pool(
        &mut self,
        caller: &AccountId,
        token_a: TokenId,
        token_b: TokenId,
        fee_bps: u32,
    ) -> Result<PoolId, EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            if token_a.is_zero() || token_b.is_zero() {
                return Err(EngineError::InvalidParameter(
                    "pool tokens must be non-zero".into(),
                ));
            }
            if token_a == token_b {
                return Err(EngineError::InvalidParameter(
                    "pool tokens must differ".into(),
                ));
            }
            if fee_bps > MAX_FEE_BPS {
                return Err(EngineError::InvalidParameter(format!(
                    "fee {} bps exceeds maximum {}",
                    fee_bps, MAX_FEE_BPS
                )));
            }
            let pool = LiquidityPool::new(token_a.clone(), token_b.clone(), fee_bps);
            let pool_id = pool.id();
            if engine.pools.contains_key(&pool_id) {
                return Err(EngineError::PoolExists);
            }
            engine.pools.insert(pool_id, pool);
            engine.emit(EngineEvent::PoolCreated {
                pool_id,
                token_a: token_a.clone(),
                token_b: token_b.clone(),
                fee_bps,
            });
            info!("pool {} created: {}/{} @{}bps", pool_id, token_a, token_b, fee_bps);
            Ok(pool_id)
        })
    }

    /// Deposit both tokens and mint shares.
    ///
    /// First deposit mints `floor(sqrt(a*b))`; follow-ups must respect
    /// the reserve ratio and mint pro rata. Tokens are pulled through
    /// the ledger before reserves move; any failure rolls back both.
    pub fn add_liquidity(
        &mut self,
        caller: &AccountId,
        pool_id: &PoolId,
        amount_a: u128,
        amount_b: u128,
    ) -> Result<u128, EngineError> {
        let pool_id = *pool_id;
        self.run(true, |engine| {
            let pool = engine.pools.get(&pool_id).ok_or(EngineError::UnknownPool)?;
            if !pool.is_active() {
                return Err(EngineError::PoolInactive);
            }
            let token_a = pool.token_a().clone();
            let token_b = pool.token_b().clone();
            let shares = pool.preview_deposit(amount_a, amount_b)?;
            if shares == 0 {
                return Err(EngineError::InvalidParameter(
                    "deposit too small to mint shares".into(),
                ));
            }

            let custody = engine.config.custody_account.clone();
            engine.ledger.transfer(&token_a, caller, &custody, amount_a)?;
            engine.ledger.transfer(&token_b, caller, &custody, amount_b)?;

            let pool = engine
                .pools
                .get_mut(&pool_id)
                .ok_or(EngineError::UnknownPool)?;
            pool.apply_deposit(amount_a, amount_b, shares)?;
            *engine
                .shares
                .entry((caller.clone(), pool_id))
                .or_insert(0) += shares;

            engine.emit(EngineEvent::LiquidityAdded {
                pool_id,
                provider: caller.clone(),
                amount_a,
                amount_b,
                shares_minted: shares,
            });
            debug!("{} added ({}, {}) to {}, minted {} shares", caller, amount_a, amount_b, pool_id, shares);
            Ok(shares)
        })
    }

    /// Burn shares and withdraw the proportional reserves.
    ///
    /// Works on inactive pools too — providers can always exit.
    pub fn remove_liquidity(
        &mut self,
        caller: &AccountId,
        pool_id: &PoolId,
        shares: u128,
    ) -> Result<(u128, u128), EngineError> {
        let pool_id = *pool_id;
        self.run(true, |engine| {
            let held = engine
                .shares
                .get(&(caller.clone(), pool_id))
                .copied()
                .unwrap_or(0);
            if shares == 0 || shares > held {
                return Err(EngineError::InsufficientShares {
                    available: held,
                    required: shares,
                });
            }
            let pool = engine.pools.get(&pool_id).ok_or(EngineError::UnknownPool)?;
            let token_a = pool.token_a().clone();
            let token_b = pool.token_b().clone();
            let (amount_a, amount_b) = pool.preview_withdraw(shares)?;

            let pool = engine
                .pools
                .get_mut(&pool_id)
                .ok_or(EngineError::UnknownPool)?;
            pool.apply_withdraw(amount_a, amount_b, shares);
            engine
                .shares
                .insert((caller.clone(), pool_id), held - shares);

            let custody = engine.config.custody_account.clone();
            if amount_a > 0 {
                engine.ledger.transfer(&token_a, &custody, caller, amount_a)?;
            }
            if amount_b > 0 {
                engine.ledger.transfer(&token_b, &custody, caller, amount_b)?;
            }

            engine.emit(EngineEvent::LiquidityRemoved {
                pool_id,
                provider: caller.clone(),
                amount_a,
                amount_b,
                shares_burned: shares,
            });
            debug!("{} burned {} shares of {} for ({}, {})", caller, shares, pool_id, amount_a, amount_b);
            Ok((amount_a, amount_b))
        })
    }

    /// Swap `amount_in` of `token_in` for the pool's other token.
    ///
    /// Constant-product pricing with the pool fee on the input side;
    /// rejects when the output falls below `min_amount_out`.
    pub fn swap(
        &mut self,
        caller: &AccountId,
        pool_id: &PoolId,
        token_in: &TokenId,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, EngineError> {
        let pool_id = *pool_id;
        self.run(true, |engine| {
            if amount_in == 0 {
                return Err(EngineError::InvalidParameter(
                    "swap input must be positive".into(),
                ));
            }
            let pool = engine.pools.get(&pool_id).ok_or(EngineError::UnknownPool)?;
            if !pool.is_active() {
                return Err(EngineError::PoolInactive);
            }
            let (token_out, amount_out) = pool.preview_swap(token_in, amount_in)?;
            if amount_out < min_amount_out {
                return Err(EngineError::SlippageExceeded {
                    amount_out,
                    min_amount_out,
                });
            }
            if amount_out == 0 {
                return Err(EngineError::InvalidParameter(
                    "swap output rounds to zero".into(),
                ));
            }

            let custody = engine.config.custody_account.clone();
            engine.ledger.transfer(token_in, caller, &custody, amount_in)?;
            engine.ledger.transfer(&token_out, &custody, caller, amount_out)?;

            let pool = engine
                .pools
                .get_mut(&pool_id)
                .ok_or(EngineError::UnknownPool)?;
            pool.apply_swap(token_in, amount_in, amount_out);

            engine.emit(EngineEvent::SwapExecuted {
                pool_id,
                trader: caller.clone(),
                token_in: token_in.clone(),
                token_out: token_out.clone(),
                amount_in,
                amount_out,
            });
            debug!("{} swapped {} {} for {} {} in {}", caller, amount_in, token_in, amount_out, token_out, pool_id);
            Ok(amount_out)
        })
    }
}
