use super::DefiEngine;
use crate::core::asset::{AccountId, TokenId};
use crate::core::error::EngineError;
use crate::core::event::EngineEvent;
use crate::core::ledger::AssetLedger;
use crate::farm::{FarmId, YieldFarm};
use log::{debug, info};

impl DefiEngine {
    /// Open a reward farm paying `reward_rate` tokens per second for
    /// `duration` seconds.
    ///
    /// Privileged setup call. The full reward budget
    /// (`reward_rate * duration`) is pulled from the caller into custody
    /// up front, so every later claim is funded.
    pub fn create_farm(
        &mut self,
        caller: &AccountId,
        staking_token: TokenId,
        reward_token: TokenId,
        reward_rate: u128,
        duration: u64,
    ) -> Result<FarmId, EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            if staking_token.is_zero() || reward_token.is_zero() {
                return Err(EngineError::InvalidParameter(
                    "farm tokens must be non-zero".into(),
                ));
            }
            if reward_rate == 0 || duration == 0 {
                return Err(EngineError::InvalidParameter(
                    "reward rate and duration must be positive".into(),
                ));
            }
            let now = engine.unix_now();
            let farm = YieldFarm::new(
                staking_token.clone(),
                reward_token.clone(),
                reward_rate,
                duration,
                now,
            );
            let farm_id = farm.id();
            let budget = farm.reward_budget(duration)?;
            let custody = engine.config.custody_account.clone();
            engine
                .ledger
                .transfer(&reward_token, caller, &custody, budget)?;

            let period_finish = farm.period_finish();
            engine.farms.insert(farm_id, farm);
            engine.emit(EngineEvent::FarmCreated {
                farm_id,
                staking_token,
                reward_token,
                reward_rate,
                period_finish,
            });
            info!("farm {} created, {} reward/s until {}", farm_id, reward_rate, period_finish);
            Ok(farm_id)
        })
    }

    /// Stake tokens into a farm. Settles the caller's reward checkpoint
    /// first, so the new stake earns only from now on.
    pub fn stake(
        &mut self,
        caller: &AccountId,
        farm_id: &FarmId,
        amount: u128,
    ) -> Result<(), EngineError> {
        let farm_id = *farm_id;
        self.run(false, |engine| {
            if amount == 0 {
                return Err(EngineError::InvalidParameter(
                    "stake amount must be positive".into(),
                ));
            }
            let now = engine.unix_now();
            let farm = engine.farms.get_mut(&farm_id).ok_or(EngineError::UnknownFarm)?;
            if farm.is_ended(now) {
                return Err(EngineError::FarmEnded);
            }
            let position = engine
                .positions
                .entry((caller.clone(), farm_id))
                .or_default();
            farm.update_reward(now, Some(position))?;
            farm.apply_stake(position, amount);

            let staking_token = farm.staking_token().clone();
            let custody = engine.config.custody_account.clone();
            engine
                .ledger
                .transfer(&staking_token, caller, &custody, amount)?;

            engine.emit(EngineEvent::Staked {
                farm_id,
                staker: caller.clone(),
                amount,
            });
            debug!("{} staked {} into {}", caller, amount, farm_id);
            Ok(())
        })
    }

    /// Withdraw staked tokens. Allowed after the reward period ends.
    pub fn unstake(
        &mut self,
        caller: &AccountId,
        farm_id: &FarmId,
        amount: u128,
    ) -> Result<(), EngineError> {
        let farm_id = *farm_id;
        self.run(false, |engine| {
            if amount == 0 {
                return Err(EngineError::InvalidParameter(
                    "unstake amount must be positive".into(),
                ));
            }
            let now = engine.unix_now();
            let farm = engine.farms.get_mut(&farm_id).ok_or(EngineError::UnknownFarm)?;
            let position = engine
                .positions
                .entry((caller.clone(), farm_id))
                .or_default();
            farm.update_reward(now, Some(position))?;
            if position.staked < amount {
                return Err(EngineError::InsufficientStake {
                    available: position.staked,
                    required: amount,
                });
            }
            farm.apply_unstake(position, amount);

            let staking_token = farm.staking_token().clone();
            let custody = engine.config.custody_account.clone();
            engine
                .ledger
                .transfer(&staking_token, &custody, caller, amount)?;

            engine.emit(EngineEvent::Unstaked {
                farm_id,
                staker: caller.clone(),
                amount,
            });
            debug!("{} unstaked {} from {}", caller, amount, farm_id);
            Ok(())
        })
    }

    /// Pay out the caller's accrued rewards and zero the pending amount.
    /// Claiming zero is a successful no-transfer commit.
    pub fn claim_rewards(
        &mut self,
        caller: &AccountId,
        farm_id: &FarmId,
    ) -> Result<u128, EngineError> {
        let farm_id = *farm_id;
        self.run(false, |engine| {
            let now = engine.unix_now();
            let farm = engine.farms.get_mut(&farm_id).ok_or(EngineError::UnknownFarm)?;
            let position = engine
                .positions
                .entry((caller.clone(), farm_id))
                .or_default();
            farm.update_reward(now, Some(position))?;

            let amount = position.pending_reward;
            position.pending_reward = 0;

            if amount > 0 {
                let reward_token = farm.reward_token().clone();
                let custody = engine.config.custody_account.clone();
                engine
                    .ledger
                    .transfer(&reward_token, &custody, caller, amount)?;
            }

            engine.emit(EngineEvent::RewardsClaimed {
                farm_id,
                staker: caller.clone(),
                amount,
            });
            debug!("{} claimed {} from {}", caller, amount, farm_id);
            Ok(amount)
        })
    }
}
