use crate::amm::pool::mul_div;
use crate::core::asset::TokenId;
use crate::core::error::EngineError;
use crate::core::hash::Digest32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale for the reward-per-token accumulator.
pub const REWARD_SCALE: u128 = 1_000_000_000_000_000_000;

/// Content-derived farm identifier: hash of the farm's defining tuple
/// plus its creation time, so two otherwise identical farms started at
/// different moments stay distinct.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FarmId(Digest32);

impl FarmId {
    pub fn derive(
        staking_token: &TokenId,
        reward_token: &TokenId,
        reward_rate: u128,
        duration: u64,
        created_at: u64,
    ) -> Self {
        Self(Digest32::of_parts(&[
            staking_token.as_str().as_bytes(),
            reward_token.as_str().as_bytes(),
            &reward_rate.to_be_bytes(),
            &duration.to_be_bytes(),
            &created_at.to_be_bytes(),
        ]))
    }

    pub fn digest(&self) -> &Digest32 {
        &self.0
    }
}

impl fmt::Display for FarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-staker accounting: current stake, the accumulator checkpoint the
/// stake was last settled against, and reward earned but not yet paid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakePosition {
    pub staked: u128,
    pub reward_per_token_paid: u128,
    pub pending_reward: u128,
}

/// A reward farm paying `reward_rate` reward tokens per second, pro rata
/// over all staked tokens, until `period_finish`.
///
/// Accrual is lazy: `update_reward` folds the elapsed interval into
/// `reward_per_token_stored` and settles one staker's pending reward
/// against it. Run at the head of every mutating call, this keeps
/// per-user accounting exact regardless of how calls interleave —
/// no iteration over stakers ever happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldFarm {
    id: FarmId,
    staking_token: TokenId,
    reward_token: TokenId,
    /// Reward tokens distributed per second across the whole farm.
    reward_rate: u128,
    period_finish: u64,
    last_update_time: u64,
    /// Accumulated reward per staked token, scaled by [`REWARD_SCALE`].
    /// Monotonically non-decreasing.
    reward_per_token_stored: u128,
    total_staked: u128,
}

impl YieldFarm {
    pub fn new(
        staking_token: TokenId,
        reward_token: TokenId,
        reward_rate: u128,
        duration: u64,
        now: u64,
    ) -> Self {
        let id = FarmId::derive(&staking_token, &reward_token, reward_rate, duration, now);
        Self {
            id,
            staking_token,
            reward_token,
            reward_rate,
            period_finish: now + duration,
            last_update_time: now,
            reward_per_token_stored: 0,
            total_staked: 0,
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> FarmId {
        self.id
    }

    pub fn staking_token(&self) -> &TokenId {
        &self.staking_token
    }

    pub fn reward_token(&self) -> &TokenId {
        &self.reward_token
    }

    pub fn reward_rate(&self) -> u128 {
        self.reward_rate
    }

    pub fn period_finish(&self) -> u64 {
        self.period_finish
    }

    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    pub fn reward_per_token_stored(&self) -> u128 {
        self.reward_per_token_stored
    }

    pub fn is_ended(&self, now: u64) -> bool {
        now >= self.period_finish
    }

    /// Total reward budget for the full period.
    pub fn reward_budget(&self, duration: u64) -> Result<u128, EngineError> {
        self.reward_rate
            .checked_mul(duration as u128)
            .ok_or(EngineError::ArithmeticOverflow("farm reward budget"))
    }

    /// Fold elapsed time into the accumulator and settle `position`.
    ///
    /// Accrual never advances past `period_finish`, and a farm with zero
    /// stake accrues nothing (the interval is skipped, not banked).
    pub fn update_reward(
        &mut self,
        now: u64,
        position: Option<&mut StakePosition>,
    ) -> Result<(), EngineError> {
        let effective_now = now.min(self.period_finish);
        if effective_now > self.last_update_time {
            if self.total_staked > 0 {
                let elapsed = (effective_now - self.last_update_time) as u128;
                let accrued = self
                    .reward_rate
                    .checked_mul(elapsed)
                    .ok_or(EngineError::ArithmeticOverflow("reward accrual"))?;
                let per_token = mul_div(accrued, REWARD_SCALE, self.total_staked)?;
                self.reward_per_token_stored = self
                    .reward_per_token_stored
                    .checked_add(per_token)
                    .ok_or(EngineError::ArithmeticOverflow("reward accumulator"))?;
            }
            self.last_update_time = effective_now;
        }
        if let Some(position) = position {
            let delta = self.reward_per_token_stored - position.reward_per_token_paid;
            if delta > 0 && position.staked > 0 {
                let earned = mul_div(position.staked, delta, REWARD_SCALE)?;
                position.pending_reward = position
                    .pending_reward
                    .checked_add(earned)
                    .ok_or(EngineError::ArithmeticOverflow("pending reward"))?;
            }
            position.reward_per_token_paid = self.reward_per_token_stored;
        }
        Ok(())
    }

    /// Record a stake. The caller has already run `update_reward`.
    pub fn apply_stake(&mut self, position: &mut StakePosition, amount: u128) {
        position.staked += amount;
        self.total_staked += amount;
    }

    /// Record an unstake. The caller has already run `update_reward` and
    /// checked `amount <= position.staked`.
    pub fn apply_unstake(&mut self, position: &mut StakePosition, amount: u128) {
        position.staked -= amount;
        self.total_staked -= amount;
    }
}
