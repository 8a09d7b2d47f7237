//! Yield farming with a lazy reward-per-token accumulator.

mod farm;

pub use farm::{FarmId, StakePosition, YieldFarm, REWARD_SCALE};
