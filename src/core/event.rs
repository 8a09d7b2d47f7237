use crate::amm::pool::PoolId;
use crate::core::asset::{AccountId, ChainId, TokenId};
use crate::core::hash::Digest32;
use crate::farm::FarmId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fact emitted by the engine.
///
/// Exactly one event accompanies each successful state commit; a failed
/// operation emits nothing. External relays and indexers consume these
/// to mirror engine activity onto a message bus — that relay is out of
/// scope here, the engine only records the facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    PoolCreated {
        pool_id: PoolId,
        token_a: TokenId,
        token_b: TokenId,
        fee_bps: u32,
    },
    LiquidityAdded {
        pool_id: PoolId,
        provider: AccountId,
        amount_a: u128,
        amount_b: u128,
        shares_minted: u128,
    },
    LiquidityRemoved {
        pool_id: PoolId,
        provider: AccountId,
        amount_a: u128,
        amount_b: u128,
        shares_burned: u128,
    },
    SwapExecuted {
        pool_id: PoolId,
        trader: AccountId,
        token_in: TokenId,
        token_out: TokenId,
        amount_in: u128,
        amount_out: u128,
    },
    FarmCreated {
        farm_id: FarmId,
        staking_token: TokenId,
        reward_token: TokenId,
        reward_rate: u128,
        period_finish: u64,
    },
    Staked {
        farm_id: FarmId,
        staker: AccountId,
        amount: u128,
    },
    Unstaked {
        farm_id: FarmId,
        staker: AccountId,
        amount: u128,
    },
    RewardsClaimed {
        farm_id: FarmId,
        staker: AccountId,
        amount: u128,
    },
    FlashLoanExecuted {
        borrower: AccountId,
        token: TokenId,
        amount: u128,
        fee: u128,
    },
    TransferLocked {
        transfer_id: u64,
        target_chain: ChainId,
        token: TokenId,
        amount: u128,
        sender: AccountId,
        recipient: AccountId,
        lock_hash: Digest32,
    },
    TransferReleased {
        transfer_id: u64,
        source_chain: ChainId,
        token: TokenId,
        amount: u128,
        recipient: AccountId,
    },
    MessageRelayed {
        source_chain: ChainId,
        sender: AccountId,
        message_hash: Digest32,
    },
    Paused,
    Unpaused,
    EmergencyWithdrawal {
        token: TokenId,
        amount: u128,
        to: AccountId,
    },
    TransferStatusOverridden {
        source_chain: ChainId,
        transfer_id: u64,
        processed: bool,
    },
}

/// An emitted event together with its identity and commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: EngineEvent,
}

impl EventRecord {
    pub fn new(event: EngineEvent, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_record_serializes_flat() {
        let record = EventRecord::new(
            EngineEvent::Paused,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "paused");
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_swap_event_round_trip() {
        let pool_id = PoolId::derive(&TokenId::new("A"), &TokenId::new("B"), 30);
        let record = EventRecord::new(
            EngineEvent::SwapExecuted {
                pool_id,
                trader: AccountId::new("alice"),
                token_in: TokenId::new("A"),
                token_out: TokenId::new("B"),
                amount_in: 100,
                amount_out: 90,
            },
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event, record.event);
    }
}
