//! The protocol engine facade.
//!
//! One `DefiEngine` instance owns all mutable protocol state — ledger,
//! pools, farms, bridge accounting — behind a single-writer boundary.
//! Every state-changing entry point runs as one atomic operation: state
//! is snapshotted at entry and restored on any error, so no partial
//! effect is ever observable, and a fact (event) is recorded only with a
//! successful commit.

mod bridge;
mod farming;
mod lending;
mod liquidity;

use crate::amm::pool::{LiquidityPool, PoolId};
use crate::bridge::transfer::{BridgeChainState, CrossChainTransfer};
use crate::bridge::verifier::{SignatureVerifier, ThresholdVerifier};
use crate::core::asset::{AccountId, ChainId, TokenId};
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::EngineError;
use crate::core::event::{EngineEvent, EventRecord};
use crate::core::ledger::{AssetLedger, InMemoryLedger};
use crate::farm::{FarmId, StakePosition, YieldFarm};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Engine deployment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account allowed to call the administrative surface.
    pub admin: AccountId,
    /// Account holding pool reserves, stakes, and bridge custody.
    pub custody_account: AccountId,
    /// Account flash-loan fees are routed to.
    pub fee_collector: AccountId,
    /// Flash-loan fee in basis points.
    pub flash_fee_bps: u32,
    /// Minimum amount accepted for a bridge lock.
    pub min_bridge_amount: u128,
    /// Chain id of the ledger this engine lives on.
    pub local_chain: ChainId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: AccountId::new("admin"),
            custody_account: AccountId::new("engine-custody"),
            fee_collector: AccountId::new("fee-collector"),
            flash_fee_bps: 9,
            min_bridge_amount: 1,
            local_chain: ChainId::new(1),
        }
    }
}

/// Clone of all rollback-relevant state, taken at operation entry.
///
/// The reentrancy guard and pause flag are deliberately excluded: they
/// describe the in-flight call, not committed state.
struct StateSnapshot {
    ledger: InMemoryLedger,
    pools: HashMap<PoolId, LiquidityPool>,
    shares: HashMap<(AccountId, PoolId), u128>,
    farms: HashMap<FarmId, YieldFarm>,
    positions: HashMap<(AccountId, FarmId), StakePosition>,
    supported_chains: HashSet<ChainId>,
    chain_state: HashMap<ChainId, BridgeChainState>,
    transfers: HashMap<u64, CrossChainTransfer>,
    next_transfer_id: u64,
    event_count: usize,
}

/// Ledger-resident protocol engine: AMM, yield farms, flash loans, and
/// the cross-chain bridge, sharing one custody account and one event log.
pub struct DefiEngine {
    config: EngineConfig,
    ledger: InMemoryLedger,
    pools: HashMap<PoolId, LiquidityPool>,
    shares: HashMap<(AccountId, PoolId), u128>,
    farms: HashMap<FarmId, YieldFarm>,
    positions: HashMap<(AccountId, FarmId), StakePosition>,
    supported_chains: HashSet<ChainId>,
    chain_state: HashMap<ChainId, BridgeChainState>,
    transfers: HashMap<u64, CrossChainTransfer>,
    next_transfer_id: u64,
    verifier: Box<dyn SignatureVerifier>,
    clock: Box<dyn Clock>,
    paused: bool,
    entered: bool,
    events: Vec<EventRecord>,
}

impl DefiEngine {
    /// Engine with the default quorum verifier (threshold 1, empty
    /// validator set — releases fail until validators are configured).
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(
            config,
            Box::new(ThresholdVerifier::new(1)),
            Box::new(SystemClock),
        )
    }

    /// Engine with explicit verifier and clock capabilities.
    pub fn with_parts(
        config: EngineConfig,
        verifier: Box<dyn SignatureVerifier>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ledger: InMemoryLedger::new(),
            pools: HashMap::new(),
            shares: HashMap::new(),
            farms: HashMap::new(),
            positions: HashMap::new(),
            supported_chains: HashSet::new(),
            chain_state: HashMap::new(),
            transfers: HashMap::new(),
            next_transfer_id: 1,
            verifier,
            clock,
            paused: false,
            entered: false,
            events: Vec::new(),
        }
    }

    // --- Atomic unit of work ---

    /// Run a mutating entry point: reject re-entry, honor the pause
    /// switch for pausable paths, and roll back every effect on error.
    pub(crate) fn run<T>(
        &mut self,
        pausable: bool,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.entered {
            return Err(EngineError::ReentrancyDetected);
        }
        if pausable && self.paused {
            return Err(EngineError::EnginePaused);
        }
        self.entered = true;
        let snapshot = self.snapshot();
        let result = f(self);
        if result.is_err() {
            self.restore(snapshot);
        }
        self.entered = false;
        result
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            ledger: self.ledger.clone(),
            pools: self.pools.clone(),
            shares: self.shares.clone(),
            farms: self.farms.clone(),
            positions: self.positions.clone(),
            supported_chains: self.supported_chains.clone(),
            chain_state: self.chain_state.clone(),
            transfers: self.transfers.clone(),
            next_transfer_id: self.next_transfer_id,
            event_count: self.events.len(),
        }
    }

    fn restore(&mut self, snapshot: StateSnapshot) {
        self.ledger = snapshot.ledger;
        self.pools = snapshot.pools;
        self.shares = snapshot.shares;
        self.farms = snapshot.farms;
        self.positions = snapshot.positions;
        self.supported_chains = snapshot.supported_chains;
        self.chain_state = snapshot.chain_state;
        self.transfers = snapshot.transfers;
        self.next_transfer_id = snapshot.next_transfer_id;
        self.events.truncate(snapshot.event_count);
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        let record = EventRecord::new(event, self.clock.now());
        self.events.push(record);
    }

    pub(crate) fn unix_now(&self) -> u64 {
        self.clock.unix_now()
    }

    pub(crate) fn require_admin(&self, caller: &AccountId) -> Result<(), EngineError> {
        if caller != &self.config.admin {
            return Err(EngineError::Unauthorized);
        }
        Ok(())
    }

    // --- Read surface ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn custody_account(&self) -> &AccountId {
        &self.config.custody_account
    }

    /// The ledger, read-only.
    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    /// Mutable ledger access. The ledger is an external collaborator:
    /// flash-loan borrowers repay through it, and scenario setup funds
    /// accounts through it. Engine invariants do not depend on who else
    /// can move balances — every operation re-checks what it needs.
    pub fn ledger_mut(&mut self) -> &mut InMemoryLedger {
        &mut self.ledger
    }

    pub fn pool(&self, pool_id: &PoolId) -> Option<&LiquidityPool> {
        self.pools.get(pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &LiquidityPool> {
        self.pools.values()
    }

    pub fn shares_of(&self, provider: &AccountId, pool_id: &PoolId) -> u128 {
        self.shares
            .get(&(provider.clone(), *pool_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn farm(&self, farm_id: &FarmId) -> Option<&YieldFarm> {
        self.farms.get(farm_id)
    }

    pub fn position_of(&self, staker: &AccountId, farm_id: &FarmId) -> Option<&StakePosition> {
        self.positions.get(&(staker.clone(), *farm_id))
    }

    pub fn is_chain_supported(&self, chain: ChainId) -> bool {
        self.supported_chains.contains(&chain)
    }

    pub fn transfer(&self, transfer_id: u64) -> Option<&CrossChainTransfer> {
        self.transfers.get(&transfer_id)
    }

    pub fn locked_for_chain(&self, chain: ChainId, token: &TokenId) -> u128 {
        self.chain_state
            .get(&chain)
            .and_then(|s| s.total_locked.get(token))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Hand emitted events to a relay, clearing the log.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // --- Administrative surface ---

    pub fn set_flash_fee_bps(&mut self, caller: &AccountId, fee_bps: u32) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        if fee_bps as u128 >= crate::amm::pool::BPS_DENOMINATOR {
            return Err(EngineError::InvalidParameter(
                "flash fee must be below 100%".into(),
            ));
        }
        self.config.flash_fee_bps = fee_bps;
        Ok(())
    }

    pub fn set_fee_collector(
        &mut self,
        caller: &AccountId,
        collector: AccountId,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        if collector.is_zero() {
            return Err(EngineError::InvalidParameter(
                "fee collector must be non-zero".into(),
            ));
        }
        self.config.fee_collector = collector;
        Ok(())
    }

    pub fn set_min_bridge_amount(
        &mut self,
        caller: &AccountId,
        amount: u128,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.config.min_bridge_amount = amount;
        Ok(())
    }

    /// Swap in a new signature-quorum policy.
    pub fn set_verifier(
        &mut self,
        caller: &AccountId,
        verifier: Box<dyn SignatureVerifier>,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.verifier = verifier;
        Ok(())
    }

    pub fn add_supported_chain(&mut self, caller: &AccountId, chain: ChainId) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.supported_chains.insert(chain);
        self.chain_state.entry(chain).or_default();
        info!("chain {} marked supported", chain);
        Ok(())
    }

    /// Withdraw support for a chain. Its replay history is kept: a
    /// re-added chain must not accept previously processed transfers.
    pub fn remove_supported_chain(
        &mut self,
        caller: &AccountId,
        chain: ChainId,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.supported_chains.remove(&chain);
        Ok(())
    }

    pub fn set_pool_active(
        &mut self,
        caller: &AccountId,
        pool_id: &PoolId,
        active: bool,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        let pool = self.pools.get_mut(pool_id).ok_or(EngineError::UnknownPool)?;
        pool.set_active(active);
        Ok(())
    }

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            engine.paused = true;
            engine.emit(EngineEvent::Paused);
            warn!("engine paused");
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            engine.paused = false;
            engine.emit(EngineEvent::Unpaused);
            info!("engine unpaused");
            Ok(())
        })
    }

    /// Move assets out of custody. Emergency path: live even while
    /// paused, subject only to the admin check and ledger balance.
    pub fn emergency_withdraw(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: u128,
        to: &AccountId,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            let custody = engine.config.custody_account.clone();
            engine.ledger.transfer(token, &custody, to, amount)?;
            engine.emit(EngineEvent::EmergencyWithdrawal {
                token: token.clone(),
                amount,
                to: to.clone(),
            });
            warn!("emergency withdrawal of {} {} to {}", amount, token, to);
            Ok(())
        })
    }

    /// Force a transfer's replay status. The one sanctioned way a
    /// completed transfer can revert to unprocessed.
    pub fn override_transfer_status(
        &mut self,
        caller: &AccountId,
        source_chain: ChainId,
        transfer_id: u64,
        processed: bool,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        self.run(false, |engine| {
            let state = engine.chain_state.entry(source_chain).or_default();
            if processed {
                state.processed_transfers.insert(transfer_id);
            } else {
                state.processed_transfers.remove(&transfer_id);
            }
            if let Some(record) = engine.transfers.get_mut(&transfer_id) {
                record.completed = processed;
            }
            engine.emit(EngineEvent::TransferStatusOverridden {
                source_chain,
                transfer_id,
                processed,
            });
            warn!(
                "transfer {} on {} forced to processed={}",
                transfer_id, source_chain, processed
            );
            Ok(())
        })
    }
}
