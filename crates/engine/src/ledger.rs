//! Stake bookkeeping: per-pool totals, per-account stakes, and the set of
//! pools each account has ever entered.
//!
//! The ledger is pure bookkeeping; settlement ordering and custody moves
//! are the façade's job. The conservation invariant — a pool's total equals
//! the sum of its per-account stakes — holds after every mutation because
//! both sides change in the same call.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tidemill_types::fixed_point::add_u128;
use tidemill_types::{pool_holder_account_id, AccountId, Amount, AssetId, PoolId};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::market::MarketEntry;

/// Everything the engine tracks about one provisioned pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Custody endpoint owning this pool's staked tokens and yield balance.
    pub holder: AccountId,
    /// Position token accounts stake into this pool.
    pub position_asset: AssetId,
    /// Market backing the position (from discovery).
    pub market_account: AccountId,
    pub total_staked: Amount,
}

/// All stake state, keyed with flat composite tables.
#[derive(Debug, Clone, Default)]
pub struct StakeLedger {
    pools: BTreeMap<PoolId, PoolState>,
    stakes: BTreeMap<(PoolId, AccountId), Amount>,
    memberships: BTreeMap<AccountId, BTreeSet<PoolId>>,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self, pool: PoolId) -> Option<&PoolState> {
        self.pools.get(&pool)
    }

    /// Provision `pool` on its first-ever stake: derive the holder account
    /// and record the discovery entry. Idempotent; returns the state and
    /// whether this call created it.
    pub fn provision_pool(&mut self, pool: PoolId, entry: MarketEntry) -> (PoolState, bool) {
        if let Some(state) = self.pools.get(&pool) {
            return (*state, false);
        }
        let state = PoolState {
            holder: pool_holder_account_id(pool),
            position_asset: entry.position_asset,
            market_account: entry.market_account,
            total_staked: 0,
        };
        self.pools.insert(pool, state);
        debug!(%pool, holder = %state.holder, "pool provisioned");
        (state, true)
    }

    pub fn stake_of(&self, pool: PoolId, account: AccountId) -> Amount {
        self.stakes.get(&(pool, account)).copied().unwrap_or(0)
    }

    pub fn total_staked(&self, pool: PoolId) -> Amount {
        self.pools.get(&pool).map(|p| p.total_staked).unwrap_or(0)
    }

    /// Pools `account` has ever staked in, in deterministic order.
    pub fn pools_of(&self, account: AccountId) -> Vec<PoolId> {
        self.memberships
            .get(&account)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Add stake; both the account entry and the pool total move together.
    pub fn increase(
        &mut self,
        pool: PoolId,
        account: AccountId,
        amount: Amount,
    ) -> EngineResult<()> {
        let state = self
            .pools
            .get_mut(&pool)
            .ok_or(EngineError::UnknownPool { pool })?;
        let entry = self.stakes.entry((pool, account)).or_insert(0);
        *entry = add_u128(*entry, amount)?;
        state.total_staked = add_u128(state.total_staked, amount)?;
        self.memberships.entry(account).or_default().insert(pool);
        Ok(())
    }

    /// Remove stake; fails on insufficient balance before touching state.
    pub fn decrease(
        &mut self,
        pool: PoolId,
        account: AccountId,
        amount: Amount,
    ) -> EngineResult<()> {
        let available = self.stake_of(pool, account);
        if available < amount {
            return Err(EngineError::InsufficientStake {
                pool,
                account,
                available,
                requested: amount,
            });
        }
        let state = self
            .pools
            .get_mut(&pool)
            .ok_or(EngineError::UnknownPool { pool })?;
        self.stakes.insert((pool, account), available - amount);
        state.total_staked -= amount;
        Ok(())
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn account_count(&self) -> usize {
        self.memberships.len()
    }

    pub fn pools(&self) -> impl Iterator<Item = (PoolId, &PoolState)> + '_ {
        self.pools.iter().map(|(id, state)| (*id, state))
    }

    pub fn stakes(&self) -> impl Iterator<Item = (PoolId, AccountId, Amount)> + '_ {
        self.stakes
            .iter()
            .map(|((pool, account), amount)| (*pool, *account, *amount))
    }

    /// Conservation check: every pool total equals the sum of its stakes.
    /// Test and debug aid; mutations preserve this by construction.
    pub fn conservation_holds(&self) -> bool {
        let mut sums: BTreeMap<PoolId, Amount> = BTreeMap::new();
        for ((pool, _), amount) in &self.stakes {
            *sums.entry(*pool).or_insert(0) += amount;
        }
        self.pools
            .iter()
            .all(|(pool, state)| sums.get(pool).copied().unwrap_or(0) == state.total_staked)
    }
}
