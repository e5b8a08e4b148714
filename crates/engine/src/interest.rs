//! Yield interest accrual: a cumulative per-pool yield-per-unit-stake
//! index and each account's claimable slice since its last settlement.
//!
//! The index only ever grows. It is recomputed from the holder's observed
//! yield-bearing balance, and the recompute is rate-limited: realizing
//! pending external yield is an expensive collaborator call, so it only
//! happens once the observed balance has drifted past a relative threshold
//! since the last snapshot (or unconditionally when the threshold is 0).
//! Interest is paid the moment it is computed; vesting applies to rewards
//! only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tidemill_types::fixed_point::{add_u128, mul_div_u128, sub_u128};
use tidemill_types::{AccountId, Amount, FixedPoint, PoolId, FP_SCALE};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::yield_source::YieldSource;

/// Relative drift denominator: thresholds are in basis points.
const BPS_DENOM: u128 = 10_000;

/// Per-pool yield accumulator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolYield {
    /// Observed yield-bearing balance at the last index recompute.
    pub last_snapshot: Amount,
    /// Cumulative yield per unit of stake, scaled by [`FP_SCALE`].
    /// Monotonically non-decreasing.
    pub index: FixedPoint,
}

/// All yield accrual state.
#[derive(Debug, Clone, Default)]
pub struct YieldBook {
    pools: BTreeMap<PoolId, PoolYield>,
    last_seen: BTreeMap<(PoolId, AccountId), FixedPoint>,
}

impl YieldBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_yield(&self, pool: PoolId) -> PoolYield {
        self.pools.get(&pool).copied().unwrap_or_default()
    }

    pub fn last_index_seen(&self, pool: PoolId, account: AccountId) -> Option<FixedPoint> {
        self.last_seen.get(&(pool, account)).copied()
    }

    /// Settle one account's yield interest in one pool.
    ///
    /// Returns the amount to pay from the pool holder to the account; the
    /// caller queues the custody transfer. The account's index mark always
    /// advances to the current index, even for a zero payout, so dust never
    /// re-accrues. The pool's own holder settles to nothing (self-yield is
    /// not claimable).
    #[allow(clippy::too_many_arguments)]
    pub fn settle_yield(
        &mut self,
        source: &mut dyn YieldSource,
        pool: PoolId,
        holder: AccountId,
        account: AccountId,
        account_stake: Amount,
        total_staked: Amount,
        drift_bps: u32,
    ) -> EngineResult<Amount> {
        if account == holder {
            return Ok(0);
        }

        self.refresh_index(source, pool, holder, total_staked, drift_bps)?;
        let current = self.pool_yield(pool).index;

        let Some(seen) = self.last_seen.get(&(pool, account)).copied() else {
            // First touch: mark the index, nothing accrued yet.
            self.last_seen.insert((pool, account), current);
            return Ok(0);
        };

        let gained = sub_u128(current, seen)?;
        let due = mul_div_u128(account_stake, gained, FP_SCALE)?;
        self.last_seen.insert((pool, account), current);

        if due > 0 {
            // The payout leaves the holder, so the snapshot must shrink
            // with it or the next drift check would read the payout as
            // negative yield.
            let state = self.pools.entry(pool).or_default();
            state.last_snapshot = sub_u128(state.last_snapshot, due)?;
            debug!(%pool, %account, due, "yield interest settled");
        }
        Ok(due)
    }

    /// Recompute the pool index from newly realized yield if the observed
    /// balance has drifted past `drift_bps` relative to the last snapshot.
    fn refresh_index(
        &mut self,
        source: &mut dyn YieldSource,
        pool: PoolId,
        holder: AccountId,
        total_staked: Amount,
        drift_bps: u32,
    ) -> EngineResult<()> {
        if total_staked == 0 {
            return Ok(());
        }
        let state = self.pools.entry(pool).or_default();

        let observed = source
            .observed_balance(pool, holder)
            .map_err(|e| EngineError::YieldSource {
                reason: e.to_string(),
            })?;
        if !drift_exceeded(state.last_snapshot, observed, drift_bps) {
            return Ok(());
        }

        source
            .realize(pool, holder)
            .map_err(|e| EngineError::YieldSource {
                reason: e.to_string(),
            })?;
        let realized = source
            .observed_balance(pool, holder)
            .map_err(|e| EngineError::YieldSource {
                reason: e.to_string(),
            })?;

        // A shrinking balance is a collaborator fault, not silently clamped.
        let gained = sub_u128(realized, state.last_snapshot)?;
        if gained > 0 {
            let delta = mul_div_u128(gained, FP_SCALE, total_staked)?;
            state.index = add_u128(state.index, delta)?;
            state.last_snapshot = realized;
            debug!(
                %pool,
                gained,
                index = state.index,
                "yield index recomputed"
            );
        }
        Ok(())
    }
}

/// True when `observed` has moved more than `drift_bps` away from
/// `snapshot`, relative to `snapshot`. A zero threshold always triggers; a
/// zero snapshot triggers on any nonzero observation.
fn drift_exceeded(snapshot: Amount, observed: Amount, drift_bps: u32) -> bool {
    if drift_bps == 0 {
        return true;
    }
    let diff = observed.abs_diff(snapshot);
    if diff == 0 {
        return false;
    }
    if snapshot == 0 {
        return true;
    }
    // diff / snapshot > drift_bps / 10_000, kept in integers
    diff.saturating_mul(BPS_DENOM) > snapshot.saturating_mul(drift_bps as u128)
}
