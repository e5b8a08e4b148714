//! Yield-source collaborator: the strategy that turns an external
//! yield-bearing position into numbers the engine can settle against.
//!
//! Implementations differ per lending protocol; the engine only ever asks
//! for the holder's current yield-bearing balance and for pending yield to
//! be realized into it. [`SimulatedYieldSource`] ships as a deterministic
//! compound-growth implementation; [`MockYieldSource`] scripts balances for
//! tests.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tidemill_types::{fixed_point, AccountId, Amount, AssetId, FixedPoint, PoolId, Timestamp, FP_SCALE};
use tracing::trace;

use crate::custody::{SharedCustody, TransferIntent};

/// Strategy interface for one yield-bearing asset class.
pub trait YieldSource: Send + Sync {
    /// Asset the yield is denominated in.
    fn yield_asset(&self) -> AssetId;

    /// Current realized yield-bearing balance held for `pool`'s holder.
    fn observed_balance(&mut self, pool: PoolId, holder: AccountId) -> Result<Amount>;

    /// Pull pending external yield into the holder's balance.
    fn realize(&mut self, pool: PoolId, holder: AccountId) -> Result<()>;

    /// Hook fired once when a pool's holder account is provisioned.
    fn on_pool_provisioned(&mut self, pool: PoolId, holder: AccountId) -> Result<()>;
}

/// Shared handles forward; lets a test keep scripting a source the engine
/// already owns.
impl<S: YieldSource> YieldSource for Arc<Mutex<S>> {
    fn yield_asset(&self) -> AssetId {
        self.lock().yield_asset()
    }

    fn observed_balance(&mut self, pool: PoolId, holder: AccountId) -> Result<Amount> {
        self.lock().observed_balance(pool, holder)
    }

    fn realize(&mut self, pool: PoolId, holder: AccountId) -> Result<()> {
        self.lock().realize(pool, holder)
    }

    fn on_pool_provisioned(&mut self, pool: PoolId, holder: AccountId) -> Result<()> {
        self.lock().on_pool_provisioned(pool, holder)
    }
}

#[derive(Debug)]
struct SimInner {
    now_us: Timestamp,
    anchors: HashMap<PoolId, Timestamp>,
}

/// Deterministic compound-growth source.
///
/// Realized yield lives in the custody ledger like any other balance: at
/// each `realize` the holder's balance grows by
/// `balance × (growth_factor ^ (elapsed / period)) - balance`, minted out
/// of a pre-funded faucet account. The exponent is fractional, so growth
/// compounds continuously and the configured series precision bounds the
/// approximation. Clones share state, so a test can keep one clone to
/// drive [`advance_to`](Self::advance_to) while the engine owns another.
#[derive(Clone)]
pub struct SimulatedYieldSource {
    asset: AssetId,
    /// Per-period growth as fixed-point (1.001 × FP_SCALE = +0.1%/period).
    growth_factor: FixedPoint,
    period_us: u64,
    /// Series termination threshold, from `EngineConfig::pow_precision`.
    pow_precision: FixedPoint,
    faucet: AccountId,
    custody: SharedCustody,
    inner: Arc<Mutex<SimInner>>,
}

impl SimulatedYieldSource {
    pub fn new(
        asset: AssetId,
        growth_factor: FixedPoint,
        period_us: u64,
        pow_precision: FixedPoint,
        faucet: AccountId,
        custody: SharedCustody,
    ) -> Self {
        Self {
            asset,
            growth_factor,
            period_us,
            pow_precision,
            faucet,
            custody,
            inner: Arc::new(Mutex::new(SimInner {
                now_us: 0,
                anchors: HashMap::new(),
            })),
        }
    }

    /// Move the source's clock forward; growth for the elapsed time accrues
    /// on the next `realize`.
    pub fn advance_to(&self, now_us: Timestamp) {
        let mut inner = self.inner.lock();
        if now_us > inner.now_us {
            inner.now_us = now_us;
        }
    }
}

impl YieldSource for SimulatedYieldSource {
    fn yield_asset(&self) -> AssetId {
        self.asset
    }

    fn observed_balance(&mut self, _pool: PoolId, holder: AccountId) -> Result<Amount> {
        Ok(self.custody.lock().balance_of(self.asset, holder))
    }

    fn realize(&mut self, pool: PoolId, holder: AccountId) -> Result<()> {
        let (elapsed, balance) = {
            let mut inner = self.inner.lock();
            let now = inner.now_us;
            let anchor = inner.anchors.entry(pool).or_insert(now);
            let elapsed = now.saturating_sub(*anchor);
            if elapsed == 0 {
                return Ok(());
            }
            *anchor = now;
            (elapsed, self.custody.lock().balance_of(self.asset, holder))
        };
        if balance == 0 {
            return Ok(());
        }

        // Fractional periods, so growth does not quantize to period edges
        let exp = fixed_point::mul_div_u128(elapsed as u128, FP_SCALE, self.period_us as u128)?;
        let factor = fixed_point::pow_with_precision(self.growth_factor, exp, self.pow_precision)?;
        let grown = fixed_point::mul_div_u128(balance, factor, FP_SCALE)?;
        let delta = grown.saturating_sub(balance);
        if delta == 0 {
            return Ok(());
        }
        trace!(%pool, %holder, elapsed, delta, "simulated yield realized");
        self.custody.lock().apply(&[TransferIntent {
            asset: self.asset,
            from: self.faucet,
            to: holder,
            amount: delta,
        }])
    }

    fn on_pool_provisioned(&mut self, pool: PoolId, _holder: AccountId) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = inner.now_us;
        inner.anchors.entry(pool).or_insert(now);
        Ok(())
    }
}

/// Scripted source for tests: balances are set directly, pending yield is
/// staged and only becomes visible after `realize`, and every call is
/// recorded.
#[derive(Debug, Clone, Default)]
pub struct MockYieldSource {
    asset: AssetId,
    balances: HashMap<PoolId, Amount>,
    pending: HashMap<PoolId, Amount>,
    realize_calls: Vec<PoolId>,
    provisioned: Vec<(PoolId, AccountId)>,
}

impl MockYieldSource {
    pub fn new(asset: AssetId) -> Self {
        Self {
            asset,
            ..Self::default()
        }
    }

    /// Overwrite the visible balance for a pool.
    pub fn set_balance(&mut self, pool: PoolId, amount: Amount) {
        self.balances.insert(pool, amount);
    }

    /// Stage yield that becomes visible on the next `realize`.
    pub fn add_pending(&mut self, pool: PoolId, amount: Amount) {
        *self.pending.entry(pool).or_insert(0) += amount;
    }

    pub fn realize_calls(&self) -> &[PoolId] {
        &self.realize_calls
    }

    pub fn provisioned(&self) -> &[(PoolId, AccountId)] {
        &self.provisioned
    }
}

impl YieldSource for MockYieldSource {
    fn yield_asset(&self) -> AssetId {
        self.asset
    }

    fn observed_balance(&mut self, pool: PoolId, _holder: AccountId) -> Result<Amount> {
        Ok(self.balances.get(&pool).copied().unwrap_or(0))
    }

    fn realize(&mut self, pool: PoolId, _holder: AccountId) -> Result<()> {
        self.realize_calls.push(pool);
        if let Some(pending) = self.pending.remove(&pool) {
            *self.balances.entry(pool).or_insert(0) += pending;
        }
        Ok(())
    }

    fn on_pool_provisioned(&mut self, pool: PoolId, holder: AccountId) -> Result<()> {
        self.provisioned.push((pool, holder));
        Ok(())
    }
}
