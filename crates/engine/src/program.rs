//! The incentive program façade: owns all accrual state plus the injected
//! collaborators and exposes the public operations.
//!
//! Every mutating entry point follows the same shape:
//! 1. take the non-reentrancy guard (reject with [`EngineError::Busy`] if a
//!    mutating operation is already on the stack);
//! 2. check preconditions;
//! 3. settle the caller's pending rewards and yield against *pre-mutation*
//!    stake, collecting custody transfers into one batch;
//! 4. apply the mutation on a scratch copy of the state;
//! 5. submit the batch, then commit the scratch.
//!
//! Because the batch is all-or-nothing and the scratch only replaces the
//! live state after the batch succeeds, a failure at any step leaves every
//! balance, index, and ledger exactly as before the call.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tidemill_types::fixed_point::add_u128;
use tidemill_types::{
    reward_vault_account_id, AccountId, Amount, AssetId, EpochClock, EpochId, FixedPoint, PoolId,
    Timestamp, VersionId,
};
use tracing::info;

use crate::accrual::RewardBook;
use crate::allocation::{AllocationBook, PolicyVersion, PoolWeight};
use crate::config::EngineConfig;
use crate::custody::{SharedCustody, TransferIntent};
use crate::error::{EngineError, EngineResult};
use crate::funding::FundingSchedule;
use crate::interest::YieldBook;
use crate::ledger::StakeLedger;
use crate::market::MarketDirectory;
use crate::yield_source::YieldSource;

/// All mutable program state, cloned per operation and committed on
/// success.
#[derive(Debug, Clone, Default)]
struct ProgramState {
    ledger: StakeLedger,
    allocations: AllocationBook,
    funding: FundingSchedule,
    rewards: RewardBook,
    yields: YieldBook,
}

/// What a claim paid and what is still vesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// Matured vested rewards paid out now, in the reward asset.
    pub rewards_paid: Amount,
    /// Yield interest paid out now, in the yield asset.
    pub yield_paid: Amount,
    /// Amounts already scheduled for the next `N - 1` epochs; forecast
    /// only, nothing is paid.
    pub vesting_forecast: Vec<(EpochId, Amount)>,
}

/// Read-only view of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOverview {
    pub pool: PoolId,
    pub holder: AccountId,
    pub position_asset: AssetId,
    pub total_staked: Amount,
    pub yield_index: FixedPoint,
    pub last_yield_snapshot: Amount,
}

/// Program-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStatistics {
    pub pools: usize,
    pub accounts: usize,
    pub total_staked: Amount,
    pub horizon: EpochId,
    pub allocation_versions: usize,
}

/// Full serde export of the persisted state, flattened into entry lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub config: EngineConfig,
    pub pools: Vec<PoolOverview>,
    pub stakes: Vec<StakeSnapshot>,
    pub epoch_records: Vec<EpochRecordSnapshot>,
    pub vesting: Vec<VestingSnapshot>,
    pub allocation_versions: Vec<PolicyVersion>,
    pub allocation_stamps: Vec<StampSnapshot>,
    pub funding: FundingSchedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSnapshot {
    pub pool: PoolId,
    pub account: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRecordSnapshot {
    pub pool: PoolId,
    pub epoch: EpochId,
    pub stake_units: u128,
    pub last_updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSnapshot {
    pub account: AccountId,
    pub unlock_epoch: EpochId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampSnapshot {
    pub epoch: EpochId,
    pub version: VersionId,
}

/// RAII clear for the non-reentrancy flag.
struct OpGuard<'a>(&'a AtomicBool);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The engine façade.
pub struct IncentiveProgram {
    config: EngineConfig,
    clock: EpochClock,
    custody: SharedCustody,
    market: Box<dyn MarketDirectory>,
    yield_source: Mutex<Box<dyn YieldSource>>,
    processing: AtomicBool,
    state: RwLock<ProgramState>,
}

impl IncentiveProgram {
    pub fn new(
        config: EngineConfig,
        custody: SharedCustody,
        market: Box<dyn MarketDirectory>,
        yield_source: Box<dyn YieldSource>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            clock: config.clock(),
            config,
            custody,
            market,
            yield_source: Mutex::new(yield_source),
            processing: AtomicBool::new(false),
            state: RwLock::new(ProgramState::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The vault holding funded but unclaimed reward budget.
    pub fn reward_vault(&self) -> AccountId {
        reward_vault_account_id()
    }

    pub fn current_epoch(&self, now: Timestamp) -> EpochId {
        self.clock.epoch_of(now)
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Deposit `amount` of the pool's position token.
    pub fn stake(
        &self,
        caller: AccountId,
        pool: PoolId,
        amount: Amount,
        now: Timestamp,
    ) -> EngineResult<()> {
        let _op = self.begin_op()?;
        if amount == 0 {
            return Err(EngineError::ZeroAmount { op: "stake" });
        }
        let epoch = self.clock.epoch_of(now);
        if epoch == 0 {
            return Err(EngineError::NotStarted {
                now,
                start_time_us: self.config.start_time_us,
            });
        }
        let entry = self
            .market
            .lookup(pool)
            .ok_or(EngineError::UnknownPool { pool })?;

        let mut state = self.state.write();
        let horizon = state.funding.horizon();
        if epoch > horizon {
            return Err(EngineError::ProgramOver {
                current_epoch: epoch,
                horizon,
            });
        }

        let mut scratch = state.clone();
        let mut batch = Vec::new();

        let (pool_state, created) = scratch.ledger.provision_pool(pool, entry);
        if created {
            self.yield_source
                .lock()
                .on_pool_provisioned(pool, pool_state.holder)
                .map_err(|e| EngineError::YieldSource {
                    reason: e.to_string(),
                })?;
        }

        self.settle_pool(&mut scratch, &mut batch, pool, caller, now)?;
        let matured = scratch.rewards.sweep_matured(caller, epoch)?;
        if matured > 0 {
            batch.push(TransferIntent {
                asset: self.config.reward_asset,
                from: reward_vault_account_id(),
                to: caller,
                amount: matured,
            });
        }

        batch.push(TransferIntent {
            asset: pool_state.position_asset,
            from: caller,
            to: pool_state.holder,
            amount,
        });
        scratch.ledger.increase(pool, caller, amount)?;

        self.apply_batch(&batch)?;
        *state = scratch;
        info!(%caller, %pool, amount, epoch, "stake applied");
        Ok(())
    }

    /// Withdraw `amount` of staked position tokens. Works after the
    /// horizon has elapsed; stakes are never trapped.
    pub fn withdraw(
        &self,
        caller: AccountId,
        pool: PoolId,
        amount: Amount,
        now: Timestamp,
    ) -> EngineResult<()> {
        let _op = self.begin_op()?;
        if amount == 0 {
            return Err(EngineError::ZeroAmount { op: "withdraw" });
        }
        let mut state = self.state.write();
        let pool_state = *state
            .ledger
            .pool(pool)
            .ok_or(EngineError::UnknownPool { pool })?;
        let available = state.ledger.stake_of(pool, caller);
        if available < amount {
            return Err(EngineError::InsufficientStake {
                pool,
                account: caller,
                available,
                requested: amount,
            });
        }

        let mut scratch = state.clone();
        let mut batch = Vec::new();
        let epoch = self.clock.epoch_of(now);

        self.settle_pool(&mut scratch, &mut batch, pool, caller, now)?;
        let matured = scratch.rewards.sweep_matured(caller, epoch)?;
        if matured > 0 {
            batch.push(TransferIntent {
                asset: self.config.reward_asset,
                from: reward_vault_account_id(),
                to: caller,
                amount: matured,
            });
        }

        batch.push(TransferIntent {
            asset: pool_state.position_asset,
            from: pool_state.holder,
            to: caller,
            amount,
        });
        scratch.ledger.decrease(pool, caller, amount)?;

        self.apply_batch(&batch)?;
        *state = scratch;
        info!(%caller, %pool, amount, epoch, "withdrawal applied");
        Ok(())
    }

    /// Settle every pool the caller has ever staked in, pay matured vested
    /// rewards and realized yield interest, and report what is still
    /// vesting.
    pub fn claim_rewards(&self, caller: AccountId, now: Timestamp) -> EngineResult<ClaimOutcome> {
        let _op = self.begin_op()?;
        let mut state = self.state.write();
        let mut scratch = state.clone();
        let mut batch = Vec::new();
        let epoch = self.clock.epoch_of(now);

        let mut yield_paid: Amount = 0;
        for pool in scratch.ledger.pools_of(caller) {
            let due = self.settle_pool(&mut scratch, &mut batch, pool, caller, now)?;
            yield_paid = add_u128(yield_paid, due)?;
        }

        let rewards_paid = scratch.rewards.sweep_matured(caller, epoch)?;
        if rewards_paid > 0 {
            batch.push(TransferIntent {
                asset: self.config.reward_asset,
                from: reward_vault_account_id(),
                to: caller,
                amount: rewards_paid,
            });
        }
        let vesting_forecast =
            scratch
                .rewards
                .vesting_forecast(caller, epoch, self.config.vesting_epochs);

        self.apply_batch(&batch)?;
        *state = scratch;
        info!(%caller, epoch, rewards_paid, yield_paid, "rewards claimed");
        Ok(ClaimOutcome {
            rewards_paid,
            yield_paid,
            vesting_forecast,
        })
    }

    /// Publish a new allocation version (authority only).
    pub fn set_allocation(
        &self,
        caller: AccountId,
        weights: Vec<PoolWeight>,
        now: Timestamp,
    ) -> EngineResult<VersionId> {
        let _op = self.begin_op()?;
        self.require_authority(caller)?;
        let mut state = self.state.write();
        let id = state.allocations.set_allocation(weights, &self.clock, now)?;
        Ok(id)
    }

    /// Extend the funding horizon by one budget per new epoch (authority
    /// only); the authority is debited for the total into the reward vault.
    pub fn add_funding(
        &self,
        caller: AccountId,
        amounts: &[Amount],
        now: Timestamp,
    ) -> EngineResult<()> {
        let _op = self.begin_op()?;
        self.require_authority(caller)?;
        let mut state = self.state.write();
        if !state.allocations.has_policy() {
            return Err(EngineError::NoAllocationPolicy);
        }
        let horizon = state.funding.horizon();
        let current_epoch = self.clock.epoch_of(now);
        if current_epoch > horizon {
            return Err(EngineError::ProgramOver {
                current_epoch,
                horizon,
            });
        }

        let mut schedule = state.funding.clone();
        let total = schedule.extend(amounts)?;
        if total > 0 {
            self.apply_batch(&[TransferIntent {
                asset: self.config.reward_asset,
                from: caller,
                to: reward_vault_account_id(),
                amount: total,
            }])?;
        }
        state.funding = schedule;
        info!(
            horizon = state.funding.horizon(),
            total, "funding added"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Views (no settlement, no guard)
    // ---------------------------------------------------------------------

    pub fn stake_of(&self, pool: PoolId, account: AccountId) -> Amount {
        self.state.read().ledger.stake_of(pool, account)
    }

    pub fn pool_overview(&self, pool: PoolId) -> Option<PoolOverview> {
        let state = self.state.read();
        let pool_state = state.ledger.pool(pool)?;
        let yield_state = state.yields.pool_yield(pool);
        Some(PoolOverview {
            pool,
            holder: pool_state.holder,
            position_asset: pool_state.position_asset,
            total_staked: pool_state.total_staked,
            yield_index: yield_state.index,
            last_yield_snapshot: yield_state.last_snapshot,
        })
    }

    pub fn statistics(&self) -> ProgramStatistics {
        let state = self.state.read();
        ProgramStatistics {
            pools: state.ledger.pool_count(),
            accounts: state.ledger.account_count(),
            total_staked: state
                .ledger
                .pools()
                .map(|(_, p)| p.total_staked)
                .sum(),
            horizon: state.funding.horizon(),
            allocation_versions: state.allocations.version_count(),
        }
    }

    /// The account's vesting ledger as-is: (unlock epoch, amount).
    pub fn vesting_schedule(&self, account: AccountId) -> Vec<(EpochId, Amount)> {
        self.state.read().rewards.vesting_schedule(account)
    }

    pub fn snapshot(&self) -> ProgramSnapshot {
        let state = self.state.read();
        let pools = state
            .ledger
            .pools()
            .map(|(pool, p)| {
                let y = state.yields.pool_yield(pool);
                PoolOverview {
                    pool,
                    holder: p.holder,
                    position_asset: p.position_asset,
                    total_staked: p.total_staked,
                    yield_index: y.index,
                    last_yield_snapshot: y.last_snapshot,
                }
            })
            .collect();
        let stakes = state
            .ledger
            .stakes()
            .map(|(pool, account, amount)| StakeSnapshot {
                pool,
                account,
                amount,
            })
            .collect();
        let epoch_records = state
            .rewards
            .epoch_records()
            .map(|(pool, epoch, r)| EpochRecordSnapshot {
                pool,
                epoch,
                stake_units: r.stake_units,
                last_updated_at: r.last_updated_at,
            })
            .collect();
        let vesting = state
            .rewards
            .vesting_entries()
            .map(|(account, unlock_epoch, amount)| VestingSnapshot {
                account,
                unlock_epoch,
                amount,
            })
            .collect();
        let allocation_stamps = state
            .allocations
            .stamps()
            .map(|(epoch, version)| StampSnapshot { epoch, version })
            .collect();
        ProgramSnapshot {
            config: self.config,
            pools,
            stakes,
            epoch_records,
            vesting,
            allocation_versions: state.allocations.versions().to_vec(),
            allocation_stamps,
            funding: state.funding.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn begin_op(&self) -> EngineResult<OpGuard<'_>> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::Busy);
        }
        Ok(OpGuard(&self.processing))
    }

    fn require_authority(&self, caller: AccountId) -> EngineResult<()> {
        if caller != self.config.authority {
            return Err(EngineError::Unauthorized { caller });
        }
        Ok(())
    }

    /// Both settlement passes plus yield for one (pool, account) pair,
    /// against pre-mutation stake. Queues the yield payout and returns it.
    fn settle_pool(
        &self,
        state: &mut ProgramState,
        batch: &mut Vec<TransferIntent>,
        pool: PoolId,
        account: AccountId,
        now: Timestamp,
    ) -> EngineResult<Amount> {
        let Some(pool_state) = state.ledger.pool(pool).copied() else {
            return Ok(0);
        };
        let total = pool_state.total_staked;
        let horizon = state.funding.horizon();

        state
            .rewards
            .backfill_pool(&self.clock, pool, total, horizon, now)?;
        let stake = state.ledger.stake_of(pool, account);
        state.rewards.settle_account(
            &self.clock,
            &mut state.allocations,
            &state.funding,
            self.config.vesting_epochs,
            pool,
            account,
            stake,
            now,
        )?;

        let mut source = self.yield_source.lock();
        let due = state.yields.settle_yield(
            source.as_mut(),
            pool,
            pool_state.holder,
            account,
            stake,
            total,
            self.config.yield_drift_bps,
        )?;
        if due > 0 {
            batch.push(TransferIntent {
                asset: source.yield_asset(),
                from: pool_state.holder,
                to: account,
                amount: due,
            });
        }
        Ok(due)
    }

    fn apply_batch(&self, batch: &[TransferIntent]) -> EngineResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.custody
            .lock()
            .apply(batch)
            .map_err(|e| EngineError::Custody {
                reason: e.to_string(),
            })
    }
}
