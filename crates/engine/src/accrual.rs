//! Reward accrual: lazy per-epoch stake-time integrals, pro-rata reward
//! credit, and the linear vesting ledger.
//!
//! Nothing here ticks on its own. Elapsed time is caught up by two passes
//! that every mutation runs, in order, against pre-mutation stake:
//!
//! 1. [`RewardBook::backfill_pool`] walks epochs backward from the current
//!    one and closes every record left open since the pool's last activity,
//!    adding `total_staked × elapsed` per record. It stops at the first
//!    record already closed — everything below is exact and immutable.
//! 2. [`RewardBook::settle_account`] walks the account's own epochs forward
//!    from its last change, accumulates the account's stake-time integral
//!    with the interval-intersection rule, and for every epoch that is now
//!    closed credits the account's budget share across the vesting window.
//!
//! A closed epoch is never revisited for the same account: settlement
//! advances `last_stake_change_at` to `now`, so each (account, epoch) pair
//! is credited exactly once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tidemill_types::fixed_point::{add_u128, mul_div_u128};
use tidemill_types::{
    AccountId, Amount, EpochClock, EpochId, MathError, PoolId, StakeUnits, Timestamp,
};
use tracing::{debug, warn};

use crate::allocation::{AllocationBook, ALLOCATION_DENOM};
use crate::error::{EngineError, EngineResult};
use crate::funding::FundingSchedule;

/// Pool-level epoch record: the area under the total-stake curve so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// ∫ total_staked dt over the epoch, accurate up to `last_updated_at`.
    pub stake_units: StakeUnits,
    /// High-water mark; once it reaches the epoch end the record is closed
    /// and immutable.
    pub last_updated_at: Timestamp,
}

impl EpochRecord {
    fn closed(&self, epoch_end: Timestamp) -> bool {
        self.last_updated_at >= epoch_end
    }
}

/// `amount × dt` in stake-units, failing on overflow.
fn stake_time(amount: Amount, dt: u64) -> Result<StakeUnits, MathError> {
    amount
        .checked_mul(dt as u128)
        .ok_or(MathError::Overflow { op: "stake_time" })
}

/// All reward accrual state: pool epoch records, per-account epoch
/// integrals, per-account change marks, and the vesting ledger.
#[derive(Debug, Clone, Default)]
pub struct RewardBook {
    epochs: BTreeMap<(PoolId, EpochId), EpochRecord>,
    account_units: BTreeMap<(PoolId, EpochId, AccountId), StakeUnits>,
    last_change: BTreeMap<(PoolId, AccountId), Timestamp>,
    vesting: BTreeMap<AccountId, BTreeMap<EpochId, Amount>>,
}

impl RewardBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch_record(&self, pool: PoolId, epoch: EpochId) -> Option<&EpochRecord> {
        self.epochs.get(&(pool, epoch))
    }

    pub fn account_units(&self, pool: PoolId, epoch: EpochId, account: AccountId) -> StakeUnits {
        self.account_units
            .get(&(pool, epoch, account))
            .copied()
            .unwrap_or(0)
    }

    pub fn last_change(&self, pool: PoolId, account: AccountId) -> Option<Timestamp> {
        self.last_change.get(&(pool, account)).copied()
    }

    /// The account's vesting ledger as-is: (unlock epoch, amount).
    pub fn vesting_schedule(&self, account: AccountId) -> Vec<(EpochId, Amount)> {
        self.vesting
            .get(&account)
            .map(|ledger| ledger.iter().map(|(e, a)| (*e, *a)).collect())
            .unwrap_or_default()
    }

    pub fn epoch_records(&self) -> impl Iterator<Item = (PoolId, EpochId, &EpochRecord)> + '_ {
        self.epochs.iter().map(|((p, e), r)| (*p, *e, r))
    }

    pub fn vesting_entries(&self) -> impl Iterator<Item = (AccountId, EpochId, Amount)> + '_ {
        self.vesting.iter().flat_map(|(account, ledger)| {
            ledger
                .iter()
                .map(move |(epoch, amount)| (*account, *epoch, *amount))
        })
    }

    /// Pool-level lazy backfill (pass one).
    ///
    /// Walks epochs backward from `min(epoch_of(now), horizon)` and, for
    /// every record not yet closed, adds `total_staked × elapsed` and
    /// advances the high-water mark to `min(now, epoch_end)`. Records are
    /// created lazily with the mark at the epoch start, so a gap of idle
    /// epochs closes with one multiply each. The early break on the first
    /// closed record is an optimization: every record below it already
    /// closed in an earlier pass.
    pub fn backfill_pool(
        &mut self,
        clock: &EpochClock,
        pool: PoolId,
        total_staked: Amount,
        horizon: EpochId,
        now: Timestamp,
    ) -> EngineResult<()> {
        let cap = clock.epoch_of(now).min(horizon);
        for epoch in (1..=cap).rev() {
            let end = clock.epoch_end_us(epoch);
            let record = self
                .epochs
                .entry((pool, epoch))
                .or_insert_with(|| EpochRecord {
                    stake_units: 0,
                    last_updated_at: clock.epoch_start_us(epoch),
                });
            if record.closed(end) {
                break;
            }
            let upto = now.min(end);
            if upto > record.last_updated_at {
                let delta = stake_time(total_staked, upto - record.last_updated_at)?;
                record.stake_units = add_u128(record.stake_units, delta)?;
                record.last_updated_at = upto;
                debug!(
                    %pool,
                    epoch,
                    stake_units = record.stake_units,
                    "pool epoch backfilled"
                );
            }
        }
        Ok(())
    }

    /// Account-level settlement (pass two); requires `backfill_pool` to
    /// have run for the same `now` first.
    ///
    /// Accumulates the account's stake-time integral per epoch and, for
    /// every epoch that is now closed, credits
    /// `budget × weight/denom × account_units/pool_units` across the next
    /// `vesting_epochs` unlock slots. Advances the account's change mark to
    /// `now`, so re-running without elapsed time credits nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_account(
        &mut self,
        clock: &EpochClock,
        allocations: &mut AllocationBook,
        funding: &FundingSchedule,
        vesting_epochs: u32,
        pool: PoolId,
        account: AccountId,
        account_stake: Amount,
        now: Timestamp,
    ) -> EngineResult<()> {
        let Some(last) = self.last_change.get(&(pool, account)).copied() else {
            // First touch: nothing staked before now, nothing to settle.
            self.last_change.insert((pool, account), now);
            return Ok(());
        };
        if now < last {
            return Err(EngineError::CorruptEpochRecord {
                pool,
                epoch: clock.epoch_of(now),
                detail: "settlement time regressed below the account change mark",
            });
        }

        let current = clock.epoch_of(now);
        let cap = current.min(funding.horizon());
        let first = clock.epoch_of(last).max(1);

        for epoch in first..=cap {
            let e_start = clock.epoch_start_us(epoch);
            let e_end = clock.epoch_end_us(epoch);

            // The account's slice of this epoch since its last change.
            let lo = last.max(e_start);
            let hi = now.min(e_end);
            if hi > lo && account_stake > 0 {
                let delta = stake_time(account_stake, hi - lo)?;
                let units = self.account_units.entry((pool, epoch, account)).or_insert(0);
                *units = add_u128(*units, delta)?;
            }

            if epoch >= current {
                // Current epoch is still open; no reward until it closes.
                break;
            }

            let version = allocations
                .stamp(epoch)
                .ok_or(EngineError::NoAllocationPolicy)?;
            let account_units = self.account_units(pool, epoch, account);

            let record = self.epochs.get(&(pool, epoch)).ok_or({
                EngineError::CorruptEpochRecord {
                    pool,
                    epoch,
                    detail: "closed epoch has no pool record",
                }
            })?;
            // Closed records are immutable: backfill closed every active
            // epoch with its exact integral, so zero units here means the
            // pool spent the whole epoch empty.
            let pool_units = record.stake_units;
            if pool_units == 0 {
                if account_units > 0 {
                    return Err(EngineError::CorruptEpochRecord {
                        pool,
                        epoch,
                        detail: "zero pool stake-units with nonzero account units",
                    });
                }
                warn!(%pool, epoch, "empty pool epoch, rewards unattributed");
                continue;
            }

            if account_units == 0 {
                continue;
            }

            let budget = funding.budget_of(epoch).unwrap_or(0);
            let weight = allocations.weight_of(version, pool);
            let pool_reward = mul_div_u128(budget, weight as u128, ALLOCATION_DENOM as u128)?;
            let share = mul_div_u128(pool_reward, account_units, pool_units)?;
            if share == 0 {
                continue;
            }
            debug!(
                %pool,
                epoch,
                %account,
                version,
                share,
                "epoch reward credited to vesting"
            );
            self.credit_vesting(account, epoch, share, vesting_epochs)?;
        }

        self.last_change.insert((pool, account), now);
        Ok(())
    }

    /// Split `share` across the unlock slots `closed_epoch+1 ..
    /// closed_epoch+n`: each slot gets `share / n`, the remainder lands in
    /// the first slot so the pieces sum exactly to `share`.
    fn credit_vesting(
        &mut self,
        account: AccountId,
        closed_epoch: EpochId,
        share: Amount,
        n: u32,
    ) -> EngineResult<()> {
        let per_slot = share / n as u128;
        let remainder = share % n as u128;
        let ledger = self.vesting.entry(account).or_default();
        for k in 1..=n as u64 {
            let amount = if k == 1 { per_slot + remainder } else { per_slot };
            if amount == 0 {
                continue;
            }
            let slot = ledger.entry(closed_epoch + k).or_insert(0);
            *slot = add_u128(*slot, amount)?;
        }
        Ok(())
    }

    /// Remove and total every vesting entry that has matured (unlock epoch
    /// at or before `current_epoch`). The caller pays the total out.
    pub fn sweep_matured(
        &mut self,
        account: AccountId,
        current_epoch: EpochId,
    ) -> EngineResult<Amount> {
        let Some(ledger) = self.vesting.get_mut(&account) else {
            return Ok(0);
        };
        let future = ledger.split_off(&(current_epoch + 1));
        let matured = std::mem::replace(ledger, future);
        let mut total: Amount = 0;
        for amount in matured.values() {
            total = add_u128(total, *amount)?;
        }
        Ok(total)
    }

    /// Vesting amounts already scheduled for the next `n - 1` epochs after
    /// `current_epoch` (forecast only; nothing is paid).
    pub fn vesting_forecast(
        &self,
        account: AccountId,
        current_epoch: EpochId,
        n: u32,
    ) -> Vec<(EpochId, Amount)> {
        let ledger = self.vesting.get(&account);
        (1..n as u64)
            .map(|k| {
                let epoch = current_epoch + k;
                let amount = ledger
                    .and_then(|l| l.get(&epoch))
                    .copied()
                    .unwrap_or(0);
                (epoch, amount)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::PoolWeight;

    const START: u64 = 1_000_000;
    const DUR: u64 = 100_000;

    fn clock() -> EpochClock {
        EpochClock::new(START, DUR)
    }

    fn single_pool_setup(pool: PoolId, budget_epochs: &[Amount]) -> (AllocationBook, FundingSchedule) {
        let mut allocations = AllocationBook::new();
        allocations
            .set_allocation(
                vec![PoolWeight {
                    pool,
                    weight: ALLOCATION_DENOM,
                }],
                &clock(),
                0,
            )
            .unwrap();
        let mut funding = FundingSchedule::new();
        funding.extend(budget_epochs).unwrap();
        (allocations, funding)
    }

    fn settle(
        book: &mut RewardBook,
        allocations: &mut AllocationBook,
        funding: &FundingSchedule,
        pool: PoolId,
        account: AccountId,
        stake: Amount,
        total: Amount,
        now: Timestamp,
    ) {
        let c = clock();
        book.backfill_pool(&c, pool, total, funding.horizon(), now)
            .unwrap();
        book.settle_account(&c, allocations, funding, 2, pool, account, stake, now)
            .unwrap();
    }

    #[test]
    fn full_epoch_single_staker_gets_whole_budget_vested() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000, 1_000]);
        let mut book = RewardBook::new();

        // Stake 100 at the exact start of epoch 1
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);

        // Settle again just after epoch 1 closes
        let now = START + DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);

        let record = book.epoch_record(pool, 1).unwrap();
        assert_eq!(record.stake_units, 100 * DUR as u128);
        assert_eq!(book.account_units(pool, 1, alice), 100 * DUR as u128);

        // Full 1000 credited, split 500/500 over epochs 2 and 3
        assert_eq!(book.vesting_schedule(alice), vec![(2, 500), (3, 500)]);
    }

    #[test]
    fn two_stakers_split_pro_rata() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let bob = AccountId::from_seed("bob");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000]);
        let mut book = RewardBook::new();

        // Both stake at epoch start: 100 and 300
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        settle(&mut book, &mut allocations, &funding, pool, bob, 0, 100, START);

        let now = START + DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 400, now);
        settle(&mut book, &mut allocations, &funding, pool, bob, 300, 400, now);

        let alice_total: Amount = book
            .vesting_schedule(alice)
            .iter()
            .map(|(_, a)| a)
            .sum();
        let bob_total: Amount = book.vesting_schedule(bob).iter().map(|(_, a)| a).sum();
        assert_eq!(alice_total, 250);
        assert_eq!(bob_total, 750);
    }

    #[test]
    fn settling_twice_without_elapsed_time_credits_nothing() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000]);
        let mut book = RewardBook::new();

        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        let now = START + DUR + DUR / 2;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);
        let first = book.clone();

        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);
        assert_eq!(
            book.vesting_schedule(alice),
            first.vesting_schedule(alice)
        );
        assert_eq!(
            book.epoch_record(pool, 1),
            first.epoch_record(pool, 1)
        );
        assert_eq!(
            book.account_units(pool, 2, alice),
            first.account_units(pool, 2, alice)
        );
    }

    #[test]
    fn backfill_is_idempotent_for_unchanged_now() {
        let pool = PoolId(1);
        let (_, funding) = single_pool_setup(pool, &[1_000; 5]);
        let mut book = RewardBook::new();
        let c = clock();

        let now = START + 3 * DUR + 17;
        book.backfill_pool(&c, pool, 250, funding.horizon(), now)
            .unwrap();
        let snapshot: Vec<_> = book
            .epoch_records()
            .map(|(p, e, r)| (p, e, *r))
            .collect();
        book.backfill_pool(&c, pool, 250, funding.horizon(), now)
            .unwrap();
        let again: Vec<_> = book
            .epoch_records()
            .map(|(p, e, r)| (p, e, *r))
            .collect();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn idle_epochs_close_exactly_from_one_multiply() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[600, 600, 600, 600]);
        let mut book = RewardBook::new();

        // Stake at epoch 1 start, then nothing happens until epoch 4
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        let now = START + 3 * DUR + DUR / 4;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);

        for epoch in 1..=3 {
            let record = book.epoch_record(pool, epoch).unwrap();
            assert_eq!(record.stake_units, 100 * DUR as u128, "epoch {epoch}");
            assert_eq!(record.last_updated_at, clock().epoch_end_us(epoch));
        }
        // 600 per closed epoch, vesting N=2: epoch e unlocks at e+1, e+2
        assert_eq!(
            book.vesting_schedule(alice),
            vec![(2, 300), (3, 600), (4, 600), (5, 300)]
        );
    }

    #[test]
    fn mid_epoch_stake_change_weights_by_time() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000]);
        let mut book = RewardBook::new();

        // Stake 100 at epoch start, bump to 300 at mid-epoch
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        let mid = START + DUR / 2;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, mid);

        let now = START + DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 300, 300, now);

        let want = 100 * (DUR / 2) as u128 + 300 * (DUR / 2) as u128;
        assert_eq!(book.epoch_record(pool, 1).unwrap().stake_units, want);
        assert_eq!(book.account_units(pool, 1, alice), want);
        // Sole staker still collects the whole budget
        let total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn empty_pool_epochs_leave_rewards_unattributed() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000, 1_000]);
        let mut book = RewardBook::new();

        // Alice only appears in epoch 3; epochs 1 and 2 stay empty
        let late = START + 2 * DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, late);
        let now = START + 3 * DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);

        // Epoch 3's budget vests; epochs 1 and 2 credit no one
        let total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn empty_gap_epochs_keep_their_closed_records_exact() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let bob = AccountId::from_seed("bob");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000; 6]);
        let mut book = RewardBook::new();

        // Alice stakes through epoch 1 and exits at its close
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, START + DUR);

        // The pool sits empty through epochs 2-4; bob arrives in epoch 5
        let e5 = START + 4 * DUR;
        settle(&mut book, &mut allocations, &funding, pool, bob, 0, 0, e5);

        // Epoch 5 closes with bob's stake; alice settles afterwards while
        // the pool is active again
        let now = START + 5 * DUR;
        settle(&mut book, &mut allocations, &funding, pool, bob, 100, 100, now);
        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 100, now);

        // The empty epochs' closed records stay exactly zero
        for epoch in 2..=4 {
            let record = book.epoch_record(pool, epoch).unwrap();
            assert_eq!(record.stake_units, 0, "epoch {epoch}");
        }
        // And their budgets credited no one
        let alice_total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        let bob_total: Amount = book.vesting_schedule(bob).iter().map(|(_, a)| a).sum();
        assert_eq!(alice_total, 1_000); // epoch 1 only
        assert_eq!(bob_total, 1_000); // epoch 5 only
    }

    #[test]
    fn vesting_split_is_exact_with_remainder_up_front() {
        let alice = AccountId::from_seed("alice");
        let mut book = RewardBook::new();
        book.credit_vesting(alice, 10, 1_001, 3).unwrap();
        assert_eq!(
            book.vesting_schedule(alice),
            vec![(11, 335), (12, 333), (13, 333)]
        );
        let total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        assert_eq!(total, 1_001);
    }

    #[test]
    fn sweep_takes_matured_and_keeps_future() {
        let alice = AccountId::from_seed("alice");
        let mut book = RewardBook::new();
        book.credit_vesting(alice, 1, 900, 3).unwrap(); // unlocks 2, 3, 4

        assert_eq!(book.sweep_matured(alice, 3).unwrap(), 600);
        assert_eq!(book.vesting_schedule(alice), vec![(4, 300)]);
        // Second sweep at the same epoch finds nothing new
        assert_eq!(book.sweep_matured(alice, 3).unwrap(), 0);
        assert_eq!(book.sweep_matured(alice, 4).unwrap(), 300);
        assert!(book.vesting_schedule(alice).is_empty());
    }

    #[test]
    fn forecast_reports_future_slots_without_paying() {
        let alice = AccountId::from_seed("alice");
        let mut book = RewardBook::new();
        book.credit_vesting(alice, 2, 800, 4).unwrap(); // unlocks 3..6

        let forecast = book.vesting_forecast(alice, 3, 4);
        assert_eq!(forecast, vec![(4, 200), (5, 200), (6, 200)]);
        // Ledger untouched
        assert_eq!(book.vesting_schedule(alice).len(), 4);
    }

    #[test]
    fn retroactive_policy_change_cannot_alter_closed_epochs() {
        let pool_a = PoolId(1);
        let pool_b = PoolId(2);
        let alice = AccountId::from_seed("alice");
        let c = clock();

        let mut allocations = AllocationBook::new();
        allocations
            .set_allocation(
                vec![PoolWeight {
                    pool: pool_a,
                    weight: ALLOCATION_DENOM,
                }],
                &c,
                0,
            )
            .unwrap();
        let mut funding = FundingSchedule::new();
        funding.extend(&[1_000; 4]).unwrap();
        let mut book = RewardBook::new();

        settle(&mut book, &mut allocations, &funding, pool_a, alice, 0, 0, START);

        // Epoch 1 closes and is settled (stamped v1, full budget to pool A)
        let after_e1 = START + DUR + 1;
        settle(&mut book, &mut allocations, &funding, pool_a, alice, 100, 100, after_e1);
        let credited_after_e1: Amount =
            book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        assert_eq!(credited_after_e1, 1_000);

        // Mid-epoch 2 the policy shifts half the budget to pool B,
        // effective from epoch 3
        allocations
            .set_allocation(
                vec![
                    PoolWeight {
                        pool: pool_a,
                        weight: ALLOCATION_DENOM / 2,
                    },
                    PoolWeight {
                        pool: pool_b,
                        weight: ALLOCATION_DENOM / 2,
                    },
                ],
                &c,
                after_e1,
            )
            .unwrap();

        // Epochs 2 (still v1) and 3 (v2) close
        let after_e3 = START + 3 * DUR + 1;
        settle(&mut book, &mut allocations, &funding, pool_a, alice, 100, 100, after_e3);

        let total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        // epoch 1: 1000 (v1), epoch 2: 1000 (v1, open when v2 landed),
        // epoch 3: 500 (v2)
        assert_eq!(total, 2_500);
        assert_eq!(allocations.stamp_for(1), Some(1));
        assert_eq!(allocations.stamp_for(2), Some(1));
        assert_eq!(allocations.stamp_for(3), Some(2));
    }

    #[test]
    fn settlement_stops_at_the_funding_horizon() {
        let pool = PoolId(1);
        let alice = AccountId::from_seed("alice");
        let (mut allocations, funding) = single_pool_setup(pool, &[1_000, 1_000]);
        let mut book = RewardBook::new();

        settle(&mut book, &mut allocations, &funding, pool, alice, 0, 0, START);
        // Far past the 2-epoch horizon: only epochs 1 and 2 pay
        let now = START + 10 * DUR;
        settle(&mut book, &mut allocations, &funding, pool, alice, 100, 100, now);

        let total: Amount = book.vesting_schedule(alice).iter().map(|(_, a)| a).sum();
        assert_eq!(total, 2_000);
        assert!(book.epoch_record(pool, 3).is_none());
    }
}
