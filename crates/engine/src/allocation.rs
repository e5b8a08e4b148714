//! Versioned allocation policy: how the per-epoch reward budget splits
//! across pools.
//!
//! Weights are parts per billion and every version must partition the whole
//! budget. Versions never apply retroactively: publishing a new version
//! first stamps every still-open epoch with the version that was in force
//! while it was open, and the new weights only take effect from the epoch
//! after the current one. A stamped epoch keeps its version forever.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tidemill_types::{EpochClock, EpochId, PoolId, Timestamp, VersionId, Weight};
use tracing::{debug, info};

/// Weight denominator: weights are parts per billion.
pub const ALLOCATION_DENOM: Weight = 1_000_000_000;

/// Upper bound on pools per version; keeps the per-settlement weight scan
/// cheap.
pub const MAX_POOLS_PER_VERSION: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("allocation weights must name at least one pool")]
    EmptyWeights,

    #[error("pool {pool} appears more than once in the weight table")]
    DuplicatePool { pool: PoolId },

    #[error("weights sum to {sum}, must sum to {ALLOCATION_DENOM}")]
    WeightSumMismatch { sum: u128 },

    #[error("weight table names {count} pools, at most {MAX_POOLS_PER_VERSION} allowed")]
    TooManyPools { count: usize },

    #[error(
        "first allocation must be set before the program opens (now {now}, opens at {start_time_us})"
    )]
    FirstVersionAfterOpen { now: Timestamp, start_time_us: Timestamp },
}

/// One pool's share of the budget under a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolWeight {
    pub pool: PoolId,
    /// Numerator over [`ALLOCATION_DENOM`].
    pub weight: Weight,
}

/// One immutable policy version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVersion {
    /// Sequential id, starting at 1.
    pub id: VersionId,
    /// First epoch this version's weights apply to.
    pub first_epoch: EpochId,
    pub weights: Vec<PoolWeight>,
}

impl PolicyVersion {
    /// Weight of `pool` under this version; pools the version does not name
    /// get nothing.
    pub fn weight_of(&self, pool: PoolId) -> Weight {
        self.weights
            .iter()
            .find(|w| w.pool == pool)
            .map(|w| w.weight)
            .unwrap_or(0)
    }
}

/// The full version history plus the per-epoch version stamps.
#[derive(Debug, Clone, Default)]
pub struct AllocationBook {
    versions: Vec<PolicyVersion>,
    stamps: BTreeMap<EpochId, VersionId>,
}

impl AllocationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once at least one version exists.
    pub fn has_policy(&self) -> bool {
        !self.versions.is_empty()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn versions(&self) -> &[PolicyVersion] {
        &self.versions
    }

    pub fn stamps(&self) -> impl Iterator<Item = (EpochId, VersionId)> + '_ {
        self.stamps.iter().map(|(e, v)| (*e, *v))
    }

    /// Publish a new version.
    ///
    /// The very first version must land before the program opens; after
    /// that, publishing at any time stamps epochs `1..=current` with the
    /// versions that were in force while they were open (skipping epochs
    /// already stamped) and schedules the new weights from `current + 1`.
    pub fn set_allocation(
        &mut self,
        weights: Vec<PoolWeight>,
        clock: &EpochClock,
        now: Timestamp,
    ) -> Result<VersionId, AllocationError> {
        validate_weights(&weights)?;

        if self.versions.is_empty() {
            if clock.has_started(now) {
                return Err(AllocationError::FirstVersionAfterOpen {
                    now,
                    start_time_us: clock.start_time_us,
                });
            }
            self.versions.push(PolicyVersion {
                id: 1,
                first_epoch: 1,
                weights,
            });
            info!(version = 1, "initial allocation policy set");
            return Ok(1);
        }

        let current = clock.epoch_of(now);
        for epoch in 1..=current {
            self.stamp(epoch);
        }

        let id = self.versions.last().map(|v| v.id).unwrap_or(0) + 1;
        let first_epoch = current + 1;
        self.versions.push(PolicyVersion {
            id,
            first_epoch,
            weights,
        });
        info!(version = id, first_epoch, "allocation policy updated");
        Ok(id)
    }

    /// The version whose weights governed `epoch`: the latest version with
    /// `first_epoch <= epoch`. `None` only before any version exists.
    pub fn version_in_force(&self, epoch: EpochId) -> Option<VersionId> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.first_epoch <= epoch)
            .map(|v| v.id)
    }

    /// The permanent stamp of `epoch`, if it has one.
    pub fn stamp_for(&self, epoch: EpochId) -> Option<VersionId> {
        self.stamps.get(&epoch).copied()
    }

    /// Stamp `epoch` with its in-force version if it is not stamped yet,
    /// and return the stamped id. Stamps are write-once.
    pub fn stamp(&mut self, epoch: EpochId) -> Option<VersionId> {
        if let Some(id) = self.stamps.get(&epoch) {
            return Some(*id);
        }
        let id = self.version_in_force(epoch)?;
        self.stamps.insert(epoch, id);
        debug!(epoch, version = id, "epoch stamped with allocation version");
        Some(id)
    }

    /// Weight of `pool` under version `id`; unknown versions get nothing.
    pub fn weight_of(&self, id: VersionId, pool: PoolId) -> Weight {
        self.versions
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.weight_of(pool))
            .unwrap_or(0)
    }
}

fn validate_weights(weights: &[PoolWeight]) -> Result<(), AllocationError> {
    if weights.is_empty() {
        return Err(AllocationError::EmptyWeights);
    }
    if weights.len() > MAX_POOLS_PER_VERSION {
        return Err(AllocationError::TooManyPools {
            count: weights.len(),
        });
    }
    for (i, w) in weights.iter().enumerate() {
        if weights[..i].iter().any(|prev| prev.pool == w.pool) {
            return Err(AllocationError::DuplicatePool { pool: w.pool });
        }
    }
    let sum: u128 = weights.iter().map(|w| w.weight as u128).sum();
    if sum != ALLOCATION_DENOM as u128 {
        return Err(AllocationError::WeightSumMismatch { sum });
    }
    Ok(())
}
