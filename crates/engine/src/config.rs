//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidemill_types::{AccountId, AssetId, EpochClock, FixedPoint, Timestamp, DEFAULT_POW_PRECISION};

/// Upper bound for the yield drift threshold (100% in basis points).
pub const MAX_DRIFT_BPS: u32 = 10_000;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("epoch duration must be nonzero")]
    ZeroEpochDuration,

    #[error("vesting window must cover at least one epoch")]
    ZeroVestingWindow,

    #[error("yield drift threshold {bps} bps exceeds {MAX_DRIFT_BPS}")]
    DriftThresholdTooLarge { bps: u32 },

    #[error("power series precision must be nonzero")]
    ZeroPowPrecision,
}

/// Static parameters of one program deployment, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timestamp at which epoch 1 begins (microseconds).
    pub start_time_us: Timestamp,
    /// Width of every epoch (microseconds).
    pub epoch_duration_us: u64,
    /// Number of future epochs a matured reward share vests over (N >= 1).
    pub vesting_epochs: u32,
    /// Asset the funding schedule is denominated in and rewards pay out in.
    pub reward_asset: AssetId,
    /// Sole account allowed to call `set_allocation` / `add_funding`.
    pub authority: AccountId,
    /// Relative drift (basis points) of the observed yield balance that
    /// triggers an index recompute. 0 recomputes on every settlement.
    pub yield_drift_bps: u32,
    /// Termination threshold for the fractional-power series; handed to
    /// yield sources that compound growth.
    pub pow_precision: FixedPoint,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_time_us: 0,
            // Weekly epochs
            epoch_duration_us: 7 * 24 * 60 * 60 * 1_000_000,
            vesting_epochs: 4,
            reward_asset: AssetId::default(),
            authority: AccountId::default(),
            // 1% relative drift before the yield index is recomputed
            yield_drift_bps: 100,
            pow_precision: DEFAULT_POW_PRECISION,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_duration_us == 0 {
            return Err(ConfigError::ZeroEpochDuration);
        }
        if self.vesting_epochs == 0 {
            return Err(ConfigError::ZeroVestingWindow);
        }
        if self.yield_drift_bps > MAX_DRIFT_BPS {
            return Err(ConfigError::DriftThresholdTooLarge {
                bps: self.yield_drift_bps,
            });
        }
        if self.pow_precision == 0 {
            return Err(ConfigError::ZeroPowPrecision);
        }
        Ok(())
    }

    /// Epoch clock anchored at this deployment's start time.
    pub const fn clock(&self) -> EpochClock {
        EpochClock::new(self.start_time_us, self.epoch_duration_us)
    }
}
