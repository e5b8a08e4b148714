//! Epoch numbering over fixed-width time windows.
//!
//! Epochs are 1-indexed, contiguous, and anchored at a configurable start
//! time: epoch 1 covers `[start, start + duration)`, epoch n covers
//! `[start + (n-1)·duration, start + n·duration)`. Timestamps before the
//! start map to epoch 0, which is never a valid accrual epoch.

use serde::{Deserialize, Serialize};

use crate::scalars::{EpochId, Timestamp};

/// Pure epoch arithmetic for one program deployment.
///
/// `epoch_duration_us` must be nonzero; construction sites validate this
/// before the clock is ever queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    /// Timestamp at which epoch 1 begins (microseconds).
    pub start_time_us: Timestamp,
    /// Width of every epoch (microseconds).
    pub epoch_duration_us: u64,
}

impl EpochClock {
    pub const fn new(start_time_us: Timestamp, epoch_duration_us: u64) -> Self {
        Self {
            start_time_us,
            epoch_duration_us,
        }
    }

    /// Epoch containing `t_us`: 0 before the start, else
    /// `1 + (t_us - start) / duration`.
    #[inline]
    pub const fn epoch_of(&self, t_us: Timestamp) -> EpochId {
        if t_us < self.start_time_us {
            return 0;
        }
        1 + (t_us - self.start_time_us) / self.epoch_duration_us
    }

    /// Start timestamp of `epoch` (inclusive). Meaningful for `epoch >= 1`.
    #[inline]
    pub const fn epoch_start_us(&self, epoch: EpochId) -> Timestamp {
        self.start_time_us
            .saturating_add(epoch.saturating_sub(1).saturating_mul(self.epoch_duration_us))
    }

    /// End timestamp of `epoch` (exclusive). Meaningful for `epoch >= 1`.
    #[inline]
    pub const fn epoch_end_us(&self, epoch: EpochId) -> Timestamp {
        self.start_time_us
            .saturating_add(epoch.saturating_mul(self.epoch_duration_us))
    }

    /// True once `t_us` has reached the start of epoch 1.
    #[inline]
    pub const fn has_started(&self, t_us: Timestamp) -> bool {
        t_us >= self.start_time_us
    }
}
