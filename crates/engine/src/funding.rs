//! Append-only reward funding schedule.
//!
//! Each entry is the total reward budget for one epoch; the schedule length
//! is the program's epoch horizon. Extending appends budgets for new epochs
//! past the horizon and is the only way the horizon grows; it never
//! shrinks. Preconditions on *when* funding may be added (policy exists,
//! horizon not elapsed) live in the façade, which also debits the funder.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidemill_types::{Amount, EpochId};
use tracing::info;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FundingError {
    #[error("funding must cover at least one epoch")]
    EmptyFunding,

    #[error("funding total overflows")]
    TotalOverflow,
}

/// Per-epoch reward budgets, index 0 holding epoch 1's budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingSchedule {
    budgets: Vec<Amount>,
}

impl FundingSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last funded epoch; 0 before any funding.
    pub fn horizon(&self) -> EpochId {
        self.budgets.len() as EpochId
    }

    /// Budget of `epoch`, defined for `1 ..= horizon`.
    pub fn budget_of(&self, epoch: EpochId) -> Option<Amount> {
        if epoch == 0 {
            return None;
        }
        self.budgets.get(epoch as usize - 1).copied()
    }

    /// Append one budget per new epoch and return the checked total the
    /// funder owes.
    pub fn extend(&mut self, amounts: &[Amount]) -> Result<Amount, FundingError> {
        if amounts.is_empty() {
            return Err(FundingError::EmptyFunding);
        }
        let mut total: Amount = 0;
        for amount in amounts {
            total = total
                .checked_add(*amount)
                .ok_or(FundingError::TotalOverflow)?;
        }
        let first_new = self.horizon() + 1;
        self.budgets.extend_from_slice(amounts);
        info!(
            first_epoch = first_new,
            horizon = self.horizon(),
            total,
            "funding schedule extended"
        );
        Ok(total)
    }
}
