//! Engine error taxonomy.
//!
//! Three classes of failure, all surfaced as [`EngineError`]:
//! - precondition violations (not started, horizon elapsed, insufficient
//!   stake, unauthorized, busy) fail the operation atomically with no state
//!   change;
//! - arithmetic overflow/underflow/precision loss, carried over from
//!   [`MathError`], likewise aborts the whole operation;
//! - internal-consistency violations ([`EngineError::CorruptEpochRecord`])
//!   signal a programming error and are never recovered.

use thiserror::Error;
use tidemill_types::{AccountId, Amount, EpochId, MathError, PoolId, Timestamp};

use crate::allocation::AllocationError;
use crate::config::ConfigError;
use crate::funding::FundingError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("program has not started (now {now}, starts at {start_time_us})")]
    NotStarted { now: Timestamp, start_time_us: Timestamp },

    #[error("program horizon has elapsed (current epoch {current_epoch}, horizon {horizon})")]
    ProgramOver {
        current_epoch: EpochId,
        horizon: EpochId,
    },

    #[error("unknown pool {pool}")]
    UnknownPool { pool: PoolId },

    #[error("amount must be nonzero for {op}")]
    ZeroAmount { op: &'static str },

    #[error("insufficient stake in {pool}: have {available}, need {requested}")]
    InsufficientStake {
        pool: PoolId,
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("caller {caller} is not the configured authority")]
    Unauthorized { caller: AccountId },

    #[error("allocation policy has never been set")]
    NoAllocationPolicy,

    #[error("another operation is in progress")]
    Busy,

    #[error("custody failure: {reason}")]
    Custody { reason: String },

    #[error("yield source failure: {reason}")]
    YieldSource { reason: String },

    /// Fatal: an epoch record violates an invariant that settlement relies
    /// on. Callers must treat the program state as unrecoverable.
    #[error("corrupt epoch record for {pool} epoch {epoch}: {detail}")]
    CorruptEpochRecord {
        pool: PoolId,
        epoch: EpochId,
        detail: &'static str,
    },

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Funding(#[from] FundingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type EngineResult<T> = Result<T, EngineError>;
