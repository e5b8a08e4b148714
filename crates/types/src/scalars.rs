//! Scalar aliases shared across the workspace.
//!
//! All quantities are integers. Amounts use `u128` so that intermediate
//! products with time deltas and weights stay representable; NO floating
//! point is allowed anywhere in accrual computation.

/// Epoch number, 1-indexed from the program start (0 means "before start").
pub type EpochId = u64;

/// Wall-clock timestamp in microseconds.
pub type Timestamp = u64;

/// Token amount in the smallest custody unit.
pub type Amount = u128;

/// Fixed-point value scaled by [`crate::fixed_point::FP_SCALE`].
pub type FixedPoint = u128;

/// Time integral of staked amount (amount × microseconds).
pub type StakeUnits = u128;

/// Allocation weight numerator (parts of the allocation denominator).
pub type Weight = u64;

/// Sequential allocation policy version, starting at 1.
pub type VersionId = u32;
