//! Tidemill shared types.
//!
//! Deterministic primitives used by the accrual engine: scalar aliases,
//! fixed-point math, the epoch clock, and identifier derivation. Everything
//! here is pure and side-effect free.

pub mod epoch;
pub mod fixed_point;
pub mod ids;
pub mod scalars;

pub use epoch::*;
pub use fixed_point::*;
pub use ids::*;
pub use scalars::*;
