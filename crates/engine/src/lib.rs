//! Tidemill accrual engine.
//!
//! Epoch-based staking with lazily computed time-weighted reward shares,
//! linear vesting over a fixed window of future epochs, and immediate
//! pro-rata yield interest. The engine keeps no clock of its own: every
//! public operation settles the caller's pending entitlements up to the
//! supplied `now` before mutating any stake, and the per-epoch accounting
//! is reconstructed exactly from sparse, event-triggered updates.
//!
//! Entry point: [`program::IncentiveProgram`]. Collaborators (custody,
//! market discovery, yield source) are injected as trait objects.

pub mod accrual;
pub mod allocation;
pub mod config;
pub mod custody;
pub mod error;
pub mod funding;
pub mod interest;
pub mod ledger;
pub mod market;
pub mod program;
pub mod yield_source;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use program::{ClaimOutcome, IncentiveProgram, PoolOverview, ProgramSnapshot};
