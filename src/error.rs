//! Engine error taxonomy.
//!
//! Configuration errors surface before a run ever starts; everything that
//! can go wrong inside a running simulation is captured on the result
//! instead (see `RunStatus::Failed`).

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that prevent a simulation from starting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Strategy kind not present in the factory
    #[error("Unknown strategy kind: {0}")]
    UnknownStrategy(String),

    /// No assets to trade
    #[error("Asset universe is empty")]
    EmptyUniverse,

    /// Price table has no dates inside the simulation window
    #[error("No price data between {start} and {end}")]
    NoPriceData { start: NaiveDate, end: NaiveDate },

    /// Parameter validation failure
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Tests
// ============================================================================
