//! Pool/market discovery collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tidemill_types::{AccountId, AssetId, PoolId};

/// What the discovery layer knows about one expiry pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    /// Position token accounts stake into this pool.
    pub position_asset: AssetId,
    /// The market backing the position.
    pub market_account: AccountId,
}

/// Resolves a pool identifier to its position token and market, or reports
/// the pool as unknown.
pub trait MarketDirectory: Send + Sync {
    fn lookup(&self, pool: PoolId) -> Option<MarketEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketDirectory {
    entries: HashMap<PoolId, MarketEntry>,
}

impl InMemoryMarketDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pool: PoolId, entry: MarketEntry) {
        self.entries.insert(pool, entry);
    }
}

impl MarketDirectory for InMemoryMarketDirectory {
    fn lookup(&self, pool: PoolId) -> Option<MarketEntry> {
        self.entries.get(&pool).copied()
    }
}
