//! Identifier types and deterministic derivation.
//!
//! Accounts and assets are 32-byte identifiers; pools are keyed by their
//! expiry timestamp. Custody endpoints owned by the program (per-pool
//! holders, the reward vault) are derived with BLAKE3 over a domain tag so
//! they are protocol-owned addresses with no private key.

use core::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Number of raw bytes in an account or asset identifier.
pub const ID_BYTES: usize = 32;

/// 32-byte account identifier (custody address). The all-zero default is a
/// placeholder, never a derived address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AccountId(pub [u8; ID_BYTES]);

impl AccountId {
    pub const fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Deterministic test/fixture account derived from a label.
    pub fn from_seed(seed: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ACCOUNT_SEED");
        hasher.update(seed.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({}…)", &self.to_hex()[..8])
    }
}

/// 32-byte asset identifier (what custody moves around). The all-zero
/// default is a placeholder, never a derived asset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AssetId(pub [u8; ID_BYTES]);

impl AssetId {
    pub const fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Deterministic test/fixture asset derived from a label.
    pub fn from_seed(seed: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ASSET_SEED");
        hasher.update(seed.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({}…)", &self.to_hex()[..8])
    }
}

/// Pool identifier: the expiry timestamp (microseconds) of the position the
/// pool stakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub u64);

impl PoolId {
    pub const fn expiry_us(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool@{}", self.0)
    }
}

/// Derive the deterministic holder account for a pool:
/// `holder = BLAKE3("POOL_HOLDER" || expiry.to_le_bytes())`
///
/// The holder custodies the pool's staked position tokens and its
/// yield-bearing balance; funds leave only through engine operations.
pub fn pool_holder_account_id(pool: PoolId) -> AccountId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"POOL_HOLDER");
    hasher.update(&pool.0.to_le_bytes());
    AccountId(*hasher.finalize().as_bytes())
}

static REWARD_VAULT: Lazy<AccountId> = Lazy::new(|| {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"REWARD_VAULT");
    AccountId(*hasher.finalize().as_bytes())
});

/// The program-owned vault that holds funded but unclaimed reward budget:
/// `vault = BLAKE3("REWARD_VAULT")`
pub fn reward_vault_account_id() -> AccountId {
    *REWARD_VAULT
}
