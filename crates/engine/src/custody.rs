//! Custody collaborator interface.
//!
//! The engine never holds token balances itself; it asks a custody ledger
//! to move assets between accounts. One operation's transfers are submitted
//! as a single batch and the batch contract is all-or-nothing: either every
//! transfer applies or none does, and failure is reported distinctly.

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tidemill_types::{AccountId, Amount, AssetId};

/// One asset movement requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub asset: AssetId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
}

/// Capability to debit and credit accounts atomically.
pub trait CustodyLedger: Send + Sync {
    /// Apply every transfer in `batch` or none of them.
    fn apply(&mut self, batch: &[TransferIntent]) -> Result<()>;

    /// Current balance of `account` in `asset`.
    fn balance_of(&self, asset: AssetId, account: AccountId) -> Amount;
}

/// Custody handle shared between the engine and collaborators that also
/// move balances (e.g. a yield source realizing growth into a holder).
pub type SharedCustody = Arc<Mutex<dyn CustodyLedger>>;

/// Wrap a custody ledger for shared ownership.
pub fn shared_custody<C: CustodyLedger + 'static>(custody: C) -> SharedCustody {
    Arc::new(Mutex::new(custody))
}

/// In-memory custody ledger with an append-only transfer log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    balances: HashMap<(AssetId, AccountId), Amount>,
    log: Vec<TransferIntent>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance (fixture setup; not a transfer).
    pub fn mint(&mut self, asset: AssetId, account: AccountId, amount: Amount) {
        let entry = self.balances.entry((asset, account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Every transfer ever applied, in order.
    pub fn transfer_log(&self) -> &[TransferIntent] {
        &self.log
    }
}

impl CustodyLedger for InMemoryCustody {
    fn apply(&mut self, batch: &[TransferIntent]) -> Result<()> {
        // Validate the whole batch against a scratch view before touching
        // real balances, so a late failure cannot leave a partial batch.
        let mut scratch: HashMap<(AssetId, AccountId), Amount> = HashMap::new();
        for t in batch {
            let from_key = (t.asset, t.from);
            let available = *scratch
                .entry(from_key)
                .or_insert_with(|| self.balances.get(&from_key).copied().unwrap_or(0));
            if available < t.amount {
                anyhow::bail!(
                    "insufficient balance: account {} holds {} of asset {}, transfer needs {}",
                    t.from,
                    available,
                    t.asset,
                    t.amount
                );
            }
            scratch.insert(from_key, available - t.amount);
            let to_key = (t.asset, t.to);
            let to_balance = scratch
                .entry(to_key)
                .or_insert_with(|| self.balances.get(&to_key).copied().unwrap_or(0));
            *to_balance = to_balance
                .checked_add(t.amount)
                .ok_or_else(|| anyhow::anyhow!("balance overflow crediting {}", t.to))?;
        }
        for (key, balance) in scratch {
            self.balances.insert(key, balance);
        }
        self.log.extend_from_slice(batch);
        Ok(())
    }

    fn balance_of(&self, asset: AssetId, account: AccountId) -> Amount {
        self.balances.get(&(asset, account)).copied().unwrap_or(0)
    }
}

/// Test double: records every batch and can be scripted to fail.
#[derive(Debug, Clone, Default)]
pub struct MockCustody {
    inner: InMemoryCustody,
    batches: Vec<Vec<TransferIntent>>,
    fail_next: bool,
}

impl MockCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, asset: AssetId, account: AccountId, amount: Amount) {
        self.inner.mint(asset, account, amount);
    }

    /// Make the next `apply` fail without touching balances.
    pub fn fail_next_batch(&mut self) {
        self.fail_next = true;
    }

    /// Every batch ever submitted, including the failed ones.
    pub fn batches(&self) -> &[Vec<TransferIntent>] {
        &self.batches
    }
}

impl CustodyLedger for MockCustody {
    fn apply(&mut self, batch: &[TransferIntent]) -> Result<()> {
        self.batches.push(batch.to_vec());
        if self.fail_next {
            self.fail_next = false;
            anyhow::bail!("scripted custody failure");
        }
        self.inner.apply(batch)
    }

    fn balance_of(&self, asset: AssetId, account: AccountId) -> Amount {
        self.inner.balance_of(asset, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (InMemoryCustody, AssetId, AccountId, AccountId) {
        let mut custody = InMemoryCustody::new();
        let asset = AssetId::from_seed("token");
        let alice = AccountId::from_seed("alice");
        let bob = AccountId::from_seed("bob");
        custody.mint(asset, alice, 1_000);
        (custody, asset, alice, bob)
    }

    #[test]
    fn batch_applies_in_order() {
        let (mut custody, asset, alice, bob) = fixture();
        custody
            .apply(&[
                TransferIntent {
                    asset,
                    from: alice,
                    to: bob,
                    amount: 400,
                },
                TransferIntent {
                    asset,
                    from: bob,
                    to: alice,
                    amount: 100,
                },
            ])
            .expect("batch applies");
        assert_eq!(custody.balance_of(asset, alice), 700);
        assert_eq!(custody.balance_of(asset, bob), 300);
        assert_eq!(custody.transfer_log().len(), 2);
    }

    #[test]
    fn failing_batch_leaves_balances_untouched() {
        let (mut custody, asset, alice, bob) = fixture();
        let err = custody.apply(&[
            TransferIntent {
                asset,
                from: alice,
                to: bob,
                amount: 600,
            },
            TransferIntent {
                asset,
                from: alice,
                to: bob,
                amount: 600,
            },
        ]);
        assert!(err.is_err());
        assert_eq!(custody.balance_of(asset, alice), 1_000);
        assert_eq!(custody.balance_of(asset, bob), 0);
        assert!(custody.transfer_log().is_empty());
    }

    #[test]
    fn batch_can_spend_funds_received_within_it() {
        let (mut custody, asset, alice, bob) = fixture();
        let carol = AccountId::from_seed("carol");
        custody
            .apply(&[
                TransferIntent {
                    asset,
                    from: alice,
                    to: bob,
                    amount: 1_000,
                },
                TransferIntent {
                    asset,
                    from: bob,
                    to: carol,
                    amount: 1_000,
                },
            ])
            .expect("forwarding within a batch");
        assert_eq!(custody.balance_of(asset, carol), 1_000);
        assert_eq!(custody.balance_of(asset, bob), 0);
    }
}
