//! Wallet model: per-agent, per-asset balances.
//!
//! Exactly one wallet per agent. The only legal balance mutations are
//! [`Wallet::debit`] and [`Wallet::credit`]; both are exposed here as plain
//! data methods and are wrapped by [`crate::ledger::WalletLedger`] with the
//! locking that makes them linearizable per wallet. Keeping the
//! invariant ("never negative") inside the model itself, the same way the
//! teacher's `Agent::debit` refuses to go below its liquidity floor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ids::{AgentId, WalletId};
use crate::core::money::MinorUnits;

/// Settlement handle backing a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Platform-custodied balance.
    Custodial,
    /// Agent-controlled smart-contract wallet.
    Smart,
}

/// Errors raised by direct balance mutation on a [`Wallet`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    /// `balances[asset] < amount`; the debit was refused and the wallet is unchanged.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: MinorUnits,
        available: MinorUnits,
    },
}

/// Per-agent ledger of per-asset balances.
///
/// `balances` uses a `BTreeMap` (not `HashMap`) so that iteration order —
/// relevant when summing balances for a reconciliation report — is
/// deterministic, the same reasoning the teacher's settlement graph applies
/// to its adjacency lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    wallet_id: WalletId,
    agent_id: AgentId,
    address: String,
    wallet_type: WalletType,
    balances: BTreeMap<String, MinorUnits>,
}

impl Wallet {
    pub fn new(wallet_id: WalletId, agent_id: AgentId, address: String, wallet_type: WalletType) -> Self {
        Self {
            wallet_id,
            agent_id,
            address,
            wallet_type,
            balances: BTreeMap::new(),
        }
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn wallet_type(&self) -> WalletType {
        self.wallet_type
    }

    /// Balance of one asset; zero if the wallet has never held it.
    pub fn balance(&self, asset: &str) -> MinorUnits {
        *self.balances.get(asset).unwrap_or(&0)
    }

    /// A snapshot of every non-zero asset balance, asset tags in sorted order.
    pub fn balances(&self) -> &BTreeMap<String, MinorUnits> {
        &self.balances
    }

    /// Seed a balance directly (test fixtures, initial funding). Never used
    /// by escrow/orchestrator logic, which must go through `debit`/`credit`.
    pub fn set_balance(&mut self, asset: &str, amount: MinorUnits) {
        self.balances.insert(asset.to_string(), amount);
    }

    /// Decrease `asset` balance by `amount`. Refuses to go negative.
    ///
    /// # Example
    /// ```
    /// use a2a_fabric_core::models::wallet::{Wallet, WalletType};
    ///
    /// let mut wallet = Wallet::new("w1".into(), "a1".into(), "0xabc".into(), WalletType::Custodial);
    /// wallet.set_balance("USDC", 100);
    /// wallet.debit("USDC", 40).unwrap();
    /// assert_eq!(wallet.balance("USDC"), 60);
    /// assert!(wallet.debit("USDC", 1000).is_err());
    /// ```
    pub fn debit(&mut self, asset: &str, amount: MinorUnits) -> Result<(), WalletError> {
        debug_assert!(amount >= 0, "debit amount must be non-negative");
        let available = self.balance(asset);
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.balances.insert(asset.to_string(), available - amount);
        Ok(())
    }

    /// Increase `asset` balance by `amount`. Always succeeds on a live wallet.
    pub fn credit(&mut self, asset: &str, amount: MinorUnits) {
        debug_assert!(amount >= 0, "credit amount must be non-negative");
        let available = self.balance(asset);
        self.balances.insert(asset.to_string(), available + amount);
    }
}
