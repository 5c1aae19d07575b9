//! Wallet Ledger (C2).
//!
//! The only legal way to move balance: [`WalletLedger::debit`] and
//! [`WalletLedger::credit`], both linearizable per wallet because they run
//! under that wallet's entry in the [`EntityStore`]. Depends on C1
//! only through shared id types — wallets are looked up by their own
//! `wallet_id`, one per agent.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::error::CoreError;
use crate::core::ids::{new_prefixed_id, AgentId, WalletId};
use crate::core::money::MinorUnits;
use crate::models::wallet::{Wallet, WalletError, WalletType};
use crate::persistence::EntityStore;

/// Component-level failures for C2.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::WalletNotFound(id) => CoreError::NotFound(format!("wallet {id}")),
            LedgerError::Wallet(WalletError::InsufficientBalance { required, available }) => {
                CoreError::InsufficientBalance { required, available }
            }
        }
    }
}

/// A trait wrapping the asynchronous on-chain/off-chain settlement network
/// ("out of scope here"). The in-ledger view stays authoritative for
/// authorization regardless of what this returns; the fabric never blocks a
/// decision on it. No implementation ships in this crate — callers that
/// need one provide it, just as the oracle client (C3) is a trait the
/// embedding binary backs with a real HTTP client.
pub trait SettlementDriver: Send + Sync {
    /// Submit a settlement instruction, returning an opaque handle
    /// (e.g. an on-chain transaction hash) once accepted for submission.
    /// Never awaited synchronously inside a debit/credit step.
    fn submit(&self, wallet_id: &str, asset: &str, amount: MinorUnits) -> Result<String, CoreError>;
}

/// A `SettlementDriver` that accepts every instruction immediately and
/// returns a synthetic handle. Stands in for the real network in tests and
/// single-process demos; never used to decide whether a debit succeeds.
#[derive(Debug, Default)]
pub struct NoopSettlementDriver;

impl SettlementDriver for NoopSettlementDriver {
    fn submit(&self, wallet_id: &str, asset: &str, amount: MinorUnits) -> Result<String, CoreError> {
        Ok(format!("noop:{wallet_id}:{asset}:{amount}"))
    }
}

/// Owns every [`Wallet`] and the debit/credit primitives.
pub struct WalletLedger {
    wallets: EntityStore<Wallet>,
    /// `agent_id -> wallet_id`, since callers address wallets by the agent
    /// they belong to far more often than by raw wallet id (exactly one
    /// wallet per agent).
    by_agent: Mutex<BTreeMap<AgentId, WalletId>>,
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletLedger {
    pub fn new() -> Self {
        Self {
            wallets: EntityStore::new(),
            by_agent: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open the one wallet an agent is entitled to. Idempotent: calling
    /// twice for the same agent returns the existing wallet id rather than
    /// creating a second wallet.
    pub fn open_wallet(&self, agent_id: &str, wallet_type: WalletType) -> WalletId {
        let mut by_agent = self.by_agent.lock().expect("wallet index poisoned");
        if let Some(existing) = by_agent.get(agent_id) {
            return existing.clone();
        }
        let wallet_id = new_prefixed_id("wal");
        let address = new_prefixed_id("0x");
        let wallet = Wallet::new(wallet_id.clone(), agent_id.to_string(), address, wallet_type);
        self.wallets.insert(wallet_id.clone(), wallet);
        by_agent.insert(agent_id.to_string(), wallet_id.clone());
        wallet_id
    }

    pub fn wallet_id_for_agent(&self, agent_id: &str) -> Option<WalletId> {
        self.by_agent
            .lock()
            .expect("wallet index poisoned")
            .get(agent_id)
            .cloned()
    }

    /// Seed a balance directly — test fixtures and initial funding only;
    /// never on the path a task, escrow, or fee flows through.
    pub fn fund(&self, wallet_id: &str, asset: &str, amount: MinorUnits) -> Result<(), LedgerError> {
        self.wallets
            .with_mut(wallet_id, |wallet| wallet.set_balance(asset, amount))
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
    }

    /// Current balance; never blocks on a concurrent debit/credit beyond
    /// the brief per-wallet lock needed to clone.
    pub fn get_balance(&self, wallet_id: &str, asset: &str) -> Result<MinorUnits, LedgerError> {
        self.wallets
            .snapshot(wallet_id)
            .map(|wallet| wallet.balance(asset))
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
    }

    /// Atomic debit. `reference` is stored for the caller's own audit log
    /// (the transaction log append happens one layer up, in the escrow
    /// engine / orchestrator, which knows the task context); the ledger
    /// itself tracks no history beyond current balance.
    pub fn debit(
        &self,
        wallet_id: &str,
        asset: &str,
        amount: MinorUnits,
        _reference: &str,
    ) -> Result<(), LedgerError> {
        self.wallets
            .with_mut(wallet_id, |wallet| wallet.debit(asset, amount))
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?
            .map_err(LedgerError::from)
    }

    /// Always succeeds on a live wallet.
    pub fn credit(
        &self,
        wallet_id: &str,
        asset: &str,
        amount: MinorUnits,
        _reference: &str,
    ) -> Result<(), LedgerError> {
        self.wallets
            .with_mut(wallet_id, |wallet| wallet.credit(asset, amount))
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
    }
}
