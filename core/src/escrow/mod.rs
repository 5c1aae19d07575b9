//! Escrow Engine (C4).
//!
//! Locks funds against the payer's wallet (C2) using a cost estimate from
//! the oracle (C3), then releases, refunds, or expires that lock. This is
//! the component [`crate::orchestrator::Orchestrator`] (C5) drives directly;
//! nothing above it talks to the ledger except through here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::core::error::CoreError;
use crate::core::ids::{new_prefixed_id, EscrowId, TaskId};
use crate::core::money::MinorUnits;
use crate::core::time::Clock;
use crate::ledger::{LedgerError, WalletLedger};
use crate::models::escrow::{Escrow, EscrowStatus};
use crate::oracle::{apply_escrow_buffer, OracleError, TokenCostOracle};
use crate::persistence::EntityStore;

/// Which side of an escrow a [`EscrowEngine::release`] call credits first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseRecipient {
    /// The provider is paid `actual_cost`; any surplus vs. `locked_amount`
    /// is refunded back to the payer.
    Payee,
    /// The payer is refunded `actual_cost`; used by the manual-release
    /// fallback endpoint when a release needs to go the other way.
    Payer,
}

/// Component-level failures for C4.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EscrowError {
    #[error("escrow not found: {0}")]
    NotFound(String),
    #[error("escrow denied: insufficient balance, required {required}, available {available}")]
    DeniedBalance {
        required: MinorUnits,
        available: MinorUnits,
    },
    #[error("escrow {0} is not active")]
    NotActive(String),
    #[error("escrow conflict: a differing release was already recorded for {0}")]
    Conflict(String),
    #[error("invalid release: actual_cost must be in (0, locked_amount], got {actual_cost} vs {locked_amount}")]
    InvalidReleaseAmount {
        actual_cost: MinorUnits,
        locked_amount: MinorUnits,
    },
    #[error("payer or payee has no wallet: {0}")]
    WalletMissing(String),
}

impl From<EscrowError> for CoreError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::NotFound(id) => CoreError::NotFound(format!("escrow {id}")),
            EscrowError::DeniedBalance { required, available } => {
                CoreError::InsufficientBalance { required, available }
            }
            EscrowError::NotActive(id) => CoreError::Conflict(format!("escrow {id} is not active")),
            EscrowError::Conflict(id) => {
                CoreError::Conflict(format!("escrow {id} already has a differing terminal release"))
            }
            EscrowError::InvalidReleaseAmount { .. } => CoreError::Validation(err.to_string()),
            EscrowError::WalletMissing(id) => CoreError::NotFound(format!("wallet for agent {id}")),
        }
    }
}

/// The outcome of a [`EscrowEngine::release`] call, including whether the
/// release was serviced from the idempotency cache.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub escrow: Escrow,
    pub released_to_payee: MinorUnits,
    pub refunded_to_payer: MinorUnits,
    pub was_idempotent_replay: bool,
}

/// Remembers the arguments of the release that terminated each escrow, so a
/// second call with identical arguments can be recognized as a no-op
/// instead of rejected as a conflict.
#[derive(Debug, Clone, PartialEq)]
struct RecordedRelease {
    actual_cost: MinorUnits,
    recipient: ReleaseRecipientKey,
    partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseRecipientKey {
    Payee,
    Payer,
}

impl From<ReleaseRecipient> for ReleaseRecipientKey {
    fn from(r: ReleaseRecipient) -> Self {
        match r {
            ReleaseRecipient::Payee => ReleaseRecipientKey::Payee,
            ReleaseRecipient::Payer => ReleaseRecipientKey::Payer,
        }
    }
}

/// Owns every [`Escrow`] plus the ledger and oracle it coordinates.
pub struct EscrowEngine {
    escrows: EntityStore<Escrow>,
    ledger: Arc<WalletLedger>,
    oracle: Arc<dyn TokenCostOracle>,
    releases: Mutex<BTreeMap<EscrowId, RecordedRelease>>,
}

impl EscrowEngine {
    pub fn new(ledger: Arc<WalletLedger>, oracle: Arc<dyn TokenCostOracle>) -> Self {
        Self {
            escrows: EntityStore::new(),
            ledger,
            oracle,
            releases: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, escrow_id: &str) -> Result<Escrow, EscrowError> {
        self.escrows
            .snapshot(escrow_id)
            .ok_or_else(|| EscrowError::NotFound(escrow_id.to_string()))
    }

    /// Create and lock an escrow.
    ///
    /// Consults the oracle for `(text, model)`; on success the locked
    /// amount is `ceil(total_tokens * (1 + buffer)) * unit_price`,
    /// floored at `fallback_amount` so a cheap oracle quote against a
    /// tool priced richly in its manifest never leaves the later release
    /// under-funded. On oracle failure, falls back to `fallback_amount`
    /// with no buffer applied — the orchestrator supplies this as
    /// `payment.amount + fee`, already balance-checked.
    #[allow(clippy::too_many_arguments)]
    pub fn create_escrow(
        &self,
        clock: &dyn Clock,
        from_agent_id: &str,
        to_agent_id: &str,
        asset: &str,
        text: &str,
        model: &str,
        buffer: f64,
        fallback_amount: MinorUnits,
        timeout_ms: i64,
        task_id: Option<TaskId>,
    ) -> Result<Escrow, EscrowError> {
        let (estimated_cost, locked_amount) = match self.oracle.estimate(text, model) {
            Ok(estimate) => {
                let base_cost = (estimate.total_tokens as i128) * estimate.unit_price;
                let locked = apply_escrow_buffer(&estimate, buffer).max(fallback_amount);
                (base_cost.max(fallback_amount), locked)
            }
            Err(OracleError::Unavailable(reason)) => {
                tracing::warn!(
                    from_agent_id,
                    to_agent_id,
                    reason = %reason,
                    "token cost oracle unavailable, falling back to explicit payment amount"
                );
                (fallback_amount, fallback_amount)
            }
        };

        let payer_wallet = self
            .ledger
            .wallet_id_for_agent(from_agent_id)
            .ok_or_else(|| EscrowError::WalletMissing(from_agent_id.to_string()))?;

        let escrow_id = new_prefixed_id("esc");
        self.ledger
            .debit(&payer_wallet, asset, locked_amount, &escrow_id)
            .map_err(|err| match err {
                LedgerError::Wallet(crate::models::wallet::WalletError::InsufficientBalance {
                    required,
                    available,
                }) => EscrowError::DeniedBalance { required, available },
                LedgerError::WalletNotFound(id) => EscrowError::WalletMissing(id),
            })?;

        let now_ms = clock.now_ms();
        let escrow = Escrow::new(
            escrow_id.clone(),
            from_agent_id.to_string(),
            to_agent_id.to_string(),
            asset.to_string(),
            estimated_cost,
            buffer,
            locked_amount,
            now_ms,
            now_ms + timeout_ms,
            task_id,
        );
        self.escrows.insert(escrow_id.clone(), escrow.clone());
        tracing::info!(escrow_id, locked_amount, "escrow created");
        Ok(escrow)
    }

    /// Release locked funds. Idempotent on identical arguments;
    /// a differing call against an already-terminal escrow is a conflict.
    pub fn release(
        &self,
        escrow_id: &str,
        actual_cost: MinorUnits,
        recipient: ReleaseRecipient,
        partial: bool,
    ) -> Result<ReleaseOutcome, EscrowError> {
        let recorded = RecordedRelease {
            actual_cost,
            recipient: recipient.into(),
            partial,
        };

        let snapshot = self.get(escrow_id)?;
        if !snapshot.is_active() {
            let previous = self.releases.lock().expect("release cache poisoned").get(escrow_id).cloned();
            return match previous {
                Some(prev) if prev == recorded => Ok(ReleaseOutcome {
                    released_to_payee: snapshot.actual_cost().unwrap_or(0),
                    refunded_to_payer: snapshot.refund_amount().unwrap_or(0),
                    escrow: snapshot,
                    was_idempotent_replay: true,
                }),
                _ => Err(EscrowError::Conflict(escrow_id.to_string())),
            };
        }

        if actual_cost <= 0 || actual_cost > snapshot.locked_amount() {
            return Err(EscrowError::InvalidReleaseAmount {
                actual_cost,
                locked_amount: snapshot.locked_amount(),
            });
        }

        let (primary_wallet_agent, refund_to_payer) = match recipient {
            ReleaseRecipient::Payee => {
                let surplus = snapshot.locked_amount() - actual_cost;
                (snapshot.to_agent_id().to_string(), surplus)
            }
            ReleaseRecipient::Payer => (snapshot.from_agent_id().to_string(), 0),
        };

        let primary_wallet = self
            .ledger
            .wallet_id_for_agent(&primary_wallet_agent)
            .ok_or_else(|| EscrowError::WalletMissing(primary_wallet_agent.clone()))?;
        self.ledger
            .credit(&primary_wallet, snapshot.asset(), actual_cost, escrow_id)
            .map_err(|_| EscrowError::WalletMissing(primary_wallet_agent))?;

        if recipient == ReleaseRecipient::Payee && refund_to_payer > 0 {
            let payer_wallet = self
                .ledger
                .wallet_id_for_agent(snapshot.from_agent_id())
                .ok_or_else(|| EscrowError::WalletMissing(snapshot.from_agent_id().to_string()))?;
            self.ledger
                .credit(&payer_wallet, snapshot.asset(), refund_to_payer, escrow_id)
                .map_err(|_| EscrowError::WalletMissing(snapshot.from_agent_id().to_string()))?;
        }

        let is_partial = partial && actual_cost < snapshot.locked_amount();
        let escrow = self
            .escrows
            .with_mut(escrow_id, |escrow| {
                escrow.mark_released(actual_cost, refund_to_payer, is_partial);
                escrow.clone()
            })
            .ok_or_else(|| EscrowError::NotFound(escrow_id.to_string()))?;

        self.releases
            .lock()
            .expect("release cache poisoned")
            .insert(escrow_id.to_string(), recorded);

        tracing::info!(escrow_id, actual_cost, refund_to_payer, "escrow released");
        Ok(ReleaseOutcome {
            escrow,
            released_to_payee: actual_cost,
            refunded_to_payer: refund_to_payer,
            was_idempotent_replay: false,
        })
    }

    /// User-initiated cancellation: full refund to the payer.
    pub fn cancel(&self, escrow_id: &str, reason: &str) -> Result<Escrow, EscrowError> {
        self.refund_full(escrow_id, reason, false)
    }

    /// Timeout-scheduler-initiated expiry: full refund to the payer, but
    /// recorded as `expired` rather than `refunded` for observability
    ///. Idempotent: firing twice on an already-terminal escrow is a
    /// silent no-op, since the scheduler may re-check a woken task.
    pub fn expire(&self, escrow_id: &str) -> Result<Escrow, EscrowError> {
        let snapshot = self.get(escrow_id)?;
        if !snapshot.is_active() {
            return Ok(snapshot);
        }
        self.refund_full(escrow_id, "timeout", true)
    }

    fn refund_full(&self, escrow_id: &str, reason: &str, expired: bool) -> Result<Escrow, EscrowError> {
        let snapshot = self.get(escrow_id)?;
        if !snapshot.is_active() {
            return Err(EscrowError::NotActive(escrow_id.to_string()));
        }

        let payer_wallet = self
            .ledger
            .wallet_id_for_agent(snapshot.from_agent_id())
            .ok_or_else(|| EscrowError::WalletMissing(snapshot.from_agent_id().to_string()))?;
        self.ledger
            .credit(&payer_wallet, snapshot.asset(), snapshot.locked_amount(), escrow_id)
            .map_err(|_| EscrowError::WalletMissing(snapshot.from_agent_id().to_string()))?;

        let escrow = self
            .escrows
            .with_mut(escrow_id, |escrow| {
                escrow.mark_refunded(reason, expired);
                escrow.clone()
            })
            .ok_or_else(|| EscrowError::NotFound(escrow_id.to_string()))?;

        tracing::info!(escrow_id, reason, expired, "escrow refunded in full");
        Ok(escrow)
    }
}
