//! Escrow model: one locked-funds record per active payment commitment.
//!
//! A small state enum, each variant carrying the timestamp of its
//! transition: `active`, `released`, `refunded`, `partially_released`,
//! `expired`.

use serde::{Deserialize, Serialize};

use crate::core::ids::{AgentId, EscrowId, TaskId};
use crate::core::money::MinorUnits;

/// Lifecycle state of an [`Escrow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Funds locked, awaiting release/refund/expiry.
    Active,
    /// Released to the payee in full.
    Released,
    /// Refunded to the payer in full (user cancel or engine-initiated).
    Refunded,
    /// Released to the payee for less than `locked_amount`, remainder refunded.
    PartiallyReleased,
    /// Timed out with no terminal action taken by either party; full refund.
    Expired,
}

impl EscrowStatus {
    /// Whether no further transition out of this status is possible.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EscrowStatus::Active)
    }
}

/// A locked-funds commitment tied to one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    escrow_id: EscrowId,
    from_agent_id: AgentId,
    to_agent_id: AgentId,
    asset: String,
    estimated_cost: MinorUnits,
    buffer_fraction: f64,
    locked_amount: MinorUnits,
    status: EscrowStatus,
    created_at: i64,
    expires_at: i64,
    actual_cost: Option<MinorUnits>,
    refund_amount: Option<MinorUnits>,
    release_reason: Option<String>,
    task_id: Option<TaskId>,
}

impl Escrow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        escrow_id: EscrowId,
        from_agent_id: AgentId,
        to_agent_id: AgentId,
        asset: String,
        estimated_cost: MinorUnits,
        buffer_fraction: f64,
        locked_amount: MinorUnits,
        created_at: i64,
        expires_at: i64,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            escrow_id,
            from_agent_id,
            to_agent_id,
            asset,
            estimated_cost,
            buffer_fraction,
            locked_amount,
            status: EscrowStatus::Active,
            created_at,
            expires_at,
            actual_cost: None,
            refund_amount: None,
            release_reason: None,
            task_id,
        }
    }

    pub fn escrow_id(&self) -> &str {
        &self.escrow_id
    }

    pub fn from_agent_id(&self) -> &str {
        &self.from_agent_id
    }

    pub fn to_agent_id(&self) -> &str {
        &self.to_agent_id
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn estimated_cost(&self) -> MinorUnits {
        self.estimated_cost
    }

    pub fn buffer_fraction(&self) -> f64 {
        self.buffer_fraction
    }

    pub fn locked_amount(&self) -> MinorUnits {
        self.locked_amount
    }

    pub fn status(&self) -> EscrowStatus {
        self.status
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn actual_cost(&self) -> Option<MinorUnits> {
        self.actual_cost
    }

    pub fn refund_amount(&self) -> Option<MinorUnits> {
        self.refund_amount
    }

    pub fn release_reason(&self) -> Option<&str> {
        self.release_reason.as_deref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.status == EscrowStatus::Active
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    /// Record a release. `actual_cost + refund` must equal `locked_amount` —
    /// enforced by the caller ([`crate::escrow::EscrowEngine::release`]); this
    /// setter only records the already-validated outcome.
    pub fn mark_released(&mut self, actual_cost: MinorUnits, refund_amount: MinorUnits, partial: bool) {
        self.actual_cost = Some(actual_cost);
        self.refund_amount = Some(refund_amount);
        self.status = if partial {
            EscrowStatus::PartiallyReleased
        } else {
            EscrowStatus::Released
        };
    }

    /// Record a full refund, either user-initiated (`reason = "cancelled"`)
    /// or timeout-initiated (`reason = "timeout"`, terminal state `Expired`).
    pub fn mark_refunded(&mut self, reason: impl Into<String>, expired: bool) {
        self.refund_amount = Some(self.locked_amount);
        self.release_reason = Some(reason.into());
        self.status = if expired {
            EscrowStatus::Expired
        } else {
            EscrowStatus::Refunded
        };
    }
}
