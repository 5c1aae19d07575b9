//! Transaction log entry: the append-only audit record behind C8.
//!
//! Every orchestrator/escrow state transition appends one of these before
//! acknowledging the caller (write-ahead ordering). Keyed logically by
//! `(task_id, action, timestamp)`; physical ordering is the monotonic
//! `(timestamp, sequence)` pair assigned by [`crate::persistence::TransactionLog`].

use serde::{Deserialize, Serialize};

use crate::core::ids::{AgentId, TaskId};
use crate::core::money::MinorUnits;

/// The action a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Created,
    Accepted,
    Completed,
    Cancelled,
    Expired,
    Refunded,
    Released,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub sequence: u64,
    pub task_id: TaskId,
    pub action: LogAction,
    pub timestamp_ms: i64,
    pub details: String,
    pub amount: MinorUnits,
    pub asset: String,
    pub from: AgentId,
    pub to: AgentId,
}
