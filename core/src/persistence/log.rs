//! Append-only transaction log (C8 "transaction log" half).
//!
//! Writes here must be durable *before* the matching entity mutation is
//! acknowledged to the caller (write-ahead ordering) so that, in principle,
//! current state can be re-derived from the log alone. This in-process
//! implementation keeps the log itself as the durability boundary (an
//! `append` either returns the new entry or the caller never proceeds to
//! mutate state) and exposes [`TransactionLog::replay_task`] as the
//! recovery procedure the design notes describe — callable on demand
//! rather than invoked only after a crash, since this process has no
//! separate crash-recovery path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::core::ids::{AgentId, TaskId};
use crate::core::money::MinorUnits;
use crate::models::log_entry::{LogAction, TransactionLogEntry};

/// Append-only, globally ordered transaction log.
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: Mutex<Vec<TransactionLogEntry>>,
    next_sequence: AtomicU64,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Append one entry, assigning it the next monotonic sequence number.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        task_id: impl Into<TaskId>,
        action: LogAction,
        timestamp_ms: i64,
        details: impl Into<String>,
        amount: MinorUnits,
        asset: impl Into<String>,
        from: impl Into<AgentId>,
        to: impl Into<AgentId>,
    ) -> TransactionLogEntry {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let entry = TransactionLogEntry {
            sequence,
            task_id: task_id.into(),
            action,
            timestamp_ms,
            details: details.into(),
            amount,
            asset: asset.into(),
            from: from.into(),
            to: to.into(),
        };
        let mut entries = self.entries.lock().expect("transaction log poisoned");
        entries.push(entry.clone());
        entry
    }

    /// All entries for one task, in append order — the replay/audit trail
    /// Guarantees `created.ts <= terminal.ts` for every task.
    pub fn replay_task(&self, task_id: &str) -> Vec<TransactionLogEntry> {
        let entries = self.entries.lock().expect("transaction log poisoned");
        entries.iter().filter(|e| e.task_id == task_id).cloned().collect()
    }

    /// All entries touching one agent (as `from` or `to`), ordered by
    /// `(timestamp, sequence)` — the log's secondary index.
    pub fn entries_for_agent(&self, agent_id: &str) -> Vec<TransactionLogEntry> {
        let entries = self.entries.lock().expect("transaction log poisoned");
        let mut matching: Vec<TransactionLogEntry> = entries
            .iter()
            .filter(|e| e.from == agent_id || e.to == agent_id)
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.timestamp_ms, e.sequence));
        matching
    }

    /// Total entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("transaction log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full log contents in append (and therefore global) order.
    pub fn all(&self) -> Vec<TransactionLogEntry> {
        self.entries.lock().expect("transaction log poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let log = TransactionLog::new();
        let e1 = log.append("t1", LogAction::Created, 0, "created", 100, "USDC", "a", "b");
        let e2 = log.append("t1", LogAction::Completed, 10, "completed", 100, "USDC", "b", "a");
        assert_eq!(e1.sequence, 0);
        assert_eq!(e2.sequence, 1);
    }

    #[test]
    fn replay_task_returns_only_matching_entries_in_order() {
        let log = TransactionLog::new();
        log.append("t1", LogAction::Created, 0, "created", 100, "USDC", "a", "b");
        log.append("t2", LogAction::Created, 1, "created", 50, "USDC", "c", "d");
        log.append("t1", LogAction::Completed, 2, "completed", 100, "USDC", "b", "a");

        let replay = log.replay_task("t1");
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].action, LogAction::Created);
        assert_eq!(replay[1].action, LogAction::Completed);
    }

    #[test]
    fn entries_for_agent_includes_both_directions() {
        let log = TransactionLog::new();
        log.append("t1", LogAction::Created, 5, "created", 100, "USDC", "a", "b");
        log.append("t1", LogAction::Completed, 10, "completed", 100, "USDC", "b", "a");
        log.append("t2", LogAction::Created, 1, "created", 10, "USDC", "c", "d");

        let for_a = log.entries_for_agent("a");
        assert_eq!(for_a.len(), 2);
        assert!(for_a.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }
}
