//! Task model: one orchestrated payment-for-work operation.
//!
//! The task state machine is the orchestrator's responsibility;
//! this module only holds the data and the pure transition guards (`can_*`)
//! that [`crate::orchestrator::Orchestrator`] consults before mutating.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ids::{AgentId, EscrowId, TaskId};
use crate::core::money::MinorUnits;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl TaskStatus {
    /// Terminal states: completed, failed, cancelled, expired.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Expired
        )
    }
}

/// Payment terms attached to a task at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayment {
    pub amount: MinorUnits,
    pub asset: String,
}

/// Caller-supplied execution options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Milliseconds until the task auto-expires. Default 24h (86_400_000).
    pub timeout_ms: i64,
    /// Max `UpstreamUnavailable` retries for idempotent oracle/settlement calls.
    pub retry_count: u32,
    /// Whether to consult the token cost oracle at all (vs. trusting `payment.amount`).
    pub estimate_tokens: bool,
    /// Escrow buffer override, as a fraction in `[0, 0.5]`. `None` uses the fabric default.
    pub escrow_buffer_percent: Option<f64>,
    /// Model identifier passed to the token cost oracle, if any.
    pub model: Option<String>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 24 * 60 * 60 * 1000,
            retry_count: 3,
            estimate_tokens: true,
            escrow_buffer_percent: None,
            model: None,
        }
    }
}

/// Usage the provider reports at `complete` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub total_cost: MinorUnits,
}

/// The provider's result payload passed to `complete`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskResult {
    pub output: Option<Value>,
    pub token_usage: Option<TokenUsage>,
    pub error: Option<String>,
}

/// One orchestrated payment-for-work operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    task_id: TaskId,
    from_agent_id: AgentId,
    to_agent_id: AgentId,
    tool_name: String,
    parameters: Value,
    payment: TaskPayment,
    options: TaskOptions,
    status: TaskStatus,
    result: Option<TaskResult>,
    escrow_id: EscrowId,
    platform_fee: MinorUnits,
    created_at: i64,
    expires_at: i64,
    completed_at: Option<i64>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: TaskId,
        from_agent_id: AgentId,
        to_agent_id: AgentId,
        tool_name: String,
        parameters: Value,
        payment: TaskPayment,
        options: TaskOptions,
        escrow_id: EscrowId,
        platform_fee: MinorUnits,
        created_at: i64,
    ) -> Self {
        let expires_at = created_at + options.timeout_ms;
        Self {
            task_id,
            from_agent_id,
            to_agent_id,
            tool_name,
            parameters,
            payment,
            options,
            status: TaskStatus::Pending,
            result: None,
            escrow_id,
            platform_fee,
            created_at,
            expires_at,
            completed_at: None,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn from_agent_id(&self) -> &str {
        &self.from_agent_id
    }

    pub fn to_agent_id(&self) -> &str {
        &self.to_agent_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn payment(&self) -> &TaskPayment {
        &self.payment
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    pub fn escrow_id(&self) -> &str {
        &self.escrow_id
    }

    pub fn platform_fee(&self) -> MinorUnits {
        self.platform_fee
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    /// `accept` is legal iff pending, caller is the provider, and not expired.
    pub fn can_accept(&self, actor_agent_id: &str, now_ms: i64) -> bool {
        self.status == TaskStatus::Pending
            && actor_agent_id == self.to_agent_id
            && now_ms < self.expires_at
    }

    /// `complete` is legal iff in-progress and caller is the provider.
    pub fn can_complete(&self, actor_agent_id: &str) -> bool {
        self.status == TaskStatus::InProgress && actor_agent_id == self.to_agent_id
    }

    /// `cancel` is legal iff not-yet-terminal and caller is the payer.
    pub fn can_cancel(&self, actor_agent_id: &str) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
            && actor_agent_id == self.from_agent_id
    }

    /// `on_timeout` applies only to tasks still pending or in progress.
    pub fn can_timeout(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
    }

    pub fn accept(&mut self) {
        self.status = TaskStatus::InProgress;
    }

    pub fn complete(&mut self, result: TaskResult, now_ms: i64, failed: bool) {
        self.result = Some(result);
        self.status = if failed { TaskStatus::Failed } else { TaskStatus::Completed };
        self.completed_at = Some(now_ms);
    }

    pub fn cancel(&mut self, now_ms: i64) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(now_ms);
    }

    pub fn expire(&mut self, now_ms: i64) {
        self.status = TaskStatus::Expired;
        self.completed_at = Some(now_ms);
    }
}
