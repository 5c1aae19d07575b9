//! Transaction Orchestrator (C5).
//!
//! The top of the dependency chain (`C8 ← C1 ← C2 ← C6 ← C7 ← C3 ← C4 ← C5`):
//! one actor per `task_id`, coupling identity (C1), the ledger (C2), the
//! tool registry (C7), and the escrow engine (C4) into the state machine
//! `pending → in_progress → {completed, failed} | cancelled | expired`.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::error::CoreError;
use crate::core::ids::{new_id, AgentId};
use crate::core::money::{mul_frac_round, MinorUnits};
use crate::core::time::Clock;
use crate::escrow::{EscrowEngine, ReleaseRecipient};
use crate::identity::IdentityRegistry;
use crate::ledger::WalletLedger;
use crate::models::log_entry::LogAction;
use crate::models::task::{Task, TaskOptions, TaskPayment, TaskResult, TaskStatus};
use crate::persistence::{EntityStore, TransactionLog};
use crate::registry::ToolRegistry;

mod timeout_queue;
pub use timeout_queue::TimeoutScheduler;

/// Component-level failures for C5: validation against the state machine
/// itself, as opposed to a failure in one of the components it drives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("agent {0} is not active")]
    AgentNotActive(String),
    #[error("{actor} is not authorized to {action} task {task_id}")]
    NotAuthorized {
        actor: String,
        action: &'static str,
        task_id: String,
    },
    #[error("task {task_id} cannot {action} from its current state")]
    InvalidTransition { task_id: String, action: &'static str },
    #[error("task {0} has already expired")]
    TaskExpired(String),
}

impl From<OrchestratorError> for CoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::TaskNotFound(id) => CoreError::NotFound(format!("task {id}")),
            OrchestratorError::AgentNotActive(id) => {
                CoreError::Forbidden(format!("agent {id} is not active"))
            }
            OrchestratorError::NotAuthorized { .. } => CoreError::Forbidden(err.to_string()),
            OrchestratorError::InvalidTransition { .. } => CoreError::Conflict(err.to_string()),
            OrchestratorError::TaskExpired(id) => CoreError::Expired(format!("task {id}")),
        }
    }
}

/// Caller-supplied request to [`Orchestrator::create`].
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    pub tool_name: String,
    pub parameters: Value,
    /// Overrides the tool manifest's price when present.
    pub amount_override: Option<MinorUnits>,
    pub asset_override: Option<String>,
    pub options: TaskOptions,
}

/// Ties C1/C2/C4/C7/C8 into the per-task state machine.
pub struct Orchestrator {
    tasks: EntityStore<Task>,
    identity: Arc<IdentityRegistry>,
    ledger: Arc<WalletLedger>,
    registry: Arc<ToolRegistry>,
    escrow: Arc<EscrowEngine>,
    log: Arc<TransactionLog>,
    platform_fee_fraction: f64,
    default_buffer_fraction: f64,
    fee_wallet_id: String,
    timeouts: TimeoutScheduler,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<IdentityRegistry>,
        ledger: Arc<WalletLedger>,
        registry: Arc<ToolRegistry>,
        escrow: Arc<EscrowEngine>,
        log: Arc<TransactionLog>,
        platform_fee_fraction: f64,
        default_buffer_fraction: f64,
        fee_wallet_id: String,
    ) -> Self {
        Self {
            tasks: EntityStore::new(),
            identity,
            ledger,
            registry,
            escrow,
            log,
            platform_fee_fraction,
            default_buffer_fraction,
            fee_wallet_id,
            timeouts: TimeoutScheduler::new(),
        }
    }

    pub fn get(&self, task_id: &str) -> Result<Task, CoreError> {
        self.tasks
            .snapshot(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()).into())
    }

    /// `create(task_params)`.
    pub fn create(&self, clock: &dyn Clock, request: CreateTaskRequest) -> Result<Task, CoreError> {
        if !self.identity.is_active(&request.from_agent_id) {
            return Err(OrchestratorError::AgentNotActive(request.from_agent_id).into());
        }
        if !self.identity.is_active(&request.to_agent_id) {
            return Err(OrchestratorError::AgentNotActive(request.to_agent_id).into());
        }

        let manifest = self.registry.get_tool(&request.tool_name)?;
        let amount = request.amount_override.unwrap_or(manifest.pricing().amount);
        let asset = request
            .asset_override
            .clone()
            .unwrap_or_else(|| manifest.pricing().asset.clone());

        let fee = mul_frac_round(amount, self.platform_fee_fraction);
        let total_required = amount + fee;

        let payer_wallet = self
            .ledger
            .wallet_id_for_agent(&request.from_agent_id)
            .ok_or_else(|| CoreError::NotFound(format!("wallet for agent {}", request.from_agent_id)))?;
        let available = self.ledger.get_balance(&payer_wallet, &asset)?;
        if available < total_required {
            return Err(CoreError::InsufficientBalance {
                required: total_required,
                available,
            });
        }

        let task_id = new_id();
        let buffer = request
            .options
            .escrow_buffer_percent
            .unwrap_or(self.default_buffer_fraction);
        let model = request.options.model.clone().unwrap_or_else(|| "default".to_string());
        let estimation_text = request.parameters.to_string();

        let escrow = self.escrow.create_escrow(
            clock,
            &request.from_agent_id,
            &request.to_agent_id,
            &asset,
            &estimation_text,
            &model,
            buffer,
            total_required,
            request.options.timeout_ms,
            Some(task_id.clone()),
        )?;

        let now_ms = clock.now_ms();
        let task = Task::new(
            task_id.clone(),
            request.from_agent_id.clone(),
            request.to_agent_id.clone(),
            request.tool_name,
            request.parameters,
            TaskPayment { amount, asset: asset.clone() },
            request.options,
            escrow.escrow_id().to_string(),
            fee,
            now_ms,
        );
        self.tasks.insert(task_id.clone(), task.clone());
        self.timeouts.schedule(task.expires_at(), task_id.clone());

        self.log.append(
            task_id.clone(),
            LogAction::Created,
            now_ms,
            format!("task created for tool {}", task.tool_name()),
            total_required,
            asset,
            request.from_agent_id,
            request.to_agent_id,
        );
        tracing::info!(task_id = %task_id, amount, fee, "task created");
        Ok(task)
    }

    /// `accept(actor_agent_id)`.
    pub fn accept(&self, clock: &dyn Clock, task_id: &str, actor_agent_id: &str) -> Result<Task, CoreError> {
        let snapshot = self.get(task_id)?;
        if snapshot.status() != TaskStatus::Pending {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                action: "accept",
            }
            .into());
        }
        if actor_agent_id != snapshot.to_agent_id() {
            return Err(OrchestratorError::NotAuthorized {
                actor: actor_agent_id.to_string(),
                action: "accept",
                task_id: task_id.to_string(),
            }
            .into());
        }
        let now_ms = clock.now_ms();
        if now_ms >= snapshot.expires_at() {
            return Err(OrchestratorError::TaskExpired(task_id.to_string()).into());
        }

        let task = self
            .tasks
            .with_mut(task_id, |task| {
                task.accept();
                task.clone()
            })
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        self.log.append(
            task_id,
            LogAction::Accepted,
            now_ms,
            "provider accepted",
            0,
            task.payment().asset.clone(),
            task.from_agent_id(),
            task.to_agent_id(),
        );
        tracing::info!(task_id, "task accepted");
        Ok(task)
    }

    /// `complete(actor_agent_id, result)`.
    pub fn complete(
        &self,
        clock: &dyn Clock,
        task_id: &str,
        actor_agent_id: &str,
        result: TaskResult,
    ) -> Result<Task, CoreError> {
        let snapshot = self.get(task_id)?;
        if snapshot.status() != TaskStatus::InProgress {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                action: "complete",
            }
            .into());
        }
        if actor_agent_id != snapshot.to_agent_id() {
            return Err(OrchestratorError::NotAuthorized {
                actor: actor_agent_id.to_string(),
                action: "complete",
                task_id: task_id.to_string(),
            }
            .into());
        }

        let escrow = self.escrow.get(snapshot.escrow_id()).map_err(CoreError::from)?;
        let failed = result.error.is_some();

        // On failure the provider earns nothing: refund the payer the *full*
        // lock, not just `amount + fee`, since the lock may exceed that
        // (the oracle's buffered estimate can run ahead of the nominal
        // price). `release(..., Payer, ...)` only ever credits the amount
        // passed in and zeroes the refund, so anything above `amount + fee`
        // would otherwise be debited from the payer at creation and never
        // credited anywhere.
        let total_due = if failed {
            self.escrow.cancel(snapshot.escrow_id(), "task failed").map_err(CoreError::from)?;
            escrow.locked_amount()
        } else {
            let total_due = match &result.token_usage {
                Some(usage) if usage.total_cost <= escrow.locked_amount() => usage.total_cost,
                _ => snapshot.payment().amount + snapshot.platform_fee(),
            };
            let release = self.escrow.release(snapshot.escrow_id(), total_due, ReleaseRecipient::Payee, false)?;

            if snapshot.platform_fee() > 0 {
                let payee_wallet = self
                    .ledger
                    .wallet_id_for_agent(snapshot.to_agent_id())
                    .ok_or_else(|| CoreError::NotFound(format!("wallet for agent {}", snapshot.to_agent_id())))?;
                let fee = snapshot.platform_fee().min(release.released_to_payee);
                self.ledger.debit(&payee_wallet, &snapshot.payment().asset, fee, snapshot.escrow_id())?;
                self.ledger.credit(&self.fee_wallet_id, &snapshot.payment().asset, fee, snapshot.escrow_id())?;
            }
            total_due
        };

        let now_ms = clock.now_ms();
        let task = self
            .tasks
            .with_mut(task_id, |task| {
                task.complete(result, now_ms, failed);
                task.clone()
            })
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        self.log.append(
            task_id,
            if failed { LogAction::Cancelled } else { LogAction::Completed },
            now_ms,
            format!("task {}", if failed { "failed" } else { "completed" }),
            total_due,
            task.payment().asset.clone(),
            task.from_agent_id(),
            task.to_agent_id(),
        );
        tracing::info!(task_id, total_due, failed, "task completed");
        Ok(task)
    }

    /// `cancel(actor_agent_id, reason)`.
    pub fn cancel(
        &self,
        clock: &dyn Clock,
        task_id: &str,
        actor_agent_id: &str,
        reason: &str,
    ) -> Result<Task, CoreError> {
        let snapshot = self.get(task_id)?;
        if !matches!(snapshot.status(), TaskStatus::Pending | TaskStatus::InProgress) {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                action: "cancel",
            }
            .into());
        }
        if actor_agent_id != snapshot.from_agent_id() {
            return Err(OrchestratorError::NotAuthorized {
                actor: actor_agent_id.to_string(),
                action: "cancel",
                task_id: task_id.to_string(),
            }
            .into());
        }

        self.escrow.cancel(snapshot.escrow_id(), reason).map_err(CoreError::from)?;

        let now_ms = clock.now_ms();
        let task = self
            .tasks
            .with_mut(task_id, |task| {
                task.cancel(now_ms);
                task.clone()
            })
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        self.log.append(
            task_id,
            LogAction::Cancelled,
            now_ms,
            reason,
            0,
            task.payment().asset.clone(),
            task.from_agent_id(),
            task.to_agent_id(),
        );
        tracing::info!(task_id, reason, "task cancelled");
        Ok(task)
    }

    /// `on_timeout()` for a single task. Idempotent: a task already
    /// in a terminal state is left untouched, matching the scheduler's
    /// "re-check current state on wake-up" rule.
    pub fn on_timeout(&self, clock: &dyn Clock, task_id: &str) -> Result<Task, CoreError> {
        let snapshot = self.get(task_id)?;
        if snapshot.status().is_terminal() {
            return Ok(snapshot);
        }

        self.escrow.expire(snapshot.escrow_id()).map_err(CoreError::from)?;

        let now_ms = clock.now_ms();
        let task = self
            .tasks
            .with_mut(task_id, |task| {
                task.expire(now_ms);
                task.clone()
            })
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        self.log.append(
            task_id,
            LogAction::Expired,
            now_ms,
            "task timed out",
            0,
            task.payment().asset.clone(),
            task.from_agent_id(),
            task.to_agent_id(),
        );
        tracing::warn!(task_id, "task expired");
        Ok(task)
    }

    /// Drive every task whose deadline has passed as of `clock.now_ms()`
    /// through [`Orchestrator::on_timeout`] ("a scheduler polls the
    /// heap"). Returns the tasks that were actually transitioned.
    pub fn process_timeouts(&self, clock: &dyn Clock) -> Vec<Task> {
        let due = self.timeouts.pop_due(clock.now_ms());
        due.into_iter()
            .filter_map(|task_id| self.on_timeout(clock, &task_id).ok())
            .collect()
    }
}
