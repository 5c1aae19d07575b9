//! Agent identity record.
//!
//! An `Agent` is a software principal with credentials and exactly
//! one [`crate::models::wallet::Wallet`]. Only `name`, `status`, and
//! `reputation_score` mutate after registration; `agent_id` is immutable.

use serde::{Deserialize, Serialize};

use crate::core::ids::AgentId;

/// Lifecycle status of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Can authenticate, pay, and be paid.
    Active,
    /// Exists but cannot transact; not a terminal state.
    Inactive,
    /// Administratively frozen; `AgentSuspended` on every auth attempt.
    Suspended,
}

/// Floor and ceiling of [`Agent::reputation_score`].
pub const REPUTATION_MIN: f64 = 0.0;
pub const REPUTATION_MAX: f64 = 10.0;
/// Starting reputation for a freshly registered agent.
pub const REPUTATION_DEFAULT: f64 = 5.0;

/// A registered principal: identity plus authentication material.
///
/// The raw API key is never stored — only [`Agent::api_key_hash`], a salted
/// SHA-256 digest computed by [`crate::identity::hash_api_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    agent_id: AgentId,
    name: String,
    owner_id: String,
    description: Option<String>,
    tags: Vec<String>,
    api_key_hash: String,
    reputation_score: f64,
    status: AgentStatus,
    created_at: i64,
    updated_at: i64,
}

impl Agent {
    /// Construct a freshly registered agent. Called only by
    /// [`crate::identity::IdentityRegistry::create_agent`], which owns
    /// id and hash generation.
    pub fn new(
        agent_id: AgentId,
        name: String,
        owner_id: String,
        description: Option<String>,
        tags: Vec<String>,
        api_key_hash: String,
        now_ms: i64,
    ) -> Self {
        Self {
            agent_id,
            name,
            owner_id,
            description,
            tags,
            api_key_hash,
            reputation_score: REPUTATION_DEFAULT,
            status: AgentStatus::Active,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn api_key_hash(&self) -> &str {
        &self.api_key_hash
    }

    pub fn reputation_score(&self) -> f64 {
        self.reputation_score
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Rename the agent. Does not validate uniqueness — the caller's store does.
    pub fn rename(&mut self, name: String, now_ms: i64) {
        self.name = name;
        self.updated_at = now_ms;
    }

    pub fn set_status(&mut self, status: AgentStatus, now_ms: i64) {
        self.status = status;
        self.updated_at = now_ms;
    }

    /// Update reputation, clamped to `[REPUTATION_MIN, REPUTATION_MAX]`.
    ///
    /// # Example
    /// ```
    /// use a2a_fabric_core::models::agent::Agent;
    ///
    /// let mut agent = Agent::new(
    ///     "a1".into(), "bot".into(), "owner-1".into(), None, vec![], "hash".into(), 0,
    /// );
    /// agent.update_reputation(15.0, 100);
    /// assert_eq!(agent.reputation_score(), 10.0);
    /// agent.update_reputation(-3.0, 200);
    /// assert_eq!(agent.reputation_score(), 0.0);
    /// ```
    pub fn update_reputation(&mut self, score: f64, now_ms: i64) {
        self.reputation_score = score.clamp(REPUTATION_MIN, REPUTATION_MAX);
        self.updated_at = now_ms;
    }
}
