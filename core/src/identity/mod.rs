//! Identity & Credentials (C1).
//!
//! Generates, hashes, and verifies API keys, and owns the `Agent` entity
//! store. This is the first non-leaf component in the dependency order of
//! the dependency chain (`C8 ← C1 ← ...`): it only depends on [`crate::persistence`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::error::CoreError;
use crate::core::ids::{new_id, AgentId};
use crate::core::time::Clock;
use crate::models::agent::{Agent, AgentStatus};
use crate::persistence::EntityStore;

/// Which key prefix [`IdentityRegistry::create_agent`] stamps onto freshly
/// generated keys (`sk_live_…` or `sk_test_…`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEnvironment {
    Live,
    Test,
}

impl KeyEnvironment {
    fn prefix(self) -> &'static str {
        match self {
            KeyEnvironment::Live => "sk_live_",
            KeyEnvironment::Test => "sk_test_",
        }
    }
}

/// Component-level failures for C1, converted to [`CoreError`] at the
/// orchestration boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("agent suspended: {0}")]
    AgentSuspended(String),
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential => CoreError::Unauthorized("invalid credential".into()),
            AuthError::AgentNotFound(id) => CoreError::NotFound(format!("agent {id}")),
            AuthError::AgentSuspended(id) => {
                CoreError::Forbidden(format!("agent {id} is suspended"))
            }
        }
    }
}

/// Application-wide pepper mixed into every key hash. Fixed (not per-agent)
/// so `validate_api_key` can still hash-and-look-up without first knowing
/// which agent it's authenticating — a per-record salt would defeat the
/// full-table hash index the spec requires.
const API_KEY_SALT: &str = "a2a-fabric/api-key/v1";

/// Salted SHA-256 hash of an API key. Stateless; exposed so callers (tests,
/// the escrow fee wallet bootstrap) can compute a hash without touching the
/// registry.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(API_KEY_SALT.as_bytes());
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh 32-byte random key, hex-encoded and stamped with the
/// environment prefix. Two `uuid::Uuid::new_v4()` draws supply the 32
/// bytes of randomness — `uuid`'s v4 generator is itself backed by a CSPRNG
/// (`getrandom`), so this needs no extra dependency beyond what the
/// fabric's id generation already uses.
fn generate_raw_api_key(environment: KeyEnvironment) -> String {
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(a.as_bytes());
    bytes.extend_from_slice(b.as_bytes());
    format!("{}{}", environment.prefix(), hex::encode(bytes))
}

/// Owns every [`Agent`] and the hash-indexed lookup `validate_api_key` needs.
pub struct IdentityRegistry {
    environment: KeyEnvironment,
    agents: EntityStore<Agent>,
    /// `api_key_hash -> agent_id`. A plain full-table index, not a
    /// prefix-filtered one ("the lookup must be over the full table").
    by_key_hash: Mutex<BTreeMap<String, AgentId>>,
}

impl IdentityRegistry {
    pub fn new(environment: KeyEnvironment) -> Self {
        Self {
            environment,
            agents: EntityStore::new(),
            by_key_hash: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a new agent and mint its raw API key. The raw key is
    /// returned exactly once; only its hash is ever persisted.
    pub fn create_agent(
        &self,
        clock: &dyn Clock,
        name: String,
        owner_id: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> (Agent, String) {
        let agent_id = new_id();
        let raw_key = generate_raw_api_key(self.environment);
        let key_hash = hash_api_key(&raw_key);
        let now_ms = clock.now_ms();

        let agent = Agent::new(
            agent_id.clone(),
            name,
            owner_id,
            description,
            tags,
            key_hash.clone(),
            now_ms,
        );

        self.agents.insert(agent_id.clone(), agent.clone());
        self.by_key_hash
            .lock()
            .expect("key hash index poisoned")
            .insert(key_hash, agent_id);

        (agent, raw_key)
    }

    /// Hash `raw` and look it up in the full key-hash index; fails closed
    /// on any mismatch, missing agent, or suspension.
    pub fn validate_api_key(&self, raw: &str) -> Result<Agent, AuthError> {
        let key_hash = hash_api_key(raw);
        let agent_id = {
            let index = self.by_key_hash.lock().expect("key hash index poisoned");
            index.get(&key_hash).cloned()
        }
        .ok_or(AuthError::InvalidCredential)?;

        let agent = self
            .agents
            .snapshot(&agent_id)
            .ok_or_else(|| AuthError::AgentNotFound(agent_id.clone()))?;

        if agent.status() == AgentStatus::Suspended {
            return Err(AuthError::AgentSuspended(agent_id));
        }
        Ok(agent)
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<Agent, AuthError> {
        self.agents
            .snapshot(agent_id)
            .ok_or_else(|| AuthError::AgentNotFound(agent_id.to_string()))
    }

    /// True only for an existing, `Active` agent — the guard the orchestrator
    /// applies before escrowing funds against payer or payee.
    pub fn is_active(&self, agent_id: &str) -> bool {
        self.agents
            .snapshot(agent_id)
            .map(|a| a.status() == AgentStatus::Active)
            .unwrap_or(false)
    }

    /// Clamp and persist a new reputation score ("no other validation").
    pub fn update_reputation(
        &self,
        clock: &dyn Clock,
        agent_id: &str,
        score: f64,
    ) -> Result<Agent, AuthError> {
        let now_ms = clock.now_ms();
        self.agents
            .with_mut(agent_id, |agent| {
                agent.update_reputation(score, now_ms);
                agent.clone()
            })
            .ok_or_else(|| AuthError::AgentNotFound(agent_id.to_string()))
    }

    pub fn set_status(
        &self,
        clock: &dyn Clock,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<Agent, AuthError> {
        let now_ms = clock.now_ms();
        self.agents
            .with_mut(agent_id, |agent| {
                agent.set_status(status, now_ms);
                agent.clone()
            })
            .ok_or_else(|| AuthError::AgentNotFound(agent_id.to_string()))
    }
}
