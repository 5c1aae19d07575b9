//! Fabric: the explicit global singleton.
//!
//! "Global singletons... are expressed as an explicit `Fabric` struct
//! constructed once via `Fabric::init(config)`... no ambient globals." One
//! `Fabric` wires C1–C8 together and is the single thing an embedding
//! binary (the `cli` crate, or an HTTP front-end) holds onto.

use std::sync::Arc;

use crate::core::config::Config;
use crate::core::ids::AgentId;
use crate::escrow::EscrowEngine;
use crate::identity::{IdentityRegistry, KeyEnvironment};
use crate::ledger::WalletLedger;
use crate::models::wallet::WalletType;
use crate::oracle::{StaticTokenCostOracle, TokenCostOracle};
use crate::orchestrator::Orchestrator;
use crate::persistence::TransactionLog;
use crate::ratelimit::RateLimiter;
use crate::registry::ToolRegistry;

/// Well-known owning agent id for the platform's own fee-collection wallet.
/// Not a real agent: never authenticates, never appears in `IdentityRegistry`.
pub const PLATFORM_FEE_AGENT_ID: &str = "platform";

/// Every component, wired per the fabric's dependency order
/// (`C8 ← C1 ← C2 ← C6 ← C7 ← C3 ← C4 ← C5`).
pub struct Fabric {
    pub identity: Arc<IdentityRegistry>,
    pub ledger: Arc<WalletLedger>,
    pub rate_limiter: Arc<RateLimiter>,
    pub registry: Arc<ToolRegistry>,
    pub oracle: Arc<dyn TokenCostOracle>,
    pub escrow: Arc<EscrowEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub log: Arc<TransactionLog>,
    pub config: Config,
    fee_wallet_id: String,
}

impl Fabric {
    /// Build every component and open the platform's fee wallet. Agents are
    /// minted with live-environment API keys (`sk_live_…`); use
    /// [`Fabric::init_with_environment`] for a test/demo fabric that mints
    /// `sk_test_…` keys instead.
    pub fn init(config: Config) -> Self {
        Self::init_with_environment(config, KeyEnvironment::Live)
    }

    pub fn init_with_environment(config: Config, key_environment: KeyEnvironment) -> Self {
        let identity = Arc::new(IdentityRegistry::new(key_environment));
        let ledger = Arc::new(WalletLedger::new());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_minute, config.rate_limit_day));
        let registry = Arc::new(ToolRegistry::new());

        // No live oracle endpoint configured: stand in with a static,
        // length-based estimator rather than leave the escrow engine
        // without a collaborator (the oracle contract allows for a concrete
        // HTTP client against `config.token_oracle_url` is the embedding
        // binary's job, out of scope for this crate).
        let oracle: Arc<dyn TokenCostOracle> = Arc::new(StaticTokenCostOracle::default());

        let escrow = Arc::new(EscrowEngine::new(Arc::clone(&ledger), Arc::clone(&oracle)));
        let log = Arc::new(TransactionLog::new());

        let fee_wallet_id = ledger.open_wallet(PLATFORM_FEE_AGENT_ID, WalletType::Custodial);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&identity),
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&escrow),
            Arc::clone(&log),
            config.platform_fee_fraction,
            config.escrow_buffer_fraction,
            fee_wallet_id.clone(),
        ));

        Self {
            identity,
            ledger,
            rate_limiter,
            registry,
            oracle,
            escrow,
            orchestrator,
            log,
            config,
            fee_wallet_id,
        }
    }

    /// Swap in a caller-supplied oracle (e.g. a live HTTP client, or a
    /// fixed-price stub for a CLI demo) instead of the length-based default.
    pub fn with_oracle(config: Config, key_environment: KeyEnvironment, oracle: Arc<dyn TokenCostOracle>) -> Self {
        let identity = Arc::new(IdentityRegistry::new(key_environment));
        let ledger = Arc::new(WalletLedger::new());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_minute, config.rate_limit_day));
        let registry = Arc::new(ToolRegistry::new());
        let escrow = Arc::new(EscrowEngine::new(Arc::clone(&ledger), Arc::clone(&oracle)));
        let log = Arc::new(TransactionLog::new());
        let fee_wallet_id = ledger.open_wallet(PLATFORM_FEE_AGENT_ID, WalletType::Custodial);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&identity),
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&escrow),
            Arc::clone(&log),
            config.platform_fee_fraction,
            config.escrow_buffer_fraction,
            fee_wallet_id.clone(),
        ));

        Self {
            identity,
            ledger,
            rate_limiter,
            registry,
            oracle,
            escrow,
            orchestrator,
            log,
            config,
            fee_wallet_id,
        }
    }

    pub fn fee_wallet_id(&self) -> &str {
        &self.fee_wallet_id
    }

    /// Open a wallet for a freshly created agent. The fabric does not open
    /// wallets automatically on `create_agent` — an agent may authenticate
    /// and browse tools before it ever needs to pay or be paid — so callers
    /// open one explicitly once the agent needs to hold a balance.
    pub fn open_wallet_for(&self, agent_id: &AgentId, wallet_type: WalletType) -> String {
        self.ledger.open_wallet(agent_id, wallet_type)
    }

    /// Drain in-flight work: fire every timeout already past its deadline
    /// so no escrow is left locked past `expires_at` purely because the
    /// process is about to exit ("a `shutdown()` that drains in-flight
    /// work"). Consumes `self` — a shut-down fabric is not reused.
    pub fn shutdown(self, clock: &dyn crate::core::time::Clock) -> Vec<crate::models::task::Task> {
        let expired = self.orchestrator.process_timeouts(clock);
        tracing::info!(count = expired.len(), "fabric shutdown: drained pending timeouts");
        expired
    }
}
