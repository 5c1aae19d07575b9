//! A2A Payment & Task Orchestration Fabric — core engine.
//!
//! Escrowed payments between autonomous agents: funds are locked against a
//! cost estimate, then released to the provider (or refunded to the payer)
//! as a task completes, is cancelled, or times out.
//!
//! # Architecture
//!
//! - **core**: ids, fixed-point money, clock, error taxonomy, configuration.
//! - **models**: domain types (Agent, Wallet, Escrow, Task, ToolManifest, …).
//! - **identity** (C1), **ledger** (C2), **oracle** (C3), **escrow** (C4),
//!   **orchestrator** (C5), **ratelimit** (C6), **registry** (C7),
//!   **persistence** (C8): one module per fabric component, in the
//!   dependency order `C8 ← C1 ← C2 ← C6 ← C7 ← C3 ← C4 ← C5`.
//! - **fabric**: the `Fabric` struct wiring every component into one
//!   constructed-once singleton.
//!
//! # Critical invariants
//!
//! 1. All monetary amounts are `i128` minor units; floats are only used for
//!    rates (buffer/fee fractions, reputation scores), never balances.
//! 2. Every public operation returns `Result<T, CoreError>` — no panics on
//!    the happy or the expected-failure path.
//! 3. Each entity id is serialized by its own `Mutex`, not a single global lock.

pub mod core;
pub mod escrow;
pub mod fabric;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod oracle;
pub mod orchestrator;
pub mod persistence;
pub mod ratelimit;
pub mod registry;

pub use core::{Clock, Config, CoreError, FixedClock, SystemClock};
pub use escrow::{EscrowEngine, EscrowError, ReleaseRecipient};
pub use fabric::Fabric;
pub use identity::{AuthError, IdentityRegistry, KeyEnvironment};
pub use ledger::{LedgerError, WalletLedger};
pub use oracle::{OracleError, TokenCostOracle};
pub use orchestrator::{CreateTaskRequest, Orchestrator, OrchestratorError};
pub use persistence::{EntityStore, TransactionLog};
pub use ratelimit::RateLimiter;
pub use registry::{RegistryError, ToolRegistry};
