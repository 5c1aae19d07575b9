//! Identifier generation.
//!
//! Every entity id in the fabric is a UUIDv4 rendered as a string
//! (`uuid::Uuid::new_v4().to_string()`). Type aliases document intent at
//! call sites without introducing newtype ceremony the rest of the crate
//! doesn't need.

/// Opaque identifier for an [`crate::models::agent::Agent`].
pub type AgentId = String;

/// Opaque identifier for a [`crate::models::wallet::Wallet`].
pub type WalletId = String;

/// Opaque identifier for an [`crate::models::escrow::Escrow`].
pub type EscrowId = String;

/// Opaque identifier for a [`crate::models::task::Task`].
pub type TaskId = String;

/// Generate a fresh UUIDv4-based id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a fresh id with a readable prefix, e.g. `esc_3c9b...`.
pub fn new_prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
