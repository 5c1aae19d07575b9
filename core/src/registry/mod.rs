//! Tool Registry — core slice (C7).
//!
//! Lookup-only from the orchestrator's point of view: `get_tool` is the
//! single operation C5 calls. Registration and listing are an outer
//! component's job in the real system (a marketplace service); this slice
//! still exposes `register_tool`/`delete_tool` so tests and the CLI demo
//! can populate manifests without a second crate.

use thiserror::Error;

use crate::core::error::CoreError;
use crate::models::tool::ToolManifest;
use crate::persistence::EntityStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("tool not found: {0}")]
    NotFound(String),
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => CoreError::NotFound(format!("tool {name}")),
        }
    }
}

/// Authoritative, name-keyed tool manifest lookup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: EntityStore<ToolManifest>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: EntityStore::new(),
        }
    }

    /// Outer-component operation; the orchestrator never calls this.
    pub fn register_tool(&self, manifest: ToolManifest) {
        self.tools.insert(manifest.name().to_string(), manifest);
    }

    /// The orchestrator's only operation on this component.
    pub fn get_tool(&self, name: &str) -> Result<ToolManifest, RegistryError> {
        self.tools
            .snapshot(name)
            .filter(|tool| tool.is_active())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Outer-component operation: soft-delete, never a hard remove, so a
    /// stale task referencing the name by id still resolves (audit trail).
    pub fn delete_tool(&self, name: &str) -> Result<(), RegistryError> {
        self.tools
            .with_mut(name, |tool| tool.mark_deleted())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }
}
