//! Tool manifest: the authoritative record consulted when a task
//! references a tool by name (C7). Registration and listing are an
//! outer-component concern; the orchestrator only ever reads here.

use serde::{Deserialize, Serialize};

use crate::core::ids::AgentId;
use crate::core::money::MinorUnits;

/// How a tool's usage is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    /// Flat `amount` per invocation.
    PerCall,
    /// `amount` scaled by `token_multiplier` and actual token usage.
    PerToken,
    /// Out-of-band subscription; `amount` is informational only here.
    Subscription,
}

/// Pricing terms for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub model: PricingModel,
    pub amount: MinorUnits,
    pub token_multiplier: Option<f64>,
    pub asset: String,
}

/// HTTP method + URL + auth scheme the orchestrator would use to reach the
/// provider directly. In this fabric the provider agent calls `complete`
/// itself, so the endpoint is carried for completeness but never dialed
/// from inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEndpoint {
    pub url: String,
    pub method: String,
    pub auth_scheme: Option<String>,
}

/// Lifecycle of a [`ToolManifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Active,
    Deleted,
}

/// Author identity attached to a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAuthor {
    pub agent_id: AgentId,
}

/// The authoritative, pricing-bearing description of a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    name: String,
    author: ToolAuthor,
    endpoint: ToolEndpoint,
    pricing: Pricing,
    input_schema: serde_json::Value,
    status: ToolStatus,
}

impl ToolManifest {
    pub fn new(
        name: String,
        author: ToolAuthor,
        endpoint: ToolEndpoint,
        pricing: Pricing,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name,
            author,
            endpoint,
            pricing,
            input_schema,
            status: ToolStatus::Active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &ToolAuthor {
        &self.author
    }

    pub fn endpoint(&self) -> &ToolEndpoint {
        &self.endpoint
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    pub fn status(&self) -> ToolStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ToolStatus::Active
    }

    pub fn mark_deleted(&mut self) {
        self.status = ToolStatus::Deleted;
    }
}
