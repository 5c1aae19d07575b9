//! Token Cost Oracle client (C3).
//!
//! A pure request/response client to an external token-counting/pricing
//! service. The core never implements the oracle itself — callers provide
//! a [`TokenCostOracle`] trait object, because the oracle genuinely lives
//! outside this process.

use thiserror::Error;

use crate::core::error::CoreError;
use crate::core::money::MinorUnits;

/// Component-level failure for C3: every call is either a timing-insensitive
/// success or a transient failure (`UpstreamUnavailable`, retryable).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("token cost oracle unavailable: {0}")]
    Unavailable(String),
}

impl From<OracleError> for CoreError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Unavailable(msg) => CoreError::UpstreamUnavailable(msg),
        }
    }
}

/// The oracle's answer to "how much will this (text, model) pair cost?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    pub prompt_tokens: u64,
    pub completion_tokens: Option<u64>,
    pub total_tokens: u64,
    /// Minor units of `asset` per token.
    pub unit_price: MinorUnits,
}

/// External token-counting/pricing collaborator.
///
/// Implementations talk to the real model-catalog service over HTTP; the
/// core only depends on this trait, never a concrete client, so it can be
/// swapped or mocked without touching escrow/orchestrator logic.
pub trait TokenCostOracle: Send + Sync {
    /// Estimate prompt + completion tokens and unit price for `(text, model)`.
    fn estimate(&self, text: &str, model: &str) -> Result<TokenEstimate, OracleError>;

    /// Compute the cost of a known token split, e.g. to re-price actual
    /// usage reported by a provider at `complete` time.
    fn cost(
        &self,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<MinorUnits, OracleError>;
}

/// Apply the escrow buffer to a token estimate:
/// `escrow_total = ceil(total_tokens * (1 + buffer)) * unit_price`.
///
/// # Example
/// ```
/// use a2a_fabric_core::oracle::{apply_escrow_buffer, TokenEstimate};
///
/// let estimate = TokenEstimate {
///     prompt_tokens: 80,
///     completion_tokens: Some(20),
///     total_tokens: 100,
///     unit_price: 10,
/// };
/// // ceil(100 * 1.15) * 10 = ceil(115) * 10 = 1150
/// assert_eq!(apply_escrow_buffer(&estimate, 0.15), 1150);
/// ```
pub fn apply_escrow_buffer(estimate: &TokenEstimate, buffer: f64) -> MinorUnits {
    let buffered_tokens = ((estimate.total_tokens as f64) * (1.0 + buffer)).ceil() as i128;
    buffered_tokens * estimate.unit_price
}

/// A fixed-price-per-model oracle that estimates tokens from text length.
///
/// Stands in for the real model-catalog service in tests and the CLI demo.
/// Token counting here is a crude `len(text) / 4` heuristic (the common
/// rule-of-thumb ratio for English text); real accuracy is the external
/// oracle's job, not this crate's.
pub struct StaticTokenCostOracle {
    default_unit_price: MinorUnits,
    unit_prices: std::collections::BTreeMap<String, MinorUnits>,
}

impl Default for StaticTokenCostOracle {
    fn default() -> Self {
        Self {
            default_unit_price: 1,
            unit_prices: std::collections::BTreeMap::new(),
        }
    }
}

impl StaticTokenCostOracle {
    pub fn new(default_unit_price: MinorUnits) -> Self {
        Self {
            default_unit_price,
            unit_prices: std::collections::BTreeMap::new(),
        }
    }

    pub fn with_model_price(mut self, model: impl Into<String>, unit_price: MinorUnits) -> Self {
        self.unit_prices.insert(model.into(), unit_price);
        self
    }

    fn price_for(&self, model: &str) -> MinorUnits {
        self.unit_prices
            .get(model)
            .copied()
            .unwrap_or(self.default_unit_price)
    }
}

impl TokenCostOracle for StaticTokenCostOracle {
    fn estimate(&self, text: &str, model: &str) -> Result<TokenEstimate, OracleError> {
        let prompt_tokens = ((text.len() as u64) / 4).max(1);
        Ok(TokenEstimate {
            prompt_tokens,
            completion_tokens: None,
            total_tokens: prompt_tokens,
            unit_price: self.price_for(model),
        })
    }

    fn cost(
        &self,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<MinorUnits, OracleError> {
        let total = prompt_tokens + completion_tokens;
        Ok((total as i128) * self.price_for(model))
    }
}

/// A `TokenCostOracle` that always fails, for exercising the
/// `payment.amount`-fallback path the orchestrator takes on oracle failure
/// ("If the oracle is unreachable... logged but not fatal").
#[derive(Debug, Default)]
pub struct UnavailableTokenCostOracle;

impl TokenCostOracle for UnavailableTokenCostOracle {
    fn estimate(&self, _text: &str, _model: &str) -> Result<TokenEstimate, OracleError> {
        Err(OracleError::Unavailable("oracle unreachable".into()))
    }

    fn cost(&self, _model: &str, _prompt_tokens: u64, _completion_tokens: u64) -> Result<MinorUnits, OracleError> {
        Err(OracleError::Unavailable("oracle unreachable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_oracle_estimates_from_text_length() {
        let oracle = StaticTokenCostOracle::new(5);
        let estimate = oracle.estimate("a".repeat(40).as_str(), "gpt-x").unwrap();
        assert_eq!(estimate.prompt_tokens, 10);
        assert_eq!(estimate.unit_price, 5);
    }

    #[test]
    fn per_model_price_overrides_default() {
        let oracle = StaticTokenCostOracle::new(1).with_model_price("gpt-x", 20);
        let estimate = oracle.estimate("hello", "gpt-x").unwrap();
        assert_eq!(estimate.unit_price, 20);
        let fallback = oracle.estimate("hello", "unknown-model").unwrap();
        assert_eq!(fallback.unit_price, 1);
    }

    #[test]
    fn buffer_rounds_up_never_down() {
        let estimate = TokenEstimate {
            prompt_tokens: 1,
            completion_tokens: None,
            total_tokens: 1,
            unit_price: 100,
        };
        // ceil(1 * 1.15) = 2 -> 200, not 115.
        assert_eq!(apply_escrow_buffer(&estimate, 0.15), 200);
    }

    #[test]
    fn unavailable_oracle_surfaces_as_upstream_unavailable() {
        let oracle = UnavailableTokenCostOracle;
        let err = oracle.estimate("x", "m").unwrap_err();
        let core_err: CoreError = err.into();
        assert!(matches!(core_err, CoreError::UpstreamUnavailable(_)));
    }
}
