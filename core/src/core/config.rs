//! Environment-based configuration.
//!
//! The fabric reads a small, fixed set of environment variables (bit-exact
//! names, matching the operator-facing contract) rather than parsing a
//! config file or framework: a direct `std::env::var` read per variable,
//! parsed and range-checked at load time.

use crate::core::error::CoreError;
use std::env;

/// Fabric-wide configuration loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Fraction of `payment.amount` diverted to the platform fee wallet on release.
    pub platform_fee_fraction: f64,

    /// Fraction added to an estimated cost when locking escrow. Clamped to `[0, 0.5]`.
    pub escrow_buffer_fraction: f64,

    /// Default escrow/task timeout, used when a task does not specify `options.timeout_ms`.
    pub escrow_timeout: std::time::Duration,

    /// Requests allowed per identity per rolling 60s window.
    pub rate_limit_minute: u32,

    /// Requests allowed per identity per UTC calendar day.
    pub rate_limit_day: u32,

    /// Base URL of the token cost oracle. Empty disables the live oracle.
    pub token_oracle_url: String,

    /// API key presented to the token cost oracle.
    pub token_oracle_api_key: String,
}

impl Config {
    /// Environment variable names, exactly as specified.
    pub const ENV_PLATFORM_FEE_PERCENT: &'static str = "PLATFORM_FEE_PERCENT";
    pub const ENV_ESCROW_BUFFER_PERCENTAGE: &'static str = "ESCROW_BUFFER_PERCENTAGE";
    pub const ENV_ESCROW_TIMEOUT_MINUTES: &'static str = "ESCROW_TIMEOUT_MINUTES";
    pub const ENV_RATE_LIMIT_MINUTE: &'static str = "RATE_LIMIT_MINUTE";
    pub const ENV_RATE_LIMIT_DAY: &'static str = "RATE_LIMIT_DAY";
    pub const ENV_TOKEN_ORACLE_URL: &'static str = "TOKEN_ORACLE_URL";
    pub const ENV_TOKEN_ORACLE_API_KEY: &'static str = "TOKEN_ORACLE_API_KEY";

    /// Build the default configuration (the documented defaults).
    ///
    /// # Example
    /// ```
    /// use a2a_fabric_core::core::config::Config;
    ///
    /// let config = Config::defaults();
    /// assert_eq!(config.platform_fee_fraction, 0.025);
    /// assert_eq!(config.rate_limit_minute, 20);
    /// ```
    pub fn defaults() -> Self {
        Self {
            platform_fee_fraction: 0.025,
            escrow_buffer_fraction: 0.15,
            escrow_timeout: std::time::Duration::from_secs(60 * 60),
            rate_limit_minute: 20,
            rate_limit_day: 1000,
            token_oracle_url: String::new(),
            token_oracle_api_key: String::new(),
        }
    }

    /// Load configuration from the process environment, falling back to
    /// [`Config::defaults`] for any variable that is unset.
    ///
    /// Returns [`CoreError::Validation`] if a variable is set but cannot be
    /// parsed, or parses to a value outside its documented range.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::defaults();

        let platform_fee_fraction = parse_percent_env(
            Self::ENV_PLATFORM_FEE_PERCENT,
            defaults.platform_fee_fraction,
        )?;
        let escrow_buffer_fraction = parse_percent_env(
            Self::ENV_ESCROW_BUFFER_PERCENTAGE,
            defaults.escrow_buffer_fraction,
        )?;
        if !(0.0..=0.5).contains(&escrow_buffer_fraction) {
            return Err(CoreError::Validation(format!(
                "{} must be within [0, 50], got {}",
                Self::ENV_ESCROW_BUFFER_PERCENTAGE,
                escrow_buffer_fraction * 100.0
            )));
        }

        let escrow_timeout_minutes = parse_env(
            Self::ENV_ESCROW_TIMEOUT_MINUTES,
            defaults.escrow_timeout.as_secs() / 60,
        )?;
        let rate_limit_minute = parse_env(Self::ENV_RATE_LIMIT_MINUTE, defaults.rate_limit_minute)?;
        let rate_limit_day = parse_env(Self::ENV_RATE_LIMIT_DAY, defaults.rate_limit_day)?;

        Ok(Self {
            platform_fee_fraction,
            escrow_buffer_fraction,
            escrow_timeout: std::time::Duration::from_secs(escrow_timeout_minutes * 60),
            rate_limit_minute,
            rate_limit_day,
            token_oracle_url: env::var(Self::ENV_TOKEN_ORACLE_URL)
                .unwrap_or_else(|_| defaults.token_oracle_url.clone()),
            token_oracle_api_key: env::var(Self::ENV_TOKEN_ORACLE_API_KEY)
                .unwrap_or_else(|_| defaults.token_oracle_api_key.clone()),
        })
    }
}

/// Parse an env var holding a percentage (e.g. `"2.5"`) into a fraction (`0.025`).
/// Falls back to `default_fraction` if the variable is unset.
fn parse_percent_env(name: &str, default_fraction: f64) -> Result<f64, CoreError> {
    match env::var(name) {
        Err(_) => Ok(default_fraction),
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(|percent| percent / 100.0)
            .map_err(|_| CoreError::Validation(format!("{name} is not a valid number: {raw:?}"))),
    }
}

/// Parse a generic numeric env var, falling back to `default` if unset.
fn parse_env<T>(name: &str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| CoreError::Validation(format!("{name} is not a valid number: {raw:?}"))),
    }
}
