//! Ledger configuration, read from `PL_*` environment variables.
//!
//! Optional settings that are missing or malformed fall back to their defaults with a warning. The payment webhook
//! secret has no sensible default, so a missing secret is an error.
use std::env;

use chrono::Duration;
use log::*;
use pl_common::{helpers::parse_number, MinorUnits, Secret};
use thiserror::Error;

use crate::pricing::{
    FeePolicy,
    PricingPolicy,
    DEFAULT_COLOR_RATE,
    DEFAULT_LARGE_MULTIPLIER,
    DEFAULT_MONOCHROME_RATE,
    DEFAULT_PLATFORM_FEE_BPS,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/print_ledger.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_PICKUP_CODE_TTL: Duration = Duration::minutes(5);
pub const DEFAULT_ARTIFACT_RETENTION: Duration = Duration::days(90);
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::minutes(1);
/// Configured durations longer than this are rejected, so that timestamps derived from them stay in range.
pub const MAX_CONFIGURED_DURATION: Duration = Duration::days(36_500);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PL_PAYMENT_WEBHOOK_SECRET is not set. Webhooks cannot be authenticated without it.")]
    MissingWebhookSecret,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Shared secret that the payment gateway presents on every webhook call.
    pub payment_webhook_secret: Secret<String>,
    pub pickup_code_ttl: Duration,
    pub pricing: PricingPolicy,
    pub fees: FeePolicy,
    /// Completed and cancelled jobs keep their artifact for this long.
    pub artifact_retention: Duration,
    /// How often the maintenance worker purges expired codes and stale artifacts.
    pub maintenance_interval: Duration,
}

impl LedgerConfig {
    /// A configuration with every default and the given webhook secret.
    pub fn with_secret<S: Into<String>>(secret: S) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            payment_webhook_secret: Secret::new(secret.into()),
            pickup_code_ttl: DEFAULT_PICKUP_CODE_TTL,
            pricing: PricingPolicy::default(),
            fees: FeePolicy::default(),
            artifact_retention: DEFAULT_ARTIFACT_RETENTION,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env` uses the process environment.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where F: Fn(&str) -> Option<String> {
        let secret = lookup("PL_PAYMENT_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty());
        let Some(secret) = secret else {
            error!("🪛️ PL_PAYMENT_WEBHOOK_SECRET is not set. Refusing to start without a webhook secret.");
            return Err(ConfigError::MissingWebhookSecret);
        };
        let database_url = lookup("PL_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ PL_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = number_or(&lookup, "PL_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let ttl_secs = number_or(&lookup, "PL_PICKUP_CODE_TTL_SECS", DEFAULT_PICKUP_CODE_TTL.num_seconds());
        let fee_bps = number_or(&lookup, "PL_PLATFORM_FEE_BPS", DEFAULT_PLATFORM_FEE_BPS);
        if !(0..=10_000).contains(&fee_bps) {
            warn!("🪛️ PL_PLATFORM_FEE_BPS={fee_bps} is outside 0..=10000 and will be clamped.");
        }
        let mono = number_or(&lookup, "PL_MONO_RATE", DEFAULT_MONOCHROME_RATE);
        let color = number_or(&lookup, "PL_COLOR_RATE", DEFAULT_COLOR_RATE);
        let large = number_or(&lookup, "PL_LARGE_MULTIPLIER", DEFAULT_LARGE_MULTIPLIER);
        let retention_days =
            number_or(&lookup, "PL_ARTIFACT_RETENTION_DAYS", DEFAULT_ARTIFACT_RETENTION.num_days());
        let interval_secs =
            number_or(&lookup, "PL_MAINTENANCE_INTERVAL_SECS", DEFAULT_MAINTENANCE_INTERVAL.num_seconds());
        Ok(Self {
            database_url,
            max_connections: max_connections.max(1),
            payment_webhook_secret: Secret::new(secret),
            pickup_code_ttl: duration_or(
                "PL_PICKUP_CODE_TTL_SECS",
                ttl_secs,
                Duration::try_seconds,
                DEFAULT_PICKUP_CODE_TTL,
            ),
            pricing: PricingPolicy::new(MinorUnits::from(mono.max(0)), MinorUnits::from(color.max(0)), large.max(1)),
            fees: FeePolicy::from_bps(fee_bps),
            artifact_retention: duration_or(
                "PL_ARTIFACT_RETENTION_DAYS",
                retention_days,
                Duration::try_days,
                DEFAULT_ARTIFACT_RETENTION,
            ),
            maintenance_interval: duration_or(
                "PL_MAINTENANCE_INTERVAL_SECS",
                interval_secs,
                Duration::try_seconds,
                DEFAULT_MAINTENANCE_INTERVAL,
            ),
        })
    }
}

fn number_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    match parse_number::<T>(lookup(key)) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(raw) => {
            warn!("🪛️ {raw} is not a valid value for {key}. Using the default, {default}, instead.");
            default
        },
    }
}

fn duration_or(key: &str, value: i64, to_duration: fn(i64) -> Option<Duration>, default: Duration) -> Duration {
    if value <= 0 {
        warn!("🪛️ {key} must be positive. Using the default, {default}, instead of {value}.");
        return default;
    }
    match to_duration(value) {
        Some(duration) if duration <= MAX_CONFIGURED_DURATION => duration,
        _ => {
            warn!("🪛️ {key}={value} is too large. Using the default, {default}, instead.");
            default
        },
    }
}
