//! Configuration module
//!
//! Loads configuration from environment variables.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Currency;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub host: String,
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Base URL of the Frankfurter-compatible FX API
    pub fx_api_url: String,
    pub fx_timeout: Duration,

    /// Base URL of the Stripe-compatible payment gateway
    pub stripe_api_url: String,
    pub stripe_secret_key: String,
    pub gateway_timeout: Duration,

    pub ledger: LedgerSettings,
}

/// Business constants handed to the engines
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSettings {
    /// Bank code embedded in generated identifiers
    pub bank_code: String,
    pub swift_code: String,
    /// Reference price of the SUPER_USER upgrade
    pub feature_price: Decimal,
    pub feature_price_currency: Currency,
    /// Smallest top-up accepted, in gateway minor units
    pub topup_min_minor_units: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            bank_code: "RAXR".to_string(),
            swift_code: "RAXBANK".to_string(),
            feature_price: Decimal::new(2000, 2),
            feature_price_currency: Currency::Eur,
            topup_min_minor_units: 100,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;
        let stripe_secret_key =
            lookup("STRIPE_SECRET_KEY").ok_or(ConfigError::MissingEnv("STRIPE_SECRET_KEY"))?;

        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let defaults = LedgerSettings::default();
        let ledger = LedgerSettings {
            bank_code: or_default("BANK_CODE", &defaults.bank_code),
            swift_code: or_default("SWIFT_CODE", &defaults.swift_code),
            feature_price: parse(&or_default("FEATURE_PRICE", "20.00"), "FEATURE_PRICE")?,
            feature_price_currency: parse(
                &or_default("FEATURE_PRICE_CURRENCY", "EUR"),
                "FEATURE_PRICE_CURRENCY",
            )?,
            topup_min_minor_units: parse(
                &or_default("TOPUP_MIN_MINOR_UNITS", "100"),
                "TOPUP_MIN_MINOR_UNITS",
            )?,
        };

        if ledger.feature_price <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue("FEATURE_PRICE"));
        }
        if ledger.bank_code.len() != 4 || !ledger.bank_code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::InvalidValue("BANK_CODE"));
        }

        Ok(Self {
            database_url,
            database_max_connections: parse(
                &or_default("DATABASE_MAX_CONNECTIONS", "10"),
                "DATABASE_MAX_CONNECTIONS",
            )?,
            host: or_default("HOST", "127.0.0.1"),
            port: parse(&or_default("PORT", "3000"), "PORT")?,
            environment: or_default("ENVIRONMENT", "development"),
            fx_api_url: or_default("FX_API_URL", "https://api.frankfurter.app"),
            fx_timeout: Duration::from_secs(parse(&or_default("FX_TIMEOUT_SECS", "5"), "FX_TIMEOUT_SECS")?),
            stripe_api_url: or_default("STRIPE_API_URL", "https://api.stripe.com"),
            stripe_secret_key,
            gateway_timeout: Duration::from_secs(parse(
                &or_default("GATEWAY_TIMEOUT_SECS", "10"),
                "GATEWAY_TIMEOUT_SECS",
            )?),
            ledger,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse<T: FromStr>(raw: &str, key: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/raxbank"),
        ("STRIPE_SECRET_KEY", "sk_test_123"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.fx_timeout, Duration::from_secs(5));
        assert_eq!(config.fx_api_url, "https://api.frankfurter.app");
        assert_eq!(config.ledger, LedgerSettings::default());
        assert_eq!(config.ledger.feature_price, dec!(20.00));
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("STRIPE_SECRET_KEY")));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("PORT")));

        let mut vars = REQUIRED.to_vec();
        vars.push(("FEATURE_PRICE_CURRENCY", "SEK"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("FEATURE_PRICE_CURRENCY")));

        let mut vars = REQUIRED.to_vec();
        vars.push(("FEATURE_PRICE", "0"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("FEATURE_PRICE")));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("FEATURE_PRICE", "15.50"), ("FEATURE_PRICE_CURRENCY", "usd"), ("BANK_CODE", "ABCD")]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.ledger.feature_price, dec!(15.50));
        assert_eq!(config.ledger.feature_price_currency, Currency::Usd);
        assert_eq!(config.ledger.bank_code, "ABCD");
    }
}
