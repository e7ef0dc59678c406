//! Process configuration read from the environment (after `.env` is loaded).

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};

use crate::eligibility::{DEFAULT_COVERAGE_AMOUNT, DEFAULT_INCOME_THRESHOLD, EligibilityPolicy};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
    pub registry: RegistryConfig,
}

/// Policy knobs the services consult at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub eligibility: EligibilityPolicy,
    /// Candidates drawn before identifier issuance gives up.
    pub id_attempts: u32,
    pub default_family_size: i32,
    pub hospital_default_limit: i64,
    pub hospital_max_limit: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            eligibility: EligibilityPolicy::default(),
            id_attempts: 5,
            default_family_size: 4,
            hospital_default_limit: 10,
            hospital_max_limit: 100,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let registry = RegistryConfig {
            eligibility: EligibilityPolicy {
                income_threshold: parse_or(&lookup, "ELIGIBILITY_INCOME_THRESHOLD", DEFAULT_INCOME_THRESHOLD)?,
                default_coverage: parse_or(&lookup, "DEFAULT_COVERAGE_AMOUNT", DEFAULT_COVERAGE_AMOUNT)?,
            },
            id_attempts: parse_or(&lookup, "ID_GENERATION_ATTEMPTS", 5)?,
            default_family_size: parse_or(&lookup, "DEFAULT_FAMILY_SIZE", 4)?,
            hospital_default_limit: parse_or(&lookup, "HOSPITAL_SEARCH_DEFAULT_LIMIT", 10)?,
            hospital_max_limit: parse_or(&lookup, "HOSPITAL_SEARCH_MAX_LIMIT", 100)?,
        };

        if registry.id_attempts < 2 {
            bail!("ID_GENERATION_ATTEMPTS must allow at least one retry (>= 2)");
        }
        if !(registry.eligibility.income_threshold >= 0.0 && registry.eligibility.default_coverage >= 0.0) {
            bail!("eligibility threshold and coverage amount must be non-negative numbers");
        }
        if registry.default_family_size < 1 {
            bail!("DEFAULT_FAMILY_SIZE must be at least 1");
        }
        if registry.hospital_default_limit < 1 || registry.hospital_max_limit < registry.hospital_default_limit {
            bail!("hospital search limits must satisfy 1 <= default <= max");
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "health_registration.db".to_string()),
            host: lookup("BIND_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 5000)?,
            pool_size: parse_or(&lookup, "DB_POOL_SIZE", 8)?,
            registry,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key} ({raw:?}): {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, "health_registration.db");
        assert_eq!(config.port, 5000);
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "/tmp/reg.db"),
            ("PORT", "8080"),
            ("ELIGIBILITY_INCOME_THRESHOLD", "250000"),
            ("ID_GENERATION_ATTEMPTS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "/tmp/reg.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.registry.eligibility.income_threshold, 250_000.0);
        assert_eq!(config.registry.id_attempts, 3);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn single_attempt_is_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("ID_GENERATION_ATTEMPTS", "1")])).is_err());
    }
}
