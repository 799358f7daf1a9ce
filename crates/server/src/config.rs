//! Environment driven configuration. A `.env` file is honored via `dotenvy`.

use std::{str::FromStr, time::Duration};

use services::services::{
    featured_limit::{DEFAULT_MAX_FEATURED, FeaturedCaps, LimiterOptions},
    sanity::SanityConfig,
};
use strum_macros::{Display, EnumString};
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DATABASE_URL: &str = "sqlite://club-content.db";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SIGNATURE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    Sqlite,
    Sanity,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub sanity: Option<SanityConfig>,
    pub webhook_secret: Option<String>,
    pub signature_tolerance_ms: Option<i64>,
    pub caps: FeaturedCaps,
    pub limiter: LimiterOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store_backend = parse_or(&get, "STORE_BACKEND", StoreBackend::Sqlite)?;

        let sanity = match get("SANITY_PROJECT_ID") {
            Some(project_id) => {
                let mut sanity = SanityConfig::new(
                    project_id,
                    get("SANITY_DATASET").unwrap_or_else(|| "production".to_string()),
                );
                if let Some(version) = get("SANITY_API_VERSION") {
                    sanity.api_version = version;
                }
                sanity.token = get("SANITY_TOKEN");
                sanity.api_host = get("SANITY_API_HOST");
                Some(sanity)
            }
            None if store_backend == StoreBackend::Sanity => {
                return Err(ConfigError::Missing("SANITY_PROJECT_ID"));
            }
            None => None,
        };

        let default_cap: usize = parse_or(&get, "FEATURED_MAX_DEFAULT", DEFAULT_MAX_FEATURED)?;
        if default_cap == 0 {
            return Err(ConfigError::Invalid {
                var: "FEATURED_MAX_DEFAULT",
                value: "0".to_string(),
            });
        }
        let mut caps = FeaturedCaps::new(default_cap);
        if let Some(raw) = get("FEATURED_MAX_OVERRIDES") {
            for (collection, cap) in parse_cap_overrides(&raw)? {
                caps = caps.with_override(collection, cap);
            }
        }

        let timeout_secs: u64 = parse_or(&get, "FEATURED_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let revision_guard: bool = parse_or(&get, "FEATURED_REVISION_GUARD", true)?;
        let tolerance: i64 = parse_or(
            &get,
            "SANITY_WEBHOOK_TOLERANCE_MS",
            DEFAULT_SIGNATURE_TOLERANCE_MS,
        )?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            store_backend,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            sanity,
            webhook_secret: get("SANITY_WEBHOOK_SECRET"),
            // 0 disables the freshness check
            signature_tolerance_ms: (tolerance > 0).then_some(tolerance),
            caps,
            limiter: LimiterOptions {
                timeout: Duration::from_secs(timeout_secs),
                revision_guard,
            },
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

/// Parse `news=4,gallery=6`
pub fn parse_cap_overrides(raw: &str) -> Result<Vec<(String, usize)>, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "FEATURED_MAX_OVERRIDES",
        value: raw.to_string(),
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (collection, cap) = entry.split_once('=').ok_or_else(invalid)?;
            let collection = collection.trim();
            let cap: usize = cap.trim().parse().map_err(|_| invalid())?;
            if collection.is_empty() || cap == 0 {
                return Err(invalid());
            }
            Ok((collection.to_string(), cap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.port, 3001);
        assert_eq!(config.caps.for_collection("news"), 4);
        assert!(config.limiter.revision_guard);
        assert!(config.sanity.is_none());
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_sanity_backend_requires_project() {
        let err = Config::from_lookup(lookup(&[("STORE_BACKEND", "sanity")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SANITY_PROJECT_ID"));

        let config = Config::from_lookup(lookup(&[
            ("STORE_BACKEND", "Sanity"),
            ("SANITY_PROJECT_ID", "abc123"),
            ("SANITY_TOKEN", "sk-token"),
        ]))
        .unwrap();
        let sanity = config.sanity.unwrap();
        assert_eq!(sanity.dataset, "production");
        assert_eq!(sanity.token.as_deref(), Some("sk-token"));
    }

    #[test]
    fn test_caps_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FEATURED_MAX_DEFAULT", "3"),
            ("FEATURED_MAX_OVERRIDES", "news=4, gallery=6"),
        ]))
        .unwrap();
        assert_eq!(config.caps.for_collection("news"), 4);
        assert_eq!(config.caps.for_collection("gallery"), 6);
        assert_eq!(config.caps.for_collection("players"), 3);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("FEATURED_MAX_DEFAULT", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(parse_cap_overrides("news").is_err());
        assert!(parse_cap_overrides("news=0").is_err());
        assert!(parse_cap_overrides("=3").is_err());
        assert!(parse_cap_overrides("").unwrap().is_empty());
    }
}
