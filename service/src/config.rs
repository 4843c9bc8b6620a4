use rand::RngCore;

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;
pub const DEFAULT_HASH_ITERATIONS: u32 = 100_000;
pub const DEFAULT_REDIS_MIN_IDLE: u32 = 4;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("`{0}` must be set")]
    Missing(&'static str),

    #[error("`{key}` is not a valid number: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Memory store when absent.
    pub redis_url: Option<String>,
    pub redis_min_idle: u32,
    pub token_secret: Vec<u8>,
    pub token_ttl_secs: i64,
    pub hash_iterations: u32,
}

impl ServiceConfig {
    /// Builds the config from any key lookup: the shuttle secret store in
    /// deployment, a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token_secret = match get("TOKEN_SECRET") {
            Some(secret) => secret.into_bytes(),
            None if get("ALLOW_EPHEMERAL_SECRET").as_deref() == Some("true") => {
                tracing::warn!("`TOKEN_SECRET` unset: issuing tokens with a throwaway secret");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
            None => return Err(ConfigError::Missing("TOKEN_SECRET")),
        };

        Ok(ServiceConfig {
            redis_url: get("REDIS_URL"),
            redis_min_idle: parse_or("REDIS_MIN_IDLE", get("REDIS_MIN_IDLE"), DEFAULT_REDIS_MIN_IDLE)?,
            token_secret,
            token_ttl_secs: parse_or("TOKEN_TTL_SECS", get("TOKEN_TTL_SECS"), DEFAULT_TOKEN_TTL_SECS)?,
            hash_iterations: parse_or(
                "PASSWORD_HASH_ITERATIONS",
                get("PASSWORD_HASH_ITERATIONS"),
                DEFAULT_HASH_ITERATIONS,
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("TOKEN_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.redis_url, None);
        assert_eq!(config.token_secret, b"s3cret".to_vec());
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.hash_iterations, DEFAULT_HASH_ITERATIONS);
        assert_eq!(config.redis_min_idle, DEFAULT_REDIS_MIN_IDLE);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(
            config(&[("REDIS_URL", "redis://localhost")]).unwrap_err(),
            ConfigError::Missing("TOKEN_SECRET")
        );
    }

    #[test]
    fn ephemeral_secret_when_allowed() {
        let config = config(&[("ALLOW_EPHEMERAL_SECRET", "true")]).unwrap();
        assert_eq!(config.token_secret.len(), 32);
    }

    #[test]
    fn numbers_are_validated() {
        let err = config(&[("TOKEN_SECRET", "s"), ("TOKEN_TTL_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: "TOKEN_TTL_SECS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("TOKEN_SECRET", "s"), ("REDIS_URL", "  ")]).unwrap();
        assert_eq!(config.redis_url, None);
    }
}
