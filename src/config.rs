use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Upper bound on `AUTH_TOKEN_EXPIRATION_MINUTES`: ten years.
pub const MAX_TOKEN_EXPIRATION_MINUTES: i64 = 60 * 24 * 365 * 10;

/// Settings consumed by the session issuer, authenticator and account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub token_expiration_minutes: i64,
    pub bcrypt_cost: u32,
    pub username_max_length: usize,
}

impl AuthConfig {
    /// Token lifetime, clamped to `0..=MAX_TOKEN_EXPIRATION_MINUTES`.
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(
            self.token_expiration_minutes
                .clamp(0, MAX_TOKEN_EXPIRATION_MINUTES),
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_expiration_minutes: 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            username_max_length: 32,
        }
    }
}

/// Settings consumed by the rate gate and its middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window.
    pub limit: u64,
    pub interval: Duration,
    /// Use the `Forwarded`/`X-Forwarded-For` address instead of the socket peer.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            interval: Duration::from_secs(60),
            trust_forwarded_for: false,
        }
    }
}

/// Process-wide configuration, built once in `main` and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub api_prefix: String,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to defaults for
    /// every optional setting.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_defaults = AuthConfig::default();
        let rate_defaults = RateLimitConfig::default();

        let api_prefix = lookup("API_PREFIX").unwrap_or_else(|| "api".to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            api_prefix: api_prefix.trim_start_matches('/').to_string(),
            auth: AuthConfig {
                token_expiration_minutes: at_most(
                    "AUTH_TOKEN_EXPIRATION_MINUTES",
                    positive(
                        "AUTH_TOKEN_EXPIRATION_MINUTES",
                        parse_or(
                            &lookup,
                            "AUTH_TOKEN_EXPIRATION_MINUTES",
                            auth_defaults.token_expiration_minutes,
                        )?,
                    )?,
                    MAX_TOKEN_EXPIRATION_MINUTES,
                )?,
                bcrypt_cost: bcrypt_cost(parse_or(
                    &lookup,
                    "BCRYPT_COST",
                    auth_defaults.bcrypt_cost,
                )?)?,
                username_max_length: positive(
                    "USERNAME_MAX_LENGTH",
                    parse_or(
                        &lookup,
                        "USERNAME_MAX_LENGTH",
                        auth_defaults.username_max_length,
                    )?,
                )?,
            },
            rate_limit: RateLimitConfig {
                limit: positive(
                    "RATE_LIMIT",
                    parse_or(&lookup, "RATE_LIMIT", rate_defaults.limit)?,
                )?,
                interval: Duration::from_secs(positive(
                    "RATE_LIMIT_INTERVAL_SECONDS",
                    parse_or(
                        &lookup,
                        "RATE_LIMIT_INTERVAL_SECONDS",
                        rate_defaults.interval.as_secs(),
                    )?,
                )?),
                trust_forwarded_for: parse_or(
                    &lookup,
                    "TRUST_FORWARDED_FOR",
                    rate_defaults.trust_forwarded_for,
                )?,
            },
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// Path every versioned API route is mounted under, e.g. `/api/v1`.
    pub fn api_base_path(&self) -> String {
        if self.api_prefix.is_empty() {
            "/v1".to_string()
        } else {
            format!("/{}/v1", self.api_prefix)
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn positive<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        })
    }
}

fn at_most<T>(var: &'static str, value: T, max: T) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if value <= max {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: format!("must be at most {}", max.to_string()),
        })
    }
}

fn bcrypt_cost(cost: u32) -> Result<u32, ConfigError> {
    // bcrypt accepts work factors 4 through 31
    if (4..=31).contains(&cost) {
        Ok(cost)
    } else {
        Err(ConfigError::Invalid {
            var: "BCRYPT_COST",
            value: cost.to_string(),
            reason: "must be between 4 and 31".into(),
        })
    }
}
