//! Process configuration read from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

const DEV_JWT_SECRET: &str = "labtrack-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Which persistence backend to wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    /// Zero disables the permission cache.
    pub permission_cache_ttl: std::time::Duration,
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub seed_demo_data: bool,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("permission_cache_ttl", &self.permission_cache_ttl)
            .field("bind_addr", &self.bind_addr)
            .field("backend", &self.backend)
            .field("seed_demo_data", &self.seed_demo_data)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dev_mode = flag(&lookup, "LABTRACK_DEV")?.unwrap_or(false);

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let session_ttl_secs = number(&lookup, "SESSION_TTL_SECS")?.unwrap_or(3600);
        if session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        let session_ttl = i64::try_from(session_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                reason: "out of range".to_string(),
            })?;

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8000)),
        };

        let backend = if flag(&lookup, "USE_PERSISTENT_STORES")?.unwrap_or(false) {
            let database_url = lookup("DATABASE_URL")
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory
        };

        // Cache invalidation is per process; a shared database can be edited
        // by other replicas, so persistent stores re-read grants by default.
        let default_cache_ttl = match backend {
            StoreBackend::InMemory => 30,
            StoreBackend::Postgres { .. } => 0,
        };
        let permission_cache_ttl = std::time::Duration::from_secs(
            number(&lookup, "PERMISSION_CACHE_TTL_SECS")?.unwrap_or(default_cache_ttl),
        );

        let seed_demo_data = flag(&lookup, "SEED_DEMO_DATA")?
            .unwrap_or(matches!(backend, StoreBackend::InMemory));

        Ok(Self {
            jwt_secret,
            session_ttl,
            permission_cache_ttl,
            bind_addr,
            backend,
            seed_demo_data,
        })
    }
}

fn flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn number<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}
