//! Environment-driven configuration for the relay host

use crate::session::OrphanPolicy;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_QUEUE_DEPTH: usize = 64;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid orphan policy '{0}' (expected 'leave_open' or 'finalize')")]
    InvalidOrphanPolicy(String),
}

/// Runtime settings of the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    pub orphan_policy: OrphanPolicy,
    /// Capacity of each session's inbound frame queue
    pub queue_depth: usize,
    /// Capacity of each session's notification broadcast buffer
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            orphan_policy: OrphanPolicy::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let orphan_policy = match lookup("UPSERT_RELAY_ORPHAN_POLICY") {
            Some(raw) => OrphanPolicy::parse(raw.trim())
                .ok_or(ConfigError::InvalidOrphanPolicy(raw))?,
            None => OrphanPolicy::default(),
        };

        Ok(Self {
            port: number(&lookup, "UPSERT_RELAY_PORT", DEFAULT_PORT),
            orphan_policy,
            queue_depth: number(&lookup, "UPSERT_RELAY_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH).max(1),
            broadcast_capacity: number(
                &lookup,
                "UPSERT_RELAY_BROADCAST_CAPACITY",
                DEFAULT_BROADCAST_CAPACITY,
            )
            .max(1),
        })
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid
fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, %default, "Ignoring unparsable setting");
        default
    })
}
