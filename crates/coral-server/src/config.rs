//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use coral_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite file holding the contribution ledger.
    /// Env: `LEDGER_PATH`
    /// Default: `./coral-ledger.db`
    pub ledger_path: PathBuf,

    /// Optional JSON file replacing the built-in level table.
    /// Env: `LEVEL_TABLE_PATH`
    /// Default: unset (built-in five tiers).
    pub level_table_path: Option<PathBuf>,

    /// Bearer token for /admin/* endpoints (corrections, reconcile).
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Largest leaderboard page a caller may request.
    /// Env: `MAX_TOP_K`
    /// Default: `100`
    pub max_top_k: usize,

    /// How often idle per-user award slots are dropped, in seconds.
    /// Env: `SLOT_PURGE_INTERVAL_SECS`
    /// Default: `300`
    pub slot_purge_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            ledger_path: PathBuf::from("./coral-ledger.db"),
            level_table_path: None,
            admin_token: None,
            max_top_k: 100,
            slot_purge_interval_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("LEVEL_TABLE_PATH") {
            if !path.trim().is_empty() {
                config.level_table_path = Some(PathBuf::from(path));
            }
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(val) = lookup("MAX_TOP_K") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_top_k = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_TOP_K, using default"),
            }
        }

        if let Some(val) = lookup("SLOT_PURGE_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.slot_purge_interval_secs = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid SLOT_PURGE_INTERVAL_SECS, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.admin_token.is_none());
        assert_eq!(config.max_top_k, 100);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("LEDGER_PATH", "/var/lib/coral/ledger.db"),
            ("ADMIN_TOKEN", "s3cret"),
            ("MAX_TOP_K", "25"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.ledger_path, PathBuf::from("/var/lib/coral/ledger.db"));
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.max_top_k, 25);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("MAX_TOP_K", "0"),
            ("ADMIN_TOKEN", ""),
            ("LEVEL_TABLE_PATH", " "),
        ]);
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.max_top_k, 100);
        assert!(config.admin_token.is_none());
        assert!(config.level_table_path.is_none());
    }
}
