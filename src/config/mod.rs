use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;

use crate::orchestrator::ScoringPolicy;

/// How risk scores are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScoringMode {
    /// 1.0 when any rule triggered, otherwise 0.0
    #[default]
    Binary,
    /// Additive weights capped at 1.0
    Weighted,
}

/// Fraud engine configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "fraudr")]
#[command(about = "Dynamic fraud rule engine and decision orchestrator")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "FRAUDR_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Postgres connection string (in-memory store if not set)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Minimum pooled database connections
    #[arg(long, default_value = "2", env = "FRAUDR_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum pooled database connections
    #[arg(long, default_value = "10", env = "FRAUDR_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Rule catalogue seeded into an empty rule store
    #[arg(long, default_value = "rules/default_rules.yaml", env = "FRAUDR_RULES_PATH")]
    pub rules_path: PathBuf,

    /// Append-only audit journal file (optional, replaces the store's audit log)
    #[arg(long, env = "FRAUDR_AUDIT_JOURNAL")]
    pub audit_journal_path: Option<PathBuf>,

    /// Risk scoring policy
    #[arg(long, value_enum, default_value = "binary", env = "FRAUDR_SCORING")]
    pub scoring: ScoringMode,

    /// Amount above which a transaction counts as anomalous (weighted scoring)
    #[arg(long, env = "FRAUDR_ANOMALY_THRESHOLD")]
    pub anomaly_threshold: Option<Decimal>,

    /// TIN registry lookup endpoint
    #[arg(long, env = "FRAUDR_TIN_URL")]
    pub tin_url: Option<String>,

    /// TIN registry username
    #[arg(long, env = "FRAUDR_TIN_USERNAME")]
    pub tin_username: Option<String>,

    /// TIN registry password
    #[arg(long, env = "FRAUDR_TIN_PASSWORD", hide_env_values = true)]
    pub tin_password: Option<String>,

    /// National ID registry base URL
    #[arg(long, env = "FRAUDR_NID_URL")]
    pub nid_url: Option<String>,

    /// Use the built-in sample NID registry when no URL is set
    #[arg(long, env = "FRAUDR_NID_STATIC")]
    pub nid_static: bool,

    /// Timeout for each registry call in milliseconds
    #[arg(long, default_value = "5000", env = "FRAUDR_VERIFICATION_TIMEOUT_MS")]
    pub verification_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "FRAUDR_LOG_JSON")]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "FRAUDR_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "FRAUDR_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

/// Connection settings for the TIN registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TinRegistryConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Config {
    /// Get per-call verification timeout as Duration.
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Scoring policy selected by `scoring` and `anomaly_threshold`.
    pub fn scoring_policy(&self) -> ScoringPolicy {
        match self.scoring {
            ScoringMode::Binary => ScoringPolicy::Binary,
            ScoringMode::Weighted => ScoringPolicy::Weighted {
                anomaly_threshold: self.anomaly_threshold,
            },
        }
    }

    /// TIN registry settings, present only when URL and credentials are all set.
    pub fn tin_registry(&self) -> Option<TinRegistryConfig> {
        match (&self.tin_url, &self.tin_username, &self.tin_password) {
            (Some(url), Some(username), Some(password)) => Some(TinRegistryConfig {
                url: url.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            db_min_connections: 2,
            db_max_connections: 10,
            rules_path: PathBuf::from("rules/default_rules.yaml"),
            audit_journal_path: None,
            scoring: ScoringMode::Binary,
            anomaly_threshold: None,
            tin_url: None,
            tin_username: None,
            tin_password: None,
            nid_url: None,
            nid_static: false,
            verification_timeout_ms: 5000,
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}
