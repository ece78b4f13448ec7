// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - NODE CONFIGURATION
//
// Layered: built-in defaults, then an optional TOML file, then MITRA_*
// environment variables, then command-line flags.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mitra_core::LedgerPolicy;
use mitra_crypto::identity::{DEFAULT_ISSUER, MIN_SECRET_LEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the per-attempt commit backoff.
pub const MAX_RETRY_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("{key}={value:?} is not valid: {reason}")]
    Env {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sled,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Command-line flags. Every flag is optional and overrides the file and
/// environment layers when given.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mitra-node")]
#[command(about = "Tamper-evident scheme-history ledger with atomic token accounting")]
pub struct Args {
    /// TOML config file
    #[arg(long, env = "MITRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP API on
    #[arg(long)]
    pub listen_addr: Option<IpAddr>,

    #[arg(long)]
    pub api_port: Option<u16>,

    /// Directory holding the sled database
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    pub write_config: Option<PathBuf>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: IpAddr,
    pub api_port: u16,
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub flush_every_commit: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub welcome_balance: u64,
    pub scheme_reward: u64,
    pub max_commit_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_reward_per_call: u64,
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let policy = LedgerPolicy::default();
        Self {
            listen_addr: IpAddr::from([127, 0, 0, 1]),
            api_port: 3000,
            data_dir: PathBuf::from("mitra_data"),
            store: StoreKind::Sled,
            flush_every_commit: false,
            jwt_secret: String::new(),
            jwt_issuer: DEFAULT_ISSUER.to_string(),
            welcome_balance: policy.welcome_balance,
            scheme_reward: policy.scheme_reward,
            max_commit_attempts: policy.max_commit_attempts,
            retry_backoff_ms: policy.retry_backoff.as_millis() as u64,
            max_reward_per_call: policy.max_reward_per_call,
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("listen_addr", &self.listen_addr)
            .field("api_port", &self.api_port)
            .field("data_dir", &self.data_dir)
            .field("store", &self.store)
            .field("flush_every_commit", &self.flush_every_commit)
            .field("jwt_secret", &"[redacted]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("welcome_balance", &self.welcome_balance)
            .field("scheme_reward", &self.scheme_reward)
            .field("max_commit_attempts", &self.max_commit_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_reward_per_call", &self.max_reward_per_call)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("cors_origins", &self.cors_origins)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl NodeConfig {
    /// Resolve every layer for the running process.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `MITRA_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MITRA_LISTEN_ADDR") {
            self.listen_addr = parse_env("MITRA_LISTEN_ADDR", &v)?;
        }
        if let Some(v) = lookup("MITRA_API_PORT") {
            self.api_port = parse_env("MITRA_API_PORT", &v)?;
        }
        if let Some(v) = lookup("MITRA_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MITRA_STORE") {
            self.store = StoreKind::from_str(&v, true).map_err(|reason| ConfigError::Env {
                key: "MITRA_STORE".into(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup("MITRA_FLUSH_EVERY_COMMIT") {
            self.flush_every_commit = parse_env("MITRA_FLUSH_EVERY_COMMIT", &v)?;
        }
        if let Some(v) = lookup("MITRA_JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("MITRA_JWT_ISSUER") {
            self.jwt_issuer = v;
        }
        if let Some(v) = lookup("MITRA_WELCOME_BALANCE") {
            self.welcome_balance = parse_env("MITRA_WELCOME_BALANCE", &v)?;
        }
        if let Some(v) = lookup("MITRA_SCHEME_REWARD") {
            self.scheme_reward = parse_env("MITRA_SCHEME_REWARD", &v)?;
        }
        if let Some(v) = lookup("MITRA_MAX_COMMIT_ATTEMPTS") {
            self.max_commit_attempts = parse_env("MITRA_MAX_COMMIT_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("MITRA_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_env("MITRA_RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("MITRA_MAX_REWARD_PER_CALL") {
            self.max_reward_per_call = parse_env("MITRA_MAX_REWARD_PER_CALL", &v)?;
        }
        if let Some(v) = lookup("MITRA_RATE_LIMIT_RPS") {
            self.rate_limit_rps = parse_env("MITRA_RATE_LIMIT_RPS", &v)?;
        }
        if let Some(v) = lookup("MITRA_RATE_LIMIT_BURST") {
            self.rate_limit_burst = parse_env("MITRA_RATE_LIMIT_BURST", &v)?;
        }
        if let Some(v) = lookup("MITRA_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("MITRA_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("MITRA_LOG_FORMAT") {
            self.log_format = LogFormat::from_str(&v, true).map_err(|reason| ConfigError::Env {
                key: "MITRA_LOG_FORMAT".into(),
                value: v.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(addr) = args.listen_addr {
            self.listen_addr = addr;
        }
        if let Some(port) = args.api_port {
            self.api_port = port;
        }
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(store) = args.store {
            self.store = store;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if let Some(format) = args.log_format {
            self.log_format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "jwt_secret is required (set MITRA_JWT_SECRET)".to_string(),
            ));
        }
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "jwt_secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                self.jwt_secret.len()
            )));
        }
        if self.jwt_issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_issuer cannot be empty".to_string()));
        }
        if self.max_commit_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_commit_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "retry_backoff_ms must be at most {}, got {}",
                MAX_RETRY_BACKOFF_MS, self.retry_backoff_ms
            )));
        }
        if self.scheme_reward == 0 {
            return Err(ConfigError::Invalid("scheme_reward must be positive".to_string()));
        }
        if self.max_reward_per_call == 0 {
            return Err(ConfigError::Invalid(
                "max_reward_per_call must be positive".to_string(),
            ));
        }
        if self.rate_limit_rps == 0 || self.rate_limit_burst == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_rps and rate_limit_burst must be positive".to_string(),
            ));
        }
        if self.api_port == 0 {
            return Err(ConfigError::Invalid("api_port cannot be 0".to_string()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.api_port)
    }

    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            welcome_balance: self.welcome_balance,
            scheme_reward: self.scheme_reward,
            max_commit_attempts: self.max_commit_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_reward_per_call: self.max_reward_per_call,
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
