use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming an optional YAML configuration file.
pub const CONFIG_ENV: &str = "PYLON_CONFIG";

/// Server configuration.
///
/// Every field has a default, so a YAML document only needs the keys it
/// wants to change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the listener binds to, e.g. `0.0.0.0:8888`
    pub listen_addr: String,
    /// Directory that request paths are appended to
    pub document_root: PathBuf,
    /// Pending-connection backlog passed to `listen(2)`
    pub backlog: i32,
    /// Capacity of each connection's receive buffer
    pub receive_buffer_size: usize,
    /// Longest request path accepted, in bytes
    pub max_path_len: usize,
    /// Upper bound on bytes moved by a single file transfer attempt
    pub max_transfer_chunk: usize,
    /// Readiness events fetched per wait
    pub events_capacity: usize,
    /// Tear down connections idle for this long (disabled when unset)
    pub idle_timeout_secs: Option<u64>,
    /// Answer 404 for any path containing a `..` segment
    pub reject_traversal: bool,
    /// Maximum log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8888".to_string(),
            document_root: PathBuf::from("./"),
            backlog: 128,
            receive_buffer_size: 8192,
            max_path_len: 4096,
            max_transfer_chunk: 1024 * 1024,
            events_capacity: 1024,
            idle_timeout_secs: None,
            reject_traversal: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration: defaults, then the YAML file named by
    /// `PYLON_CONFIG`, then the `LISTEN` and `DOCUMENT_ROOT` overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_yaml(&raw).with_context(|| format!("invalid config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }
        if let Ok(root) = std::env::var("DOCUMENT_ROOT") {
            cfg.document_root = PathBuf::from(root);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a YAML document. Missing keys keep their defaults.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw).context("failed to parse YAML")?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer_size == 0 {
            anyhow::bail!("receive_buffer_size must be greater than zero");
        }
        if self.max_path_len == 0 || self.max_path_len >= self.receive_buffer_size {
            anyhow::bail!(
                "max_path_len must be between 1 and receive_buffer_size ({})",
                self.receive_buffer_size
            );
        }
        if self.max_transfer_chunk == 0 {
            anyhow::bail!("max_transfer_chunk must be greater than zero");
        }
        if self.events_capacity == 0 {
            anyhow::bail!("events_capacity must be greater than zero");
        }
        if self.backlog <= 0 {
            anyhow::bail!("backlog must be positive");
        }
        self.max_level()?;
        Ok(())
    }

    pub fn max_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown log level {:?}", self.log_level))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}
