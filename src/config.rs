//! Configuration management for Gatehouse.
//!
//! Configuration is layered: built-in defaults, then an optional YAML or TOML
//! file, then `GATEHOUSE__*` environment variables (`__` separates nesting
//! levels, e.g. `GATEHOUSE__RATE_LIMITING__ENABLED=false`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::error::{GatehouseError, Result};
use crate::ratelimit::{PolicyCatalogue, PolicyClass, RateLimitPolicy, DEFAULT_SWEEP_PROBABILITY};

/// Environment the process runs in.
///
/// Read once at startup and handed to the components that behave differently
/// per environment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local development: verbose errors, human-readable audit output
    #[default]
    Development,
    /// Automated test runs
    Test,
    /// Live traffic: sanitized errors, machine-parseable audit lines
    Production,
}

impl Mode {
    /// Whether this is the production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }

    /// Whether raw error messages and traces may reach callers and operators' consoles.
    pub fn exposes_internals(&self) -> bool {
        !self.is_production()
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Test => "test",
            Mode::Production => "production",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration for the Gatehouse service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatehouseConfig {
    /// Runtime environment
    #[serde(default)]
    pub mode: Mode,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Global switch; when off every request is admitted
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chance per request of sweeping expired counters
    #[serde(default = "default_sweep_probability")]
    pub sweep_probability: f64,

    /// Per-class overrides of the built-in policies
    #[serde(default)]
    pub policies: HashMap<PolicyClass, RateLimitPolicy>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_probability: default_sweep_probability(),
            policies: HashMap::new(),
        }
    }
}

impl RateLimitingConfig {
    /// The policy catalogue after applying overrides.
    pub fn catalogue(&self) -> PolicyCatalogue {
        PolicyCatalogue::with_overrides(&self.policies)
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// When off, governed handlers run without emitting audit events
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_sweep_probability() -> f64 {
    DEFAULT_SWEEP_PROBABILITY
}

impl GatehouseConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GATEHOUSE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: GatehouseConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatehouseConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GatehouseError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> Result<()> {
        let p = self.rate_limiting.sweep_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(GatehouseError::Config(format!(
                "rate_limiting.sweep_probability must be within [0, 1], got {}",
                p
            )));
        }

        self.rate_limiting
            .catalogue()
            .validate()
            .map_err(|e| GatehouseError::Config(format!("rate_limiting.policies.{}", e)))
    }
}
