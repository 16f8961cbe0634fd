//! Configuration management
//!
//! Learner endpoint, backend choice and oracle display settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::oracle::query::{DEFAULT_MAX_EQUIVALENCE_QUERIES, DEFAULT_MAX_MEMBERSHIP_QUERIES};

/// Overrides `api.endpoint` when set
pub const ENDPOINT_ENV: &str = "ANGLUIN_LAB_ENDPOINT";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote learner settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Learner backend and session defaults
    #[serde(default)]
    pub learner: LearnerConfig,
    /// Terminal oracle settings
    #[serde(default)]
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint of the learner
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Sent as a bearer token when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_endpoint() -> String {
    "http://localhost:4000/graphql".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            auth_token: None,
        }
    }
}

/// Which learner answers `learn`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Remote,
    Offline,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "graphql" => Some(Backend::Remote),
            "offline" | "local" => Some(Backend::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Remote => write!(f, "remote"),
            Backend::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_session_name")]
    pub default_session_name: String,
    /// Budgets for the offline learner
    #[serde(default = "default_max_membership")]
    pub max_membership_queries: u32,
    #[serde(default = "default_max_equivalence")]
    pub max_equivalence_queries: u32,
}

fn default_session_name() -> String {
    "Food Categorization".to_string()
}

fn default_max_membership() -> u32 {
    DEFAULT_MAX_MEMBERSHIP_QUERIES
}

fn default_max_equivalence() -> u32 {
    DEFAULT_MAX_EQUIVALENCE_QUERIES
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            default_session_name: default_session_name(),
            max_membership_queries: default_max_membership(),
            max_equivalence_queries: default_max_equivalence(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Fetch the live hypothesis for equivalence queries
    #[serde(default = "default_true")]
    pub show_live_state: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            show_live_state: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from file, writing defaults on first use
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            config
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        self.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok());
    }

    fn apply_endpoint_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("Endpoint overridden by {}: {}", ENDPOINT_ENV, endpoint);
            self.api.endpoint = endpoint;
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "angluin-lab", "angluin-lab")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!("  api.endpoint:                    {}", config.api.endpoint);
    println!("  api.request_timeout_secs:        {}", config.api.request_timeout_secs);
    println!(
        "  api.auth_token:                  {}",
        if config.api.auth_token.is_some() { "Configured" } else { "Not configured" }
    );
    println!("  learner.backend:                 {}", config.learner.backend);
    println!("  learner.default_session_name:    {}", config.learner.default_session_name);
    println!("  learner.max_membership_queries:  {}", config.learner.max_membership_queries);
    println!("  learner.max_equivalence_queries: {}", config.learner.max_equivalence_queries);
    println!("  oracle.show_live_state:          {}", config.oracle.show_live_state);

    Ok(())
}

/// Set the learner endpoint
pub fn set_endpoint(endpoint: &str) -> Result<()> {
    let url = reqwest::Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
    let mut config = Config::load()?;
    config.api.endpoint = url.to_string();
    config.save()?;
    println!("Learner endpoint set to {}", config.api.endpoint);
    Ok(())
}

/// Set the default learner backend
pub fn set_backend(backend: &str) -> Result<()> {
    let Some(backend) = Backend::parse(backend) else {
        anyhow::bail!("Unknown backend '{}'. Available: remote, offline", backend);
    };
    let mut config = Config::load()?;
    config.learner.backend = backend;
    config.save()?;
    println!("Learner backend set to {}", backend);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}
