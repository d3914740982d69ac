//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The deployer's private key is referenced by env-var name in the config
//! and resolved at runtime into a `SecretString`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::BettingError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
    #[serde(default)]
    pub environments: EnvironmentsConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Directory holding `contracts/<Name>.json` artifacts and `deployments/`.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default = "default_network")]
    pub default_network: String,
    /// How often to poll for a transaction receipt.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this long.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            default_network: default_network(),
            poll_interval_ms: default_poll_interval_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

impl ProjectConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletsConfig {
    /// Name of the env var holding the deployer's hex private key.
    #[serde(default = "default_from_key_env")]
    pub from_key_env: String,
}

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            from_key_env: default_from_key_env(),
        }
    }
}

/// Network names per class. Missing lists fall back to the built-in ones.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnvironmentsConfig {
    pub local: Option<Vec<String>>,
    pub forked: Option<Vec<String>>,
    pub private: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Address of a live ETH/USD aggregator on this network.
    #[serde(default)]
    pub eth_usd_price_feed: Option<String>,
    /// Whether deployed sources should be published to the block explorer.
    /// Reported when the network is selected and on each deployment.
    #[serde(default)]
    pub verify: bool,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_network() -> String {
    "development".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_from_key_env() -> String {
    "PRIVATE_KEY".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Look up a network section by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, BettingError> {
        self.networks
            .get(name)
            .ok_or_else(|| BettingError::UnknownNetwork(name.to_string()))
    }

    /// Resolve the deployer key from the environment.
    pub fn wallet_key(&self) -> Result<SecretString, BettingError> {
        Self::resolve_env(&self.wallets.from_key_env)
            .map(SecretString::new)
            .map_err(|_| {
                BettingError::MissingWallet(format!(
                    "environment variable {} is not set",
                    self.wallets.from_key_env
                ))
            })
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
