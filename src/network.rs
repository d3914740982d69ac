//! Network, account and price-feed resolution.
//!
//! Classifies the active network, picks the account transactions are sent
//! from, and finds the ETH/USD price feed the betting contract reads,
//! deploying a `MockV3Aggregator` where no live feed exists.

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tracing::{debug, info};
use web3::ethabi::Token;
use web3::types::{Address, U256};

use crate::chain::{Account, Chain};
use crate::config::{AppConfig, EnvironmentsConfig, NetworkConfig};
use crate::deploy::Deployments;
use crate::types::{BettingError, NetworkKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FORKED_LOCAL_ENVIRONMENTS: &[&str] = &["mainnet-fork-dev"];

pub const LOCAL_BLOCKCHAIN_ENVIRONMENTS: &[&str] =
    &["development", "ganache-local", "ganache-local_bis"];

pub const PRIVATE_BLOCKCHAIN_ENVIRONMENTS: &[&str] = &["Hmz-private-chain"];

/// Artifact name of the stand-in oracle.
pub const MOCK_AGGREGATOR: &str = "MockV3Aggregator";

/// Decimals the mock aggregator is deployed with.
pub const DECIMALS: u8 = 10;

/// Mock starting price, in whole units; deployed as `STARTING_PRICE * 10^18`.
pub const STARTING_PRICE: u64 = 4000;

// ---------------------------------------------------------------------------
// Network classification
// ---------------------------------------------------------------------------

/// Network names per class.
#[derive(Debug, Clone)]
pub struct Environments {
    pub local: Vec<String>,
    pub forked: Vec<String>,
    pub private: Vec<String>,
}

impl Default for Environments {
    fn default() -> Self {
        Self {
            local: to_owned(LOCAL_BLOCKCHAIN_ENVIRONMENTS),
            forked: to_owned(FORKED_LOCAL_ENVIRONMENTS),
            private: to_owned(PRIVATE_BLOCKCHAIN_ENVIRONMENTS),
        }
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl Environments {
    pub fn from_config(cfg: &EnvironmentsConfig) -> Self {
        let defaults = Self::default();
        Self {
            local: cfg.local.clone().unwrap_or(defaults.local),
            forked: cfg.forked.clone().unwrap_or(defaults.forked),
            private: cfg.private.clone().unwrap_or(defaults.private),
        }
    }

    pub fn classify(&self, network: &str) -> NetworkKind {
        let contains = |list: &[String]| list.iter().any(|n| n == network);
        if contains(&self.local) {
            NetworkKind::Local
        } else if contains(&self.forked) {
            NetworkKind::Forked
        } else if contains(&self.private) {
            NetworkKind::Private
        } else {
            NetworkKind::Live
        }
    }
}

/// The network this run talks to.
#[derive(Debug, Clone)]
pub struct ActiveNetwork {
    pub name: String,
    pub kind: NetworkKind,
    pub config: NetworkConfig,
}

impl ActiveNetwork {
    /// Select `name`, falling back to the configured default network.
    pub fn select(cfg: &AppConfig, name: Option<&str>) -> Result<Self, BettingError> {
        let name = name.unwrap_or(&cfg.project.default_network);
        let config = cfg.network(name)?.clone();
        let kind = Environments::from_config(&cfg.environments).classify(name);
        Ok(Self {
            name: name.to_string(),
            kind,
            config,
        })
    }

    /// Configured live price feed, if any.
    pub fn configured_price_feed(&self) -> Result<Option<Address>, BettingError> {
        self.config
            .eth_usd_price_feed
            .as_deref()
            .map(|raw| {
                raw.trim_start_matches("0x").parse::<Address>().map_err(|e| {
                    BettingError::Config(format!(
                        "eth_usd_price_feed '{raw}' for network '{}' is not an address: {e}",
                        self.name
                    ))
                })
            })
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Account resolution
// ---------------------------------------------------------------------------

/// Pick the account transactions are sent from.
///
/// Local development chains use the node's first unlocked account; every
/// other network signs with the configured private key.
pub async fn get_account(
    chain: &dyn Chain,
    network: &ActiveNetwork,
    cfg: &AppConfig,
) -> Result<Account> {
    let account = match network.kind {
        NetworkKind::Local => {
            let accounts = chain.accounts().await?;
            let first = accounts
                .first()
                .copied()
                .ok_or_else(|| BettingError::NoAccounts(chain.endpoint().to_string()))?;
            Account::Node(first)
        }
        NetworkKind::Private => {
            let key = cfg.wallet_key()?;
            Account::from_hex_key(key.expose_secret())
                .context("Invalid private-chain wallet key")?
        }
        NetworkKind::Forked | NetworkKind::Live => {
            let key = cfg.wallet_key()?;
            Account::from_hex_key(key.expose_secret()).context("Invalid wallet key")?
        }
    };

    debug!(network = %network.name, kind = %network.kind, account = %account, "Account resolved");
    Ok(account)
}

// ---------------------------------------------------------------------------
// Price feed resolution
// ---------------------------------------------------------------------------

/// Constructor arguments of the mock aggregator.
pub fn mock_aggregator_args() -> Vec<Token> {
    let starting_price = U256::from(STARTING_PRICE) * U256::exp10(18);
    vec![Token::Uint(U256::from(DECIMALS)), Token::Int(starting_price)]
}

/// Find the ETH/USD price feed for the active network.
///
/// Forked networks must configure a live feed. Other networks use a
/// configured feed when present; otherwise a mock aggregator is deployed
/// once and the most recent one is reused.
pub async fn get_price_feed(
    chain: &dyn Chain,
    network: &ActiveNetwork,
    account: &Account,
    deployments: &mut Deployments,
) -> Result<Address> {
    if network.kind == NetworkKind::Forked {
        let feed = network
            .configured_price_feed()?
            .ok_or_else(|| BettingError::MissingPriceFeed(network.name.clone()))?;
        debug!(network = %network.name, feed = ?feed, "Using forked price feed");
        return Ok(feed);
    }

    if network.kind != NetworkKind::Local {
        if let Some(feed) = network.configured_price_feed()? {
            debug!(network = %network.name, feed = ?feed, "Using configured price feed");
            return Ok(feed);
        }
    }

    if deployments.count(MOCK_AGGREGATOR) == 0 {
        info!(network = %network.name, "Deploying Mocks...");
        let outcome = chain
            .deploy(MOCK_AGGREGATOR, &mock_aggregator_args(), account)
            .await?;
        deployments.record(MOCK_AGGREGATOR, &outcome, account.address())?;
        info!("Mocks Deployed!");
    }

    deployments
        .latest(MOCK_AGGREGATOR)
        .map(|record| record.address)
        .ok_or_else(|| {
            BettingError::Contract {
                contract: MOCK_AGGREGATOR.to_string(),
                message: "no deployment recorded".into(),
            }
            .into()
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
