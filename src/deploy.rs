//! Contract deployment.
//!
//! The `Deployer` resolves the sending account and price feed for the
//! active network, creates `BettingGame` instances, and keeps a registry
//! of everything it deployed. On persistent networks the registry is saved
//! to `<build_dir>/deployments/<network>.json` so later runs reuse mocks.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use web3::ethabi::Token;
use web3::types::{Address, U256};

use crate::chain::{Account, Chain};
use crate::config::AppConfig;
use crate::contracts::{BettingGame, PriceFeed, BETTING_GAME};
use crate::network::{self, ActiveNetwork};
use crate::types::{BetType, BettingError, DeploymentRecord, GameType, TxOutcome};

// ---------------------------------------------------------------------------
// Deployment registry
// ---------------------------------------------------------------------------

/// Deployed contracts per artifact name, oldest first.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Deployments {
    contracts: BTreeMap<String, Vec<DeploymentRecord>>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Deployments {
    /// An in-memory registry that is never written to disk.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    /// Load the registry at `path`, or start an empty one saved there.
    pub fn open(path: &Path) -> Result<Self> {
        let mut deployments = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read deployments from {}", path.display()))?;
            let loaded: Deployments = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse deployments from {}", path.display()))?;
            info!(
                path = %path.display(),
                contracts = loaded.contracts.len(),
                "Deployments loaded from disk"
            );
            loaded
        } else {
            debug!(path = %path.display(), "No deployments file, starting fresh");
            Self::default()
        };
        deployments.path = Some(path.to_path_buf());
        Ok(deployments)
    }

    /// Record a creation transaction under `contract`.
    pub fn record(
        &mut self,
        contract: &str,
        outcome: &TxOutcome,
        deployer: Address,
    ) -> Result<&DeploymentRecord> {
        let address = outcome.contract_address.ok_or_else(|| BettingError::Contract {
            contract: contract.to_string(),
            message: "creation receipt has no contract address".into(),
        })?;

        let record = DeploymentRecord {
            contract: contract.to_string(),
            address,
            deployer,
            transaction_hash: outcome.transaction_hash,
            deployed_at: Utc::now(),
        };
        self.contracts
            .entry(contract.to_string())
            .or_default()
            .push(record);
        self.save()?;

        self.latest(contract)
            .context("Deployment vanished right after recording")
    }

    /// Most recent deployment of `contract`.
    pub fn latest(&self, contract: &str) -> Option<&DeploymentRecord> {
        self.contracts.get(contract).and_then(|list| list.last())
    }

    pub fn count(&self, contract: &str) -> usize {
        self.contracts.get(contract).map_or(0, Vec::len)
    }

    pub fn all(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.contracts.values().flatten()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialise deployments")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployments to {}", path.display()))?;
        debug!(path = %path.display(), "Deployments saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

pub struct Deployer {
    chain: Arc<dyn Chain>,
    network: ActiveNetwork,
    config: AppConfig,
    deployments: Deployments,
}

impl Deployer {
    /// Build a deployer for `network`, opening its on-disk registry when
    /// the network is persistent.
    pub fn new(chain: Arc<dyn Chain>, network: ActiveNetwork, config: AppConfig) -> Result<Self> {
        let deployments = if network.kind.is_persistent() {
            let path = config
                .project
                .build_dir
                .join("deployments")
                .join(format!("{}.json", network.name));
            Deployments::open(&path)?
        } else {
            Deployments::ephemeral()
        };
        Ok(Self::with_deployments(chain, network, config, deployments))
    }

    pub fn with_deployments(
        chain: Arc<dyn Chain>,
        network: ActiveNetwork,
        config: AppConfig,
        deployments: Deployments,
    ) -> Self {
        Self {
            chain,
            network,
            config,
            deployments,
        }
    }

    pub fn network(&self) -> &ActiveNetwork {
        &self.network
    }

    pub fn chain(&self) -> Arc<dyn Chain> {
        Arc::clone(&self.chain)
    }

    pub fn deployments(&self) -> &Deployments {
        &self.deployments
    }

    /// The account transactions are sent from on this network.
    pub async fn account(&self) -> Result<Account> {
        network::get_account(self.chain.as_ref(), &self.network, &self.config).await
    }

    /// Resolve the price feed, deploying a mock aggregator if needed.
    pub async fn price_feed(&mut self, account: &Account) -> Result<PriceFeed> {
        let address = network::get_price_feed(
            self.chain.as_ref(),
            &self.network,
            account,
            &mut self.deployments,
        )
        .await?;
        Ok(PriceFeed::at(self.chain(), address))
    }

    /// Deploy a `BettingGame` with the given entry fee and game setup.
    pub async fn deploy_betting_game(
        &mut self,
        entry_fee: U256,
        bet_type: BetType,
        game_type: GameType,
    ) -> Result<BettingGame> {
        info!(%entry_fee, %bet_type, %game_type, network = %self.network.name, "Deploying ...");

        let account = self.account().await?;
        let price_feed = self.price_feed(&account).await?;

        let args = [
            Token::Address(price_feed.address()),
            Token::Uint(entry_fee),
            Token::String(bet_type.to_string()),
            Token::String(game_type.to_string()),
        ];
        let outcome = self
            .chain
            .deploy(BETTING_GAME, &args, &account)
            .await
            .with_context(|| format!("Failed to deploy {BETTING_GAME} ({bet_type}/{game_type})"))?;
        let address = self
            .deployments
            .record(BETTING_GAME, &outcome, account.address())?
            .address;

        info!(
            address = ?address,
            price_feed = ?price_feed.address(),
            deployer = %account,
            verify = self.network.config.verify,
            "BettingGame deployed"
        );
        Ok(BettingGame::at(self.chain(), address))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
