//! Shared types for the betting-game tooling.
//!
//! Enumerations passed to the contract constructor, network classes,
//! decoded oracle rounds, deployment records and the domain error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use web3::types::{Address, H256, U256};

// ---------------------------------------------------------------------------
// Game configuration enums
// ---------------------------------------------------------------------------

/// How entries are priced. Sent to the constructor as its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    Fixed,
    Free,
}

/// Bet types in the order the contract tooling has always listed them.
pub const BET_TYPES: [BetType; 2] = [BetType::Fixed, BetType::Free];

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Fixed => "FIXED",
            BetType::Free => "FREE",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetType {
    type Err = BettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BET_TYPES
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BettingError::UnknownVariant {
                kind: "bet type",
                value: s.to_string(),
            })
    }
}

/// How a game is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    Uniconditional,
    Multiconditional,
    HighScore,
}

pub const GAME_TYPES: [GameType; 3] = [
    GameType::Uniconditional,
    GameType::Multiconditional,
    GameType::HighScore,
];

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Uniconditional => "UNICONDITIONAL",
            GameType::Multiconditional => "MULTICONDITIONAL",
            GameType::HighScore => "HIGH_SCORE",
        }
    }

    /// High-score games are entered without naming a condition.
    pub fn takes_condition(&self) -> bool {
        !matches!(self, GameType::HighScore)
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = BettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        GAME_TYPES
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| BettingError::UnknownVariant {
                kind: "game type",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Class of the active network; drives account and price-feed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Development node with unlocked accounts (ganache, anvil, hardhat).
    Local,
    /// Local fork of a live chain; real price feeds are available.
    Forked,
    /// Permissioned chain reached with a configured key.
    Private,
    Live,
}

impl NetworkKind {
    /// Whether deployments on this network are worth keeping on disk.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, NetworkKind::Local | NetworkKind::Forked)
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Local => write!(f, "local"),
            NetworkKind::Forked => write!(f, "forked"),
            NetworkKind::Private => write!(f, "private"),
            NetworkKind::Live => write!(f, "live"),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle data
// ---------------------------------------------------------------------------

/// One answer of an aggregator's `latestRoundData()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: U256,
    /// Raw answer as returned on-chain (two's complement for int256).
    pub answer: U256,
    pub started_at: U256,
    pub updated_at: U256,
    pub answered_in_round: U256,
}

impl RoundData {
    /// The answer as a non-negative rate, `None` if the feed reports a
    /// negative price.
    pub fn rate(&self) -> Option<U256> {
        if self.answer.bit(255) {
            None
        } else {
            Some(self.answer)
        }
    }
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

/// A contract instance created by this tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub contract: String,
    pub address: Address,
    pub deployer: Address,
    pub transaction_hash: H256,
    pub deployed_at: DateTime<Utc>,
}

impl fmt::Display for DeploymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:?} (tx {:?}, by {:?})",
            self.contract, self.address, self.transaction_hash, self.deployer
        )
    }
}

/// Outcome of a mined state-changing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub transaction_hash: H256,
    pub gas_used: Option<U256>,
    /// Set for contract-creation transactions.
    pub contract_address: Option<Address>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the deployment tooling.
#[derive(Debug, thiserror::Error)]
pub enum BettingError {
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Network '{0}' is not configured")]
    UnknownNetwork(String),

    #[error("No eth_usd_price_feed configured for network '{0}'")]
    MissingPriceFeed(String),

    #[error("Wallet key not available: {0}")]
    MissingWallet(String),

    #[error("Node at '{0}' reports no accounts")]
    NoAccounts(String),

    #[error("Fee conversion failed: {0}")]
    FeeConversion(String),

    #[error("Contract error ({contract}): {message}")]
    Contract { contract: String, message: String },

    #[error("Transaction {tx:?} reverted")]
    Reverted { tx: H256 },

    #[error("Assertion failed in scenario '{scenario}': {message}")]
    Assertion { scenario: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
