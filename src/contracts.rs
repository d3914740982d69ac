//! Typed handles over deployed contracts.
//!
//! Each handle pairs a chain with an address and exposes the contract's
//! external entry points with Rust types in place of ABI tokens.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use web3::ethabi::Token;
use web3::types::{Address, U256};

use crate::chain::{Account, Chain};
use crate::network::MOCK_AGGREGATOR;
use crate::types::{BettingError, RoundData, TxOutcome};

/// Artifact name of the betting contract.
pub const BETTING_GAME: &str = "BettingGame";

/// Artifact whose ABI reads every price feed, mock or configured.
/// `MockV3Aggregator` implements Chainlink's `AggregatorV3Interface`, so
/// it decodes live aggregators too. It must be compiled into the build
/// directory even on networks that never deploy the mock.
pub const PRICE_FEED_ABI: &str = MOCK_AGGREGATOR;

// ---------------------------------------------------------------------------
// BettingGame
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct BettingGame {
    chain: Arc<dyn Chain>,
    address: Address,
}

impl BettingGame {
    pub fn at(chain: Arc<dyn Chain>, address: Address) -> Self {
        Self { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn add_condition(&self, condition: &str, from: &Account) -> Result<TxOutcome> {
        let outcome = self
            .chain
            .transact(
                BETTING_GAME,
                self.address,
                "addCondition",
                &[Token::String(condition.to_string())],
                from,
                U256::zero(),
            )
            .await
            .with_context(|| format!("addCondition({condition:?}) failed"))?;
        info!(game = ?self.address, condition, "Condition added");
        Ok(outcome)
    }

    /// Enter a conditional game, paying `fee` wei.
    pub async fn enter(
        &self,
        condition: &str,
        value: U256,
        fee: U256,
        from: &Account,
    ) -> Result<TxOutcome> {
        let outcome = self
            .chain
            .transact(
                BETTING_GAME,
                self.address,
                "enter",
                &[Token::String(condition.to_string()), Token::Uint(value)],
                from,
                fee,
            )
            .await
            .with_context(|| format!("enter({condition:?}, {value}) failed"))?;
        info!(game = ?self.address, condition, %value, %fee, player = %from, "Entered game");
        Ok(outcome)
    }

    /// Enter a high-score game, which takes no condition.
    pub async fn enter_without_condition(&self, fee: U256, from: &Account) -> Result<TxOutcome> {
        let outcome = self
            .chain
            .transact(BETTING_GAME, self.address, "enter", &[], from, fee)
            .await
            .context("enter() failed")?;
        info!(game = ?self.address, %fee, player = %from, "Entered game");
        Ok(outcome)
    }

    /// Entry fee in the fiat-pegged unit the game was deployed with.
    pub async fn get_entrance_fee(&self) -> Result<U256> {
        let out = self.query("getEntranceFee", &[], None).await?;
        single(out, "getEntranceFee")?
            .into_uint()
            .ok_or_else(|| self.decode_error("getEntranceFee", "expected uint256"))
    }

    pub async fn player_in_game(&self, player: Address, from: Option<Address>) -> Result<bool> {
        let out = self
            .query("playerInGame", &[Token::Address(player)], from)
            .await?;
        single(out, "playerInGame")?
            .into_bool()
            .ok_or_else(|| self.decode_error("playerInGame", "expected bool"))
    }

    pub async fn condition_exists(&self, condition: &str) -> Result<bool> {
        let out = self
            .query("conditionExists", &[Token::String(condition.to_string())], None)
            .await?;
        single(out, "conditionExists")?
            .into_bool()
            .ok_or_else(|| self.decode_error("conditionExists", "expected bool"))
    }

    async fn query(
        &self,
        function: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>> {
        self.chain
            .query(BETTING_GAME, self.address, function, args, from)
            .await
    }

    fn decode_error(&self, function: &str, message: &str) -> anyhow::Error {
        BettingError::Contract {
            contract: BETTING_GAME.to_string(),
            message: format!("{function}: {message}"),
        }
        .into()
    }
}

impl std::fmt::Debug for BettingGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BettingGame")
            .field("address", &self.address)
            .field("endpoint", &self.chain.endpoint())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Price feed
// ---------------------------------------------------------------------------

/// A Chainlink-style aggregator, live or mocked.
#[derive(Clone)]
pub struct PriceFeed {
    chain: Arc<dyn Chain>,
    address: Address,
}

impl PriceFeed {
    pub fn at(chain: Arc<dyn Chain>, address: Address) -> Self {
        Self { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `latestRoundData()` decoded through the `PRICE_FEED_ABI` artifact.
    pub async fn latest_round_data(&self) -> Result<RoundData> {
        let out = self
            .chain
            .query(PRICE_FEED_ABI, self.address, "latestRoundData", &[], None)
            .await?;

        let mut words = out.into_iter().map(|t| match t {
            Token::Uint(v) | Token::Int(v) => Some(v),
            _ => None,
        });
        let mut next = || -> Result<U256> {
            words.next().flatten().ok_or_else(|| {
                BettingError::Contract {
                    contract: PRICE_FEED_ABI.to_string(),
                    message: "latestRoundData: expected five integer words".into(),
                }
                .into()
            })
        };

        Ok(RoundData {
            round_id: next()?,
            answer: next()?,
            started_at: next()?,
            updated_at: next()?,
            answered_in_round: next()?,
        })
    }

    /// The latest answer, scaled by 10^18.
    pub async fn rate(&self) -> Result<U256> {
        let round = self.latest_round_data().await?;
        round.rate().ok_or_else(|| {
            BettingError::FeeConversion(format!(
                "price feed {:?} reports a negative answer",
                self.address
            ))
            .into()
        })
    }
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("address", &self.address)
            .finish()
    }
}

fn single(out: Vec<Token>, function: &str) -> Result<Token> {
    let mut out = out.into_iter();
    match (out.next(), out.next()) {
        (Some(token), None) => Ok(token),
        _ => Err(BettingError::Contract {
            contract: BETTING_GAME.to_string(),
            message: format!("{function}: expected a single return value"),
        }
        .into()),
    }
}
