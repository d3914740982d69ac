//! Mock chain for integration testing.
//!
//! Provides a deterministic `Chain` implementation that "deploys"
//! `MockV3Aggregator` and `BettingGame` instances in memory and answers
//! their calls, with no node or compiled artifacts required.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use web3::ethabi::Token;
use web3::types::{Address, H256, U256};

use betting_game::chain::{Account, Chain};
use betting_game::fee::fee_in_native;
use betting_game::types::TxOutcome;

/// A call the mock received, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub contract: String,
    pub function: String,
    pub args: Vec<Token>,
    pub sender: Address,
    pub value: U256,
}

#[derive(Debug, Clone)]
struct Game {
    price_feed: Address,
    entry_fee: U256,
    game_type: String,
    conditions: HashSet<String>,
    players: HashSet<Address>,
}

#[derive(Default)]
struct State {
    next_address: u64,
    next_tx: u64,
    feeds: HashMap<Address, U256>,
    games: HashMap<Address, Game>,
    calls: Vec<RecordedCall>,
    queries: Vec<(String, String)>,
}

/// An in-memory chain for deterministic testing.
pub struct MockChain {
    accounts: Vec<Address>,
    state: Arc<Mutex<State>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// When set, entries are accepted but players are never recorded.
    drop_players: Arc<Mutex<bool>>,
}

impl MockChain {
    /// A chain whose node manages `accounts` unlocked accounts.
    pub fn new(accounts: usize) -> Self {
        Self {
            accounts: (1..=accounts as u64).map(Address::from_low_u64_be).collect(),
            state: Arc::new(Mutex::new(State {
                next_address: 0x1000,
                ..State::default()
            })),
            force_error: Arc::new(Mutex::new(None)),
            drop_players: Arc::new(Mutex::new(false)),
        }
    }

    pub fn node_accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn drop_players(&self) {
        *self.drop_players.lock().unwrap() = true;
    }

    /// All deploy and transact calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// `(contract, function)` of every view call so far, in order.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn deploy_count(&self, contract: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.contract == contract && c.function == "constructor")
            .count()
    }

    /// Change the answer of an already deployed aggregator.
    pub fn set_rate(&self, feed: Address, rate: U256) {
        self.state.lock().unwrap().feeds.insert(feed, rate);
    }

    fn check_error(&self) -> Result<()> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(())
    }

    fn tx(state: &mut State, contract_address: Option<Address>) -> TxOutcome {
        state.next_tx += 1;
        TxOutcome {
            transaction_hash: H256::from_low_u64_be(state.next_tx),
            gas_used: Some(U256::from(21_000u64)),
            contract_address,
        }
    }
}

fn string_arg(args: &[Token], index: usize) -> Result<String> {
    match args.get(index) {
        Some(Token::String(s)) => Ok(s.clone()),
        other => bail!("argument {index}: expected string, got {other:?}"),
    }
}

fn uint_arg(args: &[Token], index: usize) -> Result<U256> {
    match args.get(index) {
        Some(Token::Uint(v)) | Some(Token::Int(v)) => Ok(*v),
        other => bail!("argument {index}: expected integer, got {other:?}"),
    }
}

#[async_trait]
impl Chain for MockChain {
    async fn accounts(&self) -> Result<Vec<Address>> {
        self.check_error()?;
        Ok(self.accounts.clone())
    }

    async fn deploy(&self, contract: &str, args: &[Token], sender: &Account) -> Result<TxOutcome> {
        self.check_error()?;
        let mut state = self.state.lock().unwrap();

        state.next_address += 1;
        let address = Address::from_low_u64_be(state.next_address);

        match contract {
            "MockV3Aggregator" => {
                if args.len() != 2 {
                    bail!("MockV3Aggregator takes (decimals, initialAnswer)");
                }
                state.feeds.insert(address, uint_arg(args, 1)?);
            }
            "BettingGame" => {
                let price_feed = match args.first() {
                    Some(Token::Address(a)) => *a,
                    other => bail!("BettingGame: expected price feed address, got {other:?}"),
                };
                if !state.feeds.contains_key(&price_feed) {
                    bail!("BettingGame: price feed {price_feed:?} has no code");
                }
                state.games.insert(
                    address,
                    Game {
                        price_feed,
                        entry_fee: uint_arg(args, 1)?,
                        game_type: string_arg(args, 3)?,
                        conditions: HashSet::new(),
                        players: HashSet::new(),
                    },
                );
            }
            other => bail!("No artifact for {other}"),
        }

        state.calls.push(RecordedCall {
            contract: contract.to_string(),
            function: "constructor".to_string(),
            args: args.to_vec(),
            sender: sender.address(),
            value: U256::zero(),
        });
        Ok(Self::tx(&mut state, Some(address)))
    }

    async fn transact(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Token],
        sender: &Account,
        value: U256,
    ) -> Result<TxOutcome> {
        self.check_error()?;
        let drop_players = *self.drop_players.lock().unwrap();
        let mut state = self.state.lock().unwrap();

        let game = state
            .games
            .get(&address)
            .cloned()
            .ok_or_else(|| anyhow!("{contract} not deployed at {address:?}"))?;
        let rate = state.feeds[&game.price_feed];
        let required = fee_in_native(rate, game.entry_fee)?;

        let game = state.games.get_mut(&address).expect("checked above");
        match (function, args.len()) {
            ("addCondition", 1) => {
                game.conditions.insert(string_arg(args, 0)?);
            }
            ("enter", 2) => {
                let condition = string_arg(args, 0)?;
                if !game.conditions.contains(&condition) {
                    bail!("execution reverted: condition does not exist");
                }
                if value < required {
                    bail!("execution reverted: not enough ETH");
                }
                if !drop_players {
                    game.players.insert(sender.address());
                }
            }
            ("enter", 0) => {
                if game.game_type != "HIGH_SCORE" {
                    bail!("execution reverted: condition required");
                }
                if value < required {
                    bail!("execution reverted: not enough ETH");
                }
                if !drop_players {
                    game.players.insert(sender.address());
                }
            }
            (other, n) => bail!("{contract} has no function {other} with {n} arguments"),
        }

        state.calls.push(RecordedCall {
            contract: contract.to_string(),
            function: function.to_string(),
            args: args.to_vec(),
            sender: sender.address(),
            value,
        });
        Ok(Self::tx(&mut state, None))
    }

    async fn query(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Token],
        _from: Option<Address>,
    ) -> Result<Vec<Token>> {
        self.check_error()?;
        let mut state = self.state.lock().unwrap();
        state
            .queries
            .push((contract.to_string(), function.to_string()));

        if function == "latestRoundData" {
            let answer = state
                .feeds
                .get(&address)
                .ok_or_else(|| anyhow!("no aggregator at {address:?}"))?;
            return Ok(vec![
                Token::Uint(U256::one()),
                Token::Int(*answer),
                Token::Uint(U256::from(1_700_000_000u64)),
                Token::Uint(U256::from(1_700_000_000u64)),
                Token::Uint(U256::one()),
            ]);
        }

        let game = state
            .games
            .get(&address)
            .ok_or_else(|| anyhow!("{contract} not deployed at {address:?}"))?;
        match function {
            "getEntranceFee" => Ok(vec![Token::Uint(game.entry_fee)]),
            "conditionExists" => Ok(vec![Token::Bool(
                game.conditions.contains(&string_arg(args, 0)?),
            )]),
            "playerInGame" => match args.first() {
                Some(Token::Address(player)) => {
                    Ok(vec![Token::Bool(game.players.contains(player))])
                }
                other => bail!("playerInGame: expected address, got {other:?}"),
            },
            other => bail!("{contract} has no view {other}"),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://chain"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_accounts() {
        let chain = MockChain::new(3);
        let accounts = chain.accounts().await.unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0], Address::from_low_u64_be(1));
    }

    #[tokio::test]
    async fn test_mock_game_requires_feed() {
        let chain = MockChain::new(1);
        let sender = Account::Node(chain.node_accounts()[0]);
        let args = [
            Token::Address(Address::repeat_byte(0xee)),
            Token::Uint(U256::from(4000u64)),
            Token::String("FIXED".into()),
            Token::String("UNICONDITIONAL".into()),
        ];
        let result = chain.deploy("BettingGame", &args, &sender).await;
        assert!(result.unwrap_err().to_string().contains("no code"));
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let chain = MockChain::new(1);
        chain.set_error("connection refused");
        assert!(chain.accounts().await.is_err());
        chain.clear_error();
        assert!(chain.accounts().await.is_ok());
    }
}
