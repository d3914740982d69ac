//! Integration scenarios against a deployed `BettingGame`.
//!
//! Each scenario deploys fresh games through the shared `Deployer`, drives
//! them through their external entry points, and checks the resulting
//! on-chain state. A failed check is a `BettingError::Assertion`.

use anyhow::Result;
use std::fmt;
use std::time::Instant;
use tracing::{error, info};
use web3::types::U256;

use crate::chain::Account;
use crate::contracts::BettingGame;
use crate::deploy::Deployer;
use crate::fee::fee_in_native;
use crate::types::{BetType, BettingError, GameType};

/// Entry fee every scenario deploys with, in fiat units.
pub const ENTRY_FEE: u64 = 4000;

/// Condition name the scenarios bet on.
pub const CONDITION: &str = "Condition 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    CanAddCondition,
    CanJoinGame,
    AllTypes,
}

pub const ALL_SCENARIOS: [Scenario; 3] = [
    Scenario::CanAddCondition,
    Scenario::CanJoinGame,
    Scenario::AllTypes,
];

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::CanAddCondition => "can_add_condition",
            Scenario::CanJoinGame => "can_join_game",
            Scenario::AllTypes => "all_types",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_SCENARIOS.into_iter().find(|s| s.name() == name)
    }

    pub async fn run(&self, deployer: &mut Deployer) -> Result<()> {
        match self {
            Scenario::CanAddCondition => can_add_condition(deployer).await,
            Scenario::CanJoinGame => can_join_game(deployer).await,
            Scenario::AllTypes => all_types(deployer).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Run `scenarios` in order, continuing past failures.
pub async fn run_all(deployer: &mut Deployer, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let started = Instant::now();
        let result = scenario.run(deployer).await;
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(()) => info!(scenario = %scenario, elapsed_ms, "PASSED"),
            Err(e) => error!(scenario = %scenario, elapsed_ms, error = format!("{e:#}"), "FAILED"),
        }
        reports.push(ScenarioReport {
            scenario: *scenario,
            error: result.err().map(|e| format!("{e:#}")),
            elapsed_ms,
        });
    }
    reports
}

fn check(scenario: Scenario, condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(BettingError::Assertion {
            scenario: scenario.name().to_string(),
            message: message.into(),
        }
        .into())
    }
}

/// Fee in wei for `game`, priced at the network's current oracle rate.
async fn entry_fee_wei(
    deployer: &mut Deployer,
    account: &Account,
    game: &BettingGame,
) -> Result<U256> {
    let entry_fee = game.get_entrance_fee().await?;
    let rate = deployer.price_feed(account).await?.rate().await?;
    Ok(fee_in_native(rate, entry_fee)?)
}

/// A condition can be added and is then reported as existing.
pub async fn can_add_condition(deployer: &mut Deployer) -> Result<()> {
    let account = deployer.account().await?;
    let game = deployer
        .deploy_betting_game(U256::from(ENTRY_FEE), BetType::Fixed, GameType::Uniconditional)
        .await?;

    game.add_condition(CONDITION, &account).await?;

    check(
        Scenario::CanAddCondition,
        game.condition_exists(CONDITION).await?,
        format!("conditionExists({CONDITION:?}) returned false"),
    )
}

/// Paying the converted entry fee makes the account a player.
pub async fn can_join_game(deployer: &mut Deployer) -> Result<()> {
    let account = deployer.account().await?;
    let game = deployer
        .deploy_betting_game(U256::from(ENTRY_FEE), BetType::Fixed, GameType::Uniconditional)
        .await?;

    let fee_wei = entry_fee_wei(deployer, &account, &game).await?;
    game.add_condition(CONDITION, &account).await?;
    game.enter(CONDITION, U256::one(), fee_wei, &account).await?;

    check(
        Scenario::CanJoinGame,
        game.player_in_game(account.address(), Some(account.address()))
            .await?,
        format!("playerInGame({account}) returned false after entering"),
    )
}

/// Every game type accepts an entry from the account.
pub async fn all_types(deployer: &mut Deployer) -> Result<()> {
    let account = deployer.account().await?;
    let fee = U256::from(ENTRY_FEE);
    let multi_free = deployer
        .deploy_betting_game(fee, BetType::Free, GameType::Multiconditional)
        .await?;
    let high_score = deployer
        .deploy_betting_game(fee, BetType::Fixed, GameType::HighScore)
        .await?;
    let uni_fixed = deployer
        .deploy_betting_game(fee, BetType::Fixed, GameType::Uniconditional)
        .await?;

    let uni_fee_wei = entry_fee_wei(deployer, &account, &uni_fixed).await?;
    let multi_fee_wei = entry_fee_wei(deployer, &account, &multi_free).await?;
    let high_fee_wei = entry_fee_wei(deployer, &account, &high_score).await?;

    uni_fixed.add_condition(CONDITION, &account).await?;
    uni_fixed
        .enter(CONDITION, U256::one(), uni_fee_wei, &account)
        .await?;

    for i in 1..4u64 {
        let condition = format!("{CONDITION}{i}");
        multi_free.add_condition(&condition, &account).await?;
        multi_free
            .enter(&condition, U256::from(i), multi_fee_wei, &account)
            .await?;
    }

    high_score
        .enter_without_condition(high_fee_wei, &account)
        .await?;

    for (label, game) in [
        ("UNICONDITIONAL/FIXED", &uni_fixed),
        ("HIGH_SCORE/FIXED", &high_score),
        ("MULTICONDITIONAL/FREE", &multi_free),
    ] {
        let in_game = game
            .player_in_game(account.address(), Some(account.address()))
            .await?;
        check(
            Scenario::AllTypes,
            in_game,
            format!("{account} not in {label} game at {:?}", game.address()),
        )?;
    }
    Ok(())
}
