//! betting-game: deploy and exercise the BettingGame contract.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! selects the network and dispatches one of the subcommands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use web3::types::U256;

use betting_game::chain::rpc::RpcChain;
use betting_game::chain::Chain;
use betting_game::config::AppConfig;
use betting_game::deploy::Deployer;
use betting_game::fee::{fee_in_native, to_ether};
use betting_game::network::ActiveNetwork;
use betting_game::scenarios::{self, Scenario, ALL_SCENARIOS};
use betting_game::types::{BetType, BettingError, GameType};

const BANNER: &str = r#"
  ___      _   _   _
 | _ ) ___| |_| |_(_)_ _  __ _    __ _ __ _ _ __  ___
 | _ \/ -_)  _|  _| | ' \/ _` |  / _` / _` | '  \/ -_)
 |___/\___|\__|\__|_|_||_\__, |  \__, \__,_|_|_|_\___|
                         |___/   |___/
"#;

#[derive(Debug, Parser)]
#[command(about, version, arg_required_else_help = true)]
struct Arguments {
    /// Configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Network to use; defaults to `project.default_network`.
    #[arg(short, long)]
    network: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the account transactions would be sent from.
    Accounts,
    /// Resolve the price feed, deploying a mock where needed.
    PriceFeed,
    /// Deploy a BettingGame.
    Deploy {
        /// Entry fee in fiat units.
        #[arg(long, default_value_t = 4000)]
        entry_fee: u64,
        /// FIXED or FREE.
        #[arg(long, default_value = "FIXED")]
        bet_type: BetType,
        /// UNICONDITIONAL, MULTICONDITIONAL or HIGH_SCORE.
        #[arg(long, default_value = "UNICONDITIONAL")]
        game_type: GameType,
    },
    /// Run the integration scenarios against the network.
    Test {
        /// Run only this scenario (can_add_condition, can_join_game, all_types).
        #[arg(long)]
        scenario: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Arguments::parse();
    let cfg = AppConfig::load(&args.config)?;

    init_logging();
    println!("{BANNER}");

    let network = ActiveNetwork::select(&cfg, args.network.as_deref())?;
    let chain: Arc<dyn Chain> = Arc::new(RpcChain::new(&network.config, &cfg)?);
    info!(
        network = %network.name,
        kind = %network.kind,
        rpc = %chain.endpoint(),
        verify = network.config.verify,
        "Network selected"
    );

    let mut deployer = Deployer::new(chain, network, cfg)?;

    match args.command {
        Command::Accounts => {
            let account = deployer.account().await?;
            println!("{account}");
        }
        Command::PriceFeed => {
            let account = deployer.account().await?;
            let feed = deployer.price_feed(&account).await?;
            let round = feed.latest_round_data().await?;
            info!(
                address = ?feed.address(),
                round = %round.round_id,
                answer = %round.answer,
                "Price feed resolved"
            );
            match round.rate() {
                Some(rate) => {
                    let one_unit = fee_in_native(rate, U256::one())?;
                    match to_ether(one_unit) {
                        Some(ether) => println!(
                            "{:?} (1 unit = {one_unit} wei = {ether} ether)",
                            feed.address()
                        ),
                        None => println!("{:?} (1 unit = {one_unit} wei)", feed.address()),
                    }
                }
                None => {
                    warn!("Price feed reports a negative answer");
                    println!("{:?}", feed.address());
                }
            }
        }
        Command::Deploy {
            entry_fee,
            bet_type,
            game_type,
        } => {
            let game = deployer
                .deploy_betting_game(U256::from(entry_fee), bet_type, game_type)
                .await?;
            println!("{:?}", game.address());
        }
        Command::Test { scenario } => {
            let selected: Vec<Scenario> = match scenario.as_deref() {
                Some(name) => vec![Scenario::from_name(name).ok_or_else(|| {
                    BettingError::UnknownVariant {
                        kind: "scenario",
                        value: name.to_string(),
                    }
                })?],
                None => ALL_SCENARIOS.to_vec(),
            };

            let reports = scenarios::run_all(&mut deployer, &selected).await;
            let failed = reports.iter().filter(|r| !r.passed()).count();
            for report in &reports {
                let status = if report.passed() { "PASSED" } else { "FAILED" };
                println!("{status:<7} {} ({} ms)", report.scenario, report.elapsed_ms);
                if let Some(error) = &report.error {
                    println!("        {error}");
                }
            }
            println!("{} passed, {failed} failed", reports.len() - failed);
            if failed > 0 {
                anyhow::bail!("{failed} scenario(s) failed");
            }
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("betting_game=info"));

    if std::env::var("BETTING_GAME_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
