//! Account and price-feed resolution per network class.

use std::sync::Arc;
use web3::types::{Address, U256};

use betting_game::chain::Account;
use betting_game::contracts::PRICE_FEED_ABI;
use betting_game::network::{get_account, ActiveNetwork, MOCK_AGGREGATOR};
use betting_game::types::{BettingError, NetworkKind};

use crate::common::{config, deployer, DEV_ADDRESS, DEV_KEY};
use crate::mock_chain::MockChain;

#[tokio::test]
async fn test_local_network_uses_first_node_account() {
    let chain = Arc::new(MockChain::new(3));
    let cfg = config("BETTING_GAME_IT_UNUSED_KEY");
    let network = ActiveNetwork::select(&cfg, Some("development")).unwrap();

    let account = get_account(chain.as_ref(), &network, &cfg).await.unwrap();
    assert!(matches!(account, Account::Node(_)));
    assert_eq!(account.address(), chain.node_accounts()[0]);
}

#[tokio::test]
async fn test_local_network_without_accounts_fails() {
    let chain = Arc::new(MockChain::new(0));
    let cfg = config("BETTING_GAME_IT_UNUSED_KEY");
    let network = ActiveNetwork::select(&cfg, Some("development")).unwrap();

    let err = get_account(chain.as_ref(), &network, &cfg).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BettingError>(),
        Some(BettingError::NoAccounts(_))
    ));
}

#[tokio::test]
async fn test_private_network_uses_configured_key() {
    let env = "BETTING_GAME_IT_PRIVATE_KEY";
    std::env::set_var(env, DEV_KEY);
    let chain = Arc::new(MockChain::new(3));
    let cfg = config(env);
    let network = ActiveNetwork::select(&cfg, Some("Hmz-private-chain")).unwrap();
    assert_eq!(network.kind, NetworkKind::Private);

    let account = get_account(chain.as_ref(), &network, &cfg).await.unwrap();
    assert!(matches!(account, Account::Local { .. }));
    assert_eq!(account.address(), DEV_ADDRESS.parse::<Address>().unwrap());
}

#[tokio::test]
async fn test_live_network_requires_key() {
    let chain = Arc::new(MockChain::new(3));
    let cfg = config("BETTING_GAME_IT_MISSING_KEY");
    let network = ActiveNetwork::select(&cfg, Some("sepolia")).unwrap();
    assert_eq!(network.kind, NetworkKind::Live);

    let err = get_account(chain.as_ref(), &network, &cfg).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BettingError>(),
        Some(BettingError::MissingWallet(_))
    ));
}

#[tokio::test]
async fn test_mock_aggregator_deployed_once() {
    let chain = Arc::new(MockChain::new(1));
    let mut deployer = deployer(&chain, "development", config("BETTING_GAME_IT_UNUSED_KEY"));
    let account = deployer.account().await.unwrap();

    let first = deployer.price_feed(&account).await.unwrap();
    let second = deployer.price_feed(&account).await.unwrap();

    assert_eq!(first.address(), second.address());
    assert_eq!(chain.deploy_count(MOCK_AGGREGATOR), 1);
    assert_eq!(deployer.deployments().count(MOCK_AGGREGATOR), 1);

    let round = first.latest_round_data().await.unwrap();
    assert_eq!(round.answer, U256::from(4000u64) * U256::exp10(18));
    assert_eq!(first.rate().await.unwrap(), round.answer);
}

#[tokio::test]
async fn test_forked_network_uses_configured_feed() {
    let env = "BETTING_GAME_IT_FORK_KEY";
    std::env::set_var(env, DEV_KEY);
    let chain = Arc::new(MockChain::new(1));
    let mut deployer = deployer(&chain, "mainnet-fork-dev", config(env));
    let account = deployer.account().await.unwrap();

    let feed = deployer.price_feed(&account).await.unwrap();
    let expected: Address = "5f4eC3Df9cbd43714FE2740f5E3616155c5b8419".parse().unwrap();
    assert_eq!(feed.address(), expected);
    assert_eq!(chain.deploy_count(MOCK_AGGREGATOR), 0);
}

#[tokio::test]
async fn test_configured_feed_read_through_aggregator_abi() {
    let env = "BETTING_GAME_IT_FORK_READ_KEY";
    std::env::set_var(env, DEV_KEY);
    let chain = Arc::new(MockChain::new(1));
    let mut deployer = deployer(&chain, "mainnet-fork-dev", config(env));
    let account = deployer.account().await.unwrap();

    let feed = deployer.price_feed(&account).await.unwrap();
    // ETH/USD on mainnet reports 8 decimals
    let answer = U256::from(250_000_000_000u64);
    chain.set_rate(feed.address(), answer);

    assert_eq!(feed.rate().await.unwrap(), answer);
    assert_eq!(
        chain.queries(),
        vec![(PRICE_FEED_ABI.to_string(), "latestRoundData".to_string())]
    );
    assert_eq!(chain.deploy_count(MOCK_AGGREGATOR), 0);
}

#[tokio::test]
async fn test_forked_network_without_feed_fails() {
    let env = "BETTING_GAME_IT_FORK_NOFEED_KEY";
    std::env::set_var(env, DEV_KEY);
    let mut cfg = config(env);
    cfg.networks
        .get_mut("mainnet-fork-dev")
        .unwrap()
        .eth_usd_price_feed = None;
    let chain = Arc::new(MockChain::new(1));
    let mut deployer = deployer(&chain, "mainnet-fork-dev", cfg);
    let account = deployer.account().await.unwrap();

    let err = deployer.price_feed(&account).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BettingError>(),
        Some(BettingError::MissingPriceFeed(_))
    ));
}

#[tokio::test]
async fn test_live_network_without_feed_deploys_mock() {
    let env = "BETTING_GAME_IT_LIVE_KEY";
    std::env::set_var(env, DEV_KEY);
    let chain = Arc::new(MockChain::new(0));
    let mut deployer = deployer(&chain, "sepolia", config(env));
    let account = deployer.account().await.unwrap();

    let feed = deployer.price_feed(&account).await.unwrap();
    assert_eq!(chain.deploy_count(MOCK_AGGREGATOR), 1);
    let calls = chain.calls();
    assert_eq!(calls[0].sender, account.address());
    assert_eq!(deployer.deployments().latest(MOCK_AGGREGATOR).unwrap().address, feed.address());
}
