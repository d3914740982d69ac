//! Chain access.
//!
//! Defines the `Chain` trait the resolver, deployer and scenarios talk to,
//! and the `Account` a transaction is sent from. The JSON-RPC backed
//! implementation lives in [`rpc`]; compiled contracts are loaded by
//! [`artifacts`].

pub mod artifacts;
pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use web3::ethabi::Token;
use web3::signing::{Key, SecretKey, SecretKeyRef};
use web3::types::{Address, U256};

use crate::types::TxOutcome;

/// Identity a transaction is sent from.
#[derive(Clone)]
pub enum Account {
    /// Unlocked account managed by the node; sent via `eth_sendTransaction`.
    Node(Address),
    /// Key held locally; transactions are signed here and sent raw.
    Local { address: Address, key: SecretKey },
}

impl Account {
    /// Build a local account from a hex private key (`0x` prefix optional).
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim().trim_start_matches("0x"))
            .map_err(|e| anyhow::anyhow!("Private key is not valid hex: {e}"))?;
        let key = SecretKey::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("Private key is not a valid secp256k1 key: {e}"))?;
        let address = SecretKeyRef::new(&key).address();
        Ok(Account::Local { address, key })
    }

    pub fn address(&self) -> Address {
        match self {
            Account::Node(address) => *address,
            Account::Local { address, .. } => *address,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Node(address) => f.debug_tuple("Node").field(address).finish(),
            Account::Local { address, .. } => f
                .debug_struct("Local")
                .field("address", address)
                .field("key", &"[REDACTED]")
                .finish(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.address())
    }
}

/// Abstraction over an EVM chain reachable by this tooling.
///
/// Contracts are named by their artifact name (`BettingGame`,
/// `MockV3Aggregator`); arguments and results are ABI tokens.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Accounts the node manages (unlocked on development chains).
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Send a contract-creation transaction and wait for it to be mined.
    /// The returned outcome carries the new contract's address.
    async fn deploy(&self, contract: &str, args: &[Token], sender: &Account) -> Result<TxOutcome>;

    /// Send a state-changing call and wait for it to be mined.
    async fn transact(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Token],
        sender: &Account,
        value: U256,
    ) -> Result<TxOutcome>;

    /// Execute a read-only call against the latest block.
    async fn query(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>>;

    /// Human-readable endpoint for logging.
    fn endpoint(&self) -> &str;
}
