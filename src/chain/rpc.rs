//! JSON-RPC chain client.
//!
//! Talks to an Ethereum node over HTTP using the `web3` crate. Node-managed
//! accounts send through `eth_sendTransaction`; local keys sign here and
//! send through `eth_sendRawTransaction`. Every state-changing call waits
//! for its receipt and fails on a reverted status.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use web3::ethabi::Token;
use web3::transports::Http;
use web3::types::{
    Address, Bytes, CallRequest, TransactionParameters, TransactionReceipt, TransactionRequest,
    H256, U256, U64,
};
use web3::Web3;

use super::artifacts::ArtifactStore;
use super::{Account, Chain};
use crate::config::{AppConfig, NetworkConfig};
use crate::types::{BettingError, TxOutcome};

pub struct RpcChain {
    web3: Web3<Http>,
    endpoint: String,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcChain {
    pub fn new(network: &NetworkConfig, cfg: &AppConfig) -> Result<Self> {
        let transport = Http::new(&network.rpc_url)
            .with_context(|| format!("Failed to build HTTP transport for {}", network.rpc_url))?;

        Ok(Self {
            web3: Web3::new(transport),
            endpoint: network.rpc_url.clone(),
            artifacts: ArtifactStore::new(&cfg.project.build_dir),
            poll_interval: cfg.project.poll_interval(),
            receipt_timeout: cfg.project.receipt_timeout(),
        })
    }

    /// Broadcast a transaction from `sender` and wait for it to be mined.
    async fn submit(
        &self,
        to: Option<Address>,
        data: Vec<u8>,
        value: U256,
        sender: &Account,
    ) -> Result<TxOutcome> {
        let hash = match sender {
            Account::Node(from) => {
                let tx = TransactionRequest {
                    from: *from,
                    to,
                    value: Some(value),
                    data: Some(Bytes(data)),
                    ..Default::default()
                };
                self.web3
                    .eth()
                    .send_transaction(tx)
                    .await
                    .context("eth_sendTransaction failed")?
            }
            Account::Local { address, key } => {
                let estimate = CallRequest {
                    from: Some(*address),
                    to,
                    value: Some(value),
                    data: Some(Bytes(data.clone())),
                    ..Default::default()
                };
                let gas = self
                    .web3
                    .eth()
                    .estimate_gas(estimate, None)
                    .await
                    .context("Gas estimation failed")?;

                let params = TransactionParameters {
                    to,
                    gas,
                    value,
                    data: Bytes(data),
                    ..Default::default()
                };
                let signed = self
                    .web3
                    .accounts()
                    .sign_transaction(params, key)
                    .await
                    .context("Failed to sign transaction")?;
                self.web3
                    .eth()
                    .send_raw_transaction(signed.raw_transaction)
                    .await
                    .context("eth_sendRawTransaction failed")?
            }
        };

        debug!(tx = ?hash, from = %sender, "Transaction sent");
        let receipt = self.wait_for_receipt(hash).await?;

        if receipt.status == Some(U64::zero()) {
            return Err(BettingError::Reverted { tx: hash }.into());
        }

        Ok(TxOutcome {
            transaction_hash: hash,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
        })
    }

    async fn wait_for_receipt(&self, hash: H256) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt = self
                .web3
                .eth()
                .transaction_receipt(hash)
                .await
                .with_context(|| format!("Failed to fetch receipt for {hash:?}"))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Transaction {hash:?} not mined within {}s",
                    self.receipt_timeout.as_secs()
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Chain for RpcChain {
    async fn accounts(&self) -> Result<Vec<Address>> {
        self.web3
            .eth()
            .accounts()
            .await
            .with_context(|| format!("eth_accounts failed on {}", self.endpoint))
    }

    async fn deploy(&self, contract: &str, args: &[Token], sender: &Account) -> Result<TxOutcome> {
        let artifact = self.artifacts.get(contract)?;
        let data = artifact.creation_data(args)?;

        let outcome = self.submit(None, data, U256::zero(), sender).await?;
        let address = outcome.contract_address.ok_or_else(|| BettingError::Contract {
            contract: contract.to_string(),
            message: format!("receipt {:?} has no contract address", outcome.transaction_hash),
        })?;

        info!(contract, address = ?address, tx = ?outcome.transaction_hash, "Contract deployed");
        Ok(outcome)
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
        let artifact = self.artifacts.get(contract)?;
        let data = artifact
            .function(function, args)?
            .encode_input(args)
            .with_context(|| format!("Failed to encode {contract}.{function}"))?;

        let outcome = self.submit(Some(address), data, value, sender).await?;
        debug!(
            contract,
            function,
            tx = ?outcome.transaction_hash,
            gas_used = ?outcome.gas_used,
            "Transaction mined"
        );
        Ok(outcome)
    }

    async fn query(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>> {
        let artifact = self.artifacts.get(contract)?;
        let function = artifact.function(function, args)?;
        let data = function
            .encode_input(args)
            .with_context(|| format!("Failed to encode {contract}.{}", function.name))?;

        let request = CallRequest {
            from,
            to: Some(address),
            data: Some(Bytes(data)),
            ..Default::default()
        };
        let output = self
            .web3
            .eth()
            .call(request, None)
            .await
            .with_context(|| format!("eth_call {contract}.{} failed", function.name))?;

        function
            .decode_output(&output.0)
            .with_context(|| format!("Failed to decode {contract}.{} output", function.name))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
