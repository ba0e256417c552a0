//! JSON-RPC chain client over `ethers`

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::Signer;
use ethers::types::{transaction::eip2718::TypedTransaction, Bytes, TransactionReceipt, U64};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{CallRequest, ChainClient, Connector, Keyring, TxReceipt};
use crate::config::{mask_url, NetworkConfig, RpcConfig};
use crate::contracts::codec::fmt_address;
use crate::error::{Error, Result};

/// Chain client backed by an HTTP provider
pub struct RpcChainClient {
    provider: Provider<Http>,
    keyring: Keyring,
    chain_id: OnceCell<u64>,
    confirmations: usize,
}

impl RpcChainClient {
    pub fn new(network: &NetworkConfig, rpc: &RpcConfig, keyring: Keyring) -> Result<Self> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| Error::Config(format!("Invalid rpc_url {}: {}", mask_url(&network.rpc_url), e)))?
            .interval(Duration::from_millis(rpc.poll_interval_ms));

        Ok(Self {
            provider,
            keyring,
            chain_id: OnceCell::new(),
            confirmations: rpc.confirmations,
        })
    }

    fn check_receipt(receipt: Option<TransactionReceipt>) -> Result<TxReceipt> {
        let receipt =
            receipt.ok_or_else(|| Error::Rpc("transaction dropped from mempool".to_string()))?;

        if receipt.status == Some(U64::zero()) {
            warn!("Transaction {:?} reverted", receipt.transaction_hash);
            return Err(Error::Reverted(format!("{:?}", receipt.transaction_hash)));
        }

        Ok(TxReceipt::from(&receipt))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                let id = self.provider.get_chainid().await?;
                Ok::<u64, Error>(id.as_u64())
            })
            .await?;
        Ok(*id)
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        debug!("eth_call to {}", fmt_address(&request.to));
        let tx: TypedTransaction = request.to_transaction().into();
        Ok(self.provider.call(&tx, None).await?)
    }

    async fn send(&self, request: &CallRequest) -> Result<TxReceipt> {
        let from = request.from.ok_or(Error::NotSet("sender"))?;
        let tx = request.to_transaction();

        let receipt = match self.keyring.get(&from) {
            Some(wallet) => {
                let chain_id = self.chain_id().await?;
                info!("Signing transaction locally as {}", fmt_address(&from));
                let client = SignerMiddleware::new(self.provider.clone(), wallet.with_chain_id(chain_id));
                let receipt = client
                    .send_transaction(tx, None)
                    .await
                    .map_err(|e| Error::Rpc(e.to_string()))?
                    .confirmations(self.confirmations)
                    .await?;
                receipt
            }
            None => {
                info!("Sending transaction through node account {}", fmt_address(&from));
                self.provider
                    .send_transaction(tx, None)
                    .await?
                    .confirmations(self.confirmations)
                    .await?
            }
        };

        let receipt = Self::check_receipt(receipt)?;
        info!("Transaction confirmed: {}", receipt);
        Ok(receipt)
    }
}

/// Connects configured networks over HTTP
#[derive(Debug, Default, Clone, Copy)]
pub struct RpcConnector;

impl Connector for RpcConnector {
    fn connect(
        &self,
        network: &NetworkConfig,
        rpc: &RpcConfig,
        keyring: Keyring,
    ) -> Result<Arc<dyn ChainClient>> {
        info!("Connecting to {} (chain id {})", mask_url(&network.rpc_url), network.chain_id);
        Ok(Arc::new(RpcChainClient::new(network, rpc, keyring)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    fn network(url: &str) -> NetworkConfig {
        NetworkConfig {
            rpc_url: url.to_string(),
            chain_id: 1337,
            explorer_url: None,
        }
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        let result = RpcConnector.connect(&network("not a url"), &RpcConfig::default(), Keyring::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_connect_is_lazy() {
        // No request is made until the first call
        let result = RpcConnector.connect(
            &network("http://127.0.0.1:1"),
            &RpcConfig::default(),
            Keyring::new(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_receipt_status() {
        let mut receipt = TransactionReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            status: Some(U64::one()),
            ..Default::default()
        };
        assert!(RpcChainClient::check_receipt(Some(receipt.clone())).is_ok());

        receipt.status = Some(U64::zero());
        assert!(matches!(
            RpcChainClient::check_receipt(Some(receipt)),
            Err(Error::Reverted(_))
        ));

        assert!(RpcChainClient::check_receipt(None).is_err());
    }
}
