//! Chain access
//!
//! Wrappers talk to the node through [`ChainClient`] only: read calls,
//! dry-runs and submissions. The console builds clients per network through
//! a [`Connector`].

pub mod keyring;
pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use std::sync::Arc;

use crate::config::{NetworkConfig, RpcConfig};
use crate::error::Result;

pub use keyring::{load_account, Keyring, LoadedAccount};
pub use rpc::{RpcChainClient, RpcConnector};

/// A single contract call, used both for `eth_call` and for submission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            data: data.into(),
            value: U256::zero(),
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Four byte selector of the calldata, if present
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }

    pub fn to_transaction(&self) -> TransactionRequest {
        let mut tx = TransactionRequest::new()
            .to(self.to)
            .data(self.data.clone())
            .value(self.value);
        if let Some(from) = self.from {
            tx = tx.from(from);
        }
        tx
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl From<&TransactionReceipt> for TxReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        }
    }
}

impl std::fmt::Display for TxReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.hash)?;
        if let Some(block) = self.block_number {
            write!(f, " (block {})", block)?;
        }
        Ok(())
    }
}

/// Remote node operations used by the contract wrappers
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64>;

    /// `eth_call`; a set `from` makes it a dry-run of that sender
    async fn call(&self, request: &CallRequest) -> Result<Bytes>;

    /// Submit a transaction from `request.from` and wait for its receipt
    async fn send(&self, request: &CallRequest) -> Result<TxReceipt>;
}

/// Builds a chain client for a configured network
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        network: &NetworkConfig,
        rpc: &RpcConfig,
        keyring: Keyring,
    ) -> Result<Arc<dyn ChainClient>>;
}
