//! In-memory chain used by the unit tests

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{CallRequest, ChainClient, Connector, Keyring, TxReceipt};
use crate::config::{NetworkConfig, RpcConfig};
use crate::contracts::codec::{b32, func_selector};
use crate::error::{Error, Result};

/// Canned responses keyed by contract and selector or exact calldata.
/// Anything unregistered reverts.
#[derive(Default)]
pub struct MockChain {
    chain_id: u64,
    by_selector: Mutex<HashMap<(Address, [u8; 4]), Vec<u8>>>,
    by_calldata: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    calls: Mutex<Vec<CallRequest>>,
    sent: Mutex<Vec<CallRequest>>,
    fail_sends: Mutex<bool>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            ..Default::default()
        })
    }

    /// Answer any call of `signature` on `address`
    pub fn on(&self, address: Address, signature: &str, output: Vec<Token>) {
        self.by_selector
            .lock()
            .unwrap()
            .insert((address, func_selector(signature)), abi::encode(&output));
    }

    /// Answer a call of `signature` with exactly these arguments
    pub fn on_args(&self, address: Address, signature: &str, args: &[Token], output: Vec<Token>) {
        let mut data = func_selector(signature).to_vec();
        data.extend_from_slice(&abi::encode(args));
        self.by_calldata
            .lock()
            .unwrap()
            .insert((address, data), abi::encode(&output));
    }

    /// Register `NAME()` (and optionally `TYPE()`) metadata
    pub fn named(&self, address: Address, name: &str, typ: Option<&str>) {
        self.on(address, "NAME()", vec![bytes32(name)]);
        if let Some(typ) = typ {
            self.on(address, "TYPE()", vec![bytes32(typ)]);
        }
    }

    /// Register the ownable reads shared by every CoboSafe contract
    pub fn ownable(&self, address: Address, name: &str, version: u64, owner: Address) {
        self.named(address, name, None);
        self.on(address, "VERSION()", vec![Token::Uint(U256::from(version))]);
        self.on(address, "owner()", vec![Token::Address(owner)]);
        self.on(address, "pendingOwner()", vec![Token::Address(Address::zero())]);
    }

    pub fn fail_sends(&self) {
        *self.fail_sends.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn lookup(&self, request: &CallRequest) -> Result<Vec<u8>> {
        if let Some(out) = self
            .by_calldata
            .lock()
            .unwrap()
            .get(&(request.to, request.data.to_vec()))
        {
            return Ok(out.clone());
        }

        let selector = request
            .selector()
            .ok_or_else(|| Error::Rpc("execution reverted".to_string()))?;

        self.by_selector
            .lock()
            .unwrap()
            .get(&(request.to, selector))
            .cloned()
            .ok_or_else(|| Error::Rpc("execution reverted".to_string()))
    }
}

pub fn bytes32(tag: &str) -> Token {
    Token::FixedBytes(b32(tag).unwrap().as_bytes().to_vec())
}

pub fn addresses(items: &[Address]) -> Token {
    Token::Array(items.iter().copied().map(Token::Address).collect())
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.calls.lock().unwrap().push(request.clone());
        self.lookup(request).map(Bytes::from)
    }

    async fn send(&self, request: &CallRequest) -> Result<TxReceipt> {
        if request.from.is_none() {
            return Err(Error::NotSet("sender"));
        }
        if *self.fail_sends.lock().unwrap() {
            return Err(Error::Rpc("execution reverted".to_string()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(TxReceipt {
            hash: H256::from(keccak256((sent.len() as u64).to_be_bytes())),
            block_number: Some(sent.len() as u64),
            gas_used: Some(U256::from(21_000)),
        })
    }
}

/// Connector handing out the same mock for every network
pub struct MockConnector(pub Arc<MockChain>);

impl Connector for MockConnector {
    fn connect(
        &self,
        _network: &NetworkConfig,
        _rpc: &RpcConfig,
        _keyring: Keyring,
    ) -> Result<Arc<dyn ChainClient>> {
        Ok(self.0.clone())
    }
}
