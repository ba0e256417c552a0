//! Contract wrappers
//!
//! A [`ContractHandle`] binds an ABI (loaded by contract name) to an address
//! and a chain client. Wrappers own one handle each and never rebind it.

pub mod abi;
pub mod account;
pub mod authorizer;
pub mod codec;
pub mod erc20;
pub mod factory;
pub mod ownable;
pub mod role_manager;
pub mod safe;

use ethers::abi::{Abi, Detokenize, Function, Token};
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;
use tracing::debug;

use crate::chain::{CallRequest, ChainClient, TxReceipt};
use crate::error::{Error, Result};

pub use account::{
    CoboAccount, CoboSafeAccount, CoboSmartAccount, RawTransaction, TransactionEnvelope, TransactionResult,
};
pub use authorizer::{
    ArgusRootAuthorizer, Authorizer, BaseAcl, BaseAuthorizer, DexBaseAcl, FarmingBaseAcl, FuncAuthorizer,
    StargateWithdrawAuthorizer, TransferAuthorizer,
};
pub use codec::Operation;
pub use erc20::Erc20;
pub use factory::CoboFactory;
pub use ownable::{BaseOwnable, Ownable};
pub use role_manager::FlatRoleManager;
pub use safe::GnosisSafe;

/// ABI bound to an address
#[derive(Clone)]
pub struct ContractHandle {
    name: &'static str,
    address: Address,
    abi: Arc<Abi>,
    client: Arc<dyn ChainClient>,
}

impl ContractHandle {
    pub fn load(name: &'static str, address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        let abi = abi::load_abi(name)?;
        Ok(Self {
            name,
            address,
            abi,
            client,
        })
    }

    /// ABI name this handle was loaded with
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    fn function(&self, method: &str) -> Result<&Function> {
        self.abi.function(method).map_err(|_| Error::UnknownMethod {
            contract: self.name.to_string(),
            method: method.to_string(),
        })
    }

    /// Calldata for `method(args)`
    pub fn encode(&self, method: &str, args: &[Token]) -> Result<Bytes> {
        let function = self.function(method)?;
        Ok(function.encode_input(args)?.into())
    }

    /// Decode the calldata of a `method` call (selector included)
    pub fn decode_input(&self, method: &str, data: &[u8]) -> Result<Vec<Token>> {
        let function = self.function(method)?;
        if data.len() < 4 || data[..4] != function.short_signature() {
            return Err(Error::Decode(format!("calldata is not a {} call", method)));
        }
        Ok(function.decode_input(&data[4..])?)
    }

    /// `eth_call` returning raw output tokens; `from` turns it into a dry-run
    pub async fn call_tokens(
        &self,
        from: Option<Address>,
        method: &str,
        args: &[Token],
        value: U256,
    ) -> Result<Vec<Token>> {
        let function = self.function(method)?;
        let data = function.encode_input(args)?;
        let mut request = CallRequest::new(self.address, data).value(value);
        request.from = from;

        debug!("{}({}).{}", self.name, self.address_hex(), method);
        let output = self.client.call(&request).await?;
        Ok(function.decode_output(&output)?)
    }

    /// Read call decoded into `D`
    pub async fn query<D: Detokenize>(&self, method: &str, args: &[Token]) -> Result<D> {
        let tokens = self.call_tokens(None, method, args, U256::zero()).await?;
        D::from_tokens(tokens).map_err(|e| Error::Decode(format!("{}.{}: {}", self.name, method, e)))
    }

    /// Submit `method(args)` from `from`
    pub async fn send(&self, from: Address, method: &str, args: &[Token], value: U256) -> Result<TxReceipt> {
        let data = self.encode(method, args)?;
        let request = CallRequest::new(self.address, data).from(from).value(value);
        self.client.send(&request).await
    }

    fn address_hex(&self) -> String {
        codec::fmt_address(&self.address)
    }
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} {}>", self.name, self.address_hex())
    }
}
