//! ERC20 token reads used to label addresses in dumps

use dashmap::DashMap;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

use super::codec::{eth_address, fmt_address};
use super::ContractHandle;
use crate::chain::{ChainClient, TxReceipt};
use crate::error::Result;

lazy_static::lazy_static! {
    /// Token symbols by (chain id, token)
    static ref SYMBOL_CACHE: DashMap<(u64, Address), String> = DashMap::new();
}

#[derive(Debug, Clone)]
pub struct Erc20 {
    contract: ContractHandle,
}

impl Erc20 {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            contract: ContractHandle::load("ERC20", address, client)?,
        })
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Token symbol, read once per chain and cached for the process
    pub async fn symbol(&self) -> Result<String> {
        let chain_id = self.contract.client().chain_id().await?;
        let key = (chain_id, self.address());
        if let Some(symbol) = SYMBOL_CACHE.get(&key) {
            return Ok(symbol.value().clone());
        }

        let symbol: String = self.contract.query("symbol", &[]).await?;
        debug!("Cached symbol {} for {}", symbol, fmt_address(&key.1));
        SYMBOL_CACHE.insert(key, symbol.clone());
        Ok(symbol)
    }

    pub async fn decimals(&self) -> Result<u8> {
        self.contract.query("decimals", &[]).await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.contract.query("balanceOf", &[Token::Address(owner)]).await
    }

    pub async fn approve(&self, spender: Address, amount: U256, from: Address) -> Result<TxReceipt> {
        info!("Approving {} of {:?} to {}", amount, self.contract, fmt_address(&spender));
        self.contract
            .send(
                from,
                "approve",
                &[Token::Address(spender), Token::Uint(amount)],
                U256::zero(),
            )
            .await
    }
}

/// `SYM(address)` label for a token, `ETH(address)` for the native placeholder,
/// the bare address when the token has no readable symbol
pub async fn get_symbol(client: Arc<dyn ChainClient>, token: Address) -> String {
    let shown = fmt_address(&token);
    if token == eth_address() {
        return format!("ETH({})", shown);
    }

    let symbol = match Erc20::new(token, client) {
        Ok(erc20) => erc20.symbol().await,
        Err(e) => Err(e),
    };
    match symbol {
        Ok(symbol) => format!("{}({})", symbol, shown),
        Err(e) => {
            debug!("No symbol for {}: {}", shown, e);
            shown
        }
    }
}
