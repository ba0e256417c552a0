//! CoboFactory: deploys account and authorizer proxies

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;
use tracing::info;

use super::codec::{b32, fmt_address, parse_address, rand_salt, s32, FACTORY_ADDRESS};
use super::ownable::{ownable_export, ownable_report, Describe, Ownable};
use super::ContractHandle;
use crate::chain::ChainClient;
use crate::error::{Error, Result};
use crate::report::Report;

fn fixed(tag: H256) -> Token {
    Token::FixedBytes(tag.as_bytes().to_vec())
}

#[derive(Debug, Clone)]
pub struct CoboFactory {
    contract: ContractHandle,
}

impl CoboFactory {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            contract: ContractHandle::load("CoboFactory", address, client)?,
        })
    }

    /// Factory at the well-known deployment address
    pub fn default_deployment(client: Arc<dyn ChainClient>) -> Result<Self> {
        Self::new(parse_address(FACTORY_ADDRESS)?, client)
    }

    /// Latest implementation registered under `name`
    pub async fn get_address(&self, name: &str) -> Result<Option<Address>> {
        let address: Address = self
            .contract
            .query("getLatestImplementation", &[fixed(b32(name)?)])
            .await?;
        Ok((!address.is_zero()).then_some(address))
    }

    pub async fn get_all_names(&self) -> Result<Vec<String>> {
        let names: Vec<H256> = self.contract.query("getAllNames", &[]).await?;
        names.iter().map(|n| s32(n.as_bytes())).collect()
    }

    /// Last CoboSafeAccount deployed by `safe`
    pub async fn get_cobosafe(&self, safe: Address) -> Result<Option<Address>> {
        let address: Address = self
            .contract
            .query(
                "getLastRecord",
                &[Token::Address(safe), fixed(b32("CoboSafeAccount")?)],
            )
            .await?;
        Ok((!address.is_zero()).then_some(address))
    }

    pub async fn get_all_impls(&self) -> Result<Vec<(String, Option<Address>)>> {
        let mut impls = Vec::new();
        for name in self.get_all_names().await? {
            let address = self.get_address(&name).await?;
            impls.push((name, address));
        }
        Ok(impls)
    }

    /// CREATE2 address a `create2(name, salt)` from `creator` lands on
    pub async fn get_create2_address(&self, creator: Address, name: &str, salt: H256) -> Result<Address> {
        self.contract
            .query(
                "getCreate2Address",
                &[Token::Address(creator), fixed(b32(name)?), fixed(salt)],
            )
            .await
    }

    /// Deploy a `name` proxy; the address comes from a dry-run from the same deployer
    pub async fn create(&self, name: &str, deployer: Address) -> Result<Address> {
        let args = [fixed(b32(name)?)];
        let output = self
            .contract
            .call_tokens(Some(deployer), "create", &args, U256::zero())
            .await?;
        let proxy = match output.first() {
            Some(Token::Address(address)) => *address,
            _ => return Err(Error::Decode("create returned no address".to_string())),
        };

        let receipt = self.contract.send(deployer, "create", &args, U256::zero()).await?;
        info!("Created {} at {} ({})", name, fmt_address(&proxy), receipt);
        Ok(proxy)
    }

    /// Deploy a `name` proxy at a deterministic address; random salt when `None`
    pub async fn create2(&self, name: &str, salt: Option<H256>, deployer: Address) -> Result<Address> {
        let salt = salt.unwrap_or_else(rand_salt);
        let proxy = self.get_create2_address(deployer, name, salt).await?;

        let receipt = self
            .contract
            .send(deployer, "create2", &[fixed(b32(name)?), fixed(salt)], U256::zero())
            .await?;
        info!("Created {} at {} ({})", name, fmt_address(&proxy), receipt);
        Ok(proxy)
    }
}

impl Ownable for CoboFactory {
    fn contract(&self) -> &ContractHandle {
        &self.contract
    }
}

fn fmt_optional(address: Option<Address>) -> String {
    address.map(|a| fmt_address(&a)).unwrap_or_else(|| "None".to_string())
}

#[async_trait]
impl Describe for CoboFactory {
    async fn dump(&self, _full: bool) -> Result<Report> {
        let mut report = ownable_report(self).await?;
        let impls = self.get_all_impls().await?;
        report.text(format!("Latest implementations (Total {}):", impls.len()));
        for (name, address) in impls {
            report.text(format!("  {}: {}", name, fmt_optional(address)));
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = ownable_export(self).await?;
        let mut impls = Mapping::new();
        for (name, address) in self.get_all_impls().await? {
            let value = address.map(|a| Value::from(fmt_address(&a))).unwrap_or(Value::Null);
            impls.insert(name.into(), value);
        }
        map.insert("Implementations".into(), Value::Mapping(impls));
        Ok(map)
    }
}
