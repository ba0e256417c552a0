//! Ownable contracts (every CoboSafe contract implements `IVersion` + ownership)

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::codec::{fmt_address, s32};
use super::ContractHandle;
use crate::chain::{ChainClient, TxReceipt};
use crate::error::Result;
use crate::report::Report;

/// Reads shared by every CoboSafe contract
#[async_trait]
pub trait Ownable: Send + Sync {
    fn contract(&self) -> &ContractHandle;

    fn address(&self) -> Address {
        self.contract().address()
    }

    /// On-chain `NAME`; `None` when the contract does not implement it
    async fn name(&self) -> Option<String> {
        self.contract()
            .query::<H256>("NAME", &[])
            .await
            .ok()
            .and_then(|name| s32(name.as_bytes()).ok())
    }

    async fn version(&self) -> Result<U256> {
        self.contract().query("VERSION", &[]).await
    }

    async fn owner(&self) -> Result<Address> {
        self.contract().query("owner", &[]).await
    }

    async fn pending_owner(&self) -> Result<Address> {
        self.contract().query("pendingOwner", &[]).await
    }

    /// `initialize(owner)` on a freshly deployed proxy
    async fn initialize(&self, owner: Address, from: Address) -> Result<TxReceipt> {
        info!("Initializing {:?} with owner {}", self.contract(), fmt_address(&owner));
        self.contract()
            .send(from, "initialize", &[Token::Address(owner)], U256::zero())
            .await
    }
}

/// Dump and YAML export
#[async_trait]
pub trait Describe: Ownable {
    /// Printable report; `full` follows references to other contracts
    async fn dump(&self, full: bool) -> Result<Report>;

    /// Fields written by `export_config`
    async fn export_fields(&self) -> Result<Mapping>;
}

/// Generic wrapper for any ownable contract
#[derive(Debug, Clone)]
pub struct BaseOwnable {
    contract: ContractHandle,
}

impl BaseOwnable {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            contract: ContractHandle::load("BaseOwnable", address, client)?,
        })
    }
}

impl Ownable for BaseOwnable {
    fn contract(&self) -> &ContractHandle {
        &self.contract
    }
}

#[async_trait]
impl Describe for BaseOwnable {
    async fn dump(&self, _full: bool) -> Result<Report> {
        ownable_report(self).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        ownable_export(self).await
    }
}

/// True when the contract at `address` reports `NAME == name`
pub async fn is_named(client: Arc<dyn ChainClient>, address: Address, name: &str) -> bool {
    match BaseOwnable::new(address, client) {
        Ok(base) => base.name().await.as_deref() == Some(name),
        Err(_) => false,
    }
}

/// Name, address, version and ownership lines
pub async fn ownable_report<T: Ownable + ?Sized>(contract: &T) -> Result<Report> {
    let mut report = Report::new();
    let name = contract.name().await;
    report
        .field("Name", name.as_deref().unwrap_or("None"))
        .field("Address", fmt_address(&contract.address()))
        .field("Version", contract.version().await?);

    match contract.owner().await {
        Ok(owner) => {
            report.field("Owner", fmt_address(&owner));
            if let Ok(pending) = contract.pending_owner().await {
                if !pending.is_zero() {
                    report.field("Pending owner", fmt_address(&pending));
                }
            }
        }
        Err(e) => debug!("No owner on {:?}: {}", contract.contract(), e),
    }

    Ok(report)
}

/// Exported ownership: a pending owner takes precedence
pub async fn ownable_export<T: Ownable + ?Sized>(contract: &T) -> Result<Mapping> {
    let mut map = Mapping::new();
    let name = contract.name().await;
    map.insert("Name".into(), name.map(Value::from).unwrap_or(Value::Null));
    map.insert("Address".into(), fmt_address(&contract.address()).into());
    map.insert("Version".into(), yaml_uint(contract.version().await?));

    if let Ok(owner) = contract.owner().await {
        let owner = match contract.pending_owner().await {
            Ok(pending) if !pending.is_zero() => pending,
            _ => owner,
        };
        map.insert("Owner".into(), fmt_address(&owner).into());
    }

    Ok(map)
}

/// YAML integer when it fits in u64, decimal string otherwise
pub fn yaml_uint(value: U256) -> Value {
    if value <= U256::from(u64::MAX) {
        Value::from(value.low_u64())
    } else {
        Value::from(value.to_string())
    }
}

pub fn yaml_addresses(addresses: &[Address]) -> Value {
    Value::Sequence(addresses.iter().map(|a| Value::from(fmt_address(a))).collect())
}

/// Write `<dir>/<filename>_config.yaml`; `filename` defaults to the on-chain name
pub async fn export_config<T: Describe + ?Sized>(
    contract: &T,
    dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf> {
    let filename = match filename {
        Some(f) => f.to_string(),
        None => contract
            .name()
            .await
            .unwrap_or_else(|| contract.contract().name().to_string()),
    };

    let fields = contract.export_fields().await?;
    let yaml = serde_yaml::to_string(&Value::Mapping(fields))?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_config.yaml", filename));
    std::fs::write(&path, yaml)?;
    info!("Exported {:?} to {}", contract.contract(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, MockChain};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_dump_with_pending_owner() {
        let chain = MockChain::new(1);
        chain.ownable(addr(1), "CoboFactory", 2, addr(2));
        chain.on(addr(1), "pendingOwner()", vec![Token::Address(addr(3))]);

        let base = BaseOwnable::new(addr(1), chain).unwrap();
        let report = base.dump(false).await.unwrap();

        assert_eq!(report.value("Name"), Some("CoboFactory"));
        assert_eq!(report.value("Version"), Some("2"));
        assert_eq!(report.value("Owner"), Some(fmt_address(&addr(2)).as_str()));
        assert_eq!(report.value("Pending owner"), Some(fmt_address(&addr(3)).as_str()));
    }

    #[tokio::test]
    async fn test_dump_without_owner() {
        let chain = MockChain::new(1);
        chain.named(addr(1), "Thing", None);
        chain.on(addr(1), "VERSION()", vec![Token::Uint(U256::one())]);

        let base = BaseOwnable::new(addr(1), chain).unwrap();
        let report = base.dump(false).await.unwrap();
        assert_eq!(report.value("Owner"), None);
        assert_eq!(report.value("Version"), Some("1"));
    }

    #[tokio::test]
    async fn test_name_none_on_revert() {
        let chain = MockChain::new(1);
        let base = BaseOwnable::new(addr(1), chain.clone()).unwrap();
        assert_eq!(base.name().await, None);
        assert!(!is_named(chain, addr(1), "CoboSafeAccount").await);
    }

    #[tokio::test]
    async fn test_export_prefers_pending_owner() {
        let chain = MockChain::new(1);
        chain.ownable(addr(1), "FlatRoleManager", 1, addr(2));
        chain.on(addr(1), "pendingOwner()", vec![Token::Address(addr(3))]);

        let dir = tempdir().unwrap();
        let base = BaseOwnable::new(addr(1), chain).unwrap();
        let path = export_config(&base, dir.path(), None).await.unwrap();
        assert!(path.ends_with("FlatRoleManager_config.yaml"));

        let yaml: Mapping = serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(yaml["Name"], Value::from("FlatRoleManager"));
        assert_eq!(yaml["Version"], Value::from(1u64));
        assert_eq!(yaml["Owner"], Value::from(fmt_address(&addr(3))));
    }

    #[test]
    fn test_yaml_uint() {
        assert_eq!(yaml_uint(U256::from(7)), Value::from(7u64));
        assert_eq!(yaml_uint(U256::MAX), Value::from(U256::MAX.to_string()));
    }
}
