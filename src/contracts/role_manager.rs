use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;

use super::codec::{b32, fmt_address, s32};
use super::ownable::{ownable_export, ownable_report, Describe, Ownable};
use super::ContractHandle;
use crate::chain::ChainClient;
use crate::error::Result;
use crate::report::Report;

/// Role assignments of an account
#[derive(Debug, Clone)]
pub struct FlatRoleManager {
    contract: ContractHandle,
}

impl FlatRoleManager {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            contract: ContractHandle::load("FlatRoleManager", address, client)?,
        })
    }

    pub async fn get_roles(&self, delegate: Address) -> Result<Vec<String>> {
        let roles: Vec<H256> = self
            .contract
            .query("getRoles", &[Token::Address(delegate)])
            .await?;
        roles.iter().map(|r| s32(r.as_bytes())).collect()
    }

    pub async fn get_all_roles(&self) -> Result<Vec<String>> {
        let roles: Vec<H256> = self.contract.query("getAllRoles", &[]).await?;
        roles.iter().map(|r| s32(r.as_bytes())).collect()
    }

    pub async fn get_all_delegates(&self) -> Result<Vec<Address>> {
        self.contract.query("getDelegates", &[]).await
    }

    pub async fn has_role(&self, delegate: Address, role: &str) -> Result<bool> {
        let role = b32(role)?;
        self.contract
            .query(
                "hasRole",
                &[Token::Address(delegate), Token::FixedBytes(role.as_bytes().to_vec())],
            )
            .await
    }

    /// Delegate with its comma joined roles
    pub async fn delegate_roles(&self) -> Result<Vec<(Address, String)>> {
        let mut out = Vec::new();
        for delegate in self.get_all_delegates().await? {
            let roles = self.get_roles(delegate).await?;
            out.push((delegate, roles.join(",")));
        }
        Ok(out)
    }
}

impl Ownable for FlatRoleManager {
    fn contract(&self) -> &ContractHandle {
        &self.contract
    }
}

#[async_trait]
impl Describe for FlatRoleManager {
    async fn dump(&self, _full: bool) -> Result<Report> {
        let mut report = ownable_report(self).await?;
        report.text("Delegate    Roles");
        for (delegate, roles) in self.delegate_roles().await? {
            report.text(format!("{} {}", fmt_address(&delegate), roles));
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = ownable_export(self).await?;
        let mut delegates = Mapping::new();
        for (delegate, roles) in self.delegate_roles().await? {
            delegates.insert(fmt_address(&delegate).into(), roles.into());
        }
        map.insert("Delegates".into(), Value::Mapping(delegates));
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, addresses, bytes32, MockChain};

    fn setup() -> Arc<MockChain> {
        let chain = MockChain::new(1);
        chain.ownable(addr(5), "FlatRoleManager", 1, addr(1));
        chain.on(addr(5), "getDelegates()", vec![addresses(&[addr(7), addr(8)])]);
        chain.on(
            addr(5),
            "getAllRoles()",
            vec![Token::Array(vec![bytes32("harvester"), bytes32("trader")])],
        );
        chain.on_args(
            addr(5),
            "getRoles(address)",
            &[Token::Address(addr(7))],
            vec![Token::Array(vec![bytes32("harvester"), bytes32("trader")])],
        );
        chain.on_args(
            addr(5),
            "getRoles(address)",
            &[Token::Address(addr(8))],
            vec![Token::Array(vec![bytes32("trader")])],
        );
        chain
    }

    #[tokio::test]
    async fn test_roles() {
        let rm = FlatRoleManager::new(addr(5), setup()).unwrap();
        assert_eq!(rm.get_all_roles().await.unwrap(), vec!["harvester", "trader"]);
        assert_eq!(
            rm.delegate_roles().await.unwrap(),
            vec![
                (addr(7), "harvester,trader".to_string()),
                (addr(8), "trader".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_dump_lists_delegates() {
        let rm = FlatRoleManager::new(addr(5), setup()).unwrap();
        let report = rm.dump(false).await.unwrap();
        assert!(report.contains_text(&format!("{} harvester,trader", fmt_address(&addr(7)))));
        assert_eq!(report.value("Name"), Some("FlatRoleManager"));
    }
}
