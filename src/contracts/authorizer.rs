//! Authorizer tree
//!
//! The root authorizer of an account maps roles to authorizers. Leaves are
//! typed policies: token transfers, function allow-lists and protocol ACLs.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

use super::account::CoboAccount;
use super::codec::{b32, fmt_address, join_addresses, s32};
use super::erc20::get_symbol;
use super::ownable::{is_named, ownable_export, ownable_report, yaml_addresses, yaml_uint, Describe, Ownable};
use super::role_manager::FlatRoleManager;
use super::{BaseOwnable, ContractHandle};
use crate::chain::ChainClient;
use crate::error::Result;
use crate::report::Report;
use crate::resolver;

pub const HAS_PRE_CHECK_MASK: u64 = 0x1;
pub const HAS_POST_CHECK_MASK: u64 = 0x2;
pub const HAS_PRE_PROC_MASK: u64 = 0x4;
pub const HAS_POST_PROC_MASK: u64 = 0x8;
pub const SUPPORT_HINT_MASK: u64 = 0x40;

/// `TYPE()` of the typed authorizers
pub const TRANSFER_TYPE: &str = "TransferType";
pub const FUNCTION_TYPE: &str = "FunctionType";
pub const COMMON_TYPE: &str = "CommonType";
pub const DEX_TYPE: &str = "DexType";

const FLAG_NAMES: [(u64, &str); 5] = [
    (HAS_PRE_CHECK_MASK, "PreCheck"),
    (HAS_POST_CHECK_MASK, "PostCheck"),
    (HAS_PRE_PROC_MASK, "PreProcess"),
    (HAS_POST_PROC_MASK, "PostProcess"),
    (SUPPORT_HINT_MASK, "SupportHint"),
];

/// Comma separated names of the set flag bits
pub fn flag_names(flag: U256) -> String {
    let flag = flag.low_u64();
    FLAG_NAMES
        .iter()
        .filter(|(mask, _)| flag & mask != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
}

fn tag_token(tag: &str) -> Result<Token> {
    Ok(Token::FixedBytes(b32(tag)?.as_bytes().to_vec()))
}

/// Reads shared by every authorizer
#[async_trait]
pub trait Authorizer: Ownable {
    /// Account this authorizer serves
    async fn caller(&self) -> Result<Address> {
        self.contract().query("caller", &[]).await
    }

    async fn tag(&self) -> Option<String> {
        self.contract()
            .query::<H256>("tag", &[])
            .await
            .ok()
            .and_then(|tag| s32(tag.as_bytes()).ok())
    }

    async fn flag(&self) -> Result<U256> {
        self.contract().query("flag", &[]).await
    }

    async fn flag_str(&self) -> Result<String> {
        Ok(flag_names(self.flag().await?))
    }

    /// On-chain `TYPE`
    async fn authorizer_type(&self) -> Option<String> {
        self.contract()
            .query::<H256>("TYPE", &[])
            .await
            .ok()
            .and_then(|typ| s32(typ.as_bytes()).ok())
    }
}

/// Ownable lines plus caller, flags, type and tag
pub async fn authorizer_report<T: Authorizer + ?Sized>(auth: &T) -> Result<Report> {
    let mut report = ownable_report(auth).await?;
    let typ = auth.authorizer_type().await;
    let tag = auth.tag().await;
    report
        .field("Caller", fmt_address(&auth.caller().await?))
        .field("Flags", auth.flag_str().await?)
        .field("Type", typ.as_deref().unwrap_or("None"))
        .field("Tag", tag.as_deref().unwrap_or("None"));
    Ok(report)
}

pub async fn authorizer_export<T: Authorizer + ?Sized>(auth: &T) -> Result<Mapping> {
    let mut map = ownable_export(auth).await?;
    map.insert("Caller".into(), fmt_address(&auth.caller().await?).into());
    map.insert("Flags".into(), auth.flag_str().await?.into());
    map.insert(
        "Type".into(),
        auth.authorizer_type().await.map(Value::from).unwrap_or(Value::Null),
    );
    map.insert("Tag".into(), auth.tag().await.map(Value::from).unwrap_or(Value::Null));
    Ok(map)
}

macro_rules! authorizer_wrapper {
    ($(#[$meta:meta])* $name:ident, $abi:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            contract: ContractHandle,
        }

        impl $name {
            pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
                Ok(Self {
                    contract: ContractHandle::load($abi, address, client)?,
                })
            }
        }

        impl Ownable for $name {
            fn contract(&self) -> &ContractHandle {
                &self.contract
            }
        }

        impl Authorizer for $name {}
    };
}

authorizer_wrapper!(
    /// Authorizer of unknown type
    BaseAuthorizer,
    "BaseAuthorizer"
);
authorizer_wrapper!(
    /// Role-keyed root of an account's authorizer tree
    ArgusRootAuthorizer,
    "ArgusRootAuthorizer"
);
authorizer_wrapper!(
    /// Token -> allowed receivers
    TransferAuthorizer,
    "TransferAuthorizer"
);
authorizer_wrapper!(
    /// Contract -> allowed function selectors
    FuncAuthorizer,
    "FuncAuthorizer"
);
authorizer_wrapper!(
    /// Protocol ACL over a set of contracts
    BaseAcl,
    "BaseACL"
);
authorizer_wrapper!(DexBaseAcl, "DEXBaseACL");
authorizer_wrapper!(FarmingBaseAcl, "FarmingBaseACL");
authorizer_wrapper!(StargateWithdrawAuthorizer, "StargateWithdrawAuthorizer");

#[async_trait]
impl Describe for BaseAuthorizer {
    async fn dump(&self, _full: bool) -> Result<Report> {
        authorizer_report(self).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        authorizer_export(self).await
    }
}

impl ArgusRootAuthorizer {
    /// Role manager of the caller when the caller is a CoboSafe account
    async fn caller_role_manager(&self) -> Result<Option<FlatRoleManager>> {
        let client = self.contract.client().clone();
        let caller = self.caller().await?;
        let is_account = is_named(client.clone(), caller, "CoboSafeAccount").await
            || is_named(client.clone(), caller, "CoboSmartAccount").await;
        if !is_account {
            return Ok(None);
        }

        let role_manager = CoboAccount::new(caller, client.clone())?.role_manager().await?;
        Ok(Some(FlatRoleManager::new(role_manager, client)?))
    }

    /// Roles known to the authorizer and to the caller's role manager
    pub async fn roles(&self) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();

        let list = self
            .contract
            .query::<Vec<H256>>("getAllRoles", &[])
            .await
            .and_then(|list| list.iter().map(|r| s32(r.as_bytes())).collect::<Result<Vec<_>>>());
        match list {
            Ok(list) => roles.extend(list),
            Err(e) => warn!("getAllRoles failed on {:?}: {}", self.contract, e),
        }

        match self.caller_role_manager().await {
            Ok(Some(rm)) => match rm.get_all_roles().await {
                Ok(list) => roles.extend(list),
                Err(e) => warn!("Role manager lookup failed: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Caller lookup failed on {:?}: {}", self.contract, e),
        }

        roles
    }

    /// Delegates of the caller's account with their comma joined roles
    pub async fn delegates(&self) -> Vec<(Address, String)> {
        let result = match self.caller_role_manager().await {
            Ok(Some(rm)) => rm.delegate_roles().await,
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!("Delegate lookup failed on {:?}: {}", self.contract, e);
            Vec::new()
        })
    }

    pub async fn get_authorizers(&self, role: &str, delegate_call: bool) -> Result<Vec<Address>> {
        self.contract
            .query(
                "getAllAuthorizers",
                &[Token::Bool(delegate_call), tag_token(role)?],
            )
            .await
    }
}

#[async_trait]
impl Describe for ArgusRootAuthorizer {
    async fn dump(&self, full: bool) -> Result<Report> {
        let client = self.contract.client().clone();
        let mut report = authorizer_report(self).await?;
        let mut children = Vec::new();

        report.text("Authorizers:");
        for role in self.roles().await {
            let auths = self.get_authorizers(&role, false).await?;
            let mut labels = Vec::new();
            for auth in &auths {
                let name = BaseOwnable::new(*auth, client.clone())?.name().await;
                labels.push(format!("{}({})", name.as_deref().unwrap_or("None"), fmt_address(auth)));
            }
            report.text(format!("  {} {}", role, labels.join(", ")));
            children.extend(auths);
        }

        report.text("").text("Delegates:");
        for (delegate, roles) in self.delegates().await {
            report.text(format!("   {} {}", fmt_address(&delegate), roles));
        }

        if full {
            for child in children {
                report.separator();
                report.append(resolver::dump(client.clone(), child, full).await?);
            }
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = authorizer_export(self).await?;

        let mut authorizers = Mapping::new();
        for role in self.roles().await {
            let auths = self.get_authorizers(&role, false).await?;
            authorizers.insert(role.into(), yaml_addresses(&auths));
        }
        map.insert("Authorizers".into(), Value::Mapping(authorizers));

        let mut delegates = Mapping::new();
        for (delegate, roles) in self.delegates().await {
            delegates.insert(fmt_address(&delegate).into(), roles.into());
        }
        map.insert("Delegates".into(), Value::Mapping(delegates));
        Ok(map)
    }
}

impl TransferAuthorizer {
    pub async fn tokens(&self) -> Result<Vec<Address>> {
        self.contract.query("getAllToken", &[]).await
    }

    pub async fn get_receivers(&self, token: Address) -> Result<Vec<Address>> {
        self.contract
            .query("getTokenReceivers", &[Token::Address(token)])
            .await
    }
}

#[async_trait]
impl Describe for TransferAuthorizer {
    async fn dump(&self, _full: bool) -> Result<Report> {
        let client = self.contract.client().clone();
        let mut report = authorizer_report(self).await?;
        report.text("Token -> Receivers:");
        for token in self.tokens().await? {
            let receivers = self.get_receivers(token).await?;
            let symbol = get_symbol(client.clone(), token).await;
            report.text(format!("  {} {}", symbol, join_addresses(&receivers)));
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = authorizer_export(self).await?;
        let mut tokens = Mapping::new();
        for token in self.tokens().await? {
            let receivers = self.get_receivers(token).await?;
            tokens.insert(fmt_address(&token).into(), yaml_addresses(&receivers));
        }
        map.insert("Token receivers".into(), Value::Mapping(tokens));
        Ok(map)
    }
}

impl FuncAuthorizer {
    pub async fn contracts(&self) -> Result<Vec<Address>> {
        self.contract.query("getAllContracts", &[]).await
    }

    /// Allowed selectors of `contract` as `0x` + 8 hex digits
    pub async fn get_funcs(&self, contract: Address) -> Result<Vec<String>> {
        let funcs: Vec<H256> = self
            .contract
            .query("getFuncsByContract", &[Token::Address(contract)])
            .await?;
        Ok(funcs
            .iter()
            .map(|f| format!("0x{}", hex::encode(&f.as_bytes()[..4])))
            .collect())
    }
}

#[async_trait]
impl Describe for FuncAuthorizer {
    async fn dump(&self, _full: bool) -> Result<Report> {
        let mut report = authorizer_report(self).await?;
        report.text("Contract -> Functions:");
        for contract in self.contracts().await? {
            let funcs = self.get_funcs(contract).await?;
            report.text(format!("  {} {}", fmt_address(&contract), funcs.join(",")));
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = authorizer_export(self).await?;
        let mut contracts = Mapping::new();
        for contract in self.contracts().await? {
            let funcs = self.get_funcs(contract).await?;
            contracts.insert(
                fmt_address(&contract).into(),
                Value::Sequence(funcs.into_iter().map(Value::from).collect()),
            );
        }
        map.insert("Functions".into(), Value::Mapping(contracts));
        Ok(map)
    }
}

/// Contracts guarded by an ACL
async fn acl_contracts(contract: &ContractHandle) -> Result<Vec<Address>> {
    contract.query("contracts", &[]).await
}

async fn acl_report<T: Authorizer + ?Sized>(acl: &T) -> Result<Report> {
    let mut report = authorizer_report(acl).await?;
    report.field("Contracts", join_addresses(&acl_contracts(acl.contract()).await?));
    Ok(report)
}

async fn acl_export<T: Authorizer + ?Sized>(acl: &T) -> Result<Mapping> {
    let mut map = authorizer_export(acl).await?;
    map.insert("Contracts".into(), yaml_addresses(&acl_contracts(acl.contract()).await?));
    Ok(map)
}

impl BaseAcl {
    pub async fn contracts(&self) -> Result<Vec<Address>> {
        acl_contracts(&self.contract).await
    }
}

#[async_trait]
impl Describe for BaseAcl {
    async fn dump(&self, _full: bool) -> Result<Report> {
        acl_report(self).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        acl_export(self).await
    }
}

impl DexBaseAcl {
    pub async fn contracts(&self) -> Result<Vec<Address>> {
        acl_contracts(&self.contract).await
    }

    pub async fn in_tokens(&self) -> Result<Vec<Address>> {
        self.contract.query("getSwapInTokens", &[]).await
    }

    pub async fn out_tokens(&self) -> Result<Vec<Address>> {
        self.contract.query("getSwapOutTokens", &[]).await
    }

    async fn symbols(&self, tokens: Vec<Address>) -> Vec<String> {
        let mut symbols = Vec::with_capacity(tokens.len());
        for token in tokens {
            symbols.push(get_symbol(self.contract.client().clone(), token).await);
        }
        symbols
    }

    pub async fn in_token_symbols(&self) -> Result<Vec<String>> {
        Ok(self.symbols(self.in_tokens().await?).await)
    }

    pub async fn out_token_symbols(&self) -> Result<Vec<String>> {
        Ok(self.symbols(self.out_tokens().await?).await)
    }
}

#[async_trait]
impl Describe for DexBaseAcl {
    async fn dump(&self, _full: bool) -> Result<Report> {
        let mut report = acl_report(self).await?;
        report
            .field("In tokens", self.in_token_symbols().await?.join(","))
            .field("Out tokens", self.out_token_symbols().await?.join(","));
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = acl_export(self).await?;
        map.insert("In tokens".into(), yaml_addresses(&self.in_tokens().await?));
        map.insert("Out tokens".into(), yaml_addresses(&self.out_tokens().await?));
        Ok(map)
    }
}

/// Pool whitelist of a farming ACL
async fn whitelist(contract: &ContractHandle) -> Result<(Vec<U256>, Vec<Address>)> {
    let ids = contract.query("getPoolIdWhiteList", &[]).await?;
    let addresses = contract.query("getPoolAddressWhiteList", &[]).await?;
    Ok((ids, addresses))
}

async fn farming_report<T: Authorizer + ?Sized>(acl: &T) -> Result<Report> {
    let mut report = acl_report(acl).await?;
    let (ids, addresses) = whitelist(acl.contract()).await?;
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    let addresses: Vec<String> = addresses.iter().map(fmt_address).collect();
    report
        .field("Whitelist IDs", ids.join(", "))
        .field("Whitelist addresses", addresses.join(", "));
    Ok(report)
}

async fn farming_export<T: Authorizer + ?Sized>(acl: &T) -> Result<Mapping> {
    let mut map = acl_export(acl).await?;
    let (ids, addresses) = whitelist(acl.contract()).await?;
    map.insert(
        "Whitelist IDs".into(),
        Value::Sequence(ids.into_iter().map(yaml_uint).collect()),
    );
    map.insert("Whitelist addresses".into(), yaml_addresses(&addresses));
    Ok(map)
}

impl FarmingBaseAcl {
    pub async fn whitelist_ids(&self) -> Result<Vec<U256>> {
        Ok(whitelist(&self.contract).await?.0)
    }

    pub async fn whitelist_addresses(&self) -> Result<Vec<Address>> {
        Ok(whitelist(&self.contract).await?.1)
    }
}

#[async_trait]
impl Describe for FarmingBaseAcl {
    async fn dump(&self, _full: bool) -> Result<Report> {
        farming_report(self).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        farming_export(self).await
    }
}

#[async_trait]
impl Describe for StargateWithdrawAuthorizer {
    async fn dump(&self, _full: bool) -> Result<Report> {
        farming_report(self).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        farming_export(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, addresses, bytes32, MockChain};
    use crate::contracts::ownable::export_config;
    use tempfile::tempdir;

    fn register_authorizer(chain: &MockChain, at: Address, name: &str, typ: &str, flag: u64) {
        chain.ownable(at, name, 1, addr(0xac));
        chain.on(at, "TYPE()", vec![bytes32(typ)]);
        chain.on(at, "caller()", vec![Token::Address(addr(0xac))]);
        chain.on(at, "tag()", vec![bytes32("uniswap")]);
        chain.on(at, "flag()", vec![Token::Uint(U256::from(flag))]);
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(flag_names(U256::from(0x1 | 0x40)), "PreCheck,SupportHint");
        assert_eq!(flag_names(U256::from(0xf)), "PreCheck,PostCheck,PreProcess,PostProcess");
        assert_eq!(flag_names(U256::zero()), "");
    }

    #[tokio::test]
    async fn test_authorizer_report() {
        let chain = MockChain::new(1);
        register_authorizer(&chain, addr(0xa1), "BaseAuthorizer", "Custom", 0x41);

        let auth = BaseAuthorizer::new(addr(0xa1), chain).unwrap();
        let report = auth.dump(false).await.unwrap();
        assert_eq!(report.value("Flags"), Some("PreCheck,SupportHint"));
        assert_eq!(report.value("Type"), Some("Custom"));
        assert_eq!(report.value("Tag"), Some("uniswap"));
        assert_eq!(report.value("Caller"), Some(fmt_address(&addr(0xac)).as_str()));
    }

    #[tokio::test]
    async fn test_func_authorizer_selectors() {
        let chain = MockChain::new(1);
        register_authorizer(&chain, addr(0xa2), "FuncAuthorizer", FUNCTION_TYPE, 1);
        chain.on(addr(0xa2), "getAllContracts()", vec![addresses(&[addr(0x41)])]);
        let mut selector = [0u8; 32];
        selector[..4].copy_from_slice(&[0xa9, 0x05, 0x9c, 0xbb]);
        chain.on(
            addr(0xa2),
            "getFuncsByContract(address)",
            vec![Token::Array(vec![Token::FixedBytes(selector.to_vec())])],
        );

        let auth = FuncAuthorizer::new(addr(0xa2), chain).unwrap();
        assert_eq!(auth.get_funcs(addr(0x41)).await.unwrap(), vec!["0xa9059cbb"]);
        let report = auth.dump(false).await.unwrap();
        assert!(report.contains_text(&format!("  {} 0xa9059cbb", fmt_address(&addr(0x41)))));
    }

    #[tokio::test]
    async fn test_transfer_authorizer_labels_tokens() {
        let chain = MockChain::new(41);
        register_authorizer(&chain, addr(0xa3), "TransferAuthorizer", TRANSFER_TYPE, 1);
        chain.on(addr(0xa3), "getAllToken()", vec![addresses(&[addr(0x51)])]);
        chain.on(addr(0xa3), "getTokenReceivers(address)", vec![addresses(&[addr(2), addr(3)])]);
        chain.on(addr(0x51), "symbol()", vec![Token::String("DAI".to_string())]);

        let auth = TransferAuthorizer::new(addr(0xa3), chain).unwrap();
        let report = auth.dump(false).await.unwrap();
        assert!(report.contains_text(&format!(
            "  DAI({}) {}",
            fmt_address(&addr(0x51)),
            join_addresses(&[addr(2), addr(3)])
        )));
    }

    #[tokio::test]
    async fn test_farming_export() {
        let chain = MockChain::new(1);
        register_authorizer(&chain, addr(0xa4), "FarmingBaseACL", COMMON_TYPE, 1);
        chain.on(addr(0xa4), "contracts()", vec![addresses(&[addr(0x61)])]);
        chain.on(
            addr(0xa4),
            "getPoolIdWhiteList()",
            vec![Token::Array(vec![Token::Uint(U256::from(3)), Token::Uint(U256::from(9))])],
        );
        chain.on(addr(0xa4), "getPoolAddressWhiteList()", vec![addresses(&[addr(0x62)])]);

        let acl = FarmingBaseAcl::new(addr(0xa4), chain).unwrap();
        let report = acl.dump(false).await.unwrap();
        assert_eq!(report.value("Whitelist IDs"), Some("3, 9"));

        let dir = tempdir().unwrap();
        let path = export_config(&acl, dir.path(), Some("farm")).await.unwrap();
        assert!(path.ends_with("farm_config.yaml"));

        let yaml: Mapping = serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(yaml["Flags"], Value::from("PreCheck"));
        assert_eq!(yaml["Type"], Value::from(COMMON_TYPE));
        assert_eq!(yaml["Contracts"], yaml_addresses(&[addr(0x61)]));
        assert_eq!(
            yaml["Whitelist IDs"],
            Value::Sequence(vec![Value::from(3u64), Value::from(9u64)])
        );
        assert_eq!(yaml["Whitelist addresses"], yaml_addresses(&[addr(0x62)]));
    }

    #[tokio::test]
    async fn test_root_authorizer_roles_and_delegates() {
        let chain = MockChain::new(1);
        register_authorizer(&chain, addr(0xa0), "ArgusRootAuthorizer", "", 0x4);
        chain.on(addr(0xa0), "getAllRoles()", vec![Token::Array(vec![bytes32("trader")])]);

        // Caller is a CoboSafeAccount whose role manager adds another role
        chain.named(addr(0xac), "CoboSafeAccount", None);
        chain.on(addr(0xac), "roleManager()", vec![Token::Address(addr(0xb0))]);
        chain.on(
            addr(0xb0),
            "getAllRoles()",
            vec![Token::Array(vec![bytes32("harvester"), bytes32("trader")])],
        );
        chain.on(addr(0xb0), "getDelegates()", vec![addresses(&[addr(0xde)])]);
        chain.on(addr(0xb0), "getRoles(address)", vec![Token::Array(vec![bytes32("harvester")])]);

        chain.on_args(
            addr(0xa0),
            "getAllAuthorizers(bool,bytes32)",
            &[Token::Bool(false), bytes32("trader")],
            vec![addresses(&[addr(0xa2)])],
        );
        chain.on_args(
            addr(0xa0),
            "getAllAuthorizers(bool,bytes32)",
            &[Token::Bool(false), bytes32("harvester")],
            vec![addresses(&[])],
        );
        chain.named(addr(0xa2), "FuncAuthorizer", None);

        let root = ArgusRootAuthorizer::new(addr(0xa0), chain).unwrap();
        let roles: Vec<String> = root.roles().await.into_iter().collect();
        assert_eq!(roles, vec!["harvester", "trader"]);

        let report = root.dump(false).await.unwrap();
        assert!(report.contains_text(&format!("  trader FuncAuthorizer({})", fmt_address(&addr(0xa2)))));
        assert!(report.contains_text(&format!("   {} harvester", fmt_address(&addr(0xde)))));
    }
}
