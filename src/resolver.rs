//! Resolve an address to the wrapper matching its on-chain metadata
//!
//! `NAME()` picks a wrapper by contract name. Unknown names fall back to
//! `TYPE()` (authorizer family), then to the generic wrappers.

use ethers::types::Address;
use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::chain::ChainClient;
use crate::contracts::authorizer::{COMMON_TYPE, DEX_TYPE, FUNCTION_TYPE, TRANSFER_TYPE};
use crate::contracts::codec::fmt_address;
use crate::contracts::ownable::{self, Describe};
use crate::contracts::{
    ArgusRootAuthorizer, Authorizer, BaseAcl, BaseAuthorizer, BaseOwnable, CoboAccount, CoboFactory,
    CoboSafeAccount, CoboSmartAccount, DexBaseAcl, FarmingBaseAcl, FlatRoleManager, FuncAuthorizer,
    Ownable, StargateWithdrawAuthorizer, TransferAuthorizer,
};
use crate::error::{Error, Result};
use crate::report::Report;

pub const NO_VALID_CONTRACT: &str = "No valid IVersion contract.";

/// Wrapper kinds known to the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    BaseOwnable,
    BaseAuthorizer,
    ArgusRootAuthorizer,
    TransferAuthorizer,
    FuncAuthorizer,
    BaseAcl,
    DexBaseAcl,
    FarmingBaseAcl,
    StargateWithdrawAuthorizer,
    CoboAccount,
    CoboSafeAccount,
    CoboSmartAccount,
    FlatRoleManager,
    CoboFactory,
}

/// Lookup order; the first kind declaring a type wins
const REGISTRY: [ContractKind; 14] = [
    ContractKind::BaseOwnable,
    ContractKind::BaseAuthorizer,
    ContractKind::ArgusRootAuthorizer,
    ContractKind::TransferAuthorizer,
    ContractKind::FuncAuthorizer,
    ContractKind::BaseAcl,
    ContractKind::DexBaseAcl,
    ContractKind::FarmingBaseAcl,
    ContractKind::StargateWithdrawAuthorizer,
    ContractKind::CoboAccount,
    ContractKind::CoboSafeAccount,
    ContractKind::CoboSmartAccount,
    ContractKind::FlatRoleManager,
    ContractKind::CoboFactory,
];

impl ContractKind {
    /// On-chain `NAME` of the contract
    pub fn name(self) -> &'static str {
        match self {
            ContractKind::BaseOwnable => "BaseOwnable",
            ContractKind::BaseAuthorizer => "BaseAuthorizer",
            ContractKind::ArgusRootAuthorizer => "ArgusRootAuthorizer",
            ContractKind::TransferAuthorizer => "TransferAuthorizer",
            ContractKind::FuncAuthorizer => "FuncAuthorizer",
            ContractKind::BaseAcl => "BaseACL",
            ContractKind::DexBaseAcl => "DEXBaseACL",
            ContractKind::FarmingBaseAcl => "FarmingBaseACL",
            ContractKind::StargateWithdrawAuthorizer => "StargateWithdrawAuthorizer",
            ContractKind::CoboAccount => "CoboAccount",
            ContractKind::CoboSafeAccount => "CoboSafeAccount",
            ContractKind::CoboSmartAccount => "CoboSmartAccount",
            ContractKind::FlatRoleManager => "FlatRoleManager",
            ContractKind::CoboFactory => "CoboFactory",
        }
    }

    /// `TYPE` declared by the wrapper, if any
    pub fn type_tag(self) -> Option<&'static str> {
        match self {
            ContractKind::TransferAuthorizer => Some(TRANSFER_TYPE),
            ContractKind::FuncAuthorizer => Some(FUNCTION_TYPE),
            ContractKind::BaseAcl | ContractKind::FarmingBaseAcl => Some(COMMON_TYPE),
            ContractKind::DexBaseAcl => Some(DEX_TYPE),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn from_type(typ: &str) -> Option<Self> {
        REGISTRY.iter().copied().find(|kind| kind.type_tag() == Some(typ))
    }

    /// Construct the wrapper for `address`
    pub fn bind(self, address: Address, client: Arc<dyn ChainClient>) -> Result<Resolved> {
        Ok(match self {
            ContractKind::BaseOwnable => Resolved::Ownable(BaseOwnable::new(address, client)?),
            ContractKind::BaseAuthorizer => Resolved::Authorizer(BaseAuthorizer::new(address, client)?),
            ContractKind::ArgusRootAuthorizer => {
                Resolved::RootAuthorizer(ArgusRootAuthorizer::new(address, client)?)
            }
            ContractKind::TransferAuthorizer => {
                Resolved::TransferAuthorizer(TransferAuthorizer::new(address, client)?)
            }
            ContractKind::FuncAuthorizer => Resolved::FuncAuthorizer(FuncAuthorizer::new(address, client)?),
            ContractKind::BaseAcl => Resolved::Acl(BaseAcl::new(address, client)?),
            ContractKind::DexBaseAcl => Resolved::DexAcl(DexBaseAcl::new(address, client)?),
            ContractKind::FarmingBaseAcl => Resolved::FarmingAcl(FarmingBaseAcl::new(address, client)?),
            ContractKind::StargateWithdrawAuthorizer => {
                Resolved::StargateWithdraw(StargateWithdrawAuthorizer::new(address, client)?)
            }
            ContractKind::CoboAccount => Resolved::Account(CoboAccount::new(address, client)?),
            ContractKind::CoboSafeAccount => Resolved::SafeAccount(CoboSafeAccount::new(address, client)?),
            ContractKind::CoboSmartAccount => Resolved::SmartAccount(CoboSmartAccount::new(address, client)?),
            ContractKind::FlatRoleManager => Resolved::RoleManager(FlatRoleManager::new(address, client)?),
            ContractKind::CoboFactory => Resolved::Factory(CoboFactory::new(address, client)?),
        })
    }
}

/// Wrapper chosen by [`convert`]
#[derive(Debug)]
pub enum Resolved {
    Ownable(BaseOwnable),
    Authorizer(BaseAuthorizer),
    RootAuthorizer(ArgusRootAuthorizer),
    TransferAuthorizer(TransferAuthorizer),
    FuncAuthorizer(FuncAuthorizer),
    Acl(BaseAcl),
    DexAcl(DexBaseAcl),
    FarmingAcl(FarmingBaseAcl),
    StargateWithdraw(StargateWithdrawAuthorizer),
    Account(CoboAccount),
    SafeAccount(CoboSafeAccount),
    SmartAccount(CoboSmartAccount),
    RoleManager(FlatRoleManager),
    Factory(CoboFactory),
}

impl Resolved {
    pub fn kind(&self) -> ContractKind {
        match self {
            Resolved::Ownable(_) => ContractKind::BaseOwnable,
            Resolved::Authorizer(_) => ContractKind::BaseAuthorizer,
            Resolved::RootAuthorizer(_) => ContractKind::ArgusRootAuthorizer,
            Resolved::TransferAuthorizer(_) => ContractKind::TransferAuthorizer,
            Resolved::FuncAuthorizer(_) => ContractKind::FuncAuthorizer,
            Resolved::Acl(_) => ContractKind::BaseAcl,
            Resolved::DexAcl(_) => ContractKind::DexBaseAcl,
            Resolved::FarmingAcl(_) => ContractKind::FarmingBaseAcl,
            Resolved::StargateWithdraw(_) => ContractKind::StargateWithdrawAuthorizer,
            Resolved::Account(_) => ContractKind::CoboAccount,
            Resolved::SafeAccount(_) => ContractKind::CoboSafeAccount,
            Resolved::SmartAccount(_) => ContractKind::CoboSmartAccount,
            Resolved::RoleManager(_) => ContractKind::FlatRoleManager,
            Resolved::Factory(_) => ContractKind::CoboFactory,
        }
    }

    /// Wrapper type name, eg `CoboSafeAccount`
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn as_describe(&self) -> &dyn Describe {
        match self {
            Resolved::Ownable(c) => c,
            Resolved::Authorizer(c) => c,
            Resolved::RootAuthorizer(c) => c,
            Resolved::TransferAuthorizer(c) => c,
            Resolved::FuncAuthorizer(c) => c,
            Resolved::Acl(c) => c,
            Resolved::DexAcl(c) => c,
            Resolved::FarmingAcl(c) => c,
            Resolved::StargateWithdraw(c) => c,
            Resolved::Account(c) => c,
            Resolved::SafeAccount(c) => c,
            Resolved::SmartAccount(c) => c,
            Resolved::RoleManager(c) => c,
            Resolved::Factory(c) => c,
        }
    }

    pub fn address(&self) -> Address {
        self.as_describe().address()
    }
}

/// Wrapper for the contract at `address`, `None` when it has no `NAME`
pub async fn convert(client: Arc<dyn ChainClient>, address: Address) -> Result<Option<Resolved>> {
    let base = BaseOwnable::new(address, client.clone())?;
    let Some(name) = base.name().await else {
        debug!("{} has no NAME", fmt_address(&address));
        return Ok(None);
    };

    if let Some(kind) = ContractKind::from_name(&name) {
        return kind.bind(address, client).map(Some);
    }

    let kind = match BaseAuthorizer::new(address, client.clone())?.authorizer_type().await {
        None => ContractKind::BaseOwnable,
        Some(typ) => ContractKind::from_type(&typ).unwrap_or(ContractKind::BaseAuthorizer),
    };
    debug!("{} ({}) resolved as {}", fmt_address(&address), name, kind.name());
    kind.bind(address, client).map(Some)
}

/// Report for the contract at `address`; boxed as dumps recurse through it
pub fn dump(
    client: Arc<dyn ChainClient>,
    address: Address,
    full: bool,
) -> BoxFuture<'static, Result<Report>> {
    async move {
        match convert(client, address).await? {
            Some(resolved) => resolved.as_describe().dump(full).await,
            None => {
                let mut report = Report::new();
                report.text(NO_VALID_CONTRACT);
                Ok(report)
            }
        }
    }
    .boxed()
}

/// Write `<dir>/<filename>_config.yaml` for the contract at `address`
pub async fn export_config(
    client: Arc<dyn ChainClient>,
    address: Address,
    dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf> {
    let resolved = convert(client, address)
        .await?
        .ok_or_else(|| Error::NoValidContract(fmt_address(&address)))?;
    ownable::export_config(resolved.as_describe(), dir, filename).await
}
