//! ABI registry
//!
//! Each wrapper loads its ABI by contract name. ABIs are assembled from
//! human-readable fragments following the contract inheritance chain and
//! parsed once per process.

use dashmap::DashMap;
use ethers::abi::{parse_abi, Abi, Function, Param, ParamType, StateMutability};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

const OWNABLE: &[&str] = &[
    "function NAME() external view returns (bytes32)",
    "function VERSION() external view returns (uint256)",
    "function owner() external view returns (address)",
    "function pendingOwner() external view returns (address)",
    "function initialize(address owner) external",
];

const AUTHORIZER: &[&str] = &[
    "function TYPE() external view returns (bytes32)",
    "function caller() external view returns (address)",
    "function tag() external view returns (bytes32)",
    "function flag() external view returns (uint256)",
];

const ROOT_AUTHORIZER: &[&str] = &[
    "function getAllRoles() external view returns (bytes32[])",
    "function getAllAuthorizers(bool isDelegateCall, bytes32 role) external view returns (address[])",
];

const TRANSFER_AUTHORIZER: &[&str] = &[
    "function getAllToken() external view returns (address[])",
    "function getTokenReceivers(address token) external view returns (address[])",
];

const FUNC_AUTHORIZER: &[&str] = &[
    "function getAllContracts() external view returns (address[])",
    "function getFuncsByContract(address _contract) external view returns (bytes32[])",
];

const ACL: &[&str] = &["function contracts() external view returns (address[])"];

const DEX_ACL: &[&str] = &[
    "function getSwapInTokens() external view returns (address[])",
    "function getSwapOutTokens() external view returns (address[])",
];

const FARMING_ACL: &[&str] = &[
    "function getPoolIdWhiteList() external view returns (uint256[])",
    "function getPoolAddressWhiteList() external view returns (address[])",
];

const ACCOUNT: &[&str] = &[
    "function authorizer() external view returns (address)",
    "function roleManager() external view returns (address)",
    "function getAllDelegates() external view returns (address[])",
    "function getAccountAddress() external view returns (address)",
    "function addDelegates(address[] delegates) external",
    "function removeDelegates(address[] delegates) external",
];

const ROLE_MANAGER: &[&str] = &[
    "function getRoles(address delegate) external view returns (bytes32[])",
    "function getAllRoles() external view returns (bytes32[])",
    "function getDelegates() external view returns (address[])",
    "function hasRole(address delegate, bytes32 role) external view returns (bool)",
];

const FACTORY: &[&str] = &[
    "function getLatestImplementation(bytes32 name) external view returns (address)",
    "function getAllNames() external view returns (bytes32[])",
    "function getLastRecord(address deployer, bytes32 name) external view returns (address)",
    "function getCreate2Address(address creator, bytes32 name, bytes32 salt) external view returns (address)",
    "function create(bytes32 name) external returns (address)",
    "function create2(bytes32 name, bytes32 salt) external returns (address)",
];

const GNOSIS_SAFE: &[&str] = &[
    "function getThreshold() external view returns (uint256)",
    "function getOwners() external view returns (address[])",
    "function isModuleEnabled(address module) external view returns (bool)",
    "function enableModule(address module) external",
    "function execTransaction(address to, uint256 value, bytes data, uint8 operation, uint256 safeTxGas, uint256 baseGas, uint256 gasPrice, address gasToken, address refundReceiver, bytes signatures) external payable returns (bool)",
];

const ERC20: &[&str] = &[
    "function symbol() external view returns (string)",
    "function decimals() external view returns (uint8)",
    "function balanceOf(address owner) external view returns (uint256)",
    "function transfer(address to, uint256 amount) external returns (bool)",
    "function approve(address spender, uint256 amount) external returns (bool)",
];

lazy_static::lazy_static! {
    static ref ABI_CACHE: DashMap<&'static str, Arc<Abi>> = DashMap::new();
}

/// `execTransaction(CallData) returns (TransactionResult)`
///
/// CallData is `(flag, to, value, data, hint, extra)`, the result
/// `(success, data, hint)`.
#[allow(deprecated)]
fn exec_transaction() -> Function {
    let param = |name: &str, kind: ParamType| Param {
        name: name.to_string(),
        kind,
        internal_type: None,
    };
    let call_data = ParamType::Tuple(vec![
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Bytes,
        ParamType::Bytes,
        ParamType::Bytes,
    ]);
    let result = ParamType::Tuple(vec![ParamType::Bool, ParamType::Bytes, ParamType::Bytes]);

    Function {
        name: "execTransaction".to_string(),
        inputs: vec![param("callData", call_data)],
        outputs: vec![param("result", result)],
        constant: None,
        state_mutability: StateMutability::NonPayable,
    }
}

/// Fragment chain for a contract name, base first
fn fragments(name: &str) -> Option<Vec<&'static [&'static str]>> {
    let chain: Vec<&'static [&'static str]> = match name {
        "BaseOwnable" => vec![OWNABLE],
        "BaseAuthorizer" => vec![OWNABLE, AUTHORIZER],
        "ArgusRootAuthorizer" => vec![OWNABLE, AUTHORIZER, ROOT_AUTHORIZER],
        "TransferAuthorizer" => vec![OWNABLE, AUTHORIZER, TRANSFER_AUTHORIZER],
        "FuncAuthorizer" => vec![OWNABLE, AUTHORIZER, FUNC_AUTHORIZER],
        "BaseACL" => vec![OWNABLE, AUTHORIZER, ACL],
        "DEXBaseACL" => vec![OWNABLE, AUTHORIZER, ACL, DEX_ACL],
        "FarmingBaseACL" | "StargateWithdrawAuthorizer" => {
            vec![OWNABLE, AUTHORIZER, ACL, FARMING_ACL]
        }
        "CoboAccount" | "CoboSafeAccount" | "CoboSmartAccount" => vec![OWNABLE, ACCOUNT],
        "FlatRoleManager" => vec![OWNABLE, ROLE_MANAGER],
        "CoboFactory" => vec![OWNABLE, FACTORY],
        "GnosisSafe" => vec![GNOSIS_SAFE],
        "ERC20" => vec![ERC20],
        _ => return None,
    };
    Some(chain)
}

/// Load the ABI registered under `name`
pub fn load_abi(name: &'static str) -> Result<Arc<Abi>> {
    if let Some(abi) = ABI_CACHE.get(name) {
        return Ok(abi.value().clone());
    }

    let chain = fragments(name).ok_or_else(|| Error::Abi(format!("no ABI named {}", name)))?;
    let lines: Vec<&str> = chain.iter().flat_map(|f| f.iter().copied()).collect();
    let mut abi = parse_abi(&lines).map_err(|e| Error::Abi(format!("{}: {}", name, e)))?;
    if chain.contains(&ACCOUNT) {
        abi.functions
            .entry("execTransaction".to_string())
            .or_default()
            .push(exec_transaction());
    }
    debug!("Parsed ABI {} ({} functions)", name, abi.functions.len());

    let abi = Arc::new(abi);
    ABI_CACHE.insert(name, abi.clone());
    Ok(abi)
}

/// Names with a registered ABI
pub const ABI_NAMES: [&str; 16] = [
    "BaseOwnable",
    "BaseAuthorizer",
    "ArgusRootAuthorizer",
    "TransferAuthorizer",
    "FuncAuthorizer",
    "BaseACL",
    "DEXBaseACL",
    "FarmingBaseACL",
    "StargateWithdrawAuthorizer",
    "CoboAccount",
    "CoboSafeAccount",
    "CoboSmartAccount",
    "FlatRoleManager",
    "CoboFactory",
    "GnosisSafe",
    "ERC20",
];
