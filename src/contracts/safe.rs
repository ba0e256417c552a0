//! Gnosis Safe driven by a single owner

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use super::account::RawTransaction;
use super::codec::{abi_encode_with_sig, fmt_address, join_addresses, Operation};
use super::ContractHandle;
use crate::chain::{ChainClient, TxReceipt};
use crate::error::{Error, Result};

/// Safe with memoized threshold and owner list
#[derive(Debug)]
pub struct GnosisSafe {
    contract: ContractHandle,
    owner: Option<Address>,
    threshold: OnceCell<U256>,
    owners: OnceCell<Vec<Address>>,
}

impl GnosisSafe {
    /// Bind a Safe and pick the executing owner
    ///
    /// An explicit `owner` requires threshold 1 and membership. Without one,
    /// a threshold-1 Safe executes as its first owner.
    pub async fn load(
        address: Address,
        owner: Option<Address>,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self> {
        let mut safe = Self {
            contract: ContractHandle::load("GnosisSafe", address, client)?,
            owner: None,
            threshold: OnceCell::new(),
            owners: OnceCell::new(),
        };

        let threshold = safe.threshold().await?;
        let owners = safe.owners().await?.to_vec();

        safe.owner = match owner {
            Some(owner) => {
                if threshold != U256::one() {
                    return Err(Error::Safe(format!(
                        "threshold = {} > 1, not supported now",
                        threshold
                    )));
                }
                if !owners.contains(&owner) {
                    return Err(Error::Safe(format!(
                        "owner {} not in safe owners list {}",
                        fmt_address(&owner),
                        join_addresses(&owners)
                    )));
                }
                Some(owner)
            }
            None if threshold == U256::one() => owners.first().copied(),
            None => None,
        };

        Ok(safe)
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Owner the Safe executes as, if one could be chosen
    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub async fn threshold(&self) -> Result<U256> {
        let threshold = self
            .threshold
            .get_or_try_init(|| self.contract.query("getThreshold", &[]))
            .await?;
        Ok(*threshold)
    }

    pub async fn owners(&self) -> Result<&[Address]> {
        let owners = self
            .owners
            .get_or_try_init(|| self.contract.query("getOwners", &[]))
            .await?;
        Ok(owners.as_slice())
    }

    pub async fn is_module_enabled(&self, module: Address) -> Result<bool> {
        self.contract
            .query("isModuleEnabled", &[Token::Address(module)])
            .await
    }

    /// Pre-validated signature of `address`: `abi.encode(address, address) ++ 0x01`
    pub fn create_single_signature(address: Address) -> Bytes {
        let mut signature = abi::encode(&[Token::Address(address), Token::Address(address)]);
        signature.push(1);
        signature.into()
    }

    /// `execTransaction` from the owner; a single owner signature when `signatures` is `None`
    pub async fn exec_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
        signatures: Option<Bytes>,
        operation: Operation,
    ) -> Result<TxReceipt> {
        let owner = self.owner.ok_or(Error::NotSet("safe owner"))?;
        let signatures = match signatures {
            Some(signatures) => signatures,
            None => {
                let threshold = self.threshold().await?;
                if threshold != U256::one() {
                    return Err(Error::Safe(format!("Can not exec as threshold = {} > 1", threshold)));
                }
                Self::create_single_signature(owner)
            }
        };

        info!(
            "Safe {} {} to {} as {}",
            fmt_address(&self.address()),
            operation,
            fmt_address(&to),
            fmt_address(&owner)
        );

        let args = [
            Token::Address(to),
            Token::Uint(value),
            Token::Bytes(data.to_vec()),
            Token::Uint(U256::from(operation.as_u8())),
            Token::Uint(U256::zero()),
            Token::Uint(U256::zero()),
            Token::Uint(U256::zero()),
            Token::Address(Address::zero()),
            Token::Address(Address::zero()),
            Token::Bytes(signatures.to_vec()),
        ];
        self.contract.send(owner, "execTransaction", &args, U256::zero()).await
    }

    pub async fn exec_transaction_ex(
        &self,
        to: Address,
        func_sig: &str,
        args: &[Token],
        value: U256,
        operation: Operation,
    ) -> Result<TxReceipt> {
        let data = abi_encode_with_sig(func_sig, args)?;
        self.exec_transaction(to, data.into(), value, None, operation).await
    }

    pub async fn exec_raw_tx(&self, tx: RawTransaction) -> Result<TxReceipt> {
        self.exec_transaction(tx.to, tx.data, tx.value, None, Operation::Call)
            .await
    }

    pub async fn delegate_call(&self, to: Address, func_sig: &str, args: &[Token]) -> Result<TxReceipt> {
        self.exec_transaction_ex(to, func_sig, args, U256::zero(), Operation::DelegateCall)
            .await
    }

    pub async fn enable_module(&self, module: Address) -> Result<TxReceipt> {
        self.exec_transaction_ex(
            self.address(),
            "enableModule(address)",
            &[Token::Address(module)],
            U256::zero(),
            Operation::Call,
        )
        .await
    }

    /// `approve(to, amount)` on `token`; unlimited when `amount` is `None`
    pub async fn approve_token(
        &self,
        token: Address,
        to: Address,
        amount: Option<U256>,
    ) -> Result<TxReceipt> {
        let amount = amount.unwrap_or(U256::MAX);
        self.exec_transaction_ex(
            token,
            "approve(address,uint256)",
            &[Token::Address(to), Token::Uint(amount)],
            U256::zero(),
            Operation::Call,
        )
        .await
    }
}
