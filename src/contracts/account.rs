//! CoboSafe accounts
//!
//! Every call goes through `execTransaction(CallData)`. The envelope is
//! optionally dry-run first so the authorizer hint can be embedded in the
//! real submission.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use serde_yaml::{Mapping, Value};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, info};

use super::codec::{abi_encode_with_sig, fmt_address, join_addresses, Operation};
use super::factory::CoboFactory;
use super::ownable::{ownable_export, ownable_report, yaml_addresses, Describe, Ownable};
use super::safe::GnosisSafe;
use super::ContractHandle;
use crate::chain::{ChainClient, TxReceipt};
use crate::error::{Error, Result};
use crate::report::Report;
use crate::resolver;

/// `CallData` submitted to `execTransaction`
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub operation: Operation,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub hint: Bytes,
    pub extra: Bytes,
}

impl TransactionEnvelope {
    pub fn call(to: Address) -> Self {
        Self {
            operation: Operation::Call,
            to,
            value: U256::zero(),
            data: Bytes::default(),
            hint: Bytes::default(),
            extra: Bytes::default(),
        }
    }

    pub fn delegate_call(to: Address) -> Self {
        Self::call(to).operation(Operation::DelegateCall)
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn extra(mut self, extra: impl Into<Bytes>) -> Self {
        self.extra = extra.into();
        self
    }

    /// `(uint256 flag, address to, uint256 value, bytes data, bytes hint, bytes extra)`
    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(U256::from(self.operation.as_u8())),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Bytes(self.data.to_vec()),
            Token::Bytes(self.hint.to_vec()),
            Token::Bytes(self.extra.to_vec()),
        ])
    }
}

/// `TransactionResult` returned by an `execTransaction` dry-run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    pub success: bool,
    pub data: Bytes,
    pub hint: Bytes,
}

impl TransactionResult {
    fn from_tokens(tokens: Vec<Token>) -> Result<Self> {
        let fields = match tokens.into_iter().next() {
            Some(Token::Tuple(fields)) if fields.len() == 3 => fields,
            other => return Err(Error::Decode(format!("unexpected TransactionResult {:?}", other))),
        };

        let mut fields = fields.into_iter();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(Token::Bool(success)), Some(Token::Bytes(data)), Some(Token::Bytes(hint))) => Ok(Self {
                success,
                data: data.into(),
                hint: hint.into(),
            }),
            _ => Err(Error::Decode("malformed TransactionResult".to_string())),
        }
    }
}

/// Plain `{to, value, data}` transaction, eg one prepared by another tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Account wrapper shared by CoboSafeAccount and CoboSmartAccount
#[derive(Debug, Clone)]
pub struct CoboAccount {
    contract: ContractHandle,
    delegate: Option<Address>,
}

impl CoboAccount {
    fn load(name: &'static str, address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            contract: ContractHandle::load(name, address, client)?,
            delegate: None,
        })
    }

    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Self::load("CoboAccount", address, client)
    }

    /// Default sender of `execTransaction`
    pub fn with_delegate(mut self, delegate: Option<Address>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn delegate(&self) -> Option<Address> {
        self.delegate
    }

    pub async fn authorizer(&self) -> Result<Address> {
        self.contract.query("authorizer", &[]).await
    }

    pub async fn role_manager(&self) -> Result<Address> {
        self.contract.query("roleManager", &[]).await
    }

    pub async fn delegates(&self) -> Result<Vec<Address>> {
        self.contract.query("getAllDelegates", &[]).await
    }

    /// Wallet holding the funds (the Safe for a CoboSafeAccount)
    pub async fn wallet_address(&self) -> Result<Address> {
        self.contract.query("getAccountAddress", &[]).await
    }

    pub async fn add_delegates(&self, delegates: &[Address], from: Address) -> Result<TxReceipt> {
        info!("Adding delegates {} to {:?}", join_addresses(delegates), self.contract);
        self.contract
            .send(from, "addDelegates", &[address_array(delegates)], U256::zero())
            .await
    }

    pub async fn remove_delegates(&self, delegates: &[Address], from: Address) -> Result<TxReceipt> {
        info!("Removing delegates {} from {:?}", join_addresses(delegates), self.contract);
        self.contract
            .send(from, "removeDelegates", &[address_array(delegates)], U256::zero())
            .await
    }

    /// Dry-run `execTransaction` from `delegate`
    pub async fn dry_run(
        &self,
        envelope: &TransactionEnvelope,
        delegate: Address,
    ) -> Result<TransactionResult> {
        let tokens = self
            .contract
            .call_tokens(Some(delegate), "execTransaction", &[envelope.to_token()], U256::zero())
            .await?;
        TransactionResult::from_tokens(tokens)
    }

    /// Submit `envelope` from `delegate` (the account delegate when `None`)
    ///
    /// With `use_hint` the envelope is dry-run first and the returned hint is
    /// embedded before submission.
    pub async fn exec_transaction(
        &self,
        mut envelope: TransactionEnvelope,
        use_hint: bool,
        delegate: Option<Address>,
    ) -> Result<TxReceipt> {
        let delegate = delegate.or(self.delegate).ok_or(Error::NotSet("delegate"))?;

        if use_hint {
            let result = self.dry_run(&envelope, delegate).await?;
            debug!("Dry-run success={} hint={} bytes", result.success, result.hint.len());
            envelope.hint = result.hint;
        }

        info!(
            "{:?} {} to {} as {}",
            self.contract,
            envelope.operation,
            fmt_address(&envelope.to),
            fmt_address(&delegate)
        );
        self.contract
            .send(delegate, "execTransaction", &[envelope.to_token()], U256::zero())
            .await
    }

    /// Call `func_sig(args)` on `to` through the account
    pub async fn exec_transaction_ex(
        &self,
        to: Address,
        func_sig: &str,
        args: &[Token],
        value: U256,
        use_hint: bool,
    ) -> Result<TxReceipt> {
        let data = abi_encode_with_sig(func_sig, args)?;
        let envelope = TransactionEnvelope::call(to).value(value).data(data);
        self.exec_transaction(envelope, use_hint, None).await
    }

    pub async fn exec_raw_tx(&self, tx: RawTransaction, use_hint: bool) -> Result<TxReceipt> {
        let envelope = TransactionEnvelope::call(tx.to).value(tx.value).data(tx.data);
        self.exec_transaction(envelope, use_hint, None).await
    }

    /// Send `amount` (and optional calldata) to `to` as the account delegate
    pub async fn transfer(&self, to: Address, amount: U256, data: Option<Bytes>) -> Result<TxReceipt> {
        let envelope = TransactionEnvelope::call(to)
            .value(amount)
            .data(data.unwrap_or_default());
        self.exec_transaction(envelope, true, None).await
    }
}

fn address_array(addresses: &[Address]) -> Token {
    Token::Array(addresses.iter().copied().map(Token::Address).collect())
}

impl Ownable for CoboAccount {
    fn contract(&self) -> &ContractHandle {
        &self.contract
    }
}

#[async_trait]
impl Describe for CoboAccount {
    async fn dump(&self, full: bool) -> Result<Report> {
        let mut report = ownable_report(self).await?;
        let authorizer = self.authorizer().await?;
        let role_manager = self.role_manager().await?;
        report
            .field("Authorizer", fmt_address(&authorizer))
            .field("Role manager", fmt_address(&role_manager))
            .field("Delegates", join_addresses(&self.delegates().await?));

        if full {
            let client = self.contract.client().clone();
            report
                .separator()
                .append(resolver::dump(client.clone(), role_manager, full).await?)
                .separator()
                .append(resolver::dump(client, authorizer, full).await?);
        }
        Ok(report)
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = ownable_export(self).await?;
        map.insert("Authorizer".into(), fmt_address(&self.authorizer().await?).into());
        map.insert("Role manager".into(), fmt_address(&self.role_manager().await?).into());
        map.insert("Delegates".into(), yaml_addresses(&self.delegates().await?));
        Ok(map)
    }
}

/// Account installed as a Safe module
#[derive(Debug, Clone)]
pub struct CoboSafeAccount {
    account: CoboAccount,
    safe_owner: Option<Address>,
}

impl CoboSafeAccount {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            account: CoboAccount::load("CoboSafeAccount", address, client)?,
            safe_owner: None,
        })
    }

    pub fn with_delegate(mut self, delegate: Option<Address>) -> Self {
        self.account = self.account.with_delegate(delegate);
        self
    }

    /// Safe owner used by `safe()`
    pub fn with_safe_owner(mut self, owner: Option<Address>) -> Self {
        self.safe_owner = owner;
        self
    }

    /// The Safe owning this account
    pub async fn safe(&self) -> Result<GnosisSafe> {
        let owner = self.owner().await?;
        GnosisSafe::load(owner, self.safe_owner, self.contract().client().clone()).await
    }

    /// Enable this account as a module of its Safe
    pub async fn enable(&self) -> Result<TxReceipt> {
        self.safe().await?.enable_module(self.address()).await
    }

    /// Deploy and initialize an account owned by `safe`
    pub async fn create(factory: &CoboFactory, safe: Address, deployer: Address) -> Result<Self> {
        let proxy = factory.create("CoboSafeAccount", deployer).await?;
        let account = Self::new(proxy, factory.contract().client().clone())?;
        account.initialize(safe, deployer).await?;
        Ok(account)
    }
}

impl Deref for CoboSafeAccount {
    type Target = CoboAccount;

    fn deref(&self) -> &CoboAccount {
        &self.account
    }
}

impl Ownable for CoboSafeAccount {
    fn contract(&self) -> &ContractHandle {
        &self.account.contract
    }
}

#[async_trait]
impl Describe for CoboSafeAccount {
    async fn dump(&self, full: bool) -> Result<Report> {
        self.account.dump(full).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        let mut map = self.account.export_fields().await?;
        if let Ok(wallet) = self.wallet_address().await {
            map.insert("Safe".into(), Value::from(fmt_address(&wallet)));
        }
        Ok(map)
    }
}

/// Standalone account owned by an EOA
#[derive(Debug, Clone)]
pub struct CoboSmartAccount {
    account: CoboAccount,
}

impl CoboSmartAccount {
    pub fn new(address: Address, client: Arc<dyn ChainClient>) -> Result<Self> {
        Ok(Self {
            account: CoboAccount::load("CoboSmartAccount", address, client)?,
        })
    }

    pub fn with_delegate(mut self, delegate: Option<Address>) -> Self {
        self.account = self.account.with_delegate(delegate);
        self
    }

    /// Deploy and initialize an account owned by `owner`, who also becomes a delegate
    pub async fn create(factory: &CoboFactory, owner: Address, deployer: Address) -> Result<Self> {
        let proxy = factory.create("CoboSmartAccount", deployer).await?;
        let account = Self::new(proxy, factory.contract().client().clone())?;
        account.initialize(owner, deployer).await?;
        account.add_delegates(&[owner], owner).await?;
        Ok(account)
    }
}

impl Deref for CoboSmartAccount {
    type Target = CoboAccount;

    fn deref(&self) -> &CoboAccount {
        &self.account
    }
}

impl Ownable for CoboSmartAccount {
    fn contract(&self) -> &ContractHandle {
        &self.account.contract
    }
}

#[async_trait]
impl Describe for CoboSmartAccount {
    async fn dump(&self, full: bool) -> Result<Report> {
        self.account.dump(full).await
    }

    async fn export_fields(&self) -> Result<Mapping> {
        self.account.export_fields().await
    }
}
