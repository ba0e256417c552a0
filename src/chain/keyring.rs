//! Signer keyring
//!
//! Holds the locally loaded signing keys. Senders without a key are left to
//! the node (unlocked or impersonated accounts on forks and dev chains).

use dashmap::DashMap;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::contracts::codec::{fmt_address, parse_address};
use crate::error::{Error, Result};

/// Environment variable consulted before prompting for a keystore password
pub const KEYSTORE_PASSWORD_ENV: &str = "COBOSAFE_KEYSTORE_PASSWORD";

/// Shared map of loaded wallets by address
#[derive(Clone, Default)]
pub struct Keyring {
    wallets: Arc<DashMap<Address, LocalWallet>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wallet, returning its address
    pub fn insert(&self, wallet: LocalWallet) -> Address {
        let address = wallet.address();
        self.wallets.insert(address, wallet);
        address
    }

    pub fn get(&self, address: &Address) -> Option<LocalWallet> {
        self.wallets.get(address).map(|w| w.value().clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.wallets.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addresses: Vec<String> = self.wallets.iter().map(|e| fmt_address(e.key())).collect();
        f.debug_struct("Keyring").field("wallets", &addresses).finish()
    }
}

/// How an account was made available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedAccount {
    /// Key held in the keyring
    Local(Address),
    /// Address only; the node must sign for it
    Unlocked(Address),
}

impl LoadedAccount {
    pub fn address(&self) -> Address {
        match self {
            LoadedAccount::Local(a) | LoadedAccount::Unlocked(a) => *a,
        }
    }
}

/// Load an account from a keystore name, a bare address or a raw private key
///
/// Keystores are looked up as `<keystore_dir>/<name>` and
/// `<keystore_dir>/<name>.json`.
pub fn load_account(keyring: &Keyring, keystore_dir: &Path, source: &str) -> Result<LoadedAccount> {
    let source = source.trim();
    if source.is_empty() {
        return Err(Error::NotSet("account"));
    }

    if let Some(path) = find_keystore(keystore_dir, source) {
        let password = keystore_password(&path)?;
        let wallet = LocalWallet::decrypt_keystore(&path, password)?;
        let address = keyring.insert(wallet);
        info!("Loaded keystore {} for {}", path.display(), fmt_address(&address));
        return Ok(LoadedAccount::Local(address));
    }

    if let Ok(address) = parse_address(source) {
        debug!("Using node managed account {}", fmt_address(&address));
        return Ok(LoadedAccount::Unlocked(address));
    }

    let wallet: LocalWallet = source.parse().map_err(|_| {
        Error::Keystore(format!(
            "{} is not a keystore, address or private key",
            mask_secret(source)
        ))
    })?;
    let address = keyring.insert(wallet);
    info!("Loaded private key for {}", fmt_address(&address));
    Ok(LoadedAccount::Local(address))
}

fn find_keystore(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) || name.starts_with("0x") {
        return None;
    }
    [dir.join(name), dir.join(format!("{}.json", name))]
        .into_iter()
        .find(|p| p.is_file())
}

fn keystore_password(path: &Path) -> Result<String> {
    if let Ok(password) = std::env::var(KEYSTORE_PASSWORD_ENV) {
        return Ok(password);
    }
    dialoguer::Password::new()
        .with_prompt(format!("Password for {}", path.display()))
        .interact()
        .map_err(|e| Error::Keystore(e.to_string()))
}

/// Keep private material out of error messages
fn mask_secret(input: &str) -> String {
    if input.len() > 8 {
        format!("{}***", input.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}
