//! Error types for the CoboSafe SDK

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} is not valid address")]
    InvalidAddress(String),

    #[error("{0} not set")]
    NotSet(&'static str),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    // Keyring errors
    #[error("Keystore error: {0}")]
    Keystore(String),

    // ABI errors
    #[error("ABI error: {0}")]
    Abi(String),

    #[error("{contract} has no method `{method}`")]
    UnknownMethod { contract: String, method: String },

    #[error("Decode error: {0}")]
    Decode(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    // Contract errors
    #[error("No valid IVersion contract at {0}")]
    NoValidContract(String),

    #[error("Safe error: {0}")]
    Safe(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came back from the node (revert or transport failure)
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Rpc(_) | Error::Reverted(_))
    }
}

impl From<ethers::abi::Error> for Error {
    fn from(e: ethers::abi::Error) -> Self {
        Error::Abi(e.to_string())
    }
}

impl From<ethers::providers::ProviderError> for Error {
    fn from(e: ethers::providers::ProviderError) -> Self {
        Error::Rpc(e.to_string())
    }
}

impl From<ethers::signers::WalletError> for Error {
    fn from(e: ethers::signers::WalletError) -> Self {
        Error::Keystore(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Error::NotSet("delegate").to_string(), "delegate not set");
        assert_eq!(
            Error::InvalidAddress("0x12".into()).to_string(),
            "0x12 is not valid address"
        );
    }

    #[test]
    fn test_unsupported_chain_message() {
        assert_eq!(
            Error::UnsupportedChain("nowhere".into()).to_string(),
            "Unsupported chain: nowhere"
        );
    }

    #[test]
    fn test_is_remote() {
        assert!(Error::Rpc("execution reverted".into()).is_remote());
        assert!(Error::Reverted("0xabc".into()).is_remote());
        assert!(!Error::NotSet("safe").is_remote());
    }
}
