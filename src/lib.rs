//! CoboSafe console SDK
//!
//! Typed wrappers around the CoboSafe contract suite (accounts, authorizers,
//! role manager, factory), a resolver that picks the wrapper from on-chain
//! metadata, and an interactive console for composing transactions.

pub mod chain;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod error;
pub mod report;
pub mod resolver;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
