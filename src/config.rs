//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::contracts::codec::{parse_address, FACTORY_ADDRESS};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Network connected at startup
    #[serde(default = "default_chain")]
    pub default_chain: String,

    /// CoboFactory used by the console
    #[serde(default = "default_factory_address")]
    pub factory_address: String,

    /// Known networks by name. Built-in networks are merged in after loading.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Block explorer prefix for addresses, eg `https://etherscan.io/address/`
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Polling interval while waiting for receipts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Confirmations to wait for after submission
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Where `export_config` writes `<name>_config.yaml`
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Where `load_account <name>` looks for JSON keystores
    #[serde(default = "default_keystore_dir")]
    pub keystore_dir: PathBuf,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            confirmations: default_confirmations(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            export_dir: default_export_dir(),
            keystore_dir: default_keystore_dir(),
        }
    }
}

/// Short names accepted by `chain <name>`
pub const CHAIN_ALIASES: [(&str, &str); 6] = [
    ("eth", "mainnet"),
    ("arb", "arbitrum-main"),
    ("op", "optimism-main"),
    ("bsc", "bsc-main"),
    ("matic", "polygon-main"),
    ("avax", "avax-main"),
];

// Default value functions
fn default_chain() -> String {
    "mainnet".to_string()
}

fn default_factory_address() -> String {
    FACTORY_ADDRESS.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_confirmations() -> usize {
    1
}

fn default_prompt() -> String {
    "cobosafe > ".to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_keystore_dir() -> PathBuf {
    PathBuf::from("keystore")
}

fn network(rpc_url: &str, chain_id: u64, explorer_url: Option<&str>) -> NetworkConfig {
    NetworkConfig {
        rpc_url: rpc_url.to_string(),
        chain_id,
        explorer_url: explorer_url.map(str::to_string),
    }
}

/// Built-in networks
pub fn default_networks() -> BTreeMap<String, NetworkConfig> {
    let mut networks = BTreeMap::new();
    networks.insert(
        "mainnet".to_string(),
        network("https://rpc.ankr.com/eth", 1, Some("https://etherscan.io/address/")),
    );
    networks.insert(
        "optimism-main".to_string(),
        network(
            "https://mainnet.optimism.io",
            10,
            Some("https://optimistic.etherscan.io/address/"),
        ),
    );
    networks.insert(
        "bsc-main".to_string(),
        network("https://bsc-dataseed.binance.org", 56, Some("https://bscscan.com/address/")),
    );
    networks.insert(
        "polygon-main".to_string(),
        network("https://rpc.ankr.com/polygon", 137, Some("https://polygonscan.com/address/")),
    );
    networks.insert(
        "arbitrum-main".to_string(),
        network("https://arb1.arbitrum.io/rpc", 42161, Some("https://arbiscan.io/address/")),
    );
    networks.insert(
        "avax-main".to_string(),
        network("https://rpc.ankr.com/avalanche", 43114, Some("https://snowtrace.io/address/")),
    );
    networks.insert(
        "development".to_string(),
        network("http://127.0.0.1:8545", 1337, None),
    );
    networks
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("default_chain", default_chain())?
            .set_default("factory_address", default_factory_address())?
            .set_default("rpc.poll_interval_ms", default_poll_interval_ms() as i64)?
            .set_default("rpc.confirmations", default_confirmations() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix COBOSAFE_)
            .add_source(
                config::Environment::with_prefix("COBOSAFE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.merge_default_networks();
        config.validate()?;

        Ok(config)
    }

    /// Add built-in networks the user did not override
    fn merge_default_networks(&mut self) {
        for (name, network) in default_networks() {
            self.networks.entry(name).or_insert(network);
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        parse_address(&self.factory_address)
            .with_context(|| format!("Invalid factory_address: {}", self.factory_address))?;

        for (name, network) in &self.networks {
            url::Url::parse(&network.rpc_url)
                .with_context(|| format!("Invalid rpc_url for network {}: {}", name, network.rpc_url))?;

            if let Some(explorer) = &network.explorer_url {
                if !explorer.ends_with('/') {
                    anyhow::bail!("explorer_url for network {} must end with '/'", name);
                }
            }
        }

        if !self.networks.contains_key(&self.default_chain) {
            anyhow::bail!(
                "default_chain {} is not a configured network",
                self.default_chain
            );
        }

        if self.rpc.poll_interval_ms == 0 {
            anyhow::bail!("rpc.poll_interval_ms must be positive");
        }

        Ok(())
    }

    /// Resolve a chain name or alias to a configured network name
    pub fn resolve_chain(&self, name: &str) -> Option<String> {
        let name = CHAIN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, full)| *full)
            .unwrap_or(name);

        self.networks.contains_key(name).then(|| name.to_string())
    }

    /// Network config by name
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.get(name)
    }

    /// All supported network names
    pub fn supported_chains(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let mut out = format!(
            "Configuration:\n  Default chain: {}\n  Factory: {}\n  Export dir: {}\n  Keystore dir: {}\n  Networks:\n",
            self.default_chain,
            self.factory_address,
            self.console.export_dir.display(),
            self.console.keystore_dir.display(),
        );
        for (name, network) in &self.networks {
            out.push_str(&format!(
                "    {}: chain_id={} rpc={}\n",
                name,
                network.chain_id,
                mask_url(&network.rpc_url)
            ));
        }
        out
    }
}

/// Mask URL for display (hide API keys in query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_chain: default_chain(),
            factory_address: default_factory_address(),
            networks: default_networks(),
            rpc: RpcConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_chain, "mainnet");
        assert_eq!(config.network("bsc-main").unwrap().chain_id, 56);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_chain_alias() {
        let config = Config::default();
        assert_eq!(config.resolve_chain("arb").as_deref(), Some("arbitrum-main"));
        assert_eq!(config.resolve_chain("mainnet").as_deref(), Some("mainnet"));
        assert_eq!(config.resolve_chain("nope"), None);
    }

    #[test]
    fn test_load_merges_networks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cobosafe.toml");
        std::fs::write(
            &path,
            r#"
default_chain = "fork"

[networks.fork]
rpc_url = "http://127.0.0.1:8545"
chain_id = 137

[console]
export_dir = "exports"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_chain, "fork");
        assert_eq!(config.network("fork").unwrap().chain_id, 137);
        assert!(config.network("mainnet").is_some());
        assert_eq!(config.console.export_dir, PathBuf::from("exports"));
        assert_eq!(config.console.prompt, "cobosafe > ");
    }

    #[test]
    fn test_validate_rejects_bad_factory() {
        let config = Config {
            factory_address: "0x1234".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.ankr.com/eth"), "https://rpc.ankr.com/eth");
    }
}
