//! Interactive console session

use anyhow::Result;
use ethers::types::Address;
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::commands;
use crate::chain::{ChainClient, Connector, Keyring};
use crate::config::Config;
use crate::contracts::codec::{fmt_address, parse_address};
use crate::error::Error;
use crate::report::Report;

/// Console state. Everything except the factory and delegate is reset when
/// the network changes.
pub struct Console {
    pub(crate) config: Config,
    connector: Arc<dyn Connector>,
    pub(crate) keyring: Keyring,
    client: Arc<dyn ChainClient>,
    chain: String,
    pub(crate) debug: bool,
    startup_debug: bool,
    pub(crate) factory_address: Address,
    pub(crate) delegate: Option<Address>,
    pub(crate) safe: Option<Address>,
    pub(crate) cobosafe: Option<Address>,
    out: Box<dyn Write + Send>,
}

impl Console {
    /// Connect to `chain` (the configured default when `None`)
    pub fn new(config: Config, connector: Arc<dyn Connector>, chain: Option<&str>) -> Result<Self> {
        let requested = chain.unwrap_or(config.default_chain.as_str()).to_string();
        let chain = config
            .resolve_chain(&requested)
            .ok_or_else(|| Error::UnsupportedChain(requested.clone()))?;
        let factory_address = parse_address(&config.factory_address)?;
        let keyring = Keyring::new();
        let client = Self::open(&config, connector.as_ref(), &chain, &keyring)?;

        Ok(Self {
            config,
            connector,
            keyring,
            client,
            chain,
            debug: false,
            startup_debug: false,
            factory_address,
            delegate: None,
            safe: None,
            cobosafe: None,
            out: Box::new(std::io::stdout()),
        })
    }

    /// Start with errors propagating instead of being caught
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self.startup_debug = debug;
        self
    }

    /// Send command output somewhere other than stdout
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    fn open(
        config: &Config,
        connector: &dyn Connector,
        chain: &str,
        keyring: &Keyring,
    ) -> Result<Arc<dyn ChainClient>> {
        let network = config
            .network(chain)
            .ok_or_else(|| Error::UnsupportedChain(chain.to_string()))?;
        Ok(connector.connect(network, &config.rpc, keyring.clone())?)
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    /// Switch network and forget the per-network addresses
    pub(crate) fn connect(&mut self, chain: &str) -> Result<()> {
        self.client = Self::open(&self.config, self.connector.as_ref(), chain, &self.keyring)?;
        self.chain = chain.to_string();
        self.reset();
        info!("Connected to {}", chain);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.safe = None;
        self.cobosafe = None;
    }

    pub(crate) fn print(&mut self, line: impl Display) -> Result<()> {
        writeln!(self.out, "{}", line)?;
        Ok(())
    }

    pub(crate) fn print_report(&mut self, report: &Report) -> Result<()> {
        write!(self.out, "{}", report)?;
        Ok(())
    }

    /// Run one console line; `Ok(true)` asks the loop to stop
    ///
    /// Errors are printed with the verb's help unless debug is on, in which
    /// case they propagate.
    pub async fn onecmd(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(false);
        }

        let line = match line.strip_prefix('!') {
            Some(rest) => format!("sh {}", rest),
            None => line.to_string(),
        };
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line.as_str(), ""),
        };

        debug!("Running {} {}", verb, arg);
        match commands::dispatch(self, verb, arg).await {
            Ok(stop) => Ok(stop),
            Err(e) => {
                self.print(format!("Error: {}", e))?;
                if self.debug {
                    return Err(e);
                }
                commands::help(self, verb)?;
                Ok(false)
            }
        }
    }

    /// Run one command non-interactively; failures propagate
    pub async fn single_command(&mut self, command: &str) -> Result<bool> {
        self.debug = true;
        self.onecmd(command).await
    }

    /// Back to the startup debug setting after `--cmd`
    pub fn restore_debug(&mut self) {
        self.debug = self.startup_debug;
    }

    /// Read-eval loop on stdin until `exit` or end of input
    pub async fn start_console(&mut self) -> Result<()> {
        self.print("Welcome to the cobosafe shell. Type `help` to list commands.\n")?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            write!(self.out, "{}", self.config.console.prompt)?;
            self.out.flush()?;

            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if self.onecmd(&line).await? {
                                return Ok(());
                            }
                        }
                        None => {
                            self.print("")?;
                            return Ok(());
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    self.print("")?;
                }
            }
        }
    }
}

/// `None` for unset session addresses
pub(crate) fn show(address: Option<Address>) -> String {
    address.map(|a| fmt_address(&a)).unwrap_or_else(|| "None".to_string())
}
