//! cobosafe - interactive console for CoboSafe accounts and authorizers

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use cobosafe::chain::RpcConnector;
use cobosafe::cli::Console;
use cobosafe::config::Config;

/// CoboSafe console
#[derive(Parser)]
#[command(name = "cobosafe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "cobosafe.toml")]
    config: String,

    /// Network to connect to (name or alias, eg `eth`, `arb`)
    #[arg(long, env = "COBOSAFE_CHAIN")]
    chain: Option<String>,

    /// Commands to run, separated by `;`
    #[arg(long, num_args = 1..)]
    cmd: Option<Vec<String>>,

    /// Verbose logging; console errors propagate instead of being caught
    #[arg(long)]
    debug: bool,

    /// Start the console after running `--cmd`
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let directive = if cli.debug { "cobosafe=debug" } else { "cobosafe=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut console =
        Console::new(config, Arc::new(RpcConnector), cli.chain.as_deref())?.with_debug(cli.debug);
    info!("Connected to {}", console.chain());

    if let Some(words) = &cli.cmd {
        let text = words.join(" ");
        for command in text.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            if console.single_command(command).await? {
                return Ok(());
            }
        }
        console.restore_debug();
    }

    if cli.console || cli.cmd.is_none() {
        console.start_console().await?;
    }
    Ok(())
}
