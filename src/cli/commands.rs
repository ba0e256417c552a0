//! Console command implementations

use anyhow::{anyhow, bail, Result};
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use tracing::{debug, info, warn};

use super::console::{show, Console};
use crate::chain::load_account as load_signer;
use crate::config::Config;
use crate::contracts::codec::{b32, fmt_address, parse_address, rand_salt, tokenize_args};
use crate::contracts::ownable::Describe;
use crate::contracts::{CoboFactory, CoboSafeAccount, CoboSmartAccount, GnosisSafe};
use crate::resolver;

/// Console verb with its help text
pub struct CommandSpec {
    pub name: &'static str,
    pub help: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        help: "help : List commands.\nhelp <cmd> : Print usage of a command.",
    },
    CommandSpec {
        name: "debug",
        help: "debug: Toggle debug flag. Once on, the console will raise errors instead of catching them.",
    },
    CommandSpec {
        name: "exit",
        help: "exit: Exit the shell.",
    },
    CommandSpec {
        name: "sh",
        help: "sh <cmd>: Run system shell command. `!<cmd>` is a shortcut.",
    },
    CommandSpec {
        name: "url",
        help: "url <address>: Open block explorer URL.",
    },
    CommandSpec {
        name: "chain",
        help: "chain : Print current chain config.\nchain <chain> : Change chain.",
    },
    CommandSpec {
        name: "config",
        help: "config: Print loaded configuration (RPC secrets masked).",
    },
    CommandSpec {
        name: "glob",
        help: "glob: Print current global config.",
    },
    CommandSpec {
        name: "load_account",
        help: "load_account <private key>: Load from raw private key.\n\
               load_account <wallet name>: Load from key store file.\n\
               load_account <address>: Use an account unlocked on the node.",
    },
    CommandSpec {
        name: "safe",
        help: "safe : Print current Safe address.\nsafe <address> : Set Safe address.",
    },
    CommandSpec {
        name: "cobosafe",
        help: "cobosafe : Print current CoboSafe address.\ncobosafe <address> : Set CoboSafe address.",
    },
    CommandSpec {
        name: "delegate",
        help: "delegate : Print current delegate address.\ndelegate <address> : Set delegate address.",
    },
    CommandSpec {
        name: "factory",
        help: "factory [<address>]: Print CoboFactory information.",
    },
    CommandSpec {
        name: "dump",
        help: "dump <address> [<verbose>]: Print contract information by name.",
    },
    CommandSpec {
        name: "export_config",
        help: "export_config <address> [<filename>]: Write contract information to <filename>_config.yaml.",
    },
    CommandSpec {
        name: "create_cobosafe",
        help: "create_cobosafe <safe>: Create CoboSafeAccount",
    },
    CommandSpec {
        name: "create_cobosmart",
        help: "create_cobosmart <owner>: Create CoboSmartAccount",
    },
    CommandSpec {
        name: "init_argus",
        help: "init_argus:\n    init argus for safe\n    (Call ArgusAccountHelper.initArgus)",
    },
    CommandSpec {
        name: "bind_delegate",
        help: "bind_delegate <role> <delegate address> :\n    Bind role and delegate to CoboSafe.\n    (Call ArgusAccountHelper.grantRoles)",
    },
    CommandSpec {
        name: "unbind_delegate",
        help: "unbind_delegate <role> <delegate address> :\n    Unbind role and delegate to CoboSafe.\n    (Call ArgusAccountHelper.revokeRoles)",
    },
    CommandSpec {
        name: "create_authorizer",
        help: "create_authorizer <name> :\n    Create authorizer for CoboSafe\n    (Call ArgusAccountHelper.createAuthorizer)",
    },
    CommandSpec {
        name: "bind_authorizer",
        help: "bind_authorizer <role> <authorizer address> :\n    Add authorizer to root authorizer of CoboSafe\n    (Call ArgusAccountHelper.addAuthorizer)",
    },
    CommandSpec {
        name: "unbind_authorizer",
        help: "unbind_authorizer <role> <authorizer address> :\n    Remove authorizer from root authorizer of CoboSafe\n    (Call ArgusAccountHelper.removeAuthorizer)",
    },
    CommandSpec {
        name: "exec",
        help: "exec <to> <func sig> [<args>...] :\n    Call a contract through CoboSafe as the delegate.\n    eg. exec 0x.. transfer(address,uint256) 0x.. 100",
    },
    CommandSpec {
        name: "enable_module",
        help: "enable_module :\n    Enable CoboSafe as a module of its Safe.",
    },
];

/// Route a verb; `Ok(true)` stops the console
pub async fn dispatch(console: &mut Console, verb: &str, arg: &str) -> Result<bool> {
    match verb {
        "help" => help(console, arg)?,
        "debug" => toggle_debug(console)?,
        "exit" => {
            console.print("bye!")?;
            return Ok(true);
        }
        "sh" => sh(arg).await?,
        "url" => url(console, arg).await?,
        "chain" => chain(console, arg)?,
        "glob" => glob(console)?,
        "config" => {
            let text = console.config.masked_display();
            console.print(text.trim_end())?
        }
        "load_account" => load_account(console, arg)?,
        "safe" => safe(console, arg).await?,
        "cobosafe" => cobosafe(console, arg)?,
        "delegate" => delegate(console, arg)?,
        "factory" => factory(console, arg).await?,
        "dump" => dump(console, arg).await?,
        "export_config" => export_config(console, arg).await?,
        "create_cobosafe" => create_cobosafe(console, arg).await?,
        "create_cobosmart" => create_cobosmart(console, arg).await?,
        "init_argus" => init_argus(console).await?,
        "bind_delegate" => update_roles(console, arg, "grantRoles(address,bytes32[],address[])").await?,
        "unbind_delegate" => update_roles(console, arg, "revokeRoles(address,bytes32[],address[])").await?,
        "create_authorizer" => create_authorizer(console, arg).await?,
        "bind_authorizer" => {
            update_authorizer(console, arg, "addAuthorizer(address,address,bool,bytes32[])").await?
        }
        "unbind_authorizer" => {
            update_authorizer(console, arg, "removeAuthorizer(address,address,bool,bytes32[])").await?
        }
        "exec" => exec(console, arg).await?,
        "enable_module" => enable_module(console).await?,
        _ => console.print(format!("*** Unknown syntax: {} {}", verb, arg).trim_end())?,
    }
    Ok(false)
}

/// Print the verb list, or one verb's usage
pub fn help(console: &mut Console, arg: &str) -> Result<()> {
    let arg = arg.trim();
    if arg.is_empty() {
        console.print("Documented commands (type help <topic>):")?;
        let names: Vec<&str> = COMMANDS.iter().map(|c| c.name).collect();
        return console.print(names.join("  "));
    }

    match COMMANDS.iter().find(|c| c.name == arg) {
        Some(spec) => console.print(spec.help),
        None => console.print(format!("*** No help on {}", arg)),
    }
}

/// Optional address argument
fn arg_as_addr(arg: &str) -> Result<Option<Address>> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_address(arg)?))
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("{} not set", what))
}

fn role_token(role: &str) -> Result<Token> {
    Ok(Token::FixedBytes(b32(role)?.as_bytes().to_vec()))
}

fn salt_token(salt: H256) -> Token {
    Token::FixedBytes(salt.as_bytes().to_vec())
}

/// `<role> <address>` arguments
fn role_and_address(arg: &str) -> Result<(String, Address)> {
    let mut parts = arg.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(role), Some(address), None) => Ok((role.to_string(), parse_address(address)?)),
        _ => bail!("expected <role> <address>"),
    }
}

fn session_factory(console: &Console) -> Result<CoboFactory> {
    Ok(CoboFactory::new(console.factory_address, console.client())?)
}

fn toggle_debug(console: &mut Console) -> Result<()> {
    console.debug = !console.debug;
    let debug = console.debug;
    console.print(format!("debug set to {}", debug))
}

async fn sh(arg: &str) -> Result<()> {
    if arg.trim().is_empty() {
        bail!("command not set");
    }
    let status = tokio::process::Command::new("sh").arg("-c").arg(arg).status().await?;
    debug!("sh exited with {}", status);
    Ok(())
}

/// Explorer page of `address` on the current network
pub fn address_url(config: &Config, chain: &str, address: &Address) -> Option<String> {
    let explorer = config.network(chain)?.explorer_url.as_ref()?;
    Some(format!("{}{}", explorer, fmt_address(address)))
}

async fn url(console: &mut Console, arg: &str) -> Result<()> {
    let address = required(arg_as_addr(arg)?, "address")?;
    let url = address_url(&console.config, console.chain(), &address)
        .ok_or_else(|| anyhow!("no block explorer configured for {}", console.chain()))?;
    console.print(&url)?;

    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    if let Err(e) = tokio::process::Command::new(opener).arg(&url).status().await {
        debug!("Could not open {}: {}", url, e);
    }
    Ok(())
}

fn chain(console: &mut Console, arg: &str) -> Result<()> {
    let new_chain = match console.config.resolve_chain(arg.trim()) {
        Some(chain) => chain,
        None => {
            let current = console.chain().to_string();
            let supported = console.config.supported_chains().join(",");
            console.print(format!("Current network: {}", current))?;
            return console.print(format!("Supported networks: {}", supported));
        }
    };

    if new_chain != console.chain() {
        console.connect(&new_chain)?;
        console.print(format!("Change to {}", new_chain))?;
    }
    glob(console)
}

fn glob(console: &mut Console) -> Result<()> {
    let lines = [
        format!("Network: {}", console.chain()),
        format!("Factory: {}", fmt_address(&console.factory_address)),
        format!("CoboSafe: {}", show(console.cobosafe)),
        format!("Safe: {}", show(console.safe)),
        format!("Delegate: {}", show(console.delegate)),
    ];
    for line in lines {
        console.print(line)?;
    }
    Ok(())
}

fn load_account(console: &mut Console, arg: &str) -> Result<()> {
    if arg.trim().is_empty() {
        bail!("account not set");
    }
    let account = load_signer(&console.keyring, &console.config.console.keystore_dir, arg.trim())?;
    let address = fmt_address(&account.address());
    console.print(format!("Load address: {}", address))?;
    delegate(console, &address)
}

async fn safe(console: &mut Console, arg: &str) -> Result<()> {
    let Some(address) = arg_as_addr(arg)? else {
        return console.print(format!("Current Safe: {}", show(console.safe)));
    };

    console.safe = Some(address);
    console.print(format!("Safe set to {}", fmt_address(&address)))?;

    // Pick up the Safe's CoboSafeAccount when the factory has one on record
    let found = match session_factory(console) {
        Ok(factory) => factory.get_cobosafe(address).await.map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };
    match found {
        Ok(Some(cobosafe_address)) => cobosafe(console, &fmt_address(&cobosafe_address))?,
        Ok(None) => {}
        Err(e) => warn!("CoboSafe lookup for {} failed: {}", fmt_address(&address), e),
    }
    Ok(())
}

fn cobosafe(console: &mut Console, arg: &str) -> Result<()> {
    match arg_as_addr(arg)? {
        Some(address) => {
            console.cobosafe = Some(address);
            console.print(format!("CoboSafe set to {}", fmt_address(&address)))
        }
        None => console.print(format!("Current CoboSafe: {}", show(console.cobosafe))),
    }
}

fn delegate(console: &mut Console, arg: &str) -> Result<()> {
    match arg_as_addr(arg)? {
        Some(address) => {
            console.delegate = Some(address);
            console.print(format!("Delegate set to {}", fmt_address(&address)))
        }
        None => console.print(format!("Current delegate: {}", show(console.delegate))),
    }
}

async fn factory(console: &mut Console, arg: &str) -> Result<()> {
    if let Some(address) = arg_as_addr(arg)? {
        if address != console.factory_address {
            console.print(format!(
                "Factory changes from {} to {}",
                fmt_address(&console.factory_address),
                fmt_address(&address)
            ))?;
            console.factory_address = address;
        }
    }

    let report = session_factory(console)?.dump(false).await?;
    console.print_report(&report)
}

async fn dump(console: &mut Console, arg: &str) -> Result<()> {
    let args: Vec<&str> = arg.split_whitespace().collect();
    let address = required(arg_as_addr(args.first().copied().unwrap_or(""))?, "address")?;
    let report = resolver::dump(console.client(), address, args.len() > 1).await?;
    console.print_report(&report)
}

async fn export_config(console: &mut Console, arg: &str) -> Result<()> {
    let args: Vec<&str> = arg.split_whitespace().collect();
    let address = required(arg_as_addr(args.first().copied().unwrap_or(""))?, "address")?;
    let dir = console.config.console.export_dir.clone();
    let path = resolver::export_config(console.client(), address, &dir, args.get(1).copied()).await?;
    console.print(format!("Exported to {}", path.display()))
}

async fn create_cobosafe(console: &mut Console, arg: &str) -> Result<()> {
    let safe = required(arg_as_addr(arg)?.or(console.safe), "safe")?;
    let deployer = required(console.delegate, "delegate")?;

    let account = CoboSafeAccount::create(&session_factory(console)?, safe, deployer).await?;
    console.print("Created:")?;
    let report = account.dump(false).await?;
    console.print_report(&report)
}

async fn create_cobosmart(console: &mut Console, arg: &str) -> Result<()> {
    let owner = required(arg_as_addr(arg)?.or(console.delegate), "owner")?;
    let deployer = console.delegate.unwrap_or(owner);

    let account = CoboSmartAccount::create(&session_factory(console)?, owner, deployer).await?;
    console.print("Created:")?;
    let report = account.dump(false).await?;
    console.print_report(&report)
}

/// Delegate-call `ArgusAccountHelper` from the session Safe
async fn call_helper(console: &Console, func_sig: &str, args: &[Token]) -> Result<()> {
    let safe_address = required(console.safe, "safe")?;
    let safe = GnosisSafe::load(safe_address, None, console.client()).await?;
    let helper = session_factory(console)?
        .get_address("ArgusAccountHelper")
        .await?
        .ok_or_else(|| anyhow!("ArgusAccountHelper not registered in factory"))?;

    info!("Safe {} delegate-calls {} on {}", fmt_address(&safe_address), func_sig, fmt_address(&helper));
    let receipt = safe.delegate_call(helper, func_sig, args).await?;
    debug!("Helper call confirmed: {}", receipt);
    Ok(())
}

async fn init_argus(console: &mut Console) -> Result<()> {
    let safe = required(console.safe, "safe")?;
    call_helper(
        console,
        "initArgus(address,bytes32)",
        &[Token::Address(console.factory_address), salt_token(rand_salt())],
    )
    .await?;

    let created = session_factory(console)?
        .get_cobosafe(safe)
        .await?
        .ok_or_else(|| anyhow!("no CoboSafeAccount recorded for {}", fmt_address(&safe)))?;
    let created = fmt_address(&created);
    console.print(format!("CoboSafeAccount created at {}", created))?;
    dump(console, &created).await?;
    cobosafe(console, &created)
}

/// `grantRoles` / `revokeRoles` for one role and delegate
async fn update_roles(console: &mut Console, arg: &str, func_sig: &str) -> Result<()> {
    let account = required(console.cobosafe, "cobosafe")?;
    let (role, delegate) = role_and_address(arg)?;
    call_helper(
        console,
        func_sig,
        &[
            Token::Address(account),
            Token::Array(vec![role_token(&role)?]),
            Token::Array(vec![Token::Address(delegate)]),
        ],
    )
    .await
}

async fn create_authorizer(console: &mut Console, arg: &str) -> Result<()> {
    let name = arg.trim();
    if name.is_empty() {
        bail!("name not set");
    }
    let safe = required(console.safe, "safe")?;
    let account = required(console.cobosafe, "cobosafe")?;

    let tag = rand_salt();
    let predicted = session_factory(console)?
        .get_create2_address(safe, name, tag)
        .await?;
    call_helper(
        console,
        "createAuthorizer(address,address,bytes32,bytes32)",
        &[
            Token::Address(console.factory_address),
            Token::Address(account),
            role_token(name)?,
            salt_token(tag),
        ],
    )
    .await?;

    let predicted = fmt_address(&predicted);
    console.print(format!("Created at {}", predicted))?;
    dump(console, &predicted).await
}

/// `addAuthorizer` / `removeAuthorizer` on the root authorizer (delegate-call flavour)
async fn update_authorizer(console: &mut Console, arg: &str, func_sig: &str) -> Result<()> {
    let account = required(console.cobosafe, "cobosafe")?;
    let (role, authorizer) = role_and_address(arg)?;
    call_helper(
        console,
        func_sig,
        &[
            Token::Address(account),
            Token::Address(authorizer),
            Token::Bool(true),
            Token::Array(vec![role_token(&role)?]),
        ],
    )
    .await
}

async fn exec(console: &mut Console, arg: &str) -> Result<()> {
    let account = required(console.cobosafe, "cobosafe")?;
    let delegate = required(console.delegate, "delegate")?;

    let mut parts = arg.split_whitespace();
    let (Some(to), Some(func_sig)) = (parts.next(), parts.next()) else {
        bail!("expected <to> <func sig> [<args>...]");
    };
    let to = parse_address(to)?;
    let args: Vec<&str> = parts.collect();
    let tokens = tokenize_args(func_sig, &args)?;

    let account = CoboSafeAccount::new(account, console.client())?.with_delegate(Some(delegate));
    let receipt = account
        .exec_transaction_ex(to, func_sig, &tokens, U256::zero(), true)
        .await?;
    console.print(format!("Transaction confirmed: {}", receipt))
}

async fn enable_module(console: &mut Console) -> Result<()> {
    let address = required(console.cobosafe, "cobosafe")?;
    let account = CoboSafeAccount::new(address, console.client())?;
    let safe = account.safe().await?;

    if safe.is_module_enabled(address).await? {
        return console.print(format!(
            "{} is already enabled on {}",
            fmt_address(&address),
            fmt_address(&safe.address())
        ));
    }
    let receipt = safe.enable_module(address).await?;
    console.print(format!("Module enabled: {}", receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, addresses, bytes32, MockChain};
    use crate::cli::console::tests::console;
    use crate::contracts::codec::FACTORY_ADDRESS;
    use crate::contracts::ContractHandle;

    fn factory_address() -> Address {
        parse_address(FACTORY_ADDRESS).unwrap()
    }

    fn safe_with_helper(chain: &MockChain) {
        chain.on(addr(0x5a), "getThreshold()", vec![Token::Uint(U256::one())]);
        chain.on(addr(0x5a), "getOwners()", vec![addresses(&[addr(1)])]);
        chain.on_args(
            factory_address(),
            "getLatestImplementation(bytes32)",
            &[bytes32("ArgusAccountHelper")],
            vec![Token::Address(addr(0x4e))],
        );
    }

    #[tokio::test]
    async fn test_help() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);

        console.onecmd("help").await.unwrap();
        assert!(out.text().contains("create_authorizer"));
        out.clear();

        console.onecmd("help glob").await.unwrap();
        assert_eq!(out.text(), "glob: Print current global config.\n");
        out.clear();

        console.onecmd("frobnicate now").await.unwrap();
        assert_eq!(out.text(), "*** Unknown syntax: frobnicate now\n");
    }

    #[tokio::test]
    async fn test_exit_and_debug() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);

        assert!(!console.onecmd("debug").await.unwrap());
        assert!(out.text().contains("debug set to true"));
        assert!(console.onecmd("exit").await.unwrap());
        assert!(out.text().ends_with("bye!\n"));
    }

    #[tokio::test]
    async fn test_chain_alias_and_glob() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);
        console.safe = Some(addr(1));

        console.onecmd("chain arb").await.unwrap();
        let text = out.text();
        assert!(text.contains("Change to arbitrum-main"));
        assert!(text.contains("Network: arbitrum-main"));
        assert!(text.contains("Safe: None"));
        assert!(text.contains(&format!("Factory: {}", FACTORY_ADDRESS)));
        out.clear();

        console.onecmd("chain").await.unwrap();
        assert!(out.text().contains("Current network: arbitrum-main"));
        assert!(out.text().contains("Supported networks: "));
    }

    #[tokio::test]
    async fn test_safe_auto_selects_cobosafe() {
        let chain = MockChain::new(1337);
        chain.on_args(
            factory_address(),
            "getLastRecord(address,bytes32)",
            &[Token::Address(addr(0x5a)), bytes32("CoboSafeAccount")],
            vec![Token::Address(addr(0xac))],
        );
        let (mut console, out) = console(&chain);

        console.onecmd(&format!("safe {}", fmt_address(&addr(0x5a)))).await.unwrap();
        assert_eq!(console.safe, Some(addr(0x5a)));
        assert_eq!(console.cobosafe, Some(addr(0xac)));
        assert!(out.text().contains(&format!("CoboSafe set to {}", fmt_address(&addr(0xac)))));
    }

    #[tokio::test]
    async fn test_load_account_sets_delegate() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);

        console
            .onecmd("load_account 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
            .await
            .unwrap();
        assert!(out.text().contains("Load address: 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(console.delegate.is_some());
    }

    #[tokio::test]
    async fn test_dump_without_metadata() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);

        console.onecmd(&format!("dump {}", fmt_address(&addr(9)))).await.unwrap();
        assert_eq!(out.text(), "No valid IVersion contract.\n");
    }

    #[tokio::test]
    async fn test_bind_delegate_requires_cobosafe() {
        let chain = MockChain::new(1337);
        let (mut console, _out) = console(&chain);
        let err = console
            .single_command(&format!("bind_delegate trader {}", fmt_address(&addr(7))))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cobosafe not set");
    }

    #[tokio::test]
    async fn test_bind_delegate_delegate_calls_helper() {
        let chain = MockChain::new(1337);
        safe_with_helper(&chain);
        let (mut console, _out) = console(&chain);
        console.safe = Some(addr(0x5a));
        console.cobosafe = Some(addr(0xac));

        console
            .single_command(&format!("bind_delegate trader {}", fmt_address(&addr(7))))
            .await
            .unwrap();

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, addr(0x5a));
        assert_eq!(sent[0].from, Some(addr(1)));

        let safe = ContractHandle::load("GnosisSafe", addr(0x5a), console.client()).unwrap();
        let args = safe.decode_input("execTransaction", &sent[0].data).unwrap();
        assert_eq!(args[0], Token::Address(addr(0x4e)));
        assert_eq!(args[3], Token::Uint(U256::one()));

        let mut expected =
            crate::contracts::codec::func_selector("grantRoles(address,bytes32[],address[])").to_vec();
        expected.extend(ethers::abi::encode(&[
            Token::Address(addr(0xac)),
            Token::Array(vec![bytes32("trader")]),
            Token::Array(vec![Token::Address(addr(7))]),
        ]));
        assert_eq!(args[2], Token::Bytes(expected));
    }

    #[tokio::test]
    async fn test_exec_through_cobosafe() {
        let chain = MockChain::new(1337);
        chain.on(
            addr(0xac),
            "execTransaction((uint256,address,uint256,bytes,bytes,bytes))",
            vec![Token::Tuple(vec![Token::Bool(true), Token::Bytes(vec![]), Token::Bytes(vec![7])])],
        );
        let (mut console, out) = console(&chain);
        console.cobosafe = Some(addr(0xac));
        console.delegate = Some(addr(0xde));

        console
            .single_command(&format!(
                "exec {} transfer(address,uint256) {} 100",
                fmt_address(&addr(0x41)),
                fmt_address(&addr(2))
            ))
            .await
            .unwrap();

        assert!(out.text().starts_with("Transaction confirmed: "));
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, Some(addr(0xde)));
        assert_eq!(sent[0].to, addr(0xac));
    }

    #[tokio::test]
    async fn test_export_config_writes_file() {
        let chain = MockChain::new(1337);
        chain.ownable(addr(0xb0), "FlatRoleManager", 1, addr(1));
        chain.on(addr(0xb0), "getDelegates()", vec![addresses(&[])]);
        let (mut console, out) = console(&chain);
        let dir = tempfile::tempdir().unwrap();
        console.config.console.export_dir = dir.path().to_path_buf();

        console
            .single_command(&format!("export_config {} roles", fmt_address(&addr(0xb0))))
            .await
            .unwrap();
        assert!(dir.path().join("roles_config.yaml").exists());
        assert!(out.text().starts_with("Exported to "));
    }

    #[tokio::test]
    async fn test_config_masks_rpc_keys() {
        let chain = MockChain::new(1337);
        let (mut console, out) = console(&chain);
        if let Some(network) = console.config.networks.get_mut("mainnet") {
            network.rpc_url = "https://rpc.example.com/eth?apikey=secret".to_string();
        }

        console.onecmd("config").await.unwrap();
        let text = out.text();
        assert!(text.starts_with("Configuration:"));
        assert!(text.contains("mainnet: chain_id=1 rpc=https://rpc.example.com/eth?***"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_address_url() {
        let config = Config::default();
        let url = address_url(&config, "mainnet", &addr(1)).unwrap();
        assert_eq!(url, format!("https://etherscan.io/address/{}", fmt_address(&addr(1))));
        assert_eq!(address_url(&config, "development", &addr(1)), None);
    }

    #[test]
    fn test_role_and_address() {
        let (role, address) = role_and_address(&format!("trader {}", fmt_address(&addr(3)))).unwrap();
        assert_eq!(role, "trader");
        assert_eq!(address, addr(3));
        assert!(role_and_address("trader").is_err());
    }
}
