mod cli;
mod render;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info, warn};

use ethdesk_core::config::{ConfigManager, DeskConfig};
use ethdesk_core::notifications::NotificationStore;
use ethdesk_core::{TaskHandle, classify_error, describe, logging};
use ethdesk_wallet::{Network, WalletDispatcher, WalletError, WalletService, notification_for};

use cli::{Cli, Command, ConfigAction};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let classified = match e.downcast_ref::<WalletError>() {
                Some(wallet_error) => describe(wallet_error),
                None => classify_error(&e),
            };
            error!(kind = %classified.kind, "{e:#}");
            eprintln!("{}", classified.message);
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::open(path),
        None => ConfigManager::new(),
    }
    .context("Config manager init failed")?;
    let mut config = config_manager.get();
    config.ensure_dirs()?;
    let _log_guard = logging::init_logging(&config)?;
    info!(config = %config_manager.path().display(), "ethdesk starting");

    let command = match cli.command {
        Command::Config { action } => return config_command(&config_manager, action),
        command => command,
    };

    if let Some(url) = &cli.rpc_url {
        config.override_rpc_url(url, cli.chain_id)?;
    }

    let show_keys = matches!(command, Command::Wallets { show_keys: true });
    let service = Arc::new(WalletService::from_config(&config)?);
    let (dispatcher, mut outcomes) = WalletDispatcher::new(service, config.max_concurrent_tasks);

    let handle = submit(&dispatcher, command)?;

    let outcome = tokio::select! {
        outcome = outcomes.recv() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!(task_id = %handle.id(), "interrupted");
            let _ = handle.cancel();
            dispatcher.shutdown();
            eprintln!("Cancelled.");
            return Ok(ExitCode::from(130));
        }
    };
    dispatcher.shutdown();
    let outcome = outcome.context("operation ended without a result")?;

    let mut notifications = NotificationStore::new();
    notifications.push(notification_for(&outcome));

    match &outcome.result {
        Ok(update) => {
            print!("{}", render::update(update, show_keys));
            if let Some(current) = notifications.current() {
                eprintln!("{}", render::notification(current));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(task = %outcome.name, error = %e, "operation failed");
            if let Some(current) = notifications.current() {
                eprintln!("{}", render::notification(current));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Hand the command to the dispatcher. Destructive resets need `--yes`.
fn submit(dispatcher: &WalletDispatcher, command: Command) -> anyhow::Result<TaskHandle> {
    let handle = match command {
        Command::Wallets { .. } => dispatcher.refresh_wallets(),
        Command::Generate => dispatcher.generate_wallet(),
        Command::Import { key } => dispatcher.import_wallet(key),
        Command::Send { amount, from, to } => {
            eprintln!("Be patient, waiting for the transfer to be mined...");
            dispatcher.send_transaction(amount, from, to)
        }
        Command::Deploy { wallet } => {
            eprintln!("Be patient, waiting for the deployment to be mined...");
            dispatcher.deploy_contract(wallet)
        }
        Command::Contracts => dispatcher.list_contracts(),
        Command::ResetWallets { yes } => {
            if !yes {
                bail!("refusing to delete every wallet without --yes");
            }
            dispatcher.reset_wallets()
        }
        Command::ResetContracts { yes } => {
            if !yes {
                bail!("refusing to clear the contract cache without --yes");
            }
            dispatcher.reset_contracts()
        }
        Command::Suggest { current } => dispatcher.suggest_address(current),
        Command::Config { .. } => bail!("config commands do not run in the background"),
    };
    Ok(handle)
}

fn config_command(manager: &ConfigManager, action: ConfigAction) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            let config: DeskConfig = manager.get();
            println!("# {}", manager.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            if config.keystore_password.is_sample() {
                eprintln!(
                    "warning: {} is not set; keystores use the sample password",
                    ethdesk_core::config::PASSWORD_ENV
                );
            }
        }
        ConfigAction::SetRpc { url, chain_id } => {
            manager.set_rpc_url(&url, chain_id)?;
            println!("RPC endpoint set to {url}");
        }
        ConfigAction::UseNetwork { name } => {
            let network: Network = name.parse().map_err(anyhow::Error::msg)?;
            manager.set_rpc_url(network.default_rpc_url(), Some(network.chain_id()))?;
            println!("Using {network} ({})", network.default_rpc_url());
        }
    }
    Ok(ExitCode::SUCCESS)
}
