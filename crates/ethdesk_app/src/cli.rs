use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ethereum sample wallet: local keystores, balances, transfers and a Greeter
/// contract.
#[derive(Parser, Debug)]
#[command(name = "ethdesk", version, about)]
pub struct Cli {
    /// Config file (defaults to ~/.ethdesk/config.json).
    #[arg(long, env = "ETHDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint for this run only.
    #[arg(long, env = "ETHDESK_RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// Chain id to sign for with `--rpc-url`; asked from the node when omitted.
    #[arg(long, env = "ETHDESK_CHAIN_ID", global = true, requires = "rpc_url")]
    pub chain_id: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List wallets with their balances.
    Wallets {
        /// Also print each private key.
        #[arg(long)]
        show_keys: bool,
    },

    /// Create a new random wallet.
    Generate,

    /// Import a wallet from a hex private key.
    Import {
        /// 1 to 64 hex digits, `0x` optional.
        key: String,
    },

    /// Send ether from a stored wallet and wait for the receipt.
    Send {
        /// Amount in ether, e.g. 0.01.
        #[arg(long)]
        amount: String,
        /// Address of a stored wallet.
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Deploy the Greeter contract from a stored wallet.
    Deploy {
        #[arg(long)]
        wallet: String,
    },

    /// List cached contract deployments.
    Contracts,

    /// Delete every keystore file.
    ResetWallets {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Forget every cached contract.
    ResetContracts {
        #[arg(long)]
        yes: bool,
    },

    /// Print the stored wallet address after `--current`.
    Suggest {
        #[arg(long)]
        current: Option<String>,
    },

    /// Inspect or change the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the active configuration.
    Show,

    /// Point at a custom JSON-RPC endpoint.
    SetRpc {
        url: String,
        /// Chain id to sign for; asked from the node when omitted.
        #[arg(long)]
        chain_id: Option<u64>,
    },

    /// Switch to a well-known network (mainnet, sepolia, holesky, local).
    UseNetwork { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_send() {
        let cli = Cli::try_parse_from([
            "ethdesk", "send", "--amount", "0.5", "--from", "0xaa", "--to", "0xbb",
        ])
        .unwrap();
        match cli.command {
            Command::Send { amount, from, to } => {
                assert_eq!(amount, "0.5");
                assert_eq!(from, "0xaa");
                assert_eq!(to, "0xbb");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_config_subcommands() {
        let cli = Cli::try_parse_from(["ethdesk", "config", "use-network", "sepolia"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::UseNetwork { ref name }
            } if name == "sepolia"
        ));

        let cli = Cli::try_parse_from([
            "ethdesk", "config", "set-rpc", "http://127.0.0.1:8545", "--chain-id", "31337",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::SetRpc {
                    chain_id: Some(31337),
                    ..
                }
            }
        ));
    }

    #[test]
    fn reset_requires_flag_to_be_spelled_out() {
        let cli = Cli::try_parse_from(["ethdesk", "reset-wallets"]).unwrap();
        assert!(matches!(cli.command, Command::ResetWallets { yes: false }));
    }

    #[test]
    fn chain_id_goes_with_rpc_override() {
        let cli = Cli::try_parse_from([
            "ethdesk", "--rpc-url", "http://127.0.0.1:8545", "--chain-id", "31337", "wallets",
        ])
        .unwrap();
        assert_eq!(cli.rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(cli.chain_id, Some(31_337));

        let cli = Cli::try_parse_from(["ethdesk", "--rpc-url", "http://127.0.0.1:8545", "contracts"])
            .unwrap();
        assert_eq!(cli.chain_id, None);

        assert!(Cli::try_parse_from(["ethdesk", "--chain-id", "1", "wallets"]).is_err());
    }

    #[test]
    fn send_requires_all_fields() {
        assert!(Cli::try_parse_from(["ethdesk", "send", "--amount", "1"]).is_err());
    }
}
