use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use ethdesk_core::{DeskConfig, DuplicateContractPolicy, KeystoreLoadPolicy};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::address_index::{address_from_file_name, normalize_address};
use crate::chain::{ChainClient, Deployment, RpcChainClient, TransferReceipt};
use crate::contract_cache::{Contract, ContractCache};
use crate::error::WalletError;
use crate::keystore::{KeystoreDir, LoadReport, WalletCredentials, WriteAbort};
use crate::kv_store::{KeyValueStore, PreferencesFile};

const MAX_ETHER_DECIMALS: usize = 18;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A wallet as shown to the user, derived from its keystore file on every
/// refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Wallet {
    /// `0x` + 40 hex digits (EIP-55 checksummed).
    pub address: String,
    /// Decimal ether.
    pub balance: String,
    pub private_key_hex: String,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("balance", &self.balance)
            .field("private_key_hex", &"<redacted>")
            .finish()
    }
}

/// A keystore file left out of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedKeystore {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletListing {
    pub wallets: Vec<Wallet>,
    pub skipped: Vec<SkippedKeystore>,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub receipt: TransferReceipt,
    pub wallets: WalletListing,
}

#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub deployment: Deployment,
    pub contracts: Vec<Contract>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub greeting: String,
    pub load_policy: KeystoreLoadPolicy,
    pub duplicate_contracts: DuplicateContractPolicy,
    /// Balance queries in flight at once during a refresh.
    pub balance_concurrency: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from(&DeskConfig::default())
    }
}

impl From<&DeskConfig> for ServiceOptions {
    fn from(config: &DeskConfig) -> Self {
        Self {
            greeting: config.greeting.clone(),
            load_policy: config.keystore_load_policy,
            duplicate_contracts: config.duplicate_contracts,
            balance_concurrency: config.balance_concurrency.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// WalletService
// ---------------------------------------------------------------------------

/// The user-facing wallet operations.
///
/// The wallet directory is guarded by a read-write lock: listing, lookup and
/// decryption share the read side, while generate, import and reset take the
/// write side and wait for readers to drain. Keystore work runs on the
/// blocking pool and owns its guard, so an aborted caller cannot release the
/// lock under a running job. Network calls happen outside the lock.
pub struct WalletService {
    keystore: KeystoreDir,
    chain: Arc<dyn ChainClient>,
    contracts: Arc<ContractCache>,
    options: ServiceOptions,
    directory: Arc<RwLock<()>>,
}

impl WalletService {
    pub fn new(
        keystore: KeystoreDir,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn KeyValueStore>,
        options: ServiceOptions,
    ) -> Self {
        let contracts = Arc::new(ContractCache::new(store, options.duplicate_contracts));
        Self {
            keystore,
            chain,
            contracts,
            options,
            directory: Arc::new(RwLock::new(())),
        }
    }

    /// Wire the service to the configured data directory and RPC endpoint.
    pub fn from_config(config: &DeskConfig) -> anyhow::Result<Self> {
        let keystore = KeystoreDir::new(config.wallets_dir()?, config.keystore_password.clone());
        let chain = RpcChainClient::from_config(config)?;
        let store = PreferencesFile::new(config.preferences_path()?);
        info!(
            wallets = %keystore.dir().display(),
            rpc_url = %chain.url(),
            "wallet service configured"
        );
        Ok(Self::new(
            keystore,
            Arc::new(chain),
            Arc::new(store),
            ServiceOptions::from(config),
        ))
    }

    pub fn keystore(&self) -> &KeystoreDir {
        &self.keystore
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Decrypt every keystore file and fetch each balance.
    pub async fn refresh_wallets(&self) -> Result<WalletListing, WalletError> {
        let policy = self.options.load_policy;
        let report = self
            .read_directory(move |keystore| keystore.load_all(policy))
            .await?;
        self.with_balances(report).await
    }

    pub async fn generate_wallet(&self) -> Result<WalletListing, WalletError> {
        let stored = self
            .write_directory(|keystore, abort| keystore.generate_abortable(abort))
            .await?;
        info!(address = %stored.address, "wallet generated");
        self.refresh_wallets().await
    }

    pub async fn import_wallet(&self, private_key: &str) -> Result<WalletListing, WalletError> {
        let key = private_key.to_string();
        let stored = self
            .write_directory(move |keystore, abort| keystore.import_abortable(&key, abort))
            .await?;
        info!(address = %stored.address, "wallet imported");
        self.refresh_wallets().await
    }

    /// Send `amount` ether from a stored wallet and wait for the receipt.
    pub async fn send_transaction(
        &self,
        amount: &str,
        from: &str,
        to: &str,
    ) -> Result<TransferOutcome, WalletError> {
        let recipient = parse_address(to)?;
        let value = parse_amount(amount)?;
        let sender = self.credentials_for(from).await?;

        info!(from = %sender.address, to = %recipient, amount = %amount.trim(), "sending funds");
        let receipt = self.chain.transfer(&sender.signer, recipient, value).await?;
        info!(tx_hash = %receipt.tx_hash, block = ?receipt.block_number, "transfer mined");

        let wallets = self.refresh_wallets().await?;
        Ok(TransferOutcome { receipt, wallets })
    }

    /// Deploy a Greeter from a stored wallet and cache the result.
    pub async fn deploy_contract(&self, wallet: &str) -> Result<DeployOutcome, WalletError> {
        let owner = self.credentials_for(wallet).await?;
        let deployment = self
            .chain
            .deploy_greeter(&owner.signer, &self.options.greeting)
            .await?;

        let cache = Arc::clone(&self.contracts);
        let record = deployment.contract.clone();
        let contracts = tokio::task::spawn_blocking(move || cache.append(record)).await??;
        Ok(DeployOutcome {
            deployment,
            contracts,
        })
    }

    pub async fn list_contracts(&self) -> Result<Vec<Contract>, WalletError> {
        let cache = Arc::clone(&self.contracts);
        tokio::task::spawn_blocking(move || cache.load()).await?
    }

    /// Delete every keystore file. Irreversible.
    pub async fn reset_wallets(&self) -> Result<WalletListing, WalletError> {
        self.write_directory(|keystore, _| keystore.delete_all())
            .await?;
        warn!(dir = %self.keystore.dir().display(), "all wallets deleted");
        self.refresh_wallets().await
    }

    pub async fn reset_contracts(&self) -> Result<Vec<Contract>, WalletError> {
        let cache = Arc::clone(&self.contracts);
        tokio::task::spawn_blocking(move || {
            cache.clear()?;
            cache.load()
        })
        .await?
    }

    /// Next stored address after `current` in file-name order, without
    /// decrypting anything or touching the network.
    pub async fn suggest_address(&self, current: Option<&str>) -> Result<Option<String>, WalletError> {
        let paths = self
            .read_directory(|keystore| keystore.list_wallet_paths())
            .await?;

        let mut addresses: Vec<Address> = Vec::new();
        for name in paths.iter().filter_map(|p| p.file_name().and_then(|n| n.to_str())) {
            let Some(address) = address_from_file_name(name).and_then(|a| parse_address(&a).ok())
            else {
                continue;
            };
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }

        let current = current.and_then(|c| parse_address(c).ok());
        let next = match current.and_then(|c| addresses.iter().position(|a| *a == c)) {
            Some(i) => addresses.get((i + 1) % addresses.len()),
            None => addresses.first(),
        };
        Ok(next.map(Address::to_string))
    }

    async fn credentials_for(&self, address: &str) -> Result<WalletCredentials, WalletError> {
        normalize_address(address)?;
        let address = address.to_string();
        self.read_directory(move |keystore| {
            let path = keystore.find_by_address(&address)?;
            keystore.load(&path)
        })
        .await
    }

    /// Run `work` on the blocking pool holding the directory read lock.
    async fn read_directory<T, F>(&self, work: F) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce(&KeystoreDir) -> Result<T, WalletError> + Send + 'static,
    {
        let guard = Arc::clone(&self.directory).read_owned().await;
        let keystore = self.keystore.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work(&keystore)
        })
        .await?
    }

    /// Run `work` on the blocking pool holding the directory write lock. If
    /// the calling task is dropped, `work` sees its [`WriteAbort`] raised and
    /// does not commit.
    async fn write_directory<T, F>(&self, work: F) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce(&KeystoreDir, &WriteAbort) -> Result<T, WalletError> + Send + 'static,
    {
        let guard = Arc::clone(&self.directory).write_owned().await;
        let keystore = self.keystore.clone();
        let abort = WriteAbort::new();
        let _abort_on_drop = AbortOnDrop(abort.clone());
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            if abort.is_aborted() {
                return Err(WalletError::Internal("wallet directory change aborted".into()));
            }
            work(&keystore, &abort)
        })
        .await?
    }

    async fn with_balances(&self, report: LoadReport) -> Result<WalletListing, WalletError> {
        let skipped = report
            .failures
            .into_iter()
            .map(|f| SkippedKeystore {
                path: f.path,
                reason: f.error.to_string(),
            })
            .collect();

        if report.credentials.is_empty() {
            return Ok(WalletListing {
                wallets: Vec::new(),
                skipped,
            });
        }

        let chain = &self.chain;
        let wallets: Vec<Wallet> = stream::iter(report.credentials)
            .map(|credentials| async move {
                let balance = chain.balance_ether(credentials.address).await?;
                Ok::<_, WalletError>(Wallet {
                    address: credentials.address.to_string(),
                    balance,
                    private_key_hex: credentials.private_key_hex(),
                })
            })
            .buffered(self.options.balance_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(WalletListing { wallets, skipped })
    }
}

/// Raises the abort flag when the owning future is dropped. After a normal
/// return the blocking job has already finished, so the flag goes unread.
struct AbortOnDrop(WriteAbort);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    let digits = normalize_address(address)?;
    digits
        .parse::<Address>()
        .map_err(|e| WalletError::InvalidAddress(format!("{address}: {e}")))
}

/// Parse a positive decimal ether amount into wei.
pub fn parse_amount(amount: &str) -> Result<U256, WalletError> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
        return Err(WalletError::InvalidAmount(format!(
            "'{amount}' is not a decimal ether amount"
        )));
    }
    if fraction.len() > MAX_ETHER_DECIMALS {
        return Err(WalletError::InvalidAmount(format!(
            "'{amount}' has more than {MAX_ETHER_DECIMALS} decimal places"
        )));
    }

    let normalized = format!(
        "{}.{}",
        if whole.is_empty() { "0" } else { whole },
        if fraction.is_empty() { "0" } else { fraction }
    );
    let wei = parse_ether(&normalized)
        .map_err(|e| WalletError::InvalidAmount(format!("'{amount}': {e}")))?;
    if wei.is_zero() {
        return Err(WalletError::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(wei)
}
