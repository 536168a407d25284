use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Password the original sample encrypted every keystore file with.
///
/// Only used when `ETHDESK_KEYSTORE_PASSWORD` is unset. Anyone holding the
/// wallet directory can decrypt every key with it.
pub const SAMPLE_KEYSTORE_PASSWORD: &str = "abc";

/// Environment variable that overrides the keystore password.
pub const PASSWORD_ENV: &str = "ETHDESK_KEYSTORE_PASSWORD";

const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
const DEFAULT_GREETING: &str = "Hello from ethdesk";

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What a wallet load does when one keystore file cannot be decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeystoreLoadPolicy {
    /// Fail the whole load on the first bad file.
    #[default]
    Abort,
    /// Skip bad files and report them next to the wallets that did load.
    SkipAndReport,
}

/// Whether the contract cache accepts a second record for the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateContractPolicy {
    #[default]
    Allow,
    Reject,
}

// ---------------------------------------------------------------------------
// KeystorePassword
// ---------------------------------------------------------------------------

/// Keystore password. Never serialized, redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct KeystorePassword(String);

impl KeystorePassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Pick the password from an optional environment value, falling back to
    /// [`SAMPLE_KEYSTORE_PASSWORD`] when it is missing or empty.
    pub fn resolve(env_value: Option<String>) -> Self {
        match env_value {
            Some(v) if !v.is_empty() => Self(v),
            _ => Self(SAMPLE_KEYSTORE_PASSWORD.to_string()),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether this is the shared sample password.
    pub fn is_sample(&self) -> bool {
        self.0 == SAMPLE_KEYSTORE_PASSWORD
    }
}

impl Default for KeystorePassword {
    fn default() -> Self {
        Self(SAMPLE_KEYSTORE_PASSWORD.to_string())
    }
}

impl fmt::Debug for KeystorePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeystorePassword(***)")
    }
}

// ---------------------------------------------------------------------------
// DeskConfig
// ---------------------------------------------------------------------------

/// Application configuration stored at `~/.ethdesk/config.json`.
///
/// The keystore password is **never** written to the JSON file. It comes from
/// the environment on every load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    #[serde(skip)]
    pub keystore_password: KeystorePassword,

    // Chain
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub rpc_timeout_secs: u64,
    pub receipt_timeout_secs: u64,

    // Contracts
    pub greeting: String,
    pub duplicate_contracts: DuplicateContractPolicy,

    // Wallets
    pub keystore_load_policy: KeystoreLoadPolicy,
    pub balance_concurrency: usize,

    // Storage overrides; `None` means under `~/.ethdesk/`
    pub data_dir: Option<PathBuf>,

    // General
    pub max_concurrent_tasks: usize,
    pub log_level: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            keystore_password: KeystorePassword::default(),
            rpc_url: DEFAULT_RPC_URL.into(),
            chain_id: None,
            rpc_timeout_secs: 30,
            receipt_timeout_secs: 300,
            greeting: DEFAULT_GREETING.into(),
            duplicate_contracts: DuplicateContractPolicy::Allow,
            keystore_load_policy: KeystoreLoadPolicy::Abort,
            balance_concurrency: 1,
            data_dir: None,
            max_concurrent_tasks: 4,
            log_level: "info".into(),
        }
    }
}

impl DeskConfig {
    /// Returns the base config directory: `~/.ethdesk/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".ethdesk"))
    }

    /// Returns the config file path: `~/.ethdesk/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.ethdesk/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Root for wallet and preference data (`data_dir` or `~/.ethdesk/`).
    pub fn data_root(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::base_dir(),
        }
    }

    /// Keystore directory: `<data root>/wallets/`
    pub fn wallets_dir(&self) -> Result<PathBuf> {
        Ok(self.data_root()?.join("wallets"))
    }

    /// Key-value preference file: `<data root>/preferences.json`
    pub fn preferences_path(&self) -> Result<PathBuf> {
        Ok(self.data_root()?.join("preferences.json"))
    }

    /// Ensures the data root and the logs directory exist. The wallet
    /// directory is owned by the keystore manager and created there.
    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [self.data_root()?, Self::logs_dir()?];
        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Point this run at another endpoint without saving. A chain id pinned
    /// for the previous endpoint is replaced, never carried over.
    pub fn override_rpc_url(&mut self, url: &str, chain_id: Option<u64>) -> Result<()> {
        if !validate_url(url) {
            anyhow::bail!("invalid RPC URL: {url}");
        }
        self.rpc_url = url.to_string();
        self.chain_id = chain_id;
        Ok(())
    }

    /// Load config from a specific file path, writing defaults if the file is
    /// missing. The keystore password is resolved from the environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            config
        };

        config.keystore_password = KeystorePassword::resolve(std::env::var(PASSWORD_ENV).ok());
        if config.keystore_password.is_sample() {
            warn!(
                "{PASSWORD_ENV} is not set; keystore files use the fixed sample password and are not protected"
            );
        }
        Ok(config)
    }

    /// Save config to a specific file path (the password is excluded).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// ConfigManager
// ---------------------------------------------------------------------------

/// Thread-safe config holder bound to the file it was loaded from.
pub struct ConfigManager {
    config: Arc<RwLock<DeskConfig>>,
    path: PathBuf,
}

impl ConfigManager {
    /// Load `~/.ethdesk/config.json`.
    pub fn new() -> Result<Self> {
        Self::open(&DeskConfig::config_path()?)
    }

    /// Load (or create) the config at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let config = DeskConfig::load_from_path(path)?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a clone of the current config.
    pub fn get(&self) -> DeskConfig {
        self.config.read().clone()
    }

    /// Mutate the config and persist it.
    pub fn update(&self, f: impl FnOnce(&mut DeskConfig)) -> Result<()> {
        let mut config = self.config.write();
        f(&mut config);
        config.save_to_path(&self.path)
    }

    /// Point the chain client at a different JSON-RPC endpoint.
    pub fn set_rpc_url(&self, url: &str, chain_id: Option<u64>) -> Result<()> {
        if !validate_url(url) {
            anyhow::bail!("invalid RPC URL: {url}");
        }
        self.update(|c| {
            c.rpc_url = url.to_string();
            c.chain_id = chain_id;
        })?;
        info!(rpc_url = %url, "RPC endpoint updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_override_drops_pinned_chain_id() {
        let mut config = DeskConfig {
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".into(),
            chain_id: Some(11_155_111),
            ..DeskConfig::default()
        };

        config.override_rpc_url("http://127.0.0.1:8545", None).unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.chain_id, None);

        config
            .override_rpc_url("http://127.0.0.1:8546", Some(31_337))
            .unwrap();
        assert_eq!(config.chain_id, Some(31_337));

        assert!(config.override_rpc_url("ftp://example.com", None).is_err());
        assert_eq!(config.rpc_url, "http://127.0.0.1:8546");
    }

    fn temp_config_path() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        (tmp, path)
    }

    #[test]
    fn load_missing_file_writes_defaults() {
        let (_tmp, path) = temp_config_path();
        assert!(!path.exists());

        let config = DeskConfig::load_from_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.balance_concurrency, 1);
        assert_eq!(config.keystore_load_policy, KeystoreLoadPolicy::Abort);
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_tmp, path) = temp_config_path();
        let config = DeskConfig {
            rpc_url: "http://localhost:8545".into(),
            chain_id: Some(31337),
            greeting: "gm".into(),
            duplicate_contracts: DuplicateContractPolicy::Reject,
            keystore_load_policy: KeystoreLoadPolicy::SkipAndReport,
            ..DeskConfig::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = DeskConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.rpc_url, "http://localhost:8545");
        assert_eq!(loaded.chain_id, Some(31337));
        assert_eq!(loaded.greeting, "gm");
        assert_eq!(loaded.duplicate_contracts, DuplicateContractPolicy::Reject);
        assert_eq!(loaded.keystore_load_policy, KeystoreLoadPolicy::SkipAndReport);
    }

    #[test]
    fn password_is_never_written() {
        let (_tmp, path) = temp_config_path();
        let config = DeskConfig {
            keystore_password: KeystorePassword::new("correct horse"),
            ..DeskConfig::default()
        };
        config.save_to_path(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("correct horse"));
        assert!(!raw.contains("keystore_password"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (_tmp, path) = temp_config_path();
        std::fs::write(&path, r#"{"rpc_url":"https://rpc.example.com"}"#).unwrap();

        let config = DeskConfig::load_from_path(&path).unwrap();
        assert_eq!(config.rpc_url, "https://rpc.example.com");
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.greeting, DEFAULT_GREETING);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_tmp, path) = temp_config_path();
        std::fs::write(&path, "{not json").unwrap();
        assert!(DeskConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn policies_serialize_snake_case() {
        let json = serde_json::to_string(&KeystoreLoadPolicy::SkipAndReport).unwrap();
        assert_eq!(json, "\"skip_and_report\"");
        let parsed: DuplicateContractPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(parsed, DuplicateContractPolicy::Reject);
    }

    #[test]
    fn password_resolution() {
        assert!(KeystorePassword::resolve(None).is_sample());
        assert!(KeystorePassword::resolve(Some(String::new())).is_sample());

        let custom = KeystorePassword::resolve(Some("s3cret".into()));
        assert!(!custom.is_sample());
        assert_eq!(custom.expose(), "s3cret");
    }

    #[test]
    fn password_debug_is_redacted() {
        let password = KeystorePassword::new("s3cret");
        assert_eq!(format!("{password:?}"), "KeystorePassword(***)");
    }

    #[test]
    fn data_dir_override_moves_wallets_and_preferences() {
        let config = DeskConfig {
            data_dir: Some(PathBuf::from("/tmp/ethdesk-test")),
            ..DeskConfig::default()
        };
        assert_eq!(
            config.wallets_dir().unwrap(),
            PathBuf::from("/tmp/ethdesk-test/wallets")
        );
        assert_eq!(
            config.preferences_path().unwrap(),
            PathBuf::from("/tmp/ethdesk-test/preferences.json")
        );
    }

    #[test]
    fn manager_set_rpc_url_persists() {
        let (_tmp, path) = temp_config_path();
        let manager = ConfigManager::open(&path).unwrap();
        manager
            .set_rpc_url("https://my-node.example.com", Some(11155111))
            .unwrap();

        assert_eq!(manager.get().rpc_url, "https://my-node.example.com");
        let reloaded = DeskConfig::load_from_path(&path).unwrap();
        assert_eq!(reloaded.rpc_url, "https://my-node.example.com");
        assert_eq!(reloaded.chain_id, Some(11155111));
    }

    #[test]
    fn manager_rejects_invalid_rpc_url() {
        let (_tmp, path) = temp_config_path();
        let manager = ConfigManager::open(&path).unwrap();
        assert!(manager.set_rpc_url("ftp://files.example.com", None).is_err());
        assert_eq!(manager.get().rpc_url, DEFAULT_RPC_URL);
    }

    #[test]
    fn validate_url_cases() {
        assert!(validate_url("https://rpc.example.com"));
        assert!(validate_url("http://localhost:8545"));
        assert!(!validate_url(""));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("file:///etc/passwd"));
    }
}
