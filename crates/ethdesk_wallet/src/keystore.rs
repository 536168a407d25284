use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use eth_keystore::KeystoreError;
use ethdesk_core::{KeystoreLoadPolicy, KeystorePassword};
use tracing::{debug, info, warn};

use crate::address_index::{AddressIndex, normalize_address};
use crate::error::WalletError;

const PRIVATE_KEY_HEX_LEN: usize = 64;

/// Credentials decrypted from one keystore file.
#[derive(Clone)]
pub struct WalletCredentials {
    pub address: Address,
    pub signer: PrivateKeySigner,
    pub path: PathBuf,
}

impl WalletCredentials {
    /// Lowercase hex of the 32-byte private key, no `0x` prefix.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signer.to_bytes())
    }
}

impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("address", &self.address)
            .field("path", &self.path)
            .field("signer", &"<redacted>")
            .finish()
    }
}

/// A keystore file that was written (or already present) for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWallet {
    pub address: Address,
    pub path: PathBuf,
}

/// A keystore file that could not be decrypted during [`KeystoreDir::load_all`].
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: WalletError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub credentials: Vec<WalletCredentials>,
    pub failures: Vec<LoadFailure>,
}

/// Shared flag that stops a keystore write before the file lands in the
/// directory. Raised from another thread once the caller has gone away.
#[derive(Debug, Clone, Default)]
pub struct WriteAbort(Arc<AtomicBool>);

impl WriteAbort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A directory of Web3 Secret Storage (v3) keystore files, all encrypted
/// with one password.
#[derive(Clone)]
pub struct KeystoreDir {
    dir: PathBuf,
    password: KeystorePassword,
}

impl KeystoreDir {
    pub fn new(dir: impl Into<PathBuf>, password: KeystorePassword) -> Self {
        let dir = dir.into();
        if password.is_sample() {
            warn!(dir = %dir.display(), "keystore files are encrypted with the sample password");
        }
        Self { dir, password }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it is absent. Existing contents are untouched.
    pub fn ensure_directory(&self) -> Result<(), WalletError> {
        match std::fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(WalletError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", self.dir.display()),
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                std::fs::create_dir_all(&self.dir)?;
                info!(dir = %self.dir.display(), "keystore directory created");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Regular, non-hidden files in the directory, sorted by name. A missing
    /// directory lists as empty.
    pub fn list_wallet_paths(&self) -> Result<Vec<PathBuf>, WalletError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    pub fn index(&self) -> Result<AddressIndex, WalletError> {
        Ok(AddressIndex::build(&self.list_wallet_paths()?))
    }

    /// Create a fresh random key pair and write its keystore file.
    pub fn generate(&self) -> Result<StoredWallet, WalletError> {
        self.generate_abortable(&WriteAbort::new())
    }

    /// [`generate`](Self::generate) that writes nothing once `abort` is raised.
    pub fn generate_abortable(&self, abort: &WriteAbort) -> Result<StoredWallet, WalletError> {
        let signer = PrivateKeySigner::random();
        self.write_keystore(&signer, abort)
    }

    /// Write a keystore file for a hex-encoded private key.
    ///
    /// Importing an address that already has a keystore file returns that
    /// file and writes nothing.
    pub fn import_from_private_key(&self, hex_key: &str) -> Result<StoredWallet, WalletError> {
        self.import_abortable(hex_key, &WriteAbort::new())
    }

    pub fn import_abortable(
        &self,
        hex_key: &str,
        abort: &WriteAbort,
    ) -> Result<StoredWallet, WalletError> {
        let signer = parse_private_key(hex_key)?;
        let address = signer.address();

        let index = self.index()?;
        let key = hex::encode(address.as_slice());
        if index.contains(&key) {
            let path = index.resolve(&key)?.to_path_buf();
            info!(address = %address, path = %path.display(), "wallet already imported");
            return Ok(StoredWallet { address, path });
        }

        self.write_keystore(&signer, abort)
    }

    /// Decrypt one keystore file.
    pub fn load(&self, path: &Path) -> Result<WalletCredentials, WalletError> {
        if !path.is_file() {
            return Err(WalletError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("keystore file {} not found", path.display()),
            )));
        }

        let secret = eth_keystore::decrypt_key(path, self.password.expose())
            .map_err(|e| decryption_error(path, e))?;
        let signer =
            PrivateKeySigner::from_slice(&secret).map_err(|e| WalletError::Decryption {
                path: path.to_path_buf(),
                detail: format!("stored key is not a valid secp256k1 scalar: {e}"),
            })?;

        debug!(address = %signer.address(), path = %path.display(), "keystore decrypted");
        Ok(WalletCredentials {
            address: signer.address(),
            signer,
            path: path.to_path_buf(),
        })
    }

    /// Decrypt every keystore file in listing order.
    pub fn load_all(&self, policy: KeystoreLoadPolicy) -> Result<LoadReport, WalletError> {
        let mut report = LoadReport::default();
        for path in self.list_wallet_paths()? {
            match self.load(&path) {
                Ok(credentials) => report.credentials.push(credentials),
                Err(error) => match policy {
                    KeystoreLoadPolicy::Abort => return Err(error),
                    KeystoreLoadPolicy::SkipAndReport => {
                        warn!(path = %path.display(), error = %error, "skipping unreadable keystore file");
                        report.failures.push(LoadFailure { path, error });
                    }
                },
            }
        }
        Ok(report)
    }

    /// Path of the keystore file holding `address`.
    pub fn find_by_address(&self, address: &str) -> Result<PathBuf, WalletError> {
        normalize_address(address)?;
        Ok(self.index()?.resolve(address)?.to_path_buf())
    }

    /// Remove every keystore file and leave an empty directory behind.
    pub fn delete_all(&self) -> Result<(), WalletError> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::create_dir_all(&self.dir)?;
        info!(dir = %self.dir.display(), "keystore directory reset");
        Ok(())
    }

    /// Encrypt into a private staging directory, restrict the file, then
    /// rename it into place. The key is never readable by other users, and an
    /// aborted write leaves nothing behind.
    fn write_keystore(
        &self,
        signer: &PrivateKeySigner,
        abort: &WriteAbort,
    ) -> Result<StoredWallet, WalletError> {
        self.ensure_directory()?;

        let address = signer.address();
        let name = keystore_file_name(&address, Utc::now());
        // Hidden and mode 0700, so listings skip it and other users cannot enter.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.dir)?;

        let secret = signer.to_bytes();
        let mut rng = rand::thread_rng();
        eth_keystore::encrypt_key(
            staging.path(),
            &mut rng,
            secret.as_slice(),
            self.password.expose(),
            Some(name.as_str()),
        )
        .map_err(|e| WalletError::Crypto(format!("keystore encryption failed: {e}")))?;

        let staged = staging.path().join(&name);
        restrict_permissions(&staged)?;

        if abort.is_aborted() {
            warn!(address = %address, "keystore write aborted before commit");
            return Err(WalletError::Internal("keystore write aborted".into()));
        }
        let path = self.dir.join(&name);
        std::fs::rename(&staged, &path)?;

        info!(address = %address, path = %path.display(), "keystore file written");
        Ok(StoredWallet { address, path })
    }
}

impl fmt::Debug for KeystoreDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreDir")
            .field("dir", &self.dir)
            .field("password", &self.password)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `UTC--<timestamp>--<40 lowercase hex>.json`, the naming web3 tooling uses.
pub fn keystore_file_name(address: &Address, created_at: DateTime<Utc>) -> String {
    format!(
        "UTC--{}--{}.json",
        created_at.format("%Y-%m-%dT%H-%M-%S%.3fZ"),
        hex::encode(address.as_slice())
    )
}

/// Parse 1 to 64 hex digits (optional `0x`) as a secp256k1 private key.
/// Shorter input is left-padded with zeros.
pub fn parse_private_key(hex_key: &str) -> Result<PrivateKeySigner, WalletError> {
    let trimmed = hex_key.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > PRIVATE_KEY_HEX_LEN {
        return Err(WalletError::InvalidKey(format!(
            "expected 1 to {PRIVATE_KEY_HEX_LEN} hex digits, got {}",
            digits.len()
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidKey("not a hexadecimal number".into()));
    }

    let padded = format!("{digits:0>PRIVATE_KEY_HEX_LEN$}");
    let bytes = hex::decode(&padded).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
    PrivateKeySigner::from_slice(&bytes)
        .map_err(|_| WalletError::InvalidKey("key is zero or not below the curve order".into()))
}

fn decryption_error(path: &Path, err: KeystoreError) -> WalletError {
    let detail = match err {
        KeystoreError::MacMismatch => "wrong password or corrupted file (MAC mismatch)".to_string(),
        other => other.to_string(),
    };
    WalletError::Decryption {
        path: path.to_path_buf(),
        detail,
    }
}

fn restrict_permissions(path: &Path) -> Result<(), WalletError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn keystore(dir: &Path) -> KeystoreDir {
        KeystoreDir::new(dir.join("wallets"), KeystorePassword::new("test-password"))
    }

    #[test]
    fn file_name_carries_timestamp_and_address() {
        let signer = parse_private_key(KEY).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap();
        let name = keystore_file_name(&signer.address(), at);

        assert!(name.starts_with("UTC--2024-03-01T10-20-30.000Z--"));
        assert!(name.ends_with(".json"));
        assert!(name.contains(&hex::encode(signer.address().as_slice())));
    }

    #[test]
    fn parse_key_accepts_prefix_and_short_input() {
        let full = parse_private_key(&format!("0x{KEY}")).unwrap();
        assert_eq!(hex::encode(full.to_bytes()), KEY);

        let short = parse_private_key("1").unwrap();
        assert_eq!(hex::encode(short.to_bytes()), format!("{:0>64}", "1"));
    }

    #[test]
    fn parse_key_rejects_bad_input() {
        assert!(matches!(parse_private_key(""), Err(WalletError::InvalidKey(_))));
        assert!(matches!(parse_private_key("0xzz"), Err(WalletError::InvalidKey(_))));
        assert!(matches!(parse_private_key(&"f".repeat(65)), Err(WalletError::InvalidKey(_))));
        assert!(matches!(parse_private_key("0"), Err(WalletError::InvalidKey(_))));
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        store.ensure_directory().unwrap();
        std::fs::write(store.dir().join("keep.txt"), "x").unwrap();
        store.ensure_directory().unwrap();

        assert!(store.dir().join("keep.txt").exists());
    }

    #[test]
    fn ensure_directory_rejects_regular_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        std::fs::write(store.dir(), "not a dir").unwrap();

        assert!(matches!(store.ensure_directory(), Err(WalletError::Io(_))));
    }

    #[test]
    fn listing_skips_hidden_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        store.ensure_directory().unwrap();
        std::fs::write(store.dir().join("b.json"), "{}").unwrap();
        std::fs::write(store.dir().join("a.json"), "{}").unwrap();
        std::fs::write(store.dir().join(".DS_Store"), "").unwrap();
        std::fs::create_dir(store.dir().join("nested")).unwrap();

        let names: Vec<_> = store
            .list_wallet_paths()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn listing_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(keystore(tmp.path()).list_wallet_paths().unwrap().is_empty());
    }

    #[test]
    fn import_then_load_round_trips_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());

        let stored = store.import_from_private_key(KEY).unwrap();
        let loaded = store.load(&stored.path).unwrap();

        assert_eq!(loaded.address, stored.address);
        assert_eq!(loaded.private_key_hex(), KEY);
    }

    #[test]
    fn reimport_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());

        let first = store.import_from_private_key(KEY).unwrap();
        let second = store.import_from_private_key(&format!("0x{KEY}")).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_wallet_paths().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn keystore_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let stored = keystore(tmp.path()).generate().unwrap();
        let mode = std::fs::metadata(&stored.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn aborted_write_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let ks = keystore(tmp.path());
        let abort = WriteAbort::new();
        abort.abort();

        assert!(matches!(
            ks.import_abortable(KEY, &abort),
            Err(WalletError::Internal(_))
        ));
        assert!(ks.list_wallet_paths().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(ks.dir()).unwrap().count(), 0);
    }

    #[test]
    fn staging_directory_is_removed_after_write() {
        let tmp = tempfile::tempdir().unwrap();
        let ks = keystore(tmp.path());
        let stored = ks.generate().unwrap();

        let entries: Vec<PathBuf> = std::fs::read_dir(ks.dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries, vec![stored.path]);
    }

    #[test]
    fn wrong_password_is_a_decryption_error() {
        let tmp = tempfile::tempdir().unwrap();
        let stored = keystore(tmp.path()).generate().unwrap();

        let other = KeystoreDir::new(tmp.path().join("wallets"), KeystorePassword::new("nope"));
        let err = other.load(&stored.path).unwrap_err();
        assert!(matches!(err, WalletError::Decryption { .. }));
    }

    #[test]
    fn load_all_policies() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        store.generate().unwrap();
        std::fs::write(store.dir().join("garbage.json"), "not a keystore").unwrap();

        assert!(store.load_all(KeystoreLoadPolicy::Abort).is_err());

        let report = store.load_all(KeystoreLoadPolicy::SkipAndReport).unwrap();
        assert_eq!(report.credentials.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("garbage.json"));
    }

    #[test]
    fn find_by_address_matches_generated_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        let stored = store.generate().unwrap();

        let found = store.find_by_address(&stored.address.to_string()).unwrap();
        assert_eq!(found, stored.path);
    }

    #[test]
    fn delete_all_leaves_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        store.generate().unwrap();

        store.delete_all().unwrap();
        assert!(store.dir().is_dir());
        assert!(store.list_wallet_paths().unwrap().is_empty());

        // A missing directory is fine too.
        std::fs::remove_dir(store.dir()).unwrap();
        store.delete_all().unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn credentials_debug_hides_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = keystore(tmp.path());
        let stored = store.import_from_private_key(KEY).unwrap();
        let loaded = store.load(&stored.path).unwrap();

        let rendered = format!("{loaded:?}");
        assert!(!rendered.contains(KEY));
        assert!(rendered.contains("<redacted>"));
    }
}
