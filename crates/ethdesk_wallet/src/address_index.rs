use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LookupMiss, WalletError};

const ADDRESS_HEX_LEN: usize = 40;

/// Strip an optional `0x`, check for exactly 40 hex digits, lowercase.
pub fn normalize_address(address: &str) -> Result<String, WalletError> {
    let trimmed = address.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != ADDRESS_HEX_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    Ok(digits.to_ascii_lowercase())
}

/// Extract the wallet address a keystore file name carries: the last run of
/// exactly 40 hex digits.
pub fn address_from_file_name(name: &str) -> Option<String> {
    name.split(|c: char| !c.is_ascii_hexdigit())
        .filter(|run| run.len() == ADDRESS_HEX_LEN)
        .last()
        .map(str::to_ascii_lowercase)
}

/// Address to keystore-file map built from one directory listing.
///
/// Several files carrying the same address make that address unresolvable
/// rather than picking one of them.
#[derive(Debug, Default)]
pub struct AddressIndex {
    entries: HashMap<String, Vec<PathBuf>>,
    unindexed: Vec<PathBuf>,
}

impl AddressIndex {
    pub fn build(paths: &[PathBuf]) -> Self {
        let mut index = Self::default();
        for path in paths {
            let address = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(address_from_file_name);
            match address {
                Some(address) => index.entries.entry(address).or_default().push(path.clone()),
                None => {
                    debug!(path = %path.display(), "keystore file name carries no address");
                    index.unindexed.push(path.clone());
                }
            }
        }
        index
    }

    /// The single keystore file for `address`.
    pub fn resolve(&self, address: &str) -> Result<&Path, WalletError> {
        let key = normalize_address(address)?;
        match self.entries.get(&key).map(Vec::as_slice) {
            Some([path]) => Ok(path.as_path()),
            Some(paths) if paths.len() > 1 => Err(WalletError::WalletNotFound {
                address: address.to_string(),
                reason: LookupMiss::Ambiguous(paths.len()),
            }),
            _ => Err(WalletError::not_found(address)),
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_address(address)
            .map(|key| self.entries.contains_key(&key))
            .unwrap_or(false)
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files whose names carry no address.
    pub fn unindexed(&self) -> &[PathBuf] {
        &self.unindexed
    }
}
