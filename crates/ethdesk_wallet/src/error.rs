use std::fmt;
use std::path::PathBuf;

use ethdesk_core::{ClassifyError, ErrorCategory};

/// Why an address lookup in the keystore directory failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMiss {
    NoMatch,
    /// More than one keystore file carries the address.
    Ambiguous(usize),
}

impl fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => f.write_str("no keystore file"),
            Self::Ambiguous(n) => write!(f, "ambiguous: {n} keystore files"),
        }
    }
}

/// Errors produced by the wallet store, chain client and orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Crypto(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("cannot decrypt {}: {detail}", path.display())]
    Decryption { path: PathBuf, detail: String },

    #[error("{reason} for {address}")]
    WalletNotFound { address: String, reason: LookupMiss },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0}")]
    Network(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    Transaction(String),

    #[error("contract cache is corrupted: {0}")]
    CacheCorrupted(String),

    #[error("contract {0} is already cached")]
    DuplicateContract(String),

    #[error("{0}")]
    Internal(String),
}

impl WalletError {
    pub fn not_found(address: impl Into<String>) -> Self {
        Self::WalletNotFound {
            address: address.into(),
            reason: LookupMiss::NoMatch,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WalletNotFound { .. })
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking keystore task failed: {err}"))
    }
}

impl ClassifyError for WalletError {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Io(_) => "IOError",
            Self::Crypto(_) => "CryptoError",
            Self::InvalidKey(_) => "InvalidKeyError",
            Self::Decryption { .. } => "DecryptionError",
            Self::WalletNotFound { .. } => "WalletNotFoundError",
            Self::InvalidAddress(_) => "InvalidAddressError",
            Self::InvalidAmount(_) => "InvalidAmountError",
            Self::Network(_) => "NetworkError",
            Self::Rpc { .. } => "RpcError",
            Self::Transaction(_) => "TransactionError",
            Self::CacheCorrupted(_) => "CacheCorruptedError",
            Self::DuplicateContract(_) => "DuplicateContractError",
            Self::Internal(_) => "InternalError",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKey(_)
            | Self::InvalidAddress(_)
            | Self::InvalidAmount(_)
            | Self::WalletNotFound { .. }
            | Self::DuplicateContract(_) => ErrorCategory::UserError,
            Self::Crypto(_) | Self::Decryption { .. } => ErrorCategory::CryptoError,
            Self::Network(_) => ErrorCategory::NetworkError,
            Self::Rpc { .. } | Self::Transaction(_) => ErrorCategory::ChainError,
            Self::Io(_) | Self::CacheCorrupted(_) => ErrorCategory::StorageError,
            Self::Internal(_) => ErrorCategory::SystemError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethdesk_core::describe;

    #[test]
    fn not_found_message_names_address() {
        let err = WalletError::not_found("0xabc");
        assert_eq!(err.to_string(), "no keystore file for 0xabc");
        assert!(err.is_not_found());
    }

    #[test]
    fn ambiguous_lookup_is_still_not_found() {
        let err = WalletError::WalletNotFound {
            address: "0xabc".into(),
            reason: LookupMiss::Ambiguous(2),
        };
        assert_eq!(err.kind_name(), "WalletNotFoundError");
        assert_eq!(err.to_string(), "ambiguous: 2 keystore files for 0xabc");
    }

    #[test]
    fn describe_combines_kind_and_detail() {
        let err = WalletError::Rpc {
            code: -32000,
            message: "header not found".into(),
        };
        let classified = describe(&err);
        assert_eq!(classified.message, "RpcError: rpc error -32000: header not found");
        assert_eq!(classified.category, ErrorCategory::ChainError);
    }

    #[test]
    fn io_errors_classify_as_storage() {
        let err = WalletError::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind_name(), "IOError");
        assert_eq!(err.category(), ErrorCategory::StorageError);
    }
}
