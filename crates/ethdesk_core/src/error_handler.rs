use serde::{Deserialize, Serialize};

/// Classification of errors for logging and user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad input from the user (malformed key, address, amount).
    UserError,
    /// Keystore encryption or decryption failure.
    CryptoError,
    /// RPC endpoint unreachable or timed out.
    NetworkError,
    /// The chain rejected a request or transaction.
    ChainError,
    /// Local storage: files, directories, cached state.
    StorageError,
    /// Invalid or missing configuration.
    ConfigError,
    /// Anything else.
    SystemError,
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Non-critical, log only.
    Low,
    /// Show to user, recoverable.
    Medium,
    /// Operation failed.
    High,
    /// App may be unstable.
    Critical,
}

/// Implemented by typed errors that know their own kind name and category.
pub trait ClassifyError: std::error::Error {
    /// Stable kind name shown to the user, e.g. `WalletNotFoundError`.
    fn kind_name(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::NetworkError => ErrorSeverity::Medium,
            _ => ErrorSeverity::High,
        }
    }

    /// Short hint shown next to the message.
    fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::UserError => "Check the values you entered.".into(),
            ErrorCategory::CryptoError => "Keystore could not be read or written.".into(),
            ErrorCategory::NetworkError => "Network error. Check your connection.".into(),
            ErrorCategory::ChainError => "The node rejected the request.".into(),
            ErrorCategory::StorageError => "Storage error. Check disk space and permissions.".into(),
            ErrorCategory::ConfigError => "Configuration error. Check settings.".into(),
            ErrorCategory::SystemError => "An unexpected error occurred.".into(),
        }
    }
}

/// Classified error with context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: String,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    /// `"<Kind>: <detail>"`
    pub message: String,
    pub user_message: String,
    pub recoverable: bool,
}

/// Turn a typed error into the single message the presentation layer shows.
pub fn describe<E: ClassifyError + ?Sized>(error: &E) -> ClassifiedError {
    let severity = error.severity();
    ClassifiedError {
        kind: error.kind_name().to_string(),
        severity,
        category: error.category(),
        message: format!("{}: {}", error.kind_name(), error),
        user_message: error.user_message(),
        recoverable: severity != ErrorSeverity::Critical,
    }
}

// ---------------------------------------------------------------------------
// Error classification for anyhow::Error (message-pattern based)
// ---------------------------------------------------------------------------

/// Classify an untyped `anyhow::Error` (bootstrap, config, CLI plumbing) by
/// inspecting the message for known patterns.
pub fn classify_error(error: &anyhow::Error) -> ClassifiedError {
    let msg = format!("{error:#}").to_lowercase();

    let (kind, category, severity, user_msg) =
        if msg.contains("timeout") || msg.contains("connection") || msg.contains("dns") {
            (
                "NetworkError",
                ErrorCategory::NetworkError,
                ErrorSeverity::Medium,
                "Network error. Check your connection.",
            )
        } else if msg.contains("permission denied") {
            (
                "IOError",
                ErrorCategory::StorageError,
                ErrorSeverity::High,
                "Permission denied.",
            )
        } else if (msg.contains("not found") && msg.contains("file")) || msg.contains("no such file") {
            (
                "IOError",
                ErrorCategory::StorageError,
                ErrorSeverity::Medium,
                "File not found.",
            )
        } else if msg.contains("config") || msg.contains("rpc url") {
            (
                "ConfigError",
                ErrorCategory::ConfigError,
                ErrorSeverity::Medium,
                "Configuration error. Check settings.",
            )
        } else {
            (
                "InternalError",
                ErrorCategory::SystemError,
                ErrorSeverity::Medium,
                "An unexpected error occurred.",
            )
        };

    ClassifiedError {
        kind: kind.to_string(),
        severity,
        category,
        message: format!("{kind}: {error:#}"),
        user_message: user_msg.to_string(),
        recoverable: severity != ErrorSeverity::Critical,
    }
}
