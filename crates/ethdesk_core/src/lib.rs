pub mod background;
pub mod config;
pub mod error_handler;
pub mod logging;
pub mod notifications;

pub use background::{
    BackgroundService, BackgroundTask, OutcomeReceiver, TaskHandle, TaskOutcome, TaskStatus,
};
pub use config::{
    ConfigManager, DeskConfig, DuplicateContractPolicy, KeystoreLoadPolicy, KeystorePassword,
    validate_url,
};
pub use error_handler::{
    ClassifiedError, ClassifyError, ErrorCategory, ErrorSeverity, classify_error, describe,
};
pub use notifications::{AppNotification, NotificationStore, NotificationType};
