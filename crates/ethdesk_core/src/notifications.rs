use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handler::ClassifiedError;

const DEFAULT_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-facing status message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppNotification {
    pub id: String,
    pub level: NotificationType,
    /// The operation the message is about, e.g. `send funds`.
    pub title: Option<String>,
    pub message: String,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl AppNotification {
    pub fn new(level: NotificationType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            title: None,
            message: message.into(),
            dismissed: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Error notification carrying the classified `"<Kind>: <detail>"` message.
    pub fn from_error(error: &ClassifiedError) -> Self {
        Self::new(NotificationType::Error, error.message.clone())
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationType::Error
    }
}

/// Bounded history of notifications, newest first.
///
/// Only [`current`](Self::current) is meant to be on screen: pushing a new
/// notification supersedes whatever was shown before, and older entries stay
/// in the history until they fall off the end.
#[derive(Debug)]
pub struct NotificationStore {
    history: VecDeque<AppNotification>,
    capacity: usize,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, notification: AppNotification) {
        // Superseded messages no longer count as pending.
        if let Some(previous) = self.history.front_mut() {
            previous.dismissed = true;
        }
        self.history.push_front(notification);
        self.history.truncate(self.capacity);
    }

    /// The newest notification, unless it has been dismissed.
    pub fn current(&self) -> Option<&AppNotification> {
        self.history.front().filter(|n| !n.dismissed)
    }

    pub fn dismiss_current(&mut self) {
        if let Some(n) = self.history.front_mut() {
            n.dismissed = true;
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &AppNotification> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.history.iter().filter(|n| n.is_error()).count()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::{ErrorCategory, ErrorSeverity};

    #[test]
    fn new_notification_is_pending() {
        let n = AppNotification::new(NotificationType::Info, "Be patient, sending funds");
        assert_eq!(n.level, NotificationType::Info);
        assert!(!n.dismissed);
        assert!(n.title.is_none());

        let titled = n.with_title("send funds");
        assert_eq!(titled.title.as_deref(), Some("send funds"));
    }

    #[test]
    fn from_error_uses_classified_message() {
        let classified = ClassifiedError {
            kind: "NetworkError".into(),
            severity: ErrorSeverity::Medium,
            category: ErrorCategory::NetworkError,
            message: "NetworkError: connection refused".into(),
            user_message: "Network error. Check your connection.".into(),
            recoverable: true,
        };
        let n = AppNotification::from_error(&classified);
        assert!(n.is_error());
        assert_eq!(n.message, "NetworkError: connection refused");
    }

    #[test]
    fn newer_notification_supersedes_current() {
        let mut store = NotificationStore::new();
        store.push(AppNotification::new(NotificationType::Error, "first"));
        store.push(AppNotification::new(NotificationType::Success, "second"));

        assert_eq!(store.current().map(|n| n.message.as_str()), Some("second"));
        let older: Vec<_> = store.history().map(|n| (n.message.as_str(), n.dismissed)).collect();
        assert_eq!(older, vec![("second", false), ("first", true)]);
        assert_eq!(store.error_count(), 1);
    }

    #[test]
    fn dismissed_notification_is_not_current() {
        let mut store = NotificationStore::default();
        store.push(AppNotification::new(NotificationType::Info, "only"));
        store.dismiss_current();

        assert!(store.current().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut store = NotificationStore::with_capacity(3);
        for i in 0..5 {
            store.push(AppNotification::new(NotificationType::Info, format!("msg-{i}")));
        }
        let kept: Vec<_> = store.history().map(|n| n.message.clone()).collect();
        assert_eq!(kept, vec!["msg-4", "msg-3", "msg-2"]);

        store.clear();
        assert!(store.is_empty());
        assert!(store.current().is_none());
    }

    #[test]
    fn level_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationType::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
