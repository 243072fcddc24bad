//! User-facing failure notifications

use log::warn;

/// Message shown to the user when an image could not be watermarked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    /// Notification for a failed watermark
    pub fn failure(file_name: &str, error: &dyn std::error::Error) -> Self {
        Self {
            title: "Watermark failed".to_string(),
            body: format!("{file_name}: {error}"),
        }
    }
}

/// Receives failure notifications from the hook
///
/// Shared across threads so a batch can run on any runtime worker.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        warn!("{}: {}", notification.title, notification.body);
    }
}
