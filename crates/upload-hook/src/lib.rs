//! Upload Hook - watermark images before they are uploaded
//!
//! This crate provides:
//! - Plugin settings parsing (the `enabled` switch plus watermark settings)
//! - Per-batch processing of upload items holding raw or base64 bytes
//! - Failure reporting to the log and to a user-facing notifier
//!
//! # Example
//!
//! ```ignore
//! use upload_hook::{PluginSettings, UploadHook, UploadItem};
//! use watermark_core::Watermarker;
//!
//! let settings = PluginSettings::from_json(settings_json)?;
//! let watermarker = Watermarker::new();
//! let hook = UploadHook::new(&watermarker);
//!
//! let mut items = vec![UploadItem::from_buffer("photo.jpg", photo_bytes)];
//! let report = hook.handle(Some(&settings), &mut items).await;
//! ```

mod hook;
mod notify;
mod settings;

pub use hook::{BatchReport, UploadHook, UploadItem};
pub use notify::{LogNotifier, Notification, Notifier};
pub use settings::PluginSettings;

use thiserror::Error;

/// Errors that can occur while handling an upload batch
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Invalid plugin settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Watermark(#[from] watermark_core::WatermarkError),
}

/// Result type for hook operations
pub type Result<T> = std::result::Result<T, HookError>;
