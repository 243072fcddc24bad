//! Batch handling for the before-upload hook

use crate::notify::{LogNotifier, Notification, Notifier};
use crate::settings::PluginSettings;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use log::{debug, error, info};
use watermark_core::{WatermarkConfig, Watermarker};

/// One image of an upload batch
///
/// The host hands over either raw bytes or a base64 string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadItem {
    pub file_name: String,
    pub buffer: Option<Bytes>,
    pub base64_image: Option<String>,
}

impl UploadItem {
    /// Item carrying raw image bytes
    pub fn from_buffer(file_name: impl Into<String>, buffer: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            buffer: Some(buffer.into()),
            base64_image: None,
        }
    }

    /// Item carrying base64-encoded image bytes
    pub fn from_base64(file_name: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            buffer: None,
            base64_image: Some(encoded.into()),
        }
    }
}

/// Outcome counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items that went through the watermarker (including pass-through)
    pub processed: usize,
    /// Items left untouched because the hook is disabled or they carry no data
    pub skipped: usize,
    /// Items that failed; they keep their original data
    pub failed: usize,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Before-upload hook
pub struct UploadHook<'a> {
    /// Shared watermark generator
    watermarker: &'a Watermarker,
    /// Receiver of user-facing failure notices
    notifier: Option<&'a dyn Notifier>,
}

impl<'a> UploadHook<'a> {
    /// Create a hook that reports failures to the log only
    pub fn new(watermarker: &'a Watermarker) -> Self {
        Self {
            watermarker,
            notifier: None,
        }
    }

    /// Set the notifier for failure notices
    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn notify(&self, notification: Notification) {
        match self.notifier {
            Some(notifier) => notifier.notify(notification),
            None => LogNotifier.notify(notification),
        }
    }

    /// Watermark every item of a batch in place
    ///
    /// Settings are read once per batch. When they are absent or disabled the
    /// watermarker is never invoked. A failing item is logged, reported to
    /// the notifier and left unchanged; the rest of the batch continues.
    pub async fn handle(
        &self,
        settings: Option<&PluginSettings>,
        items: &mut [UploadItem],
    ) -> BatchReport {
        let mut report = BatchReport::default();

        let Some(settings) = settings.filter(|s| s.enabled) else {
            debug!("Watermark disabled, passing {} item(s) through", items.len());
            report.skipped = items.len();
            return report;
        };
        let config = settings.config();

        for item in items.iter_mut() {
            match self.process_item(&config, item).await {
                Ok(true) => report.processed += 1,
                Ok(false) => {
                    debug!("{} has no image data, skipping", item.file_name);
                    report.skipped += 1;
                }
                Err(err) => {
                    error!("Failed to add watermark to {}: {err}", item.file_name);
                    self.notify(Notification::failure(&item.file_name, &err));
                    report.failed += 1;
                }
            }
        }

        info!(
            "Watermark batch done: {} processed, {} skipped, {} failed",
            report.processed, report.skipped, report.failed
        );
        report
    }

    /// Returns `Ok(false)` when the item carries no image data
    async fn process_item(&self, config: &WatermarkConfig, item: &mut UploadItem) -> Result<bool> {
        if let Some(buffer) = item.buffer.clone() {
            let output = self.watermarker.apply(buffer, config).await?;
            item.buffer = Some(output);
            return Ok(true);
        }

        if let Some(encoded) = item.base64_image.as_deref() {
            let decoded = Bytes::from(STANDARD.decode(encoded.trim())?);
            let output = self.watermarker.apply(decoded, config).await?;
            item.base64_image = Some(STANDARD.encode(&output));
            item.buffer = Some(output);
            return Ok(true);
        }

        Ok(false)
    }
}
