use serde_json::json;
use std::future::Future;
use thiserror::Error;

use crate::logging::{log_event, LogLevel};

/// Name of the window global page scripts call, e.g. from an inline
/// `onclick` handler.
pub const PAGE_GLOBAL: &str = "copyToClipboard";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard is unavailable")]
    Unavailable,
    #[error("clipboard write rejected: {0}")]
    Rejected(String),
}

pub trait ClipboardWriter {
    fn write_text(&self, text: &str) -> impl Future<Output = Result<(), ClipboardError>>;
}

/// Writes `text` to the clipboard and logs the outcome. Not wired to any
/// page event; page scripts reach it through the [`PAGE_GLOBAL`] function.
pub async fn copy_to_clipboard<C: ClipboardWriter>(
    clipboard: &C,
    text: &str,
    log_level: LogLevel,
) -> Result<(), ClipboardError> {
    match clipboard.write_text(text).await {
        Ok(()) => {
            log_event(
                log_level,
                LogLevel::Info,
                "clipboard_copied",
                json!({ "chars": text.chars().count() }),
            );
            Ok(())
        }
        Err(error) => {
            log_event(
                log_level,
                LogLevel::Error,
                "clipboard_copy_failed",
                json!({ "error": error.to_string() }),
            );
            Err(error)
        }
    }
}
