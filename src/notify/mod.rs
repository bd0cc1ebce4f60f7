//! Publication notices
//!
//! Once a report is published, a [`Notifier`] tells someone where to find it.
//! [`SmtpNotifier`] sends a plain-text email whose subject is the report
//! title and whose body is the URL; [`LogNotifier`] only records the event.

use crate::types::Result;
use async_trait::async_trait;

#[cfg(feature = "smtp")]
mod smtp;

#[cfg(feature = "smtp")]
pub use smtp::{SmtpNotifier, SmtpSettings};

/// Announces a published report
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, url: &str) -> Result<()>;
}

/// Notifier that only writes a log event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, url: &str) -> Result<()> {
        tracing::info!(title = %title, url = %url, "report_available");
        Ok(())
    }
}
