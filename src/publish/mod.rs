//! Report publishing
//!
//! A [`Publisher`] takes a finished report and returns the public URL it was
//! published under. The pipeline never renders markup itself; that is the
//! publisher's job.

pub mod telegraph;

use crate::research::ResearchReport;
use crate::types::Result;
use async_trait::async_trait;

pub use telegraph::TelegraphPublisher;

/// Publishes finished reports
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the report and return its URL
    async fn publish(&self, report: &ResearchReport) -> Result<String>;
}
