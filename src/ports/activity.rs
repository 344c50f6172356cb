use crate::domain::{ActivityEvent, ActivityLog};

/// Sink for the audit trail of mutations
///
/// Callers treat this as best-effort: an error here is logged and never undoes the mutation it
/// describes.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ActivityPort {
    async fn record(&self, event: ActivityEvent) -> Result<ActivityLog, Error>;
    /// Most recent entries first
    async fn recent(&self, limit: usize) -> Result<Vec<ActivityLog>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
