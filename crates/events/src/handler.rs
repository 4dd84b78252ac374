use async_trait::async_trait;

use crate::{EventEnvelope, HandlerError};

/// A subscriber to domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Handles one event.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}
