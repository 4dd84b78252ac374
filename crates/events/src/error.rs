use thiserror::Error;

/// Failure of a single event subscriber.
///
/// The bus logs and counts these; they never reach the publisher.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wraps any error raised by a subscriber.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
