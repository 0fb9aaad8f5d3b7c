use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use thiserror::Error;

/// Failure modes of a single publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The envelope is not JSON or does not carry a string `Id` field.
    /// Raised before any broker interaction.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    /// The broker could not be reached, the local queue was full, or the
    /// delivery wait expired.
    #[error("broker transport failure: {0}")]
    Transport(#[source] KafkaError),

    /// The broker took the message and refused it.
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[source] KafkaError),

    /// The publisher was closed before this call.
    #[error("publisher already closed")]
    Closed,
}

impl PublishError {
    pub(crate) fn from_kafka(err: KafkaError) -> Self {
        match err.rdkafka_error_code() {
            Some(
                RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::QueueFull,
            ) => PublishError::Transport(err),
            _ => PublishError::DeliveryFailed(err),
        }
    }
}
