pub mod admin;
mod envelope;
mod error;
mod kafka;
mod memory;

pub use envelope::StreamEnvelope;
pub use error::PublishError;
pub use kafka::KafkaPublisher;
pub use memory::{MemoryPublisher, SentMessage};

use std::future::Future;

/// Broker acknowledgment for one published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Publishes raw envelope bytes to the relay topic, keyed by the envelope's
/// `Id` field, and resolves once the broker has acknowledged that message.
///
/// Every call correlates with its own delivery report, so concurrent
/// publishes need no external serialization.
pub trait Publish: Send + Sync {
    fn publish(
        &self,
        envelope: &[u8],
    ) -> impl Future<Output = Result<Delivery, PublishError>> + Send;

    /// Flushes outstanding deliveries and refuses further publishes.
    /// Calling it again is a no-op.
    fn close(&self) -> Result<(), PublishError>;
}
