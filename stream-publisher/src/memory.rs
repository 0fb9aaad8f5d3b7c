use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use tokio::sync::Mutex;

use crate::envelope::StreamEnvelope;
use crate::error::PublishError;
use crate::{Delivery, Publish};

/// One message captured by a [`MemoryPublisher`], in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub key: String,
    pub payload: Vec<u8>,
}

/// In-memory stand-in for the Kafka publisher. It extracts partition keys
/// exactly like the real one and records every accepted message instead of
/// producing it, so handler tests can assert on what would have been sent.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    reject: bool,
    closed: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose broker refuses every delivery.
    pub fn rejecting() -> Self {
        MemoryPublisher {
            reject: true,
            ..Self::default()
        }
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

impl Publish for MemoryPublisher {
    fn publish(
        &self,
        envelope: &[u8],
    ) -> impl Future<Output = Result<Delivery, PublishError>> + Send {
        async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PublishError::Closed);
            }
            let key = StreamEnvelope::partition_key(envelope)?;
            if self.reject {
                return Err(PublishError::DeliveryFailed(KafkaError::MessageProduction(
                    RDKafkaErrorCode::InvalidMessage,
                )));
            }

            let mut sent = self.sent.lock().await;
            let offset = sent.len() as i64;
            sent.push(SentMessage {
                key,
                payload: envelope.to_vec(),
            });
            Ok(Delivery {
                partition: 0,
                offset,
            })
        }
    }

    fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
