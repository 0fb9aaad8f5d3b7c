use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};

use crate::envelope::StreamEnvelope;
use crate::error::PublishError;
use crate::{Delivery, Publish};

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Production publisher backed by an rdkafka [`FutureProducer`].
///
/// Clones share the producer and the closed flag, so closing any clone
/// closes them all.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    flush_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl KafkaPublisher {
    pub fn new(producer: FutureProducer, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        trace!("kafka publisher ready for topic {topic}");
        KafkaPublisher {
            producer,
            topic,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bounds how long [`Publish::close`] waits for in-flight deliveries.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

impl Publish for KafkaPublisher {
    fn publish(
        &self,
        envelope: &[u8],
    ) -> impl Future<Output = Result<Delivery, PublishError>> + Send {
        async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PublishError::Closed);
            }

            // Key extraction happens before the record exists, so a bad
            // envelope never reaches the broker.
            let key = StreamEnvelope::partition_key(envelope)?;
            let record = FutureRecord::to(&self.topic).key(&key).payload(envelope);

            match self.producer.send(record, Duration::from_secs(0)).await {
                Ok((partition, offset)) => {
                    debug!("delivered key={key} partition={partition} offset={offset}");
                    Ok(Delivery { partition, offset })
                }
                Err((e, _)) => {
                    error!("delivery failed for key={key}: {e}");
                    Err(PublishError::from_kafka(e))
                }
            }
        }
    }

    fn close(&self) -> Result<(), PublishError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        trace!("flushing producer before close");
        self.producer
            .flush(self.flush_timeout)
            .map_err(PublishError::from_kafka)
    }
}
