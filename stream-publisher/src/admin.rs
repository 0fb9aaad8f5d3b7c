use log::info;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};

/// Creates the relay topic if the broker does not have it yet. An existing
/// topic is not an error.
pub async fn ensure_topic(
    admin: &AdminClient<DefaultClientContext>,
    topic: &str,
    partitions: i32,
    replication: i32,
) -> Result<(), KafkaError> {
    let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
    let results = admin
        .create_topics([&new_topic], &AdminOptions::new())
        .await?;

    for result in results {
        match result {
            Ok(name) => info!("created topic {name}"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                info!("topic {name} already exists")
            }
            Err((_, code)) => return Err(KafkaError::AdminOp(code)),
        }
    }

    Ok(())
}
