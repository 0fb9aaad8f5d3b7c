use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use log::{error, info};
use ntex::web;
use ntex::web::middleware::Logger;
use rdkafka::admin::AdminClient;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;

use stream_gateway::config::Config;
use stream_gateway::metrics::RelayMetrics;
use stream_gateway::{default_headers, routes, AppState};
use stream_publisher::{admin, KafkaPublisher, Publish};

#[ntex::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .parse_filters(&Config::log_level_from_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("refusing to start: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "starting stream gateway on port {}, broker={}, topic={}",
        config.port, config.brokers, config.topic
    );

    let admin_client: AdminClient<_> = match ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .create()
    {
        Ok(client) => client,
        Err(e) => {
            error!("could not create admin client: {e}");
            std::process::exit(1);
        }
    };

    let producer: FutureProducer = match ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("message.timeout.ms", config.message_timeout_ms.to_string())
        .create()
    {
        Ok(producer) => producer,
        Err(e) => {
            error!("could not create producer: {e}");
            std::process::exit(1);
        }
    };

    // The broker may auto-create topics or come up later, so a failed create
    // is logged rather than fatal.
    if let Err(e) = admin::ensure_topic(
        &admin_client,
        &config.topic,
        config.topic_partitions,
        config.topic_replication,
    )
    .await
    {
        error!("could not ensure topic {}: {e}", config.topic);
    }

    let publisher = KafkaPublisher::new(producer, config.topic.clone())
        .with_flush_timeout(Duration::from_millis(config.message_timeout_ms));

    let state = Arc::new(AppState {
        publisher,
        version: config.version.clone(),
        metrics: RelayMetrics::new(),
    });
    let shutdown_state = state.clone();

    web::server(move || {
        let s = state.clone();
        web::App::new()
            .state(s)
            .wrap(Logger::default())
            .wrap(default_headers())
            .configure(routes::<KafkaPublisher>)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await?;

    if let Err(e) = shutdown_state.publisher.close() {
        error!("could not flush publisher on shutdown: {e}");
    }
    info!("shutdown complete");
    Ok(())
}
