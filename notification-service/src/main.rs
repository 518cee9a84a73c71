mod handlers;

use anyhow::Result;
use clap::Parser;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use tracing::info;

#[derive(Parser)]
#[command(name = "notification-service")]
struct Args {
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    kafka_brokers: String,

    #[arg(long, env = "ORDER_PROCESSED_TOPIC", default_value = "order-processed")]
    processed_topic: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", "notification-service")
        .set("bootstrap.servers", &args.kafka_brokers)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("enable.auto.commit", "true")
        .create()?;

    consumer.subscribe(&[&args.processed_topic])?;

    info!("Notification service consuming {}", args.processed_topic);

    let handler = handlers::NotificationHandler::new();
    handler.run(consumer).await;

    Ok(())
}
