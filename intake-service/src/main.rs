mod api;

use anyhow::Result;
use clap::Parser;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use tracing::info;

#[derive(Parser)]
#[command(name = "intake-service")]
struct Args {
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    kafka_brokers: String,

    #[arg(long, env = "ORDER_CREATED_TOPIC", default_value = "order-created")]
    order_topic: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &args.kafka_brokers)
        .set("message.timeout.ms", "5000")
        .create()?;

    let app_state = api::AppState {
        producer,
        order_topic: args.order_topic.clone(),
    };

    let app = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Intake service accepting orders at http://0.0.0.0:{}/orders", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
