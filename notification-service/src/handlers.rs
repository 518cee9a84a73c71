use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use tracing::{error, info, warn};

use shared::{OrderProcessed, OrderStatus};

#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Notified,
    Ignored,
    Discarded,
}

pub struct NotificationHandler;

impl NotificationHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    match m.payload_view::<str>() {
                        Some(Ok(json_str)) => {
                            dispatch(json_str);
                        }
                        Some(Err(e)) => error!("Error parsing payload: {}", e),
                        None => error!("Discarding empty message"),
                    }
                    // Notifications are best-effort. The message is always
                    // acknowledged; a bad payload is never retried.
                    if let Err(e) = consumer.commit_message(&m, rdkafka::consumer::CommitMode::Async)
                    {
                        error!("Error committing message: {}", e);
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }
}

fn dispatch(payload: &str) -> Disposition {
    match serde_json::from_str::<OrderProcessed>(payload) {
        Ok(event) if event.status == OrderStatus::Processed => {
            info!(
                "Notification sent for Order ID: {} to Customer ID: {}",
                event.order_id, event.customer_id
            );
            Disposition::Notified
        }
        Ok(event) => {
            warn!(
                "Ignoring completion event with status {:?} for order {}",
                event.status, event.order_id
            );
            Disposition::Ignored
        }
        Err(e) => {
            error!("Error processing notification: {}", e);
            Disposition::Discarded
        }
    }
}
