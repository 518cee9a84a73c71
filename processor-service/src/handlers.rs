use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::ProcessError;
use crate::models::*;
use crate::schema::*;
use shared::{LineItem, OrderCreated, OrderProcessed, OrderStatus};

type DbPool = Pool<AsyncPgConnection>;

/// How a single delivery was resolved. Every variant acknowledges the
/// message; storage failures travel separately as [`ProcessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    InsufficientStock,
    DuplicateSkipped,
}

enum Admission {
    Processed(DateTime<Utc>),
    Duplicate,
}

enum TxFailure {
    Insufficient { product_id: String },
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxFailure {
    fn from(e: diesel::result::Error) -> Self {
        TxFailure::Db(e)
    }
}

pub struct OrderProcessor {
    pool: DbPool,
    producer: FutureProducer,
    processed_topic: String,
}

impl OrderProcessor {
    pub fn new(pool: DbPool, producer: FutureProducer, processed_topic: String) -> Self {
        Self {
            pool,
            producer,
            processed_topic,
        }
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    let resolved = match m.payload_view::<str>() {
                        Some(Ok(json_str)) => self.handle_payload(json_str).await,
                        Some(Err(e)) => {
                            error!("Discarding non-utf8 payload: {}", e);
                            true
                        }
                        None => {
                            error!("Discarding empty message");
                            true
                        }
                    };

                    // Only a resolved delivery is acknowledged. A storage
                    // failure leaves the offset uncommitted so the broker
                    // redelivers the message.
                    if resolved {
                        if let Err(e) =
                            consumer.commit_message(&m, rdkafka::consumer::CommitMode::Async)
                        {
                            error!("Error committing message: {}", e);
                        }
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }

    async fn handle_payload(&self, json_str: &str) -> bool {
        let event = match serde_json::from_str::<OrderCreated>(json_str) {
            Ok(event) => event,
            Err(e) => {
                error!("Discarding undecodable OrderCreated payload: {}", e);
                return true;
            }
        };

        let order_id = event.order_id;
        match self.process(event).await {
            Ok(outcome) => {
                info!("Order {} resolved: {:?}", order_id, outcome);
                true
            }
            Err(e) => {
                error!(
                    "Storage error processing order {}, leaving message for redelivery: {}",
                    order_id, e
                );
                false
            }
        }
    }

    /// Admits the order idempotently, then checks and decrements inventory
    /// inside the same transaction. The PENDING insert and every decrement
    /// commit together or not at all.
    pub async fn process(&self, event: OrderCreated) -> Result<ProcessOutcome, ProcessError> {
        let mut conn = self.pool.get().await?;

        let order_id = event.order_id;
        let new_order = NewOrder::pending(&event);
        let plan = lock_order(&event.items);

        let attempt = conn
            .transaction::<Admission, TxFailure, _>(|conn| {
                Box::pin(async move {
                    // The primary-key constraint decides "already admitted",
                    // not application state. Zero rows affected means a prior
                    // delivery owns this order, and no inventory row may be
                    // read after that.
                    let inserted = diesel::insert_into(orders::table)
                        .values(&new_order)
                        .on_conflict(orders::order_id)
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    if inserted == 0 {
                        return Ok(Admission::Duplicate);
                    }

                    for item in &plan {
                        let record = inventory::table
                            .filter(inventory::product_id.eq(&item.product_id))
                            .for_update()
                            .first::<InventoryRecord>(conn)
                            .await
                            .optional()?;

                        let available = record.map(|r| r.quantity_available).unwrap_or(0);
                        if available < item.quantity {
                            return Err(TxFailure::Insufficient {
                                product_id: item.product_id.clone(),
                            });
                        }

                        diesel::update(
                            inventory::table.filter(inventory::product_id.eq(&item.product_id)),
                        )
                        .set(
                            inventory::quantity_available
                                .eq(inventory::quantity_available - item.quantity),
                        )
                        .execute(conn)
                        .await?;
                    }

                    let processed_at = Utc::now();
                    diesel::update(orders::table.filter(orders::order_id.eq(order_id)))
                        .set((
                            orders::status.eq(OrderStatus::Processed.as_str()),
                            orders::processed_at.eq(processed_at),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(Admission::Processed(processed_at))
                })
            })
            .await;

        match attempt {
            Ok(Admission::Processed(processed_at)) => {
                info!("Order {} PROCESSED successfully", order_id);
                // The order is committed either way. A lost completion event
                // is an accepted gap on the downstream side.
                if let Err(e) = self.publish_processed(&event, processed_at).await {
                    error!("Failed to publish OrderProcessed for {}: {}", order_id, e);
                }
                Ok(ProcessOutcome::Processed)
            }
            Ok(Admission::Duplicate) => {
                info!(
                    "Order {} already exists. Skipping duplicate processing.",
                    order_id
                );
                Ok(ProcessOutcome::DuplicateSkipped)
            }
            Err(TxFailure::Insufficient { product_id }) => {
                warn!(
                    "Insufficient inventory for product {} in order {}",
                    product_id, order_id
                );
                self.record_failure(&mut conn, &event).await?;
                info!("Order {} marked as FAILED", order_id);
                Ok(ProcessOutcome::InsufficientStock)
            }
            Err(TxFailure::Db(e)) => Err(ProcessError::Database(e)),
        }
    }

    /// Records the FAILED terminal state after the main transaction rolled
    /// back. The rollback removed the PENDING row, so this is an upsert; a
    /// redelivered failure simply refreshes the row.
    async fn record_failure(
        &self,
        conn: &mut AsyncPgConnection,
        event: &OrderCreated,
    ) -> Result<(), ProcessError> {
        let failed = NewOrder::failed(event);
        let processed_at = failed.processed_at;

        diesel::insert_into(orders::table)
            .values(&failed)
            .on_conflict(orders::order_id)
            .do_update()
            .set((
                orders::status.eq(OrderStatus::Failed.as_str()),
                orders::processed_at.eq(processed_at),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn publish_processed(
        &self,
        event: &OrderCreated,
        processed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let message = OrderProcessed {
            order_id: event.order_id,
            customer_id: event.customer_id.clone(),
            status: OrderStatus::Processed,
            processed_at,
        };

        let json = serde_json::to_string(&message)?;
        let key = message.order_id.to_string();
        let record = FutureRecord::to(&self.processed_topic)
            .payload(&json)
            .key(&key);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to publish OrderProcessed: {}", e))?;

        Ok(())
    }
}

/// Canonical per-transaction lock order. Two concurrent orders touching the
/// same products must acquire their row locks in the same sequence, so the
/// items are locked sorted by product id rather than in payload order.
fn lock_order(items: &[LineItem]) -> Vec<LineItem> {
    let mut plan = items.to_vec();
    plan.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, quantity: i32) -> LineItem {
        LineItem {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn lock_order_sorts_by_product_id() {
        let plan = lock_order(&[item("prod-9", 1), item("prod-1", 2), item("prod-5", 3)]);
        let ids: Vec<&str> = plan.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, ["prod-1", "prod-5", "prod-9"]);
    }

    #[test]
    fn lock_order_keeps_repeated_products_in_payload_order() {
        let plan = lock_order(&[item("prod-1", 5), item("prod-1", 2)]);
        assert_eq!(plan[0].quantity, 5);
        assert_eq!(plan[1].quantity, 2);
    }

    #[test]
    fn lock_order_leaves_payload_untouched() {
        let items = vec![item("prod-9", 1), item("prod-1", 2)];
        let _ = lock_order(&items);
        assert_eq!(items[0].product_id, "prod-9");
    }
}
