use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use shared::{OrderCreated, OrderStatus};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::inventory, primary_key(product_id))]
pub struct InventoryRecord {
    pub product_id: String,
    pub quantity_available: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub order_id: Uuid,
    pub customer_id: String,
    pub items: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl NewOrder {
    /// Admission row for a freshly delivered order.
    pub fn pending(event: &OrderCreated) -> Self {
        Self {
            order_id: event.order_id,
            customer_id: event.customer_id.clone(),
            items: serde_json::to_value(&event.items).unwrap(),
            status: OrderStatus::Pending.as_str().to_string(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Terminal row recorded after an insufficient-stock rollback. The
    /// rollback also undid the PENDING insert, so this goes in as an upsert.
    pub fn failed(event: &OrderCreated) -> Self {
        Self {
            order_id: event.order_id,
            customer_id: event.customer_id.clone(),
            items: serde_json::to_value(&event.items).unwrap(),
            status: OrderStatus::Failed.as_str().to_string(),
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::LineItem;

    fn event() -> OrderCreated {
        OrderCreated::new(
            "cust-A".to_string(),
            vec![LineItem {
                product_id: "prod-101".to_string(),
                quantity: 2,
            }],
        )
    }

    #[test]
    fn pending_row_starts_unprocessed() {
        let row = NewOrder::pending(&event());
        assert_eq!(row.status, "PENDING");
        assert!(row.processed_at.is_none());
        assert_eq!(
            row.items,
            serde_json::json!([{"product_id": "prod-101", "quantity": 2}])
        );
    }

    #[test]
    fn failed_row_is_terminal() {
        let row = NewOrder::failed(&event());
        assert_eq!(row.status, "FAILED");
        assert!(row.processed_at.is_some());
    }
}
