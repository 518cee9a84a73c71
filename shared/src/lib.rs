use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for content-addressed order identifiers (UUIDv5).
const ORDER_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8a6c_3f1d_9b42_4c7e_a1d5_0e9f_6b21_7c44);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProcessed {
    pub order_id: Uuid,
    pub customer_id: String,
    pub status: OrderStatus,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSED" => Some(OrderStatus::Processed),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// PENDING is the only admissible starting state; PROCESSED is terminal.
    /// FAILED may be re-recorded, since failure recording runs after a rollback
    /// and a redelivered message can hit it again.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processed)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Failed, OrderStatus::Failed)
        )
    }
}

/// Derives the order identifier from the canonicalized request content.
/// Identical `(customer_id, items)` submissions always map to the same id,
/// which is what lets the processor collapse re-submissions and redeliveries
/// into a single order row.
pub fn derive_order_id(customer_id: &str, items: &[LineItem]) -> Uuid {
    #[derive(Serialize)]
    struct Canonical<'a> {
        c: &'a str,
        i: &'a [LineItem],
    }

    let payload = serde_json::to_vec(&Canonical {
        c: customer_id,
        i: items,
    })
    .unwrap();

    Uuid::new_v5(&ORDER_ID_NAMESPACE, &payload)
}

impl OrderCreated {
    pub fn new(customer_id: String, items: Vec<LineItem>) -> Self {
        let order_id = derive_order_id(&customer_id, &items);
        Self {
            order_id,
            customer_id,
            items,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem {
                product_id: "prod-101".to_string(),
                quantity: 2,
            },
            LineItem {
                product_id: "prod-202".to_string(),
                quantity: 1,
            },
        ]
    }

    #[test]
    fn order_id_is_stable_across_retries() {
        let a = derive_order_id("cust-A", &items());
        let b = derive_order_id("cust-A", &items());
        assert_eq!(a, b);
    }

    #[test]
    fn order_id_changes_with_content() {
        let base = derive_order_id("cust-A", &items());
        assert_ne!(base, derive_order_id("cust-B", &items()));

        let mut more = items();
        more[0].quantity = 3;
        assert_ne!(base, derive_order_id("cust-A", &more));
    }

    #[test]
    fn order_id_depends_on_item_order() {
        let mut reversed = items();
        reversed.reverse();
        assert_ne!(
            derive_order_id("cust-A", &items()),
            derive_order_id("cust-A", &reversed)
        );
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(OrderStatus::Failed.can_transition_to(OrderStatus::Failed));

        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Processed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processed,
            OrderStatus::Failed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn order_created_parses_wire_json() {
        let json = r#"{
            "order_id": "4a3f9c6e-8d21-5b4a-9e37-1c2d3e4f5a6b",
            "customer_id": "cust-A",
            "items": [{"product_id": "prod-101", "quantity": 1}],
            "timestamp": "2026-01-15T08:30:00Z"
        }"#;

        let event: OrderCreated = serde_json::from_str(json).unwrap();
        assert_eq!(event.customer_id, "cust-A");
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].quantity, 1);
    }

    #[test]
    fn order_processed_serializes_status_as_processed() {
        let event = OrderProcessed {
            order_id: derive_order_id("cust-A", &items()),
            customer_id: "cust-A".to_string(),
            status: OrderStatus::Processed,
            processed_at: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "PROCESSED");
    }
}
