use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use shared::{LineItem, OrderCreated};

#[derive(Clone)]
pub struct AppState {
    pub producer: FutureProducer,
    pub order_topic: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/health", axum::routing::get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

/// Shape validation only. Nothing here consults persistent state; the
/// processor owns every stateful decision.
fn validate(request: &CreateOrderRequest) -> Result<(), &'static str> {
    if request.customer_id.is_empty() {
        return Err("Invalid input. Valid customer_id and items (>0 quantity) are required.");
    }
    if request.items.is_empty() {
        return Err("Invalid input. Valid customer_id and items (>0 quantity) are required.");
    }
    for item in &request.items {
        if item.quantity <= 0 {
            return Err("Invalid input. Valid customer_id and items (>0 quantity) are required.");
        }
    }
    Ok(())
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(reason) = validate(&request) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                message: reason.to_string(),
            }),
        ));
    }

    // The order id is a content hash, so resubmitting the same request
    // publishes an event the processor will recognize as the same order.
    let event = OrderCreated::new(request.customer_id, request.items);

    match publish_order_created(&state, &event).await {
        Ok(_) => {
            tracing::info!("Accepted order {}", event.order_id);
            Ok((
                StatusCode::ACCEPTED,
                Json(CreateOrderResponse {
                    message: "Order accepted".to_string(),
                    order_id: event.order_id,
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Failed to publish OrderCreated: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: "Internal Server Error".to_string(),
                }),
            ))
        }
    }
}

async fn publish_order_created(state: &AppState, event: &OrderCreated) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    let key = event.order_id.to_string();
    let record = FutureRecord::to(&state.order_topic)
        .payload(&json)
        .key(&key);

    state
        .producer
        .send(record, Duration::from_secs(5))
        .await
        .map_err(|(e, _)| anyhow::anyhow!("Failed to publish OrderCreated: {}", e))?;

    Ok(())
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(customer_id: &str, items: Vec<LineItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: customer_id.to_string(),
            items,
        }
    }

    fn item(quantity: i32) -> LineItem {
        LineItem {
            product_id: "prod-101".to_string(),
            quantity,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate(&request("cust-A", vec![item(1), item(3)])).is_ok());
    }

    #[test]
    fn rejects_empty_customer_id() {
        assert!(validate(&request("", vec![item(1)])).is_err());
    }

    #[test]
    fn rejects_empty_items() {
        assert!(validate(&request("cust-A", vec![])).is_err());
    }

    #[test]
    fn rejects_non_positive_quantities() {
        assert!(validate(&request("cust-A", vec![item(0)])).is_err());
        assert!(validate(&request("cust-A", vec![item(-2)])).is_err());
        assert!(validate(&request("cust-A", vec![item(1), item(0)])).is_err());
    }
}
