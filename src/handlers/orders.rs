use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        order::{self, DeliveryType},
        order_item,
    },
    errors::ServiceError,
    handlers::{AdminAuth, AppState, CurrentUser},
    services::checkout::{CheckoutOutcome, CreateOrderInput, StaleLine},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub delivery_type: DeliveryType,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(length(min = 1, max = 50))]
    pub customer_phone: String,
    pub address: Option<String>,
    pub delivery_service: Option<String>,
    pub promo_code: Option<String>,
    pub bonus_to_use: Option<Decimal>,
}

/// An order with its frozen line snapshots.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Serialize)]
struct ConflictBody {
    error: &'static str,
    message: &'static str,
    removed: Vec<StaleLine>,
    adjusted: Vec<StaleLine>,
}

/// POST /api/v1/orders
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    payload.validate()?;

    let input = CreateOrderInput {
        delivery_type: payload.delivery_type,
        customer_name: payload.customer_name,
        customer_phone: payload.customer_phone,
        address: payload.address,
        delivery_service: payload.delivery_service,
        promo_code: payload.promo_code,
        bonus_to_use: payload.bonus_to_use,
    };

    match state.services.checkout.create_order(&customer, input).await? {
        CheckoutOutcome::Completed { order, items } => {
            Ok((StatusCode::CREATED, Json(OrderView { order, items })).into_response())
        }
        CheckoutOutcome::Conflict { removed, adjusted } => Ok((
            StatusCode::CONFLICT,
            Json(ConflictBody {
                error: "cart_conflict",
                message: "Cart contents changed; review the corrections and retry",
                removed,
                adjusted,
            }),
        )
            .into_response()),
    }
}

/// GET /api/v1/orders
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
) -> Result<Json<Vec<OrderView>>, ServiceError> {
    let orders = state.services.orders.list_for_customer(customer.id).await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|(order, items)| OrderView { order, items })
            .collect(),
    ))
}

/// GET /api/v1/orders/{id}
pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ServiceError> {
    let (order, items) = state
        .services
        .orders
        .get_for_customer(customer.id, order_id)
        .await?;
    Ok(Json(OrderView { order, items }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, max = 20))]
    pub status: String,
    pub tracking_number: Option<String>,
}

/// PATCH /api/v1/admin/orders/{id}
pub async fn update_status(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<order::Model>, ServiceError> {
    payload.validate()?;
    let updated = state
        .services
        .orders
        .update_status(order_id, &payload.status, payload.tracking_number)
        .await?;
    Ok(Json(updated))
}
