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
    errors::ServiceError,
    handlers::{AppState, CurrentUser},
    services::carts::CartLine,
};

/// One cart line with the live product snapshot the UI renders from.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_value: Option<String>,
    pub line_total: Decimal,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        let line_total = (line.product.price * Decimal::from(line.item.quantity)).round_dp(2);
        Self {
            id: line.item.id,
            product_id: line.product.id,
            product_name: line.product.name,
            unit_price: line.product.price,
            quantity: line.item.quantity,
            option_name: line.item.option_name,
            option_value: line.item.option_value,
            line_total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Decimal,
}

async fn render_cart(state: &AppState, customer_id: Uuid) -> Result<CartView, ServiceError> {
    let items: Vec<CartLineView> = state
        .services
        .carts
        .lines(customer_id)
        .await?
        .into_iter()
        .map(CartLineView::from)
        .collect();
    let subtotal = items.iter().map(|l| l.line_total).sum::<Decimal>().round_dp(2);
    Ok(CartView { items, subtotal })
}

/// GET /api/v1/cart
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
) -> Result<Json<CartView>, ServiceError> {
    Ok(Json(render_cart(&state, customer.id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
    pub option_name: Option<String>,
    pub option_value: Option<String>,
}

/// POST /api/v1/cart
pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Response, ServiceError> {
    payload.validate()?;
    state
        .services
        .carts
        .add_item(
            customer.id,
            payload.product_id,
            payload.quantity,
            payload.option_name.as_deref(),
            payload.option_value.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(render_cart(&state, customer.id).await?),
    )
        .into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = 999))]
    pub quantity: i32,
}

/// PATCH /api/v1/cart/{id}
pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    payload.validate()?;
    state
        .services
        .carts
        .update_item(customer.id, item_id, payload.quantity)
        .await?;
    Ok(Json(render_cart(&state, customer.id).await?))
}

/// DELETE /api/v1/cart/{id}
pub async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartView>, ServiceError> {
    state.services.carts.update_item(customer.id, item_id, 0).await?;
    Ok(Json(render_cart(&state, customer.id).await?))
}
