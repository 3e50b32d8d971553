use axum::{
    extract::{Query, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    entities::{bonus_transaction, customer, order::DeliveryType, promo_code::DiscountKind},
    errors::ServiceError,
    handlers::{AppState, CurrentUser},
    services::{pricing, promo, settings},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckPromoRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub delivery_type: DeliveryType,
}

/// Dry-run verdict for a promo code against the customer's current cart.
#[derive(Debug, Serialize)]
pub struct CheckPromoResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DiscountKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_delivery: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/v1/promo/check
///
/// Runs the same validation chain checkout uses, without consuming the
/// code or touching the cart. A rejected code is a 200 with
/// `valid: false`, not an error; the UI shows the reason inline.
pub async fn check_promo(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Json(payload): Json<CheckPromoRequest>,
) -> Result<Json<CheckPromoResponse>, ServiceError> {
    payload.validate()?;

    let store = settings::load_or_default(&*state.db).await?;
    let lines: Vec<pricing::PricedLine> = state
        .services
        .carts
        .lines(customer.id)
        .await?
        .iter()
        .map(|l| pricing::PricedLine {
            unit_price: l.product.price,
            quantity: l.item.quantity,
        })
        .collect();
    let subtotal = pricing::subtotal(&lines);

    let verdict = promo::validate(
        &*state.db,
        &payload.code,
        customer.id,
        subtotal,
        payload.delivery_type,
        &store,
    )
    .await?;

    Ok(Json(match verdict {
        Ok(grant) => CheckPromoResponse {
            valid: true,
            kind: Some(grant.kind),
            discount: Some(grant.discount),
            free_delivery: Some(grant.free_delivery),
            message: None,
        },
        Err(rejection) => CheckPromoResponse {
            valid: false,
            kind: None,
            discount: None,
            free_delivery: None,
            message: Some(rejection.to_string()),
        },
    }))
}

/// GET /api/v1/me
pub async fn profile(
    CurrentUser(customer): CurrentUser,
) -> Result<Json<customer::Model>, ServiceError> {
    Ok(Json(customer))
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    20
}

/// GET /api/v1/me/bonus-transactions
pub async fn bonus_transactions(
    State(state): State<AppState>,
    CurrentUser(customer): CurrentUser,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<bonus_transaction::Model>>, ServiceError> {
    let limit = query.limit.min(100);
    Ok(Json(
        state
            .services
            .customers
            .bonus_transactions(customer.id, limit, query.offset)
            .await?,
    ))
}
