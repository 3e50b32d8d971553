use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    entities::customer,
    errors::ServiceError,
    events::EventSender,
    services::{
        carts::CartService, checkout::CheckoutService, customers::CustomerService,
        notifications::NotificationService, orders::OrderService,
    },
};

pub mod cart;
pub mod me;
pub mod orders;

/// Service container handed to every handler through the router state.
#[derive(Clone)]
pub struct AppServices {
    pub customers: CustomerService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new());
        let services = AppServices {
            customers: CustomerService::new(db.clone()),
            carts: CartService::new(db.clone()),
            checkout: CheckoutService::new(db.clone(), event_sender.clone(), notifications),
            orders: OrderService::new(db.clone(), event_sender.clone()),
        };
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// The authenticated storefront customer, provisioned on first sight.
///
/// Identity arrives as the opaque `X-User-Id` header (with an optional
/// `X-User-Name`), already verified by the upstream gateway; this layer
/// trusts it and maps it to a customer row.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub customer::Model);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let external_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing X-User-Id header".to_string()))?
            .to_string();
        let username = parts
            .headers
            .get("x-user-name")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let customer = state
            .services
            .customers
            .provision(&external_id, username)
            .await?;
        Ok(CurrentUser(customer))
    }
}

/// Marker extractor for the privileged admin routes. Compares the
/// `X-Admin-Token` header against the configured shared secret; a missing
/// server-side token disables the admin surface entirely.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(ServiceError::Forbidden(
                "Admin endpoints are not configured".to_string(),
            ));
        };
        let provided = parts
            .headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected {
            return Err(ServiceError::Unauthorized(
                "Invalid admin token".to_string(),
            ));
        }
        Ok(AdminAuth)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            database: "up",
        })
        .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "down" })),
        )
            .into_response(),
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/orders", post(orders::create).get(orders::list))
        .route("/api/v1/orders/:id", get(orders::get_one))
        .route("/api/v1/admin/orders/:id", patch(orders::update_status))
        .route("/api/v1/cart", get(cart::list).post(cart::add_item))
        .route(
            "/api/v1/cart/:id",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/api/v1/promo/check", post(me::check_promo))
        .route("/api/v1/me", get(me::profile))
        .route("/api/v1/me/bonus-transactions", get(me::bonus_transactions))
        .with_state(state)
}
