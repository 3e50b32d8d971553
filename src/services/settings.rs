use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};
use uuid::Uuid;

use crate::{
    entities::store_settings::{self, CheckoutMode, SpendLimitType},
    errors::ServiceError,
};

/// Loads the store settings singleton, creating it with defaults on first
/// access. Callers re-read at the start of every checkout/reconcile call;
/// the row is never cached across requests.
pub async fn load_or_default<C: ConnectionTrait>(
    conn: &C,
) -> Result<store_settings::Model, ServiceError> {
    if let Some(settings) = store_settings::Entity::find().limit(1).one(conn).await? {
        return Ok(settings);
    }

    let defaults = store_settings::ActiveModel {
        id: Set(Uuid::new_v4()),
        currency: Set("USD".to_string()),
        checkout_mode: Set(CheckoutMode::Basic),
        delivery_enabled: Set(true),
        pickup_enabled: Set(true),
        promo_enabled: Set(true),
        delivery_cost: Set(Decimal::ZERO),
        free_delivery_min_amount: Set(Decimal::ZERO),
        min_order_amount_pickup: Set(Decimal::ZERO),
        min_order_amount_delivery: Set(Decimal::ZERO),
        bonus_enabled: Set(false),
        bonus_welcome_enabled: Set(false),
        bonus_welcome_amount: Set(Decimal::ZERO),
        bonus_purchase_enabled: Set(false),
        bonus_purchase_percent: Set(Decimal::ZERO),
        bonus_spend_enabled: Set(false),
        bonus_spend_limit_type: Set(SpendLimitType::Percent),
        bonus_spend_limit_value: Set(Decimal::ZERO),
    };
    Ok(defaults.insert(conn).await?)
}
