use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{
        order,
        promo_code::{self, DiscountKind},
        store_settings,
    },
    errors::ServiceError,
};

/// Why a promo code was refused. Each reason carries the user-facing
/// message surfaced by the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoRejection {
    #[error("Promo code not found")]
    NotFound,
    #[error("Promo code is not active yet")]
    NotYetValid,
    #[error("Promo code has expired")]
    Expired,
    #[error("Promo code has reached its usage limit")]
    UsageCapExhausted,
    #[error("Order amount is below the promo code minimum")]
    BelowMinimum,
    #[error("You have already used this promo code")]
    AlreadyUsed,
    #[error("Promo code is only valid on a first order")]
    FirstOrderOnly,
    #[error("Free-delivery promo codes do not apply to pickup orders")]
    PickupIncompatible,
    #[error("Delivery is already free for this order")]
    RedundantFreeDelivery,
    #[error("Promo codes are disabled")]
    Disabled,
}

impl From<PromoRejection> for ServiceError {
    fn from(rejection: PromoRejection) -> Self {
        ServiceError::PromoRejected(rejection.to_string())
    }
}

/// Outcome of a successful validation. `discount` is already capped at
/// the subtotal; `free_delivery` marks the fee waiver instead of a
/// subtotal discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoGrant {
    pub promo_id: Uuid,
    pub kind: DiscountKind,
    pub discount: Decimal,
    pub free_delivery: bool,
}

/// Discount amount for a percent/fixed code, capped at the subtotal.
/// Free-delivery codes discount nothing.
pub fn discount_for(kind: DiscountKind, value: Decimal, subtotal: Decimal) -> Decimal {
    let raw = match kind {
        DiscountKind::Percent => subtotal * value / Decimal::from(100),
        DiscountKind::Fixed => value,
        DiscountKind::FreeDelivery => return Decimal::ZERO,
    };
    raw.min(subtotal).round_dp(2)
}

/// Evaluates a promo code for a customer's pending order. Checks run in
/// order and short-circuit on the first failure. This never mutates
/// `used_count`; the checkout transaction increments it after the order
/// insert via [`mark_used`].
///
/// One-redemption-per-customer is enforced by scanning the customer's
/// order history, not a uniqueness constraint, so concurrent double
/// submission can slip past it. Known race, accepted.
pub async fn validate<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    customer_id: Uuid,
    subtotal: Decimal,
    delivery_type: order::DeliveryType,
    settings: &store_settings::Model,
) -> Result<Result<PromoGrant, PromoRejection>, ServiceError> {
    if !settings.promo_enabled {
        return Ok(Err(PromoRejection::Disabled));
    }

    let Some(promo) = promo_code::Entity::find()
        .filter(promo_code::Column::Code.eq(code))
        .filter(promo_code::Column::IsActive.eq(true))
        .one(conn)
        .await?
    else {
        return Ok(Err(PromoRejection::NotFound));
    };

    let now = Utc::now();
    if let Some(valid_from) = promo.valid_from {
        if now < valid_from {
            return Ok(Err(PromoRejection::NotYetValid));
        }
    }
    if let Some(valid_until) = promo.valid_until {
        if now > valid_until {
            return Ok(Err(PromoRejection::Expired));
        }
    }
    if let Some(max_uses) = promo.max_uses {
        if promo.used_count >= max_uses {
            return Ok(Err(PromoRejection::UsageCapExhausted));
        }
    }
    if subtotal < promo.min_order_amount {
        return Ok(Err(PromoRejection::BelowMinimum));
    }

    let used_by_customer = order::Entity::find()
        .filter(order::Column::CustomerId.eq(customer_id))
        .filter(order::Column::PromoCodeId.eq(promo.id))
        .count(conn)
        .await?;
    if used_by_customer > 0 {
        return Ok(Err(PromoRejection::AlreadyUsed));
    }

    if promo.first_order_only {
        let prior_orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .count(conn)
            .await?;
        if prior_orders > 0 {
            return Ok(Err(PromoRejection::FirstOrderOnly));
        }
    }

    if promo.discount_kind == DiscountKind::FreeDelivery {
        if delivery_type == order::DeliveryType::Pickup {
            return Ok(Err(PromoRejection::PickupIncompatible));
        }
        // Redundant when the threshold policy already waives the fee.
        if settings.free_delivery_min_amount > Decimal::ZERO
            && subtotal >= settings.free_delivery_min_amount
        {
            return Ok(Err(PromoRejection::RedundantFreeDelivery));
        }
    }

    let discount = discount_for(promo.discount_kind, promo.discount_value, subtotal);
    debug!(
        "Promo {} granted: kind {:?}, discount {}",
        promo.code, promo.discount_kind, discount
    );
    Ok(Ok(PromoGrant {
        promo_id: promo.id,
        kind: promo.discount_kind,
        discount,
        free_delivery: promo.discount_kind == DiscountKind::FreeDelivery,
    }))
}

/// Increments the usage counter. Called inside the checkout transaction,
/// only after the order row has been inserted.
pub async fn mark_used<C: ConnectionTrait>(conn: &C, promo_id: Uuid) -> Result<(), ServiceError> {
    let promo = promo_code::Entity::find_by_id(promo_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Promo code {} not found", promo_id)))?;

    let used_count = promo.used_count;
    let mut active: promo_code::ActiveModel = promo.into();
    active.used_count = Set(used_count + 1);
    active.update(conn).await?;
    Ok(())
}
