//! Bonus (loyalty point) ledger: an append-only transaction log plus a
//! cached per-customer balance.
//!
//! Every mutation writes the ledger row and the cached balance in the
//! same transaction; the cache is adjusted by delta at write time, never
//! re-summed from the ledger on the hot path. Re-summing is a
//! reconciliation/audit concern outside this engine.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::info;
use uuid::Uuid;

use crate::{
    entities::{
        bonus_transaction::{self, BonusKind},
        customer,
        store_settings::{self, SpendLimitType},
    },
    errors::ServiceError,
};

/// A pending ledger mutation produced by checkout or status
/// reconciliation. `amount` is signed: positive credits, negative debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEffect {
    pub amount: Decimal,
    pub kind: BonusKind,
}

/// Bonus points actually redeemable for an order: the floor of the
/// smallest of the requested amount, the customer's balance and the
/// configured per-order cap. Fractional points are not permitted.
pub fn redeemable_amount(
    requested: Decimal,
    balance: Decimal,
    subtotal_after_discount: Decimal,
    settings: &store_settings::Model,
) -> Decimal {
    if requested <= Decimal::ZERO || !settings.bonus_enabled || !settings.bonus_spend_enabled {
        return Decimal::ZERO;
    }
    let max_allowed = match settings.bonus_spend_limit_type {
        SpendLimitType::Percent => {
            subtotal_after_discount * settings.bonus_spend_limit_value / Decimal::from(100)
        }
        SpendLimitType::Fixed => settings.bonus_spend_limit_value,
    };
    requested
        .min(balance)
        .min(max_allowed)
        .max(Decimal::ZERO)
        .floor()
}

/// Purchase-accrual amount for an order entering `done`: a percentage of
/// the pre-bonus-deduction total, rounded to 2 decimal places.
pub fn purchase_accrual(
    total: Decimal,
    bonus_used: Decimal,
    settings: &store_settings::Model,
) -> Option<LedgerEffect> {
    if !settings.bonus_enabled
        || !settings.bonus_purchase_enabled
        || settings.bonus_purchase_percent <= Decimal::ZERO
        || bonus_used > Decimal::ZERO
    {
        return None;
    }
    let gross = total + bonus_used;
    let amount = (gross * settings.bonus_purchase_percent / Decimal::from(100)).round_dp(2);
    (amount > Decimal::ZERO).then_some(LedgerEffect {
        amount,
        kind: BonusKind::Purchase,
    })
}

/// Appends a ledger entry and moves the cached balance by the same signed
/// amount. The caller supplies the enclosing transaction; both writes
/// land or neither does.
pub async fn append<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    order_id: Option<Uuid>,
    amount: Decimal,
    kind: BonusKind,
) -> Result<(), ServiceError> {
    let customer = customer::Entity::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

    let new_balance = (customer.bonus_balance + amount).round_dp(2);
    let mut active: customer::ActiveModel = customer.into();
    active.bonus_balance = Set(new_balance);
    active.update(conn).await?;

    let entry = bonus_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        amount: Set(amount.round_dp(2)),
        kind: Set(kind),
        order_id: Set(order_id),
        created_at: Set(Utc::now()),
    };
    entry.insert(conn).await?;

    info!(
        "Bonus ledger: customer {} {:+} ({:?}), balance now {}",
        customer_id, amount, kind, new_balance
    );
    Ok(())
}

/// Applies a reconciliation effect against a specific order.
pub async fn apply_effect<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    order_id: Uuid,
    effect: LedgerEffect,
) -> Result<(), ServiceError> {
    append(conn, customer_id, Some(order_id), effect.amount, effect.kind).await
}

/// Credits the welcome bonus to a freshly provisioned customer. Called
/// only on the insert path of provisioning, which makes it idempotent per
/// customer.
pub async fn credit_welcome<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    settings: &store_settings::Model,
) -> Result<(), ServiceError> {
    if !settings.bonus_enabled
        || !settings.bonus_welcome_enabled
        || settings.bonus_welcome_amount <= Decimal::ZERO
    {
        return Ok(());
    }
    append(
        conn,
        customer_id,
        None,
        settings.bonus_welcome_amount,
        BonusKind::Welcome,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(limit_type: SpendLimitType, limit_value: Decimal) -> store_settings::Model {
        store_settings::Model {
            id: Uuid::new_v4(),
            currency: "USD".to_string(),
            checkout_mode: store_settings::CheckoutMode::Basic,
            delivery_enabled: true,
            pickup_enabled: true,
            promo_enabled: true,
            delivery_cost: dec!(200),
            free_delivery_min_amount: Decimal::ZERO,
            min_order_amount_pickup: Decimal::ZERO,
            min_order_amount_delivery: Decimal::ZERO,
            bonus_enabled: true,
            bonus_welcome_enabled: false,
            bonus_welcome_amount: Decimal::ZERO,
            bonus_purchase_enabled: true,
            bonus_purchase_percent: dec!(5),
            bonus_spend_enabled: true,
            bonus_spend_limit_type: limit_type,
            bonus_spend_limit_value: limit_value,
        }
    }

    #[test]
    fn redemption_takes_smallest_bound_and_floors() {
        let s = settings(SpendLimitType::Percent, dec!(20));
        // min(1000, 500, 900 * 0.20 = 180) = 180
        let used = redeemable_amount(dec!(1000), dec!(500), dec!(900), &s);
        assert_eq!(used, dec!(180));
    }

    #[test]
    fn redemption_floors_to_whole_points() {
        let s = settings(SpendLimitType::Percent, dec!(20));
        let used = redeemable_amount(dec!(1000), dec!(500), dec!(903.30), &s);
        assert_eq!(used, dec!(180));
    }

    #[test]
    fn redemption_fixed_cap() {
        let s = settings(SpendLimitType::Fixed, dec!(50));
        let used = redeemable_amount(dec!(1000), dec!(500), dec!(900), &s);
        assert_eq!(used, dec!(50));
    }

    #[test]
    fn redemption_disabled_yields_zero() {
        let mut s = settings(SpendLimitType::Percent, dec!(20));
        s.bonus_spend_enabled = false;
        assert_eq!(
            redeemable_amount(dec!(100), dec!(500), dec!(900), &s),
            Decimal::ZERO
        );
    }

    #[test]
    fn purchase_accrual_uses_gross_amount() {
        let s = settings(SpendLimitType::Percent, dec!(20));
        let effect = purchase_accrual(dec!(1000), Decimal::ZERO, &s).unwrap();
        assert_eq!(effect.amount, dec!(50.00));
        assert_eq!(effect.kind, BonusKind::Purchase);
    }

    #[test]
    fn purchase_accrual_skipped_when_order_redeemed_points() {
        let s = settings(SpendLimitType::Percent, dec!(20));
        assert!(purchase_accrual(dec!(820), dec!(180), &s).is_none());
    }
}
