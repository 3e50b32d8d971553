//! Pure pricing of a validated cart: subtotal, discount, bonus
//! deduction, delivery fee and the charged total. All amounts are
//! rounded to 2 decimal places before they reach persistence, so a
//! catalog price of 3090 never drifts to 3089.99 on its way into an
//! order row.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::entities::{order::DeliveryType, store_settings};

/// A cart line reduced to what pricing needs: the frozen unit price and
/// the quantity.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// The full money breakdown of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub bonus_used: Decimal,
    pub net_subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

/// Sum of `unit_price * quantity` over the lines, rounded to 2dp.
pub fn subtotal(lines: &[PricedLine]) -> Decimal {
    lines
        .iter()
        .map(|l| l.unit_price * Decimal::from(l.quantity))
        .sum::<Decimal>()
        .round_dp(2)
}

/// Computes the final quote. `discount` and `bonus_used` are already
/// validated/capped upstream (promo validator, bonus ledger), so
/// `net_subtotal` cannot go negative here.
///
/// Delivery fee rules, in order: pickup is always free; a free-delivery
/// promo waives the fee; a configured threshold waives it when the net
/// subtotal qualifies; otherwise the flat configured cost applies.
pub fn quote(
    lines: &[PricedLine],
    discount: Decimal,
    bonus_used: Decimal,
    delivery_type: DeliveryType,
    free_delivery_promo: bool,
    settings: &store_settings::Model,
) -> Quote {
    let subtotal = subtotal(lines);
    let after_discount = (subtotal - discount).round_dp(2);
    let net_subtotal = (after_discount - bonus_used).round_dp(2);

    let delivery_fee = match delivery_type {
        DeliveryType::Pickup => Decimal::ZERO,
        DeliveryType::Delivery => {
            if free_delivery_promo {
                Decimal::ZERO
            } else if settings.free_delivery_min_amount > Decimal::ZERO
                && net_subtotal >= settings.free_delivery_min_amount
            {
                Decimal::ZERO
            } else {
                settings.delivery_cost.round_dp(2)
            }
        }
    };

    Quote {
        subtotal,
        discount: discount.round_dp(2),
        bonus_used: bonus_used.round_dp(2),
        net_subtotal,
        delivery_fee,
        total: (net_subtotal + delivery_fee).round_dp(2),
    }
}
