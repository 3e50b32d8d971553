//! Inventory ledger over product stock counters and per-variant
//! quantities.
//!
//! The read-then-decrement sequence inside a checkout is optimistic: two
//! concurrent checkouts against the same scarce stock can both pass the
//! availability check. The decrement clamps at zero but does not
//! re-validate against the other transaction's effect. A hardened setup
//! would use a conditional `UPDATE ... WHERE quantity >= ?`.
//!
//! There is deliberately no restock operation: cancelling an order does
//! not return stock; cancelled stock is treated as lost.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{product, product_variant},
    errors::ServiceError,
};

/// A cart/order line viewed as a stock counter reference.
pub struct StockLine<'a> {
    pub product: &'a product::Model,
    pub option_name: Option<&'a str>,
    pub option_value: Option<&'a str>,
}

/// Looks up the variant row a cart/order line points at, if any.
pub async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    option_name: &str,
    option_value: &str,
) -> Result<Option<product_variant::Model>, ServiceError> {
    Ok(product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .filter(product_variant::Column::OptionName.eq(option_name))
        .filter(product_variant::Column::OptionValue.eq(option_value))
        .one(conn)
        .await?)
}

/// Currently sellable quantity for a line: the variant quantity when a
/// variant is selected, else the product's own stock. A missing variant
/// row counts as zero.
pub async fn sellable_quantity<C: ConnectionTrait>(
    conn: &C,
    line: &StockLine<'_>,
) -> Result<i32, ServiceError> {
    match (line.option_name, line.option_value) {
        (Some(name), Some(value)) => {
            let variant = find_variant(conn, line.product.id, name, value).await?;
            Ok(variant.map(|v| v.quantity).unwrap_or(0))
        }
        _ => Ok(line.product.stock_quantity),
    }
}

/// Decrements the counter backing a line by `qty`, clamped at zero.
///
/// Product-level stock flips `is_available = false` on reaching zero;
/// variant-level stock has no such side effect (a product with variants
/// is driven purely by its variant quantities).
pub async fn decrement<C: ConnectionTrait>(
    conn: &C,
    line: &StockLine<'_>,
    qty: i32,
) -> Result<(), ServiceError> {
    match (line.option_name, line.option_value) {
        (Some(name), Some(value)) => {
            if let Some(variant) = find_variant(conn, line.product.id, name, value).await? {
                let remaining = (variant.quantity - qty).max(0);
                let mut active: product_variant::ActiveModel = variant.into();
                active.quantity = Set(remaining);
                active.update(conn).await?;
                debug!(
                    "Variant stock for product {} ({}: {}) now {}",
                    line.product.id, name, value, remaining
                );
            }
            Ok(())
        }
        _ => {
            let remaining = (line.product.stock_quantity - qty).max(0);
            let mut active: product::ActiveModel = line.product.clone().into();
            active.stock_quantity = Set(remaining);
            if remaining == 0 {
                active.is_available = Set(false);
            }
            active.update(conn).await?;
            debug!("Product {} stock now {}", line.product.id, remaining);
            Ok(())
        }
    }
}
