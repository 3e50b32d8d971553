use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        bonus_transaction::BonusKind,
        order::{self, OrderStatus},
        order_item, store_settings,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{bonus, bonus::LedgerEffect, settings},
};

/// Bonus-ledger effects of a fulfillment-status transition.
///
/// Deliberately insensitive to every pair except the three that carry
/// financial meaning:
/// - into `done` from any non-`done`: purchase accrual (only when the
///   order itself redeemed no points);
/// - into `cancelled` from any non-`cancelled`: refund of redeemed
///   points;
/// - `cancelled` into `done`: the cancellation refund is re-debited
///   because the order is honored after all.
///
/// The `cancelled -> done` pair can yield both an accrual and a re-debit
/// candidate; they are mutually exclusive because accrual requires
/// `bonus_used == 0` and the re-debit requires `bonus_used > 0`.
pub fn reconcile(
    old_status: OrderStatus,
    new_status: OrderStatus,
    total: rust_decimal::Decimal,
    bonus_used: rust_decimal::Decimal,
    settings: &store_settings::Model,
) -> Vec<LedgerEffect> {
    use rust_decimal::Decimal;

    let mut effects = Vec::new();

    if new_status == OrderStatus::Done && old_status != OrderStatus::Done {
        if let Some(accrual) = bonus::purchase_accrual(total, bonus_used, settings) {
            effects.push(accrual);
        }
    }

    if new_status == OrderStatus::Cancelled
        && old_status != OrderStatus::Cancelled
        && bonus_used > Decimal::ZERO
    {
        effects.push(LedgerEffect {
            amount: bonus_used,
            kind: BonusKind::Refund,
        });
    }

    if old_status == OrderStatus::Cancelled
        && new_status == OrderStatus::Done
        && bonus_used > Decimal::ZERO
    {
        effects.push(LedgerEffect {
            amount: -bonus_used,
            kind: BonusKind::Spend,
        });
    }

    effects
}

/// Read access to orders plus the privileged status-update path that
/// drives bonus reconciliation.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// A customer's orders, newest first.
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?)
    }

    /// A single order, scoped to its owner.
    pub async fn get_for_customer(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let mut found = order::Entity::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        found
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Changes an order's fulfillment status (privileged), applying the
    /// bonus-ledger effects of the transition in the same transaction.
    /// Unknown status strings are rejected before any mutation.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: &str,
        tracking_number: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let Some(target) = OrderStatus::parse(new_status) else {
            return Err(ServiceError::InvalidStatus(format!(
                "Unknown order status: {}",
                new_status
            )));
        };

        let txn = self.db.begin().await?;

        let existing = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let old_status = existing.status;

        // Settings are re-read per call; the accrual percent may have
        // changed since checkout.
        let store = settings::load_or_default(&txn).await?;
        let effects = reconcile(
            old_status,
            target,
            existing.total,
            existing.bonus_used,
            &store,
        );

        let customer_id = existing.customer_id;
        let mut active: order::ActiveModel = existing.into();
        active.status = Set(target);
        if let Some(tracking) = tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        let updated = active.update(&txn).await?;

        for effect in effects {
            bonus::apply_effect(&txn, customer_id, order_id, effect).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: target.to_string(),
            })
            .await;
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, target
        );
        Ok(updated)
    }
}
