use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        cart_item, customer,
        order::{self, DeliveryType, OrderStatus},
        order_item, product,
        bonus_transaction::BonusKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{bonus, inventory, notifications::NotificationService, pricing, promo, settings},
};

/// Checkout request as accepted from the API layer, already bound to a
/// provisioned customer.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub delivery_type: DeliveryType,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: Option<String>,
    pub delivery_service: Option<String>,
    pub promo_code: Option<String>,
    pub bonus_to_use: Option<Decimal>,
}

/// A cart line the validation pass removed or clamped.
#[derive(Debug, Clone, Serialize)]
pub struct StaleLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub old_quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_quantity: Option<i32>,
}

/// Settlement result: either the committed order, or the corrections the
/// customer must confirm before retrying. The conflict arm is a value,
/// not an error, so callers can re-prompt instead of failing.
#[derive(Debug)]
pub enum CheckoutOutcome {
    Completed {
        order: order::Model,
        items: Vec<order_item::Model>,
    },
    Conflict {
        removed: Vec<StaleLine>,
        adjusted: Vec<StaleLine>,
    },
}

/// Turns a mutable cart into an immutable order while reserving
/// inventory, applying a promo discount and redeeming bonus points,
/// all inside one transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifications: Arc<NotificationService>,
}

struct ValidatedLine {
    item: cart_item::Model,
    product: product::Model,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifications,
        }
    }

    /// Settles the customer's cart.
    ///
    /// Either every mutation lands (order + item snapshots, inventory
    /// decrement, promo counter, bonus debit, cart clear) or none does.
    /// A stale cart short-circuits into [`CheckoutOutcome::Conflict`]
    /// after persisting the corrections to the cart itself; no order is
    /// created on that path.
    #[instrument(skip(self, input), fields(customer_id = %customer.id))]
    pub async fn create_order(
        &self,
        customer: &customer::Model,
        input: CreateOrderInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let store = settings::load_or_default(&txn).await?;

        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::CustomerId.eq(customer.id))
            .find_also_related(product::Entity)
            .all(&txn)
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        self.validate_delivery_fields(&input, &store)?;

        // Classify lines against live stock before touching anything.
        // Corrections are keyed on the cart item id so that two variant
        // lines of the same product never cross-match.
        let mut removed = Vec::new();
        let mut adjusted = Vec::new();
        let mut removed_ids: Vec<Uuid> = Vec::new();
        let mut adjustments: Vec<(Uuid, i32)> = Vec::new();
        let mut lines = Vec::with_capacity(rows.len());
        for (item, maybe_product) in rows {
            let product = maybe_product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references missing product",
                    item.id
                ))
            })?;

            if !product.is_available {
                removed.push(StaleLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    old_quantity: item.quantity,
                    new_quantity: None,
                });
                removed_ids.push(item.id);
                lines.push(ValidatedLine { item, product });
                continue;
            }

            let max_stock = inventory::sellable_quantity(
                &txn,
                &inventory::StockLine {
                    product: &product,
                    option_name: item.option_name.as_deref(),
                    option_value: item.option_value.as_deref(),
                },
            )
            .await?;

            if max_stock <= 0 {
                removed.push(StaleLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    old_quantity: item.quantity,
                    new_quantity: None,
                });
                removed_ids.push(item.id);
            } else if item.quantity > max_stock {
                adjusted.push(StaleLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    old_quantity: item.quantity,
                    new_quantity: Some(max_stock),
                });
                adjustments.push((item.id, max_stock));
            }
            lines.push(ValidatedLine { item, product });
        }

        if !removed.is_empty() || !adjusted.is_empty() {
            self.apply_corrections(&txn, &lines, &removed_ids, &adjustments)
                .await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CheckoutRejectedStale {
                    customer_id: customer.id,
                    removed: removed.len(),
                    adjusted: adjusted.len(),
                })
                .await;
            info!(
                "Checkout rejected as stale for customer {}: {} removed, {} adjusted",
                customer.id,
                removed.len(),
                adjusted.len()
            );
            return Ok(CheckoutOutcome::Conflict { removed, adjusted });
        }

        // Cart is consistent; settle.
        let priced: Vec<pricing::PricedLine> = lines
            .iter()
            .map(|l| pricing::PricedLine {
                unit_price: l.product.price,
                quantity: l.item.quantity,
            })
            .collect();
        let subtotal = pricing::subtotal(&priced);

        let min_order = match input.delivery_type {
            DeliveryType::Pickup => store.min_order_amount_pickup,
            DeliveryType::Delivery => store.min_order_amount_delivery,
        };
        if min_order > Decimal::ZERO && subtotal < min_order {
            return Err(ServiceError::ValidationError(format!(
                "Order subtotal {} is below the minimum of {}",
                subtotal, min_order
            )));
        }

        let grant = match &input.promo_code {
            Some(code) => Some(
                promo::validate(
                    &txn,
                    code,
                    customer.id,
                    subtotal,
                    input.delivery_type,
                    &store,
                )
                .await?
                .map_err(ServiceError::from)?,
            ),
            None => None,
        };
        let discount = grant.as_ref().map(|g| g.discount).unwrap_or(Decimal::ZERO);
        let free_delivery_promo = grant.as_ref().is_some_and(|g| g.free_delivery);

        // Balance must be read inside the transaction; the cached value on
        // `customer` may predate a concurrent ledger write.
        let balance = customer::Entity::find_by_id(customer.id)
            .one(&txn)
            .await?
            .map(|c| c.bonus_balance)
            .unwrap_or(Decimal::ZERO);
        let bonus_used = bonus::redeemable_amount(
            input.bonus_to_use.unwrap_or(Decimal::ZERO),
            balance,
            subtotal - discount,
            &store,
        );

        let quote = pricing::quote(
            &priced,
            discount,
            bonus_used,
            input.delivery_type,
            free_delivery_promo,
            &store,
        );
        if store.checkout_mode.requires_payment() {
            debug!("Order will await payment (checkout mode: full)");
        }

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer.id),
            promo_code_id: Set(grant.as_ref().map(|g| g.promo_id)),
            status: Set(OrderStatus::New),
            total: Set(quote.total),
            discount: Set(quote.discount),
            bonus_used: Set(quote.bonus_used),
            delivery_fee: Set(quote.delivery_fee),
            delivery_type: Set(input.delivery_type),
            customer_name: Set(input.customer_name.clone()),
            customer_phone: Set(input.customer_phone.clone()),
            address: Set(input.address.clone()),
            delivery_service: Set(input.delivery_service.clone()),
            tracking_number: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                quantity: Set(line.item.quantity),
                price_at_order: Set(line.product.price.round_dp(2)),
                option_name: Set(line.item.option_name.clone()),
                option_value: Set(line.item.option_value.clone()),
            }
            .insert(&txn)
            .await?;
            items.push(item);

            inventory::decrement(
                &txn,
                &inventory::StockLine {
                    product: &line.product,
                    option_name: line.item.option_name.as_deref(),
                    option_value: line.item.option_value.as_deref(),
                },
                line.item.quantity,
            )
            .await?;
        }

        if let Some(grant) = &grant {
            promo::mark_used(&txn, grant.promo_id).await?;
        }

        if quote.bonus_used > Decimal::ZERO {
            bonus::append(
                &txn,
                customer.id,
                Some(order_id),
                -quote.bonus_used,
                BonusKind::Spend,
            )
            .await?;
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CustomerId.eq(customer.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        // Post-commit side channels: failures here never unwind the order.
        self.notifications.order_created(&order, &items).await;
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id,
                customer_id: customer.id,
                total: order.total,
            })
            .await;

        info!(
            "Order {} settled for customer {}: total {}, discount {}, bonus {}, fee {}",
            order_id, customer.id, order.total, order.discount, order.bonus_used, order.delivery_fee
        );
        Ok(CheckoutOutcome::Completed { order, items })
    }

    fn validate_delivery_fields(
        &self,
        input: &CreateOrderInput,
        store: &crate::entities::store_settings::Model,
    ) -> Result<(), ServiceError> {
        let method_enabled = match input.delivery_type {
            DeliveryType::Pickup => store.pickup_enabled,
            DeliveryType::Delivery => store.delivery_enabled,
        };
        if !method_enabled {
            return Err(ServiceError::ValidationError(format!(
                "{} orders are currently disabled",
                input.delivery_type
            )));
        }
        if input.customer_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "customer_name is required".to_string(),
            ));
        }
        if input.customer_phone.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "customer_phone is required".to_string(),
            ));
        }
        if input.delivery_type == DeliveryType::Delivery {
            let required = store.checkout_mode.required_fields();
            if required.contains(&"address")
                && input.address.as_deref().unwrap_or("").trim().is_empty()
            {
                return Err(ServiceError::ValidationError(
                    "address is required for delivery orders".to_string(),
                ));
            }
            if required.contains(&"delivery_service")
                && input
                    .delivery_service
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .is_empty()
            {
                return Err(ServiceError::ValidationError(
                    "delivery_service is required for delivery orders".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Persists removals/clamps back to the cart so it reflects reality
    /// before the caller is asked to re-confirm.
    async fn apply_corrections(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        lines: &[ValidatedLine],
        removed_ids: &[Uuid],
        adjustments: &[(Uuid, i32)],
    ) -> Result<(), ServiceError> {
        for line in lines {
            if removed_ids.contains(&line.item.id) {
                cart_item::Entity::delete_by_id(line.item.id).exec(txn).await?;
            } else if let Some((_, new_quantity)) =
                adjustments.iter().find(|(id, _)| *id == line.item.id)
            {
                let mut active: cart_item::ActiveModel = line.item.clone().into();
                active.quantity = Set(*new_quantity);
                active.update(txn).await?;
            }
        }
        Ok(())
    }
}
