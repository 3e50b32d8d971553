use tracing::info;

use crate::entities::{order, order_item};

/// Best-effort outbound notifications (store owner pings, customer
/// receipts). Failures are logged and never surfaced to the settlement
/// path; an order that committed is an order, notified or not.
#[derive(Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    /// Announces a freshly committed order. Called strictly after the
    /// settlement transaction commits.
    pub async fn order_created(&self, order: &order::Model, items: &[order_item::Model]) {
        let units: i32 = items.iter().map(|i| i.quantity).sum();
        info!(
            "New order {}: {} line(s), {} unit(s), total {} ({})",
            order.id,
            items.len(),
            units,
            order.total,
            order.delivery_type
        );
    }
}
