use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{bonus_transaction, customer},
    errors::ServiceError,
    services::{bonus, settings},
};

/// Provisions customers from identities resolved upstream and serves
/// their bonus profile.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the customer for a resolved external identity, creating
    /// the row on first sight. The welcome bonus is credited only on the
    /// insert path, which keeps it idempotent per customer.
    #[instrument(skip(self))]
    pub async fn provision(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<customer::Model, ServiceError> {
        if let Some(existing) = customer::Entity::find()
            .filter(customer::Column::ExternalId.eq(external_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let txn = self.db.begin().await?;

        let created = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            external_id: Set(external_id.to_string()),
            username: Set(username.map(str::to_string)),
            bonus_balance: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await;

        let created = match created {
            Ok(model) => model,
            Err(_) => {
                // Concurrent request won the insert race; read theirs.
                txn.rollback().await?;
                return customer::Entity::find()
                    .filter(customer::Column::ExternalId.eq(external_id))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "Failed to provision customer {}",
                            external_id
                        ))
                    });
            }
        };

        let store = settings::load_or_default(&txn).await?;
        bonus::credit_welcome(&txn, created.id, &store).await?;
        txn.commit().await?;

        info!("Provisioned customer {} ({})", created.id, external_id);

        // Re-read so the returned balance reflects the welcome credit.
        Ok(customer::Entity::find_by_id(created.id)
            .one(&*self.db)
            .await?
            .unwrap_or(created))
    }

    pub async fn get(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }

    /// Most recent bonus ledger entries for a customer.
    pub async fn bonus_transactions(
        &self,
        customer_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<bonus_transaction::Model>, ServiceError> {
        Ok(bonus_transaction::Entity::find()
            .filter(bonus_transaction::Column::CustomerId.eq(customer_id))
            .order_by_desc(bonus_transaction::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?)
    }
}
