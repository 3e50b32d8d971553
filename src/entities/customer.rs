use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storefront customer.
///
/// `bonus_balance` is a denormalized cache of the bonus ledger; it is only
/// ever written together with a `bonus_transactions` row in the same
/// transaction (see `services::bonus::append`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Stable identity resolved by the upstream identity provider.
    #[sea_orm(unique)]
    pub external_id: String,
    #[sea_orm(nullable)]
    pub username: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub bonus_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::bonus_transaction::Entity")]
    BonusTransactions,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::bonus_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonusTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
