use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Singleton row of admin-editable store policy: delivery fees, minimum
/// order amounts and the bonus-program toggles. Created lazily with
/// defaults on first access and re-read at the start of every checkout or
/// reconcile call (never cached across requests).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub currency: String,
    pub checkout_mode: CheckoutMode,
    pub delivery_enabled: bool,
    pub pickup_enabled: bool,
    pub promo_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub delivery_cost: Decimal,
    /// Net subtotal at or above which delivery is free; 0 disables the
    /// threshold.
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub free_delivery_min_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub min_order_amount_pickup: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub min_order_amount_delivery: Decimal,
    pub bonus_enabled: bool,
    pub bonus_welcome_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub bonus_welcome_amount: Decimal,
    pub bonus_purchase_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub bonus_purchase_percent: Decimal,
    pub bonus_spend_enabled: bool,
    pub bonus_spend_limit_type: SpendLimitType,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub bonus_spend_limit_value: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// How bonus redemption is capped per order: percent of the
/// after-discount subtotal, or a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum SpendLimitType {
    #[sea_orm(string_value = "percent")]
    Percent,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

/// Which delivery fields a checkout must carry, as one
/// configuration-driven value rather than a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Name, phone and a free-text address.
    #[sea_orm(string_value = "basic")]
    Basic,
    /// Basic plus a geocoded address.
    #[sea_orm(string_value = "enhanced")]
    Enhanced,
    /// Enhanced plus a delivery-service selection; order requires payment.
    #[sea_orm(string_value = "full")]
    Full,
}

impl CheckoutMode {
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Basic => &["customer_name", "customer_phone", "address"],
            Self::Enhanced => &["customer_name", "customer_phone", "address"],
            Self::Full => &[
                "customer_name",
                "customer_phone",
                "address",
                "delivery_service",
            ],
        }
    }

    pub fn requires_payment(self) -> bool {
        matches!(self, Self::Full)
    }
}
