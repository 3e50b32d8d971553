use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One mutable cart line per (customer, product, variant_key).
///
/// `variant_key` is the empty string for products without variants,
/// otherwise `"{option_name}:{option_value}"`. Lines are clamped to live
/// stock on every read-for-checkout and deleted on quantity 0, order
/// placement, or explicit clear.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[sea_orm(nullable)]
    pub option_name: Option<String>,
    #[sea_orm(nullable)]
    pub option_value: Option<String>,
    pub variant_key: String,
}

impl Model {
    /// Key under which a (option_name, option_value) selection is stored.
    pub fn variant_key_for(option_name: Option<&str>, option_value: Option<&str>) -> String {
        match (option_name, option_value) {
            (Some(name), Some(value)) if !name.is_empty() && !value.is_empty() => {
                format!("{}:{}", name, value)
            }
            _ => String::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
