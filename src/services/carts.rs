use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{cart_item, product, product_variant},
    errors::ServiceError,
    services::inventory,
};

/// One cart line joined with its product snapshot.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item: cart_item::Model,
    pub product: product::Model,
}

/// Mutable shopping cart keyed on (customer, product, variant_key).
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All of a customer's cart lines with their current product rows.
    pub async fn lines(&self, customer_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (item, maybe_product) in rows {
            let product = maybe_product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references missing product",
                    item.id
                ))
            })?;
            lines.push(CartLine { item, product });
        }
        Ok(lines)
    }

    /// Adds a product to the cart or merges into the existing line,
    /// clamping the resulting quantity to live stock.
    ///
    /// Products with variants require an option selection; products
    /// without reject one.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        option_name: Option<&str>,
        option_value: Option<&str>,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_available)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let has_variants = product
            .find_related(product_variant::Entity)
            .one(&*self.db)
            .await?
            .is_some();

        let (option_name, option_value) = match (has_variants, option_name, option_value) {
            (true, Some(name), Some(value)) => (Some(name), Some(value)),
            (true, _, _) => {
                return Err(ServiceError::ValidationError(
                    "This product requires a variant selection".to_string(),
                ))
            }
            (false, None, None) => (None, None),
            (false, _, _) => {
                return Err(ServiceError::ValidationError(
                    "This product has no variants".to_string(),
                ))
            }
        };

        let max_stock = inventory::sellable_quantity(
            &*self.db,
            &inventory::StockLine {
                product: &product,
                option_name,
                option_value,
            },
        )
        .await?;
        if max_stock <= 0 {
            return Err(ServiceError::ValidationError(
                "Product is out of stock".to_string(),
            ));
        }

        let variant_key = cart_item::Model::variant_key_for(option_name, option_value);
        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(cart_item::Column::VariantKey.eq(variant_key.clone()))
            .one(&*self.db)
            .await?;

        let saved = if let Some(item) = existing {
            let merged = (item.quantity + quantity).min(max_stock);
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(merged);
            active.update(&*self.db).await?
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                customer_id: Set(customer_id),
                product_id: Set(product_id),
                quantity: Set(quantity.min(max_stock)),
                option_name: Set(option_name.map(str::to_string)),
                option_value: Set(option_value.map(str::to_string)),
                variant_key: Set(variant_key),
            }
            .insert(&*self.db)
            .await?
        };

        info!(
            "Cart {}: product {} x{}",
            customer_id, product_id, saved.quantity
        );
        Ok(saved)
    }

    /// Sets a line's quantity, clamped to live stock. Zero removes the
    /// line; a line whose backing stock has vanished is removed as well.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        let item = cart_item::Entity::find_by_id(item_id)
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if quantity <= 0 {
            item.delete(&*self.db).await?;
            return Ok(None);
        }

        let product = product::Entity::find_by_id(item.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;

        let max_stock = inventory::sellable_quantity(
            &*self.db,
            &inventory::StockLine {
                product: &product,
                option_name: item.option_name.as_deref(),
                option_value: item.option_value.as_deref(),
            },
        )
        .await?;
        if max_stock <= 0 {
            item.delete(&*self.db).await?;
            return Err(ServiceError::ValidationError(
                "Product is out of stock".to_string(),
            ));
        }

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity.min(max_stock));
        Ok(Some(active.update(&*self.db).await?))
    }

    /// Removes every line in the customer's cart.
    pub async fn clear(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
