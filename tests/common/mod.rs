#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db,
    entities::{
        bonus_transaction, cart_item, customer, product, product_variant,
        promo_code::{self, DiscountKind},
        store_settings,
    },
    events,
    AppState,
};

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // One pooled connection so every handle sees the same in-memory DB.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_token = Some("test_admin_token_0123456789".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, Arc::new(event_sender));
        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    /// Mutates the settings singleton through a closure.
    pub async fn configure_settings<F>(&self, mutate: F) -> store_settings::Model
    where
        F: FnOnce(&mut store_settings::Model),
    {
        let mut settings = storefront_api::services::settings::load_or_default(self.db())
            .await
            .expect("failed to load settings");
        mutate(&mut settings);

        store_settings::Entity::delete_many()
            .exec(self.db())
            .await
            .expect("failed to clear settings");
        let active: store_settings::ActiveModel = settings.clone().into_active_model_all();
        active.insert(self.db()).await.expect("failed to save settings")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            is_available: Set(true),
            stock_quantity: Set(stock),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        option_name: &str,
        option_value: &str,
        quantity: i32,
    ) -> product_variant::Model {
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            option_name: Set(option_name.to_string()),
            option_value: Set(option_value.to_string()),
            quantity: Set(quantity),
        }
        .insert(self.db())
        .await
        .expect("failed to seed variant")
    }

    pub async fn seed_promo(
        &self,
        code: &str,
        kind: DiscountKind,
        value: Decimal,
    ) -> promo_code::Model {
        promo_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            discount_kind: Set(kind),
            discount_value: Set(value),
            first_order_only: Set(false),
            min_order_amount: Set(Decimal::ZERO),
            max_uses: Set(None),
            used_count: Set(0),
            valid_from: Set(None),
            valid_until: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed promo code")
    }

    /// Provisions a customer through the real service path (welcome bonus
    /// included when enabled).
    pub async fn customer(&self, external_id: &str) -> customer::Model {
        self.state
            .services
            .customers
            .provision(external_id, Some("tester"))
            .await
            .expect("failed to provision customer")
    }

    pub async fn add_to_cart(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        self.state
            .services
            .carts
            .add_item(customer_id, product_id, quantity, None, None)
            .await
            .expect("failed to add cart item")
    }

    pub async fn balance(&self, customer_id: Uuid) -> Decimal {
        customer::Entity::find_by_id(customer_id)
            .one(self.db())
            .await
            .expect("failed to read customer")
            .expect("customer missing")
            .bonus_balance
    }

    pub async fn ledger(&self, customer_id: Uuid) -> Vec<bonus_transaction::Model> {
        bonus_transaction::Entity::find()
            .filter(bonus_transaction::Column::CustomerId.eq(customer_id))
            .all(self.db())
            .await
            .expect("failed to read ledger")
    }

    pub async fn reload_product(&self, product_id: Uuid) -> product::Model {
        product::Entity::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("failed to read product")
            .expect("product missing")
    }

    pub async fn reload_promo(&self, promo_id: Uuid) -> promo_code::Model {
        promo_code::Entity::find_by_id(promo_id)
            .one(self.db())
            .await
            .expect("failed to read promo code")
            .expect("promo missing")
    }
}

trait IntoActiveModelAll {
    fn into_active_model_all(self) -> store_settings::ActiveModel;
}

impl IntoActiveModelAll for store_settings::Model {
    fn into_active_model_all(self) -> store_settings::ActiveModel {
        store_settings::ActiveModel {
            id: Set(self.id),
            currency: Set(self.currency),
            checkout_mode: Set(self.checkout_mode),
            delivery_enabled: Set(self.delivery_enabled),
            pickup_enabled: Set(self.pickup_enabled),
            promo_enabled: Set(self.promo_enabled),
            delivery_cost: Set(self.delivery_cost),
            free_delivery_min_amount: Set(self.free_delivery_min_amount),
            min_order_amount_pickup: Set(self.min_order_amount_pickup),
            min_order_amount_delivery: Set(self.min_order_amount_delivery),
            bonus_enabled: Set(self.bonus_enabled),
            bonus_welcome_enabled: Set(self.bonus_welcome_enabled),
            bonus_welcome_amount: Set(self.bonus_welcome_amount),
            bonus_purchase_enabled: Set(self.bonus_purchase_enabled),
            bonus_purchase_percent: Set(self.bonus_purchase_percent),
            bonus_spend_enabled: Set(self.bonus_spend_enabled),
            bonus_spend_limit_type: Set(self.bonus_spend_limit_type),
            bonus_spend_limit_value: Set(self.bonus_spend_limit_value),
        }
    }
}
