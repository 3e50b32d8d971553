mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use storefront_api::{
    entities::{
        cart_item, order,
        order::{DeliveryType, OrderStatus},
        promo_code::DiscountKind,
        store_settings::{CheckoutMode, SpendLimitType},
    },
    errors::ServiceError,
    services::checkout::{CheckoutOutcome, CreateOrderInput},
};

fn delivery_input() -> CreateOrderInput {
    CreateOrderInput {
        delivery_type: DeliveryType::Delivery,
        customer_name: "Ada".to_string(),
        customer_phone: "+1000000".to_string(),
        address: Some("1 Main St".to_string()),
        delivery_service: None,
        promo_code: None,
        bonus_to_use: None,
    }
}

#[tokio::test]
async fn checkout_settles_cart_with_promo_and_bonus() {
    let app = TestApp::new().await;
    app.configure_settings(|s| {
        s.delivery_cost = dec!(200);
        s.bonus_enabled = true;
        s.bonus_welcome_enabled = true;
        s.bonus_welcome_amount = dec!(500);
        s.bonus_spend_enabled = true;
        s.bonus_spend_limit_type = SpendLimitType::Percent;
        s.bonus_spend_limit_value = dec!(20);
    })
    .await;

    let product = app.seed_product("Lamp", dec!(1000), 10).await;
    let promo = app.seed_promo("SAVE100", DiscountKind::Fixed, dec!(100)).await;
    let customer = app.customer("u-1").await;
    assert_eq!(customer.bonus_balance, dec!(500));
    app.add_to_cart(customer.id, product.id, 1).await;

    let mut input = delivery_input();
    input.promo_code = Some("SAVE100".to_string());
    input.bonus_to_use = Some(dec!(1000));

    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, input)
        .await
        .unwrap();
    let (order, items) = match outcome {
        CheckoutOutcome::Completed { order, items } => (order, items),
        CheckoutOutcome::Conflict { .. } => panic!("expected completed checkout"),
    };

    // 1000 subtotal - 100 promo - 180 bonus (20% of 900) + 200 delivery
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.discount, dec!(100));
    assert_eq!(order.bonus_used, dec!(180));
    assert_eq!(order.delivery_fee, dec!(200));
    assert_eq!(order.total, dec!(920));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].price_at_order, dec!(1000.00));

    // Side effects landed in the same transaction.
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 9);
    assert_eq!(app.reload_promo(promo.id).await.used_count, 1);
    assert_eq!(app.balance(customer.id).await, dec!(320));

    let cart_left = cart_item::Entity::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .all(app.db())
        .await
        .unwrap();
    assert!(cart_left.is_empty());

    // Ledger matches the cached balance.
    let ledger_sum: Decimal = app
        .ledger(customer.id)
        .await
        .iter()
        .map(|t| t.amount)
        .sum();
    assert_eq!(ledger_sum, app.balance(customer.id).await);
}

#[tokio::test]
async fn stale_cart_returns_conflict_and_persists_corrections() {
    let app = TestApp::new().await;
    let product = app.seed_product("Chair", dec!(50), 5).await;
    let gone = app.seed_product("Table", dec!(200), 3).await;
    let customer = app.customer("u-2").await;
    let line = app.add_to_cart(customer.id, product.id, 5).await;
    app.add_to_cart(customer.id, gone.id, 1).await;

    // Stock moved under the cart.
    let mut shrink: storefront_api::entities::product::ActiveModel =
        app.reload_product(product.id).await.into();
    shrink.stock_quantity = Set(2);
    shrink.update(app.db()).await.unwrap();
    let mut vanish: storefront_api::entities::product::ActiveModel =
        app.reload_product(gone.id).await.into();
    vanish.stock_quantity = Set(0);
    vanish.is_available = Set(false);
    vanish.update(app.db()).await.unwrap();

    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap();
    let (removed, adjusted) = match outcome {
        CheckoutOutcome::Conflict { removed, adjusted } => (removed, adjusted),
        CheckoutOutcome::Completed { .. } => panic!("expected conflict"),
    };
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].product_id, gone.id);
    assert_eq!(adjusted.len(), 1);
    assert_eq!(adjusted[0].new_quantity, Some(2));

    // No order was created; the cart now reflects reality.
    let orders = order::Entity::find().all(app.db()).await.unwrap();
    assert!(orders.is_empty());
    let corrected = cart_item::Entity::find_by_id(line.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(corrected.quantity, 2);
    let remaining = cart_item::Entity::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);

    // A retry against the corrected cart succeeds.
    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.customer("u-3").await;

    let err = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn delivery_order_requires_address() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", dec!(10), 5).await;
    let customer = app.customer("u-4").await;
    app.add_to_cart(customer.id, product.id, 1).await;

    let mut input = delivery_input();
    input.address = None;
    let err = app
        .state
        .services
        .checkout
        .create_order(&customer, input)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // The failed attempt touched neither the cart nor the stock.
    let cart = cart_item::Entity::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 1);
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 5);
}

#[tokio::test]
async fn full_mode_requires_delivery_service() {
    let app = TestApp::new().await;
    app.configure_settings(|s| s.checkout_mode = CheckoutMode::Full)
        .await;
    let product = app.seed_product("Mug", dec!(10), 5).await;
    let customer = app.customer("u-5").await;
    app.add_to_cart(customer.id, product.id, 1).await;

    let err = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let mut input = delivery_input();
    input.delivery_service = Some("courier".to_string());
    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, input)
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));
}

#[tokio::test]
async fn disabled_delivery_method_is_rejected() {
    let app = TestApp::new().await;
    app.configure_settings(|s| s.delivery_enabled = false).await;
    let product = app.seed_product("Mug", dec!(10), 5).await;
    let customer = app.customer("u-9").await;
    app.add_to_cart(customer.id, product.id, 1).await;

    let err = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn subtotal_below_minimum_is_rejected() {
    let app = TestApp::new().await;
    app.configure_settings(|s| s.min_order_amount_delivery = dec!(100))
        .await;
    let product = app.seed_product("Pen", dec!(10), 5).await;
    let customer = app.customer("u-6").await;
    app.add_to_cart(customer.id, product.id, 2).await;

    let err = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Pickup has its own (zero) minimum, so the same cart settles there.
    let mut input = delivery_input();
    input.delivery_type = DeliveryType::Pickup;
    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, input)
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));
}

#[tokio::test]
async fn product_stock_hits_zero_and_flips_availability() {
    let app = TestApp::new().await;
    let product = app.seed_product("Last one", dec!(30), 2).await;
    let customer = app.customer("u-7").await;
    app.add_to_cart(customer.id, product.id, 2).await;

    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));

    let after = app.reload_product(product.id).await;
    assert_eq!(after.stock_quantity, 0);
    assert!(!after.is_available);
}

#[tokio::test]
async fn variant_line_decrements_variant_stock_only() {
    let app = TestApp::new().await;
    let product = app.seed_product("Shirt", dec!(40), 0).await;
    let variant = app.seed_variant(product.id, "size", "M", 4).await;
    let customer = app.customer("u-8").await;
    app.state
        .services
        .carts
        .add_item(customer.id, product.id, 3, Some("size"), Some("M"))
        .await
        .unwrap();

    let outcome = app
        .state
        .services
        .checkout
        .create_order(&customer, delivery_input())
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));

    let after_variant = storefront_api::entities::product_variant::Entity::find_by_id(variant.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_variant.quantity, 1);
    // The product row itself is untouched and stays listed.
    let after_product = app.reload_product(product.id).await;
    assert_eq!(after_product.stock_quantity, 0);
    assert!(after_product.is_available);
}
