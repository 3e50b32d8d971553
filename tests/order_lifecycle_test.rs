mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use storefront_api::{
    entities::{
        bonus_transaction::BonusKind,
        order::{self, DeliveryType, OrderStatus},
        store_settings::SpendLimitType,
    },
    errors::ServiceError,
    services::checkout::{CheckoutOutcome, CreateOrderInput},
};

fn pickup_input(bonus_to_use: Option<Decimal>) -> CreateOrderInput {
    CreateOrderInput {
        delivery_type: DeliveryType::Pickup,
        customer_name: "Ada".to_string(),
        customer_phone: "+1000000".to_string(),
        address: None,
        delivery_service: None,
        promo_code: None,
        bonus_to_use,
    }
}

async fn place_order(
    app: &TestApp,
    customer: &storefront_api::entities::customer::Model,
    bonus_to_use: Option<Decimal>,
) -> order::Model {
    match app
        .state
        .services
        .checkout
        .create_order(customer, pickup_input(bonus_to_use))
        .await
        .unwrap()
    {
        CheckoutOutcome::Completed { order, .. } => order,
        CheckoutOutcome::Conflict { .. } => panic!("unexpected conflict"),
    }
}

#[tokio::test]
async fn completing_an_order_accrues_purchase_bonus() {
    let app = TestApp::new().await;
    app.configure_settings(|s| {
        s.bonus_enabled = true;
        s.bonus_purchase_enabled = true;
        s.bonus_purchase_percent = dec!(5);
    })
    .await;
    let product = app.seed_product("Desk", dec!(1000), 3).await;
    let customer = app.customer("u-1").await;
    app.add_to_cart(customer.id, product.id, 1).await;
    let order = place_order(&app, &customer, None).await;

    let updated = app
        .state
        .services
        .orders
        .update_status(order.id, "done", None)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Done);
    assert_eq!(app.balance(customer.id).await, dec!(50.00));

    let ledger = app.ledger(customer.id).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, BonusKind::Purchase);
    assert_eq!(ledger[0].order_id, Some(order.id));
}

#[tokio::test]
async fn cancel_refund_and_redo_nets_to_zero() {
    let app = TestApp::new().await;
    app.configure_settings(|s| {
        s.bonus_enabled = true;
        s.bonus_welcome_enabled = true;
        s.bonus_welcome_amount = dec!(300);
        s.bonus_spend_enabled = true;
        s.bonus_spend_limit_type = SpendLimitType::Fixed;
        s.bonus_spend_limit_value = dec!(200);
    })
    .await;
    let product = app.seed_product("Desk", dec!(1000), 3).await;
    let customer = app.customer("u-2").await;
    app.add_to_cart(customer.id, product.id, 1).await;

    // Redeems min(250, 300, 200) = 200 points.
    let order = place_order(&app, &customer, Some(dec!(250))).await;
    assert_eq!(order.bonus_used, dec!(200));
    assert_eq!(app.balance(customer.id).await, dec!(100));

    // Cancel refunds the redemption.
    app.state
        .services
        .orders
        .update_status(order.id, "cancelled", None)
        .await
        .unwrap();
    assert_eq!(app.balance(customer.id).await, dec!(300));

    // Honoring the cancelled order re-debits it; accrual is skipped
    // because the order redeemed points.
    app.state
        .services
        .orders
        .update_status(order.id, "done", None)
        .await
        .unwrap();
    assert_eq!(app.balance(customer.id).await, dec!(100));

    // welcome +300, spend -200, refund +200, spend -200
    let ledger = app.ledger(customer.id).await;
    assert_eq!(ledger.len(), 4);
    let sum: Decimal = ledger.iter().map(|t| t.amount).sum();
    assert_eq!(sum, app.balance(customer.id).await);
}

#[tokio::test]
async fn cancelling_does_not_restock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Desk", dec!(100), 5).await;
    let customer = app.customer("u-3").await;
    app.add_to_cart(customer.id, product.id, 2).await;
    let order = place_order(&app, &customer, None).await;
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 3);

    app.state
        .services
        .orders
        .update_status(order.id, "cancelled", None)
        .await
        .unwrap();
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 3);
}

#[tokio::test]
async fn unknown_status_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let product = app.seed_product("Desk", dec!(100), 5).await;
    let customer = app.customer("u-4").await;
    app.add_to_cart(customer.id, product.id, 1).await;
    let order = place_order(&app, &customer, None).await;

    let err = app
        .state
        .services
        .orders
        .update_status(order.id, "shipped", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));

    let (unchanged, _) = app
        .state
        .services
        .orders
        .get_for_customer(customer.id, order.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, OrderStatus::New);
    assert!(app.ledger(customer.id).await.is_empty());
}

#[tokio::test]
async fn canceled_spelling_is_accepted_and_tracking_is_stored() {
    let app = TestApp::new().await;
    let product = app.seed_product("Desk", dec!(100), 5).await;
    let customer = app.customer("u-5").await;
    app.add_to_cart(customer.id, product.id, 1).await;
    let order = place_order(&app, &customer, None).await;

    let updated = app
        .state
        .services
        .orders
        .update_status(order.id, "paid", Some("TRK-1".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Paid);
    assert_eq!(updated.tracking_number.as_deref(), Some("TRK-1"));

    let updated = app
        .state
        .services
        .orders
        .update_status(order.id, "canceled", None)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);
    // Tracking survives a later status change.
    assert_eq!(updated.tracking_number.as_deref(), Some("TRK-1"));
}

#[tokio::test]
async fn repeated_done_does_not_accrue_twice() {
    let app = TestApp::new().await;
    app.configure_settings(|s| {
        s.bonus_enabled = true;
        s.bonus_purchase_enabled = true;
        s.bonus_purchase_percent = dec!(10);
    })
    .await;
    let product = app.seed_product("Desk", dec!(500), 5).await;
    let customer = app.customer("u-6").await;
    app.add_to_cart(customer.id, product.id, 1).await;
    let order = place_order(&app, &customer, None).await;

    app.state
        .services
        .orders
        .update_status(order.id, "done", None)
        .await
        .unwrap();
    app.state
        .services
        .orders
        .update_status(order.id, "done", None)
        .await
        .unwrap();
    assert_eq!(app.balance(customer.id).await, dec!(50.00));
}

#[tokio::test]
async fn welcome_bonus_is_granted_once() {
    let app = TestApp::new().await;
    app.configure_settings(|s| {
        s.bonus_enabled = true;
        s.bonus_welcome_enabled = true;
        s.bonus_welcome_amount = dec!(100);
    })
    .await;

    let first = app.customer("repeat-visitor").await;
    assert_eq!(first.bonus_balance, dec!(100));
    let second = app.customer("repeat-visitor").await;
    assert_eq!(second.id, first.id);
    assert_eq!(second.bonus_balance, dec!(100));
    assert_eq!(app.ledger(first.id).await.len(), 1);
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("Desk", dec!(100), 5).await;
    let alice = app.customer("alice").await;
    let bob = app.customer("bob").await;
    app.add_to_cart(alice.id, product.id, 1).await;
    let order = place_order(&app, &alice, None).await;

    let err = app
        .state
        .services
        .orders
        .get_for_customer(bob.id, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(app
        .state
        .services
        .orders
        .list_for_customer(bob.id)
        .await
        .unwrap()
        .is_empty());
}
