pub mod bonus_transaction;
pub mod cart_item;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod promo_code;
pub mod store_settings;

pub use bonus_transaction::Entity as BonusTransaction;
pub use cart_item::Entity as CartItem;
pub use customer::Entity as Customer;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use promo_code::Entity as PromoCode;
pub use store_settings::Entity as StoreSettings;
