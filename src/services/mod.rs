pub mod bonus;
pub mod carts;
pub mod checkout;
pub mod customers;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod pricing;
pub mod promo;
pub mod settings;
