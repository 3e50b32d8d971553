//! Storefront settlement engine: carts, promo codes, bonus points and
//! the checkout path that turns a cart into an immutable order.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;

pub use handlers::{AppServices, AppState};
