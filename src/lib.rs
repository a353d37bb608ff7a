// eshop - session-based storefront
// Catalog, basket, accounts, checkout with PayPal, and order history

pub mod basket;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod mail;
pub mod messages;
pub mod money;
pub mod observability;
pub mod orders;
pub mod paypal;
pub mod security;
pub mod session;
pub mod signals;
pub mod state;
pub mod users;

pub use error::{ShopError, ShopResult};
pub use state::AppState;
