//! HTTP route handlers.

pub mod basket;
pub mod health;
pub mod menu;
pub mod metrics;
pub mod orders;
