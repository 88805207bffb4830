//! Domain layer for the canteen ordering backend.
//!
//! This crate holds the rules that protect the system's invariants:
//! - Inventory ledger: stock reservation inside the caller's transaction
//! - Order transaction engine: all-or-nothing order placement
//! - Order status state machine, gated by caller role
//! - Order deletion guard
//! - Basket aggregator with live pricing
//! - Typed menu administration
//!
//! Every service takes an injected [`store::Store`] and runs each operation
//! in exactly one storage transaction.

pub mod basket;
pub mod error;
pub mod inventory;
pub mod menu;
pub mod order;

pub use basket::{AddToBasket, BasketLine, BasketLineRequest, BasketService, BasketView};
pub use error::{DomainError, ErrorKind, Result};
pub use menu::MenuService;
pub use order::{OrderDetails, OrderLineDetails, OrderLineRequest, OrderService, PlaceOrder};
