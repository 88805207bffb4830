//! Order placement, status transitions and deletion.

mod commands;
mod service;

pub use commands::{OrderLineRequest, PlaceOrder};
pub use service::{OrderDetails, OrderLineDetails, OrderService};
