//! Shared types for the canteen ordering backend.
//!
//! Everything here is plain data: identifiers, exact money amounts, the
//! order status enum with its transition table, and the caller identity
//! handed to the core by the identity provider.

pub mod identity;
pub mod money;
pub mod status;
pub mod types;

pub use identity::{Caller, Role, RoleParseError};
pub use money::Money;
pub use status::{OrderStatus, StatusParseError};
pub use types::{BasketEntryId, BasketId, MenuItemId, OrderId, OrderLineId, UserId};
