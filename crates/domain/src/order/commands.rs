//! Order commands.

use common::MenuItemId;

use crate::error::{DomainError, Result};

/// One requested `(item, quantity)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLineRequest {
    /// The menu item to order.
    pub item_id: MenuItemId,

    /// Units to order; must be greater than zero.
    pub quantity: i32,
}

impl OrderLineRequest {
    pub fn new(item_id: MenuItemId, quantity: i32) -> Self {
        Self { item_id, quantity }
    }
}

/// Command to place an order.
///
/// Lines are processed in the given order, and the first failing line
/// aborts the whole order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceOrder {
    pub items: Vec<OrderLineRequest>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(items: Vec<OrderLineRequest>) -> Self {
        Self { items }
    }

    /// Builds a command from `(item id, quantity)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i32)>) -> Self {
        Self {
            items: pairs
                .into_iter()
                .map(|(item_id, quantity)| {
                    OrderLineRequest::new(MenuItemId::new(item_id), quantity)
                })
                .collect(),
        }
    }

    /// Rejects an empty order or any non-positive quantity.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(DomainError::InvalidRequest(
                "order must contain at least one item".to_string(),
            ));
        }

        if let Some(line) = self.items.iter().find(|line| line.quantity <= 0) {
            return Err(DomainError::InvalidRequest(format!(
                "quantity for item {} must be greater than 0, got {}",
                line.item_id, line.quantity
            )));
        }

        Ok(())
    }
}
