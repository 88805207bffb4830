//! Basket aggregator: per-user pending selections.
//!
//! A basket is a wish list. Nothing here touches stock; availability is only
//! checked when the basket is checked out through the order service.

mod service;

pub use service::BasketService;

use common::{BasketId, MenuItemId, Money};

use crate::error::{DomainError, Result};

/// One `(item, quantity)` pair to append to a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasketLineRequest {
    pub item_id: MenuItemId,
    pub quantity: i32,
}

impl BasketLineRequest {
    pub fn new(item_id: MenuItemId, quantity: i32) -> Self {
        Self { item_id, quantity }
    }
}

/// Command to add items to the caller's basket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddToBasket {
    pub items: Vec<BasketLineRequest>,
}

impl AddToBasket {
    pub fn new(items: Vec<BasketLineRequest>) -> Self {
        Self { items }
    }

    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(DomainError::InvalidRequest(
                "no items to add to basket".to_string(),
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

/// A basket entry priced at the item's current catalog price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketLine {
    pub item_id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub quantity: i32,
    pub total_price: Money,
}

/// The caller's basket as it would cost right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketView {
    /// `0` when the user has no basket.
    pub basket_id: BasketId,
    pub items: Vec<BasketLine>,
    pub total_price: Money,
}

impl BasketView {
    /// The view of a user who has never added anything.
    pub fn empty() -> Self {
        Self {
            basket_id: BasketId::new(0),
            items: Vec::new(),
            total_price: Money::zero(),
        }
    }
}
