//! Persisted records.

use chrono::{DateTime, Utc};
use common::{
    BasketEntryId, BasketId, MenuItemId, Money, OrderId, OrderLineId, OrderStatus, UserId,
};

/// A catalog entry with its tracked stock.
///
/// `stock_quantity` never goes below zero; stock only moves through admin
/// edits and reservations made while placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub available: bool,
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuItem {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub available: bool,
}

/// Partial update of a catalog entry. Only these fields are editable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<i32>,
    pub available: Option<bool>,
}

impl MenuItemPatch {
    /// Returns true if the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
            && self.available.is_none()
    }

    /// Applies the set fields to `item`.
    pub fn apply_to(&self, item: &mut MenuItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(stock_quantity) = self.stock_quantity {
            item.stock_quantity = stock_quantity;
        }
        if let Some(available) = self.available {
            item.available = available;
        }
    }
}

/// A placed order with its line snapshots.
///
/// Immutable after creation except for `status` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_price: Money,
    pub lines: Vec<OrderLine>,
}

/// Quantity and cost of one item, frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub item_id: MenuItemId,
    pub quantity: i32,
    pub line_cost: Money,
}

/// An order ready to be written; ids are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total_price: Money,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub item_id: MenuItemId,
    pub quantity: i32,
    pub line_cost: Money,
}

/// A user's pending selections. At most one per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    pub id: BasketId,
    pub user_id: UserId,
    pub entries: Vec<BasketEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketEntry {
    pub id: BasketEntryId,
    pub item_id: MenuItemId,
    pub quantity: i32,
}
