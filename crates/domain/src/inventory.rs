//! Inventory ledger: stock reservation.

use common::{MenuItemId, Money};
use store::StoreTransaction;

use crate::error::{DomainError, Result};

/// Reserves `quantity` units of an item inside the caller's transaction.
///
/// Reads the item with a row lock, checks it can be sold, decrements its
/// stock and returns the unit price in effect right now, which the caller
/// snapshots into the order line. Nothing is visible outside `tx` until it
/// commits, and dropping `tx` undoes the decrement.
pub async fn reserve<T: StoreTransaction>(
    tx: &mut T,
    item_id: MenuItemId,
    quantity: i32,
) -> Result<Money> {
    if quantity <= 0 {
        return Err(DomainError::InvalidRequest(format!(
            "quantity for item {item_id} must be greater than 0, got {quantity}"
        )));
    }

    let item = tx
        .menu_item_for_update(item_id)
        .await?
        .ok_or_else(|| DomainError::menu_item_not_found(item_id))?;

    if !item.available {
        return Err(DomainError::ItemUnavailable { item_id });
    }

    if item.stock_quantity < quantity {
        return Err(DomainError::InsufficientStock {
            item_id,
            requested: quantity,
            available: item.stock_quantity,
        });
    }

    tx.set_stock(item_id, item.stock_quantity - quantity)
        .await?;

    tracing::debug!(
        %item_id,
        quantity,
        remaining = item.stock_quantity - quantity,
        "stock reserved"
    );

    Ok(item.price)
}
