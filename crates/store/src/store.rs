use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BasketId, MenuItemId, OrderId, OrderStatus, UserId};

use crate::{
    Basket, BasketEntry, MenuItem, MenuItemPatch, NewMenuItem, NewOrder, Order, Result,
};

/// Entry point to storage.
///
/// A store is a cheap, cloneable handle created once at start-up and passed
/// into every service. All reads and writes go through a transaction.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// The transaction type handed out by [`Store::begin`].
    type Transaction: StoreTransaction;

    /// Opens a new transaction.
    ///
    /// Nothing written through the transaction is visible to others until
    /// [`StoreTransaction::commit`] succeeds. Dropping it uncommitted rolls
    /// every change back.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// An open storage transaction.
///
/// Implementations must run with at least read-committed isolation, and the
/// `*_for_update` reads must hold the row until the transaction ends so two
/// transactions can never both act on the same stale stock count.
#[async_trait]
pub trait StoreTransaction: Send {
    // -- Menu --

    /// Lists every catalog entry, ordered by id.
    async fn list_menu_items(&mut self) -> Result<Vec<MenuItem>>;

    /// Reads a catalog entry without locking it.
    async fn menu_item(&mut self, id: MenuItemId) -> Result<Option<MenuItem>>;

    /// Locks the given catalog rows in ascending id order.
    ///
    /// Ids that do not exist are skipped. Locking everything up front in a
    /// fixed order keeps concurrent checkouts from deadlocking each other.
    async fn lock_menu_items(&mut self, ids: &[MenuItemId]) -> Result<()>;

    /// Reads a catalog entry and locks it until the transaction ends.
    async fn menu_item_for_update(&mut self, id: MenuItemId) -> Result<Option<MenuItem>>;

    /// Overwrites the stock count of a catalog entry.
    async fn set_stock(&mut self, id: MenuItemId, stock_quantity: i32) -> Result<()>;

    async fn insert_menu_item(&mut self, item: NewMenuItem) -> Result<MenuItem>;

    /// Applies a patch, returning the updated entry or `None` if it does not exist.
    async fn update_menu_item(
        &mut self,
        id: MenuItemId,
        patch: &MenuItemPatch,
    ) -> Result<Option<MenuItem>>;

    /// Deletes a catalog entry and any basket entries pointing at it.
    ///
    /// Returns `false` if it did not exist, and fails with
    /// [`StoreError::ForeignKeyViolation`](crate::StoreError::ForeignKeyViolation)
    /// while any order line references it.
    async fn delete_menu_item(&mut self, id: MenuItemId) -> Result<bool>;

    // -- Orders --

    /// Writes an order and its lines, returning it with assigned ids.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads an order and locks it until the transaction ends.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, ordered by id.
    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Deletes an order together with its lines.
    async fn delete_order(&mut self, id: OrderId) -> Result<()>;

    // -- Baskets --

    async fn basket_for_user(&mut self, user_id: UserId) -> Result<Option<Basket>>;

    /// Reads the user's basket and locks it until the transaction ends.
    ///
    /// Use this before consuming or deleting a basket so a concurrent
    /// checkout or add waits for this transaction instead of acting on
    /// entries it has already read.
    async fn basket_for_user_for_update(&mut self, user_id: UserId) -> Result<Option<Basket>>;

    /// Returns the user's basket, creating an empty one if there is none.
    ///
    /// The basket row stays locked until the transaction ends.
    async fn basket_for_user_or_create(&mut self, user_id: UserId) -> Result<Basket>;

    async fn add_basket_entry(
        &mut self,
        basket_id: BasketId,
        item_id: MenuItemId,
        quantity: i32,
    ) -> Result<BasketEntry>;

    /// Deletes a basket together with all its entries.
    ///
    /// Returns `false` if the basket was already gone.
    async fn delete_basket(&mut self, basket_id: BasketId) -> Result<bool>;

    /// Makes every change in the transaction durable and visible.
    async fn commit(self) -> Result<()>;
}
