use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BasketEntryId, BasketId, MenuItemId, OrderId, OrderLineId, OrderStatus, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Basket, BasketEntry, MenuItem, MenuItemPatch, NewMenuItem, NewOrder, Order, OrderLine,
    Result, StoreError,
    store::{Store, StoreTransaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    menu: BTreeMap<MenuItemId, MenuItem>,
    orders: BTreeMap<OrderId, Order>,
    baskets: BTreeMap<BasketId, Basket>,
    last_menu_id: i64,
    last_order_id: i64,
    last_line_id: i64,
    last_basket_id: i64,
    last_entry_id: i64,
}

/// In-memory store implementation for testing and local runs.
///
/// Transactions are serialised: [`Store::begin`] takes an exclusive lock on
/// the data and works on a private copy, which replaces the shared data on
/// commit. Concurrent checkouts therefore behave as if every row they read
/// were locked, exactly like the row-locking PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_on_order_insert: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent order insert to fail.
    pub fn set_fail_on_order_insert(&self, fail: bool) {
        self.fail_on_order_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the committed stock of a menu item.
    pub async fn stock_of(&self, id: MenuItemId) -> Option<i32> {
        self.tables
            .lock()
            .await
            .menu
            .get(&id)
            .map(|item| item.stock_quantity)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_on_order_insert: self.fail_on_order_insert.load(Ordering::SeqCst),
        })
    }
}

/// A transaction over an [`InMemoryStore`].
///
/// Holds the store lock for its whole lifetime. Dropping it without
/// committing discards the private copy.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_on_order_insert: bool,
}

impl InMemoryTransaction {
    fn basket_mut(&mut self, id: BasketId) -> Option<&mut Basket> {
        self.working.baskets.get_mut(&id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn list_menu_items(&mut self) -> Result<Vec<MenuItem>> {
        Ok(self.working.menu.values().cloned().collect())
    }

    async fn menu_item(&mut self, id: MenuItemId) -> Result<Option<MenuItem>> {
        Ok(self.working.menu.get(&id).cloned())
    }

    async fn lock_menu_items(&mut self, _ids: &[MenuItemId]) -> Result<()> {
        // The whole store is already locked.
        Ok(())
    }

    async fn menu_item_for_update(&mut self, id: MenuItemId) -> Result<Option<MenuItem>> {
        Ok(self.working.menu.get(&id).cloned())
    }

    async fn set_stock(&mut self, id: MenuItemId, stock_quantity: i32) -> Result<()> {
        if let Some(item) = self.working.menu.get_mut(&id) {
            item.stock_quantity = stock_quantity;
        }
        Ok(())
    }

    async fn insert_menu_item(&mut self, item: NewMenuItem) -> Result<MenuItem> {
        self.working.last_menu_id += 1;
        let id = MenuItemId::new(self.working.last_menu_id);
        let item = MenuItem {
            id,
            name: item.name,
            description: item.description,
            price: item.price,
            stock_quantity: item.stock_quantity,
            available: item.available,
        };
        self.working.menu.insert(id, item.clone());
        Ok(item)
    }

    async fn update_menu_item(
        &mut self,
        id: MenuItemId,
        patch: &MenuItemPatch,
    ) -> Result<Option<MenuItem>> {
        Ok(self.working.menu.get_mut(&id).map(|item| {
            patch.apply_to(item);
            item.clone()
        }))
    }

    async fn delete_menu_item(&mut self, id: MenuItemId) -> Result<bool> {
        if !self.working.menu.contains_key(&id) {
            return Ok(false);
        }

        let referenced = self
            .working
            .orders
            .values()
            .flat_map(|order| order.lines.iter())
            .any(|line| line.item_id == id);
        if referenced {
            return Err(StoreError::ForeignKeyViolation(format!(
                "menu item {id} is referenced by order lines"
            )));
        }

        for basket in self.working.baskets.values_mut() {
            basket.entries.retain(|entry| entry.item_id != id);
        }
        self.working.menu.remove(&id);
        Ok(true)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        if self.fail_on_order_insert {
            return Err(StoreError::Unavailable("order insert rejected".to_string()));
        }

        self.working.last_order_id += 1;
        let order_id = OrderId::new(self.working.last_order_id);

        let mut lines = Vec::with_capacity(order.lines.len());
        for line in order.lines {
            self.working.last_line_id += 1;
            lines.push(OrderLine {
                id: OrderLineId::new(self.working.last_line_id),
                order_id,
                item_id: line.item_id,
                quantity: line.quantity,
                line_cost: line.line_cost,
            });
        }

        let order = Order {
            id: order_id,
            user_id: order.user_id,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.created_at,
            total_price: order.total_price,
            lines,
        };
        self.working.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(order) = self.working.orders.get_mut(&id) {
            order.status = status;
            order.updated_at = updated_at;
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<()> {
        self.working.orders.remove(&id);
        Ok(())
    }

    async fn basket_for_user(&mut self, user_id: UserId) -> Result<Option<Basket>> {
        Ok(self
            .working
            .baskets
            .values()
            .find(|basket| basket.user_id == user_id)
            .cloned())
    }

    async fn basket_for_user_for_update(&mut self, user_id: UserId) -> Result<Option<Basket>> {
        self.basket_for_user(user_id).await
    }

    async fn basket_for_user_or_create(&mut self, user_id: UserId) -> Result<Basket> {
        if let Some(basket) = self.basket_for_user(user_id).await? {
            return Ok(basket);
        }

        self.working.last_basket_id += 1;
        let basket = Basket {
            id: BasketId::new(self.working.last_basket_id),
            user_id,
            entries: Vec::new(),
        };
        self.working.baskets.insert(basket.id, basket.clone());
        Ok(basket)
    }

    async fn add_basket_entry(
        &mut self,
        basket_id: BasketId,
        item_id: MenuItemId,
        quantity: i32,
    ) -> Result<BasketEntry> {
        self.working.last_entry_id += 1;
        let entry = BasketEntry {
            id: BasketEntryId::new(self.working.last_entry_id),
            item_id,
            quantity,
        };
        let basket = self.basket_mut(basket_id).ok_or_else(|| {
            StoreError::ForeignKeyViolation(format!("basket {basket_id} does not exist"))
        })?;
        basket.entries.push(entry.clone());
        Ok(entry)
    }

    async fn delete_basket(&mut self, basket_id: BasketId) -> Result<bool> {
        Ok(self.working.baskets.remove(&basket_id).is_some())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}
