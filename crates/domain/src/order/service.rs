//! Order service: the order transaction engine and status state machine.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, SubsecRound, Utc};
use common::{Caller, MenuItemId, Money, OrderId, OrderStatus, Role, UserId};
use store::{MenuItem, NewOrder, NewOrderLine, Order, OrderLine, Store, StoreTransaction};

use crate::error::{DomainError, Result};
use crate::inventory;

use super::{OrderLineRequest, PlaceOrder};

/// An order line paired with the menu item it references.
///
/// `line.line_cost` is the snapshot taken at order time; `item` is the
/// catalog entry as it is now and may carry a different price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDetails {
    pub line: OrderLine,
    pub item: Option<MenuItem>,
}

/// An order with its lines resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLineDetails>,
}

/// Service for placing and managing orders.
///
/// Every operation runs in a single storage transaction; a failed operation
/// leaves storage exactly as it found it.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order for `user_id`.
    ///
    /// Reserves stock for every line, snapshots each line's cost at the
    /// current unit price and writes the order in `Preparing` state. Either
    /// all of that commits or none of it does.
    #[tracing::instrument(skip(self, cmd), fields(lines = cmd.items.len()))]
    pub async fn place_order(&self, user_id: UserId, cmd: PlaceOrder) -> Result<Order> {
        let start = Instant::now();

        let result = async {
            cmd.validate()?;
            let mut tx = self.store.begin().await?;
            let order = place_in(&mut tx, user_id, &cmd.items).await?;
            tx.commit().await?;
            Ok(order)
        }
        .await;

        record_placement(&result, start);
        result
    }

    /// Turns the user's basket into an order and deletes the basket.
    ///
    /// The basket is only removed if the order commits; any placement
    /// failure leaves both stock and basket untouched. The basket row is
    /// locked for the whole transaction, so concurrent checkouts by the same
    /// user produce at most one order.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_basket(&self, user_id: UserId) -> Result<Order> {
        let start = Instant::now();

        let result = async {
            let mut tx = self.store.begin().await?;
            let basket = tx
                .basket_for_user_for_update(user_id)
                .await?
                .filter(|basket| !basket.entries.is_empty())
                .ok_or_else(|| DomainError::InvalidRequest("basket is empty".to_string()))?;

            let items: Vec<OrderLineRequest> = basket
                .entries
                .iter()
                .map(|entry| OrderLineRequest::new(entry.item_id, entry.quantity))
                .collect();
            PlaceOrder::new(items.clone()).validate()?;

            let order = place_in(&mut tx, user_id, &items).await?;
            if !tx.delete_basket(basket.id).await? {
                return Err(DomainError::InvalidRequest("basket is empty".to_string()));
            }
            tx.commit().await?;
            Ok(order)
        }
        .await;

        record_placement(&result, start);
        result
    }

    /// Lists a user's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_user(user_id).await?;
        let items = load_items(&mut tx, &orders).await?;

        Ok(orders
            .into_iter()
            .map(|order| with_items(order, &items))
            .collect())
    }

    /// Loads a single order visible to the caller.
    ///
    /// Admins see every order; clients only their own. Someone else's order
    /// is reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, caller: &Caller, order_id: OrderId) -> Result<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .order(order_id)
            .await?
            .filter(|order| match caller.role {
                Role::Admin => true,
                Role::Client => order.user_id == caller.user_id,
            })
            .ok_or_else(|| DomainError::order_not_found(order_id))?;

        let items = load_items(&mut tx, std::slice::from_ref(&order)).await?;
        Ok(with_items(order, &items))
    }

    /// Moves an order to `requested` status.
    ///
    /// Only admins may do this, `requested` must be a recognised status and
    /// the move must be legal from the current one.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        requested: &str,
        caller: &Caller,
    ) -> Result<Order> {
        match caller.role {
            Role::Admin => {}
            Role::Client => {
                return Err(DomainError::Forbidden(
                    "only admin can update order status".to_string(),
                ));
            }
        }

        let next: OrderStatus = requested
            .parse()
            .map_err(|_| DomainError::InvalidStatus(requested.to_string()))?;

        let mut tx = self.store.begin().await?;
        let order = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| DomainError::order_not_found(order_id))?;

        if !order.status.can_transition_to(next) {
            tracing::warn!(
                %order_id,
                from = %order.status,
                to = %next,
                terminal = order.status.is_terminal(),
                "illegal status transition"
            );
            return Err(DomainError::IllegalTransition {
                from: order.status,
                to: next,
            });
        }

        let updated_at = now();
        tx.set_order_status(order_id, next, updated_at).await?;
        tx.commit().await?;

        metrics::counter!("order_status_transitions_total", "to" => next.as_str()).increment(1);
        tracing::info!(%order_id, from = %order.status, to = %next, "order status updated");

        Ok(Order {
            status: next,
            updated_at,
            ..order
        })
    }

    /// Deletes one of the user's own orders while it is still `Preparing`.
    ///
    /// A missing order and another user's order are both reported as not
    /// found. Stock reserved by the order is not returned.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId, user_id: UserId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .order_for_update(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| DomainError::order_not_found(order_id))?;

        if !order.status.is_deletable() {
            return Err(DomainError::Forbidden(format!(
                "only orders with '{}' status can be deleted, order {order_id} is '{}'",
                OrderStatus::Preparing,
                order.status
            )));
        }

        tx.delete_order(order_id).await?;
        tx.commit().await?;

        metrics::counter!("orders_deleted_total").increment(1);
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }
}

/// Reserves every line and writes the order inside `tx`.
///
/// Item rows are locked up front in id order, then reserved in input order.
async fn place_in<T: StoreTransaction>(
    tx: &mut T,
    user_id: UserId,
    items: &[OrderLineRequest],
) -> Result<Order> {
    let mut item_ids: Vec<MenuItemId> = items.iter().map(|line| line.item_id).collect();
    item_ids.sort();
    item_ids.dedup();
    tx.lock_menu_items(&item_ids).await?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total_price = Money::zero();

    for line in items {
        let unit_price = inventory::reserve(tx, line.item_id, line.quantity).await?;

        let line_cost = unit_price
            .checked_multiply(line.quantity)
            .ok_or_else(|| amount_overflow(line.item_id))?;
        total_price = total_price
            .checked_add(line_cost)
            .ok_or_else(|| amount_overflow(line.item_id))?;

        lines.push(NewOrderLine {
            item_id: line.item_id,
            quantity: line.quantity,
            line_cost,
        });
    }

    let order = tx
        .insert_order(NewOrder {
            user_id,
            status: OrderStatus::Preparing,
            created_at: now(),
            total_price,
            lines,
        })
        .await?;

    Ok(order)
}

fn amount_overflow(item_id: MenuItemId) -> DomainError {
    DomainError::InvalidRequest(format!("order total overflows at item {item_id}"))
}

fn record_placement(result: &Result<Order>, start: Instant) {
    metrics::histogram!("order_placement_duration_seconds")
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(order) => {
            metrics::counter!("orders_placed_total").increment(1);
            tracing::info!(
                order_id = %order.id,
                user_id = %order.user_id,
                total_price = %order.total_price,
                lines = order.lines.len(),
                "order placed"
            );
        }
        Err(err) => {
            metrics::counter!("orders_rejected_total", "reason" => err.kind().as_str())
                .increment(1);
            match err {
                DomainError::Store(store_err) => {
                    tracing::error!(error = %store_err, "order placement failed")
                }
                _ => tracing::warn!(error = %err, "order rejected"),
            }
        }
    }
}

async fn load_items<T: StoreTransaction>(
    tx: &mut T,
    orders: &[Order],
) -> Result<HashMap<MenuItemId, MenuItem>> {
    let mut items = HashMap::new();
    for line in orders.iter().flat_map(|order| order.lines.iter()) {
        if items.contains_key(&line.item_id) {
            continue;
        }
        if let Some(item) = tx.menu_item(line.item_id).await? {
            items.insert(line.item_id, item);
        }
    }
    Ok(items)
}

fn with_items(order: Order, items: &HashMap<MenuItemId, MenuItem>) -> OrderDetails {
    let lines = order
        .lines
        .iter()
        .map(|line| OrderLineDetails {
            line: line.clone(),
            item: items.get(&line.item_id).cloned(),
        })
        .collect();
    OrderDetails { order, lines }
}

/// Current time at the precision storage keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use store::{InMemoryStore, NewMenuItem};

    async fn seeded() -> (OrderService<InMemoryStore>, MenuItemId) {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let item = tx
            .insert_menu_item(NewMenuItem {
                name: "Borscht".to_string(),
                description: "Beetroot soup".to_string(),
                price: Money::new(dec!(3.50)),
                stock_quantity: 5,
                available: true,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (OrderService::new(store), item.id)
    }

    #[tokio::test]
    async fn test_place_order() {
        let (service, item_id) = seeded().await;

        let order = service
            .place_order(
                UserId::new(1),
                PlaceOrder::new(vec![OrderLineRequest::new(item_id, 2)]),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.user_id, UserId::new(1));
        assert_eq!(order.total_price.to_string(), "7.00");
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].line_cost.to_string(), "7.00");
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(service.store().stock_of(item_id).await, Some(3));
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty() {
        let (service, _) = seeded().await;

        let err = service
            .place_order(UserId::new(1), PlaceOrder::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_transition_requires_admin() {
        let (service, item_id) = seeded().await;
        let order = service
            .place_order(UserId::new(1), PlaceOrder::from_pairs([(item_id.get(), 1)]))
            .await
            .unwrap();

        let err = service
            .transition_status(order.id, "ready", &Caller::client(UserId::new(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_transition_to_ready() {
        let (service, item_id) = seeded().await;
        let order = service
            .place_order(UserId::new(1), PlaceOrder::from_pairs([(item_id.get(), 1)]))
            .await
            .unwrap();

        let updated = service
            .transition_status(order.id, "ready", &Caller::admin(UserId::new(99)))
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Ready);
        assert!(updated.updated_at >= order.updated_at);
        assert_eq!(updated.total_price, order.total_price);
    }

    #[tokio::test]
    async fn test_get_order_hides_other_users_orders() {
        let (service, item_id) = seeded().await;
        let order = service
            .place_order(UserId::new(1), PlaceOrder::from_pairs([(item_id.get(), 1)]))
            .await
            .unwrap();

        let own = service
            .get_order(&Caller::client(UserId::new(1)), order.id)
            .await
            .unwrap();
        assert_eq!(own.order.id, order.id);
        assert_eq!(own.lines[0].item.as_ref().unwrap().name, "Borscht");

        let err = service
            .get_order(&Caller::client(UserId::new(2)), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        assert!(
            service
                .get_order(&Caller::admin(UserId::new(2)), order.id)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_delete_order() {
        let (service, item_id) = seeded().await;
        let order = service
            .place_order(UserId::new(1), PlaceOrder::from_pairs([(item_id.get(), 1)]))
            .await
            .unwrap();

        service.delete_order(order.id, UserId::new(1)).await.unwrap();

        assert_eq!(service.store().order_count().await, 0);
        // Deletion never restocks.
        assert_eq!(service.store().stock_of(item_id).await, Some(4));
    }
}
