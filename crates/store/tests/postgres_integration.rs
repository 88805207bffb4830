//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Money, OrderStatus, UserId};
use rust_decimal_macros::dec;
use serial_test::serial;
use sqlx::PgPool;
use store::{
    MenuItemPatch, NewMenuItem, NewOrder, NewOrderLine, PostgresStore, Store, StoreError,
    StoreTransaction,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE basket_entries, baskets, order_lines, orders, menu_items RESTART IDENTITY",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn soup(stock_quantity: i32) -> NewMenuItem {
    NewMenuItem {
        name: "Soup".to_string(),
        description: "Tomato".to_string(),
        price: Money::new(dec!(3.50)),
        stock_quantity,
        available: true,
    }
}

#[tokio::test]
#[serial]
async fn insert_and_read_menu_item() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.menu_item(item.id).await.unwrap().unwrap();
    assert_eq!(loaded, item);
    assert_eq!(loaded.price.to_string(), "3.50");
}

#[tokio::test]
#[serial]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    tx.commit().await.unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        tx.set_stock(item.id, 0).await.unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.menu_item(item.id).await.unwrap().unwrap();
    assert_eq!(loaded.stock_quantity, 5);
}

#[tokio::test]
#[serial]
async fn row_lock_blocks_second_writer_until_commit() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    tx.commit().await.unwrap();

    let mut first = store.begin().await.unwrap();
    let locked = first.menu_item_for_update(item.id).await.unwrap().unwrap();
    assert_eq!(locked.stock_quantity, 5);

    let second_store = store.clone();
    let item_id = item.id;
    let second = tokio::spawn(async move {
        let mut tx = second_store.begin().await.unwrap();
        let seen = tx.menu_item_for_update(item_id).await.unwrap().unwrap();
        seen.stock_quantity
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!second.is_finished(), "second reader must wait for the lock");

    first.set_stock(item.id, 2).await.unwrap();
    first.commit().await.unwrap();

    assert_eq!(second.await.unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn insert_order_with_lines() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let order = tx
        .insert_order(NewOrder {
            user_id: UserId::new(1),
            status: OrderStatus::Preparing,
            created_at: Utc::now(),
            total_price: Money::new(dec!(7.00)),
            lines: vec![NewOrderLine {
                item_id: item.id,
                quantity: 2,
                line_cost: Money::new(dec!(7.00)),
            }],
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].order_id, order.id);

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Preparing);
    assert_eq!(loaded.total_price.to_string(), "7.00");
    assert_eq!(loaded.lines, order.lines);

    let listed = tx.orders_for_user(UserId::new(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].lines.len(), 1);
    assert!(tx.orders_for_user(UserId::new(2)).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn delete_order_cascades_lines() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let order = tx
        .insert_order(NewOrder {
            user_id: UserId::new(1),
            status: OrderStatus::Preparing,
            created_at: Utc::now(),
            total_price: Money::new(dec!(3.50)),
            lines: vec![NewOrderLine {
                item_id: item.id,
                quantity: 1,
                line_cost: Money::new(dec!(3.50)),
            }],
        })
        .await
        .unwrap();
    tx.delete_order(order.id).await.unwrap();
    tx.commit().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_lines")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn referenced_menu_item_cannot_be_deleted() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    tx.insert_order(NewOrder {
        user_id: UserId::new(1),
        status: OrderStatus::Preparing,
        created_at: Utc::now(),
        total_price: Money::new(dec!(3.50)),
        lines: vec![NewOrderLine {
            item_id: item.id,
            quantity: 1,
            line_cost: Money::new(dec!(3.50)),
        }],
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx.delete_menu_item(item.id).await;
    assert!(matches!(result, Err(StoreError::ForeignKeyViolation(_))));
}

#[tokio::test]
#[serial]
async fn patch_updates_only_given_fields() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let patch = MenuItemPatch {
        price: Some(Money::new(dec!(4.25))),
        ..Default::default()
    };
    let updated = tx.update_menu_item(item.id, &patch).await.unwrap().unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.price.to_string(), "4.25");
    assert_eq!(updated.name, "Soup");
    assert_eq!(updated.stock_quantity, 5);
}

#[tokio::test]
#[serial]
async fn basket_lifecycle() {
    let store = get_test_store().await;
    let user = UserId::new(9);

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let basket = tx.basket_for_user_or_create(user).await.unwrap();
    let again = tx.basket_for_user_or_create(user).await.unwrap();
    assert_eq!(basket.id, again.id);

    tx.add_basket_entry(basket.id, item.id, 1).await.unwrap();
    tx.add_basket_entry(basket.id, item.id, 2).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.basket_for_user(user).await.unwrap().unwrap();
    assert_eq!(loaded.entries.len(), 2);

    assert!(tx.delete_basket(loaded.id).await.unwrap());
    assert!(!tx.delete_basket(loaded.id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.basket_for_user(user).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn basket_lock_hides_basket_deleted_by_first_holder() {
    let store = get_test_store().await;
    let user = UserId::new(9);

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let basket = tx.basket_for_user_or_create(user).await.unwrap();
    tx.add_basket_entry(basket.id, item.id, 1).await.unwrap();
    tx.commit().await.unwrap();

    let mut first = store.begin().await.unwrap();
    let locked = first.basket_for_user_for_update(user).await.unwrap().unwrap();
    assert_eq!(locked.entries.len(), 1);

    let second_store = store.clone();
    let second = tokio::spawn(async move {
        let mut tx = second_store.begin().await.unwrap();
        tx.basket_for_user_for_update(user).await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!second.is_finished(), "second reader must wait for the basket lock");

    assert!(first.delete_basket(locked.id).await.unwrap());
    first.commit().await.unwrap();

    assert!(second.await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn basket_add_waits_for_locked_basket() {
    let store = get_test_store().await;
    let user = UserId::new(9);

    let mut tx = store.begin().await.unwrap();
    let item = tx.insert_menu_item(soup(5)).await.unwrap();
    let basket = tx.basket_for_user_or_create(user).await.unwrap();
    tx.add_basket_entry(basket.id, item.id, 1).await.unwrap();
    tx.commit().await.unwrap();

    let mut first = store.begin().await.unwrap();
    let locked = first.basket_for_user_for_update(user).await.unwrap().unwrap();

    let second_store = store.clone();
    let item_id = item.id;
    let second = tokio::spawn(async move {
        let mut tx = second_store.begin().await.unwrap();
        let basket = tx.basket_for_user_or_create(user).await.unwrap();
        tx.add_basket_entry(basket.id, item_id, 3).await.unwrap();
        tx.commit().await.unwrap();
        basket.id
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!second.is_finished(), "add must wait for the basket lock");

    first.delete_basket(locked.id).await.unwrap();
    first.commit().await.unwrap();

    // The add lands in a fresh basket instead of vanishing with the old one.
    let new_id = second.await.unwrap();
    assert_ne!(new_id, locked.id);

    let mut tx = store.begin().await.unwrap();
    let basket = tx.basket_for_user(user).await.unwrap().unwrap();
    assert_eq!(basket.id, new_id);
    assert_eq!(basket.entries.len(), 1);
    assert_eq!(basket.entries[0].quantity, 3);
}
