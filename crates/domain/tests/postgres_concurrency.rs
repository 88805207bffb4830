//! Concurrency tests for the order services over PostgreSQL.
//!
//! The in-memory store serialises whole transactions, so contention on row
//! locks only shows up here. Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_concurrency -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{MenuItemId, Money, UserId};
use domain::{AddToBasket, BasketLineRequest, BasketService, ErrorKind, OrderService, PlaceOrder};
use rust_decimal_macros::dec;
use serial_test::serial;
use sqlx::PgPool;
use store::{NewMenuItem, PostgresStore, Store, StoreTransaction};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

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

async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
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

async fn add_item(store: &PostgresStore, name: &str, stock_quantity: i32) -> MenuItemId {
    let mut tx = store.begin().await.unwrap();
    let item = tx
        .insert_menu_item(NewMenuItem {
            name: name.to_string(),
            description: String::new(),
            price: Money::new(dec!(2.00)),
            stock_quantity,
            available: true,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    item.id
}

async fn stock_of(store: &PostgresStore, item_id: MenuItemId) -> i32 {
    let mut tx = store.begin().await.unwrap();
    tx.menu_item(item_id).await.unwrap().unwrap().stock_quantity
}

async fn order_count(store: &PostgresStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_orders_never_oversell() {
    let store = get_test_store().await;
    let soup = add_item(&store, "Soup", 10).await;
    let service = Arc::new(OrderService::new(store.clone()));

    let handles = (0..25).map(|user| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .place_order(UserId::new(user), PlaceOrder::from_pairs([(soup.get(), 1)]))
                .await
        })
    });

    let results = futures_util::future::join_all(handles).await;
    let mut placed = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientStock),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(stock_of(&store, soup).await, 0);
    assert_eq!(order_count(&store).await, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_checkouts_place_one_order() {
    let store = get_test_store().await;
    let soup = add_item(&store, "Soup", 10).await;
    let tea = add_item(&store, "Tea", 10).await;
    let baskets = BasketService::new(store.clone());
    let orders = Arc::new(OrderService::new(store.clone()));
    let user = UserId::new(1);

    baskets
        .add_items(
            user,
            AddToBasket::new(vec![
                BasketLineRequest::new(soup, 2),
                BasketLineRequest::new(tea, 1),
            ]),
        )
        .await
        .unwrap();

    let handles = (0..5).map(|_| {
        let orders = Arc::clone(&orders);
        tokio::spawn(async move { orders.checkout_basket(user).await })
    });

    let results = futures_util::future::join_all(handles).await;
    let mut placed = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidRequest),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(order_count(&store).await, 1);
    assert_eq!(stock_of(&store, soup).await, 8);
    assert_eq!(stock_of(&store, tea).await, 9);
    assert!(baskets.get_basket(user).await.unwrap().items.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn basket_adds_racing_checkout_are_never_lost() {
    let store = get_test_store().await;
    let soup = add_item(&store, "Soup", 100).await;
    let baskets = Arc::new(BasketService::new(store.clone()));
    let orders = Arc::new(OrderService::new(store.clone()));
    let user = UserId::new(1);

    baskets
        .add_items(user, AddToBasket::new(vec![BasketLineRequest::new(soup, 1)]))
        .await
        .unwrap();

    let adds = (0..10).map(|_| {
        let baskets = Arc::clone(&baskets);
        tokio::spawn(async move {
            baskets
                .add_items(user, AddToBasket::new(vec![BasketLineRequest::new(soup, 1)]))
                .await
                .unwrap();
        })
    });
    let checkout = {
        let orders = Arc::clone(&orders);
        tokio::spawn(async move { orders.checkout_basket(user).await.unwrap() })
    };

    futures_util::future::join_all(adds).await;
    let order = checkout.await.unwrap();

    // Every unit is either in the order or still in the basket.
    let ordered: i32 = order.lines.iter().map(|line| line.quantity).sum();
    let left: i32 = baskets
        .get_basket(user)
        .await
        .unwrap()
        .items
        .iter()
        .map(|line| line.quantity)
        .sum();
    assert_eq!(ordered + left, 11);
    assert_eq!(stock_of(&store, soup).await, 100 - ordered);
}
