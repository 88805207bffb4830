use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BasketEntryId, BasketId, MenuItemId, Money, OrderId, OrderLineId, OrderStatus, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Basket, BasketEntry, MenuItem, MenuItemPatch, NewMenuItem, NewOrder, Order, OrderLine,
    Result, StoreError,
    store::{Store, StoreTransaction},
};

const MENU_COLUMNS: &str = "id, name, description, price, stock_quantity, available";
const ORDER_COLUMNS: &str = "id, user_id, status, created_at, updated_at, total_price";
const BASKET_CREATE_ATTEMPTS: usize = 3;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// A transaction over a [`PostgresStore`].
///
/// Row locks taken through the `*_for_update` reads are held until the
/// transaction commits or is dropped (which rolls back).
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    fn row_to_menu_item(row: PgRow) -> Result<MenuItem> {
        Ok(MenuItem {
            id: MenuItemId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::new(row.try_get("price")?),
            stock_quantity: row.try_get("stock_quantity")?,
            available: row.try_get("available")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status: OrderStatus = status
            .parse()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            total_price: Money::new(row.try_get("total_price")?),
            lines: Vec::new(),
        })
    }

    fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: OrderLineId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            item_id: MenuItemId::new(row.try_get("item_id")?),
            quantity: row.try_get("quantity")?,
            line_cost: Money::new(row.try_get("line_cost")?),
        })
    }

    fn row_to_basket_entry(row: PgRow) -> Result<BasketEntry> {
        Ok(BasketEntry {
            id: BasketEntryId::new(row.try_get("id")?),
            item_id: MenuItemId::new(row.try_get("item_id")?),
            quantity: row.try_get("quantity")?,
        })
    }

    async fn fetch_order(&mut self, id: OrderId, for_update: bool) -> Result<Option<Order>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}");

        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = Self::row_to_order(row)?;
        order.lines = self.fetch_order_lines(order.id).await?;
        Ok(Some(order))
    }

    async fn fetch_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, item_id, quantity, line_cost
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Self::row_to_order_line).collect()
    }

    async fn fetch_basket(&mut self, user_id: UserId, for_update: bool) -> Result<Option<Basket>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT id, user_id FROM baskets WHERE user_id = $1{lock}");

        let row = sqlx::query(&sql)
            .bind(user_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id = BasketId::new(row.try_get("id")?);
        let entries = self.fetch_basket_entries(id).await?;

        Ok(Some(Basket {
            id,
            user_id: UserId::new(row.try_get("user_id")?),
            entries,
        }))
    }

    async fn fetch_basket_entries(&mut self, basket_id: BasketId) -> Result<Vec<BasketEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, quantity
            FROM basket_entries
            WHERE basket_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(basket_id.get())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Self::row_to_basket_entry).collect()
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn list_menu_items(&mut self) -> Result<Vec<MenuItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu_items ORDER BY id ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Self::row_to_menu_item).collect()
    }

    async fn menu_item(&mut self, id: MenuItemId) -> Result<Option<MenuItem>> {
        let row = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu_items WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Self::row_to_menu_item).transpose()
    }

    async fn lock_menu_items(&mut self, ids: &[MenuItemId]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(MenuItemId::get).collect();

        sqlx::query("SELECT id FROM menu_items WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE")
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn menu_item_for_update(&mut self, id: MenuItemId) -> Result<Option<MenuItem>> {
        let row = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Self::row_to_menu_item).transpose()
    }

    async fn set_stock(&mut self, id: MenuItemId, stock_quantity: i32) -> Result<()> {
        sqlx::query("UPDATE menu_items SET stock_quantity = $2 WHERE id = $1")
            .bind(id.get())
            .bind(stock_quantity)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_menu_item(&mut self, item: NewMenuItem) -> Result<MenuItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO menu_items (name, description, price, stock_quantity, available)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.amount())
        .bind(item.stock_quantity)
        .bind(item.available)
        .fetch_one(&mut *self.tx)
        .await?;

        Self::row_to_menu_item(row)
    }

    async fn update_menu_item(
        &mut self,
        id: MenuItemId,
        patch: &MenuItemPatch,
    ) -> Result<Option<MenuItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE menu_items SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock_quantity = COALESCE($5, stock_quantity),
                available = COALESCE($6, available)
            WHERE id = $1
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.price.map(|price| price.amount()))
        .bind(patch.stock_quantity)
        .bind(patch.available)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Self::row_to_menu_item).transpose()
    }

    async fn delete_menu_item(&mut self, id: MenuItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (user_id, status, created_at, updated_at, total_price)
            VALUES ($1, $2, $3, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.user_id.get())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.total_price.amount())
        .fetch_one(&mut *self.tx)
        .await?;

        let mut stored = Self::row_to_order(row)?;

        for line in order.lines {
            let row = sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, item_id, quantity, line_cost)
                VALUES ($1, $2, $3, $4)
                RETURNING id, order_id, item_id, quantity, line_cost
                "#,
            )
            .bind(stored.id.get())
            .bind(line.item_id.get())
            .bind(line.quantity)
            .bind(line.line_cost.amount())
            .fetch_one(&mut *self.tx)
            .await?;

            stored.lines.push(Self::row_to_order_line(row)?);
        }

        Ok(stored)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, false).await
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, true).await
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id.get())
        .fetch_all(&mut *self.tx)
        .await?;

        let mut orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let order_ids: Vec<i64> = orders.iter().map(|order| order.id.get()).collect();
        let line_rows = sqlx::query(
            r#"
            SELECT id, order_id, item_id, quantity, line_cost
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in line_rows {
            let line = Self::row_to_order_line(row)?;
            lines_by_order.entry(line.order_id).or_default().push(line);
        }
        for order in &mut orders {
            order.lines = lines_by_order.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<()> {
        // order_lines cascade
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn basket_for_user(&mut self, user_id: UserId) -> Result<Option<Basket>> {
        self.fetch_basket(user_id, false).await
    }

    async fn basket_for_user_for_update(&mut self, user_id: UserId) -> Result<Option<Basket>> {
        self.fetch_basket(user_id, true).await
    }

    async fn basket_for_user_or_create(&mut self, user_id: UserId) -> Result<Basket> {
        // A concurrent checkout may delete the row between the insert and the
        // locking read; the next insert then creates a fresh basket.
        for _ in 0..BASKET_CREATE_ATTEMPTS {
            sqlx::query(
                "INSERT INTO baskets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user_id.get())
            .execute(&mut *self.tx)
            .await?;

            if let Some(basket) = self.fetch_basket(user_id, true).await? {
                return Ok(basket);
            }
        }

        Err(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn add_basket_entry(
        &mut self,
        basket_id: BasketId,
        item_id: MenuItemId,
        quantity: i32,
    ) -> Result<BasketEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO basket_entries (basket_id, item_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, item_id, quantity
            "#,
        )
        .bind(basket_id.get())
        .bind(item_id.get())
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        Self::row_to_basket_entry(row)
    }

    async fn delete_basket(&mut self, basket_id: BasketId) -> Result<bool> {
        // basket_entries cascade
        let result = sqlx::query("DELETE FROM baskets WHERE id = $1")
            .bind(basket_id.get())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Splits foreign key violations (`23503`) out of other database errors.
fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23503") => {
            StoreError::ForeignKeyViolation(db_err.message().to_string())
        }
        err => StoreError::Database(err),
    }
}
