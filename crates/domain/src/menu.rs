//! Menu administration.

use common::{Caller, MenuItemId, Money, Role};
use store::{MenuItem, MenuItemPatch, NewMenuItem, Store, StoreError, StoreTransaction};

use crate::error::{DomainError, Result};

/// Service for reading and editing the catalog.
///
/// Stock set here is the only way it ever goes up; reservations made by the
/// order service only take it down.
pub struct MenuService<S: Store> {
    store: S,
}

impl<S: Store> MenuService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the whole catalog ordered by id.
    #[tracing::instrument(skip(self))]
    pub async fn list_menu(&self) -> Result<Vec<MenuItem>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_menu_items().await?)
    }

    #[tracing::instrument(skip(self, item), fields(name = %item.name))]
    pub async fn create_item(&self, caller: &Caller, item: NewMenuItem) -> Result<MenuItem> {
        require_admin(caller)?;

        if item.name.trim().is_empty() {
            return Err(DomainError::InvalidRequest(
                "name must not be empty".to_string(),
            ));
        }
        validate_price(item.price)?;
        validate_stock(item.stock_quantity)?;

        let mut tx = self.store.begin().await?;
        let created = tx.insert_menu_item(item).await?;
        tx.commit().await?;

        tracing::info!(item_id = %created.id, "menu item created");
        Ok(created)
    }

    /// Applies a partial update to a catalog entry.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_item(
        &self,
        caller: &Caller,
        item_id: MenuItemId,
        patch: MenuItemPatch,
    ) -> Result<MenuItem> {
        require_admin(caller)?;

        if patch.is_empty() {
            return Err(DomainError::InvalidRequest(
                "no fields to update".to_string(),
            ));
        }
        if patch
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(DomainError::InvalidRequest(
                "name must not be empty".to_string(),
            ));
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        if let Some(stock_quantity) = patch.stock_quantity {
            validate_stock(stock_quantity)?;
        }

        let mut tx = self.store.begin().await?;
        let updated = tx
            .update_menu_item(item_id, &patch)
            .await?
            .ok_or_else(|| DomainError::menu_item_not_found(item_id))?;
        tx.commit().await?;

        tracing::info!(%item_id, "menu item updated");
        Ok(updated)
    }

    /// Removes a catalog entry.
    ///
    /// Fails with [`DomainError::ItemInUse`] while any order line still
    /// references the item.
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, caller: &Caller, item_id: MenuItemId) -> Result<()> {
        require_admin(caller)?;

        let mut tx = self.store.begin().await?;
        let deleted = match tx.delete_menu_item(item_id).await {
            Ok(deleted) => deleted,
            Err(StoreError::ForeignKeyViolation(_)) => {
                return Err(DomainError::ItemInUse { item_id });
            }
            Err(err) => return Err(err.into()),
        };
        if !deleted {
            return Err(DomainError::menu_item_not_found(item_id));
        }
        tx.commit().await?;

        tracing::info!(%item_id, "menu item deleted");
        Ok(())
    }
}

fn require_admin(caller: &Caller) -> Result<()> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Client => Err(DomainError::Forbidden(
            "only admin can manage the menu".to_string(),
        )),
    }
}

fn validate_price(price: Money) -> Result<()> {
    if price.is_negative() {
        return Err(DomainError::InvalidRequest(format!(
            "price must not be negative, got {price}"
        )));
    }
    Ok(())
}

fn validate_stock(stock_quantity: i32) -> Result<()> {
    if stock_quantity < 0 {
        return Err(DomainError::InvalidRequest(format!(
            "stock quantity must not be negative, got {stock_quantity}"
        )));
    }
    Ok(())
}
