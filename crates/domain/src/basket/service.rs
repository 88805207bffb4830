use common::{BasketId, Money, UserId};
use store::{Store, StoreTransaction};

use crate::error::{DomainError, Result};

use super::{AddToBasket, BasketLine, BasketView};

/// Service for building, pricing and clearing baskets.
pub struct BasketService<S: Store> {
    store: S,
}

impl<S: Store> BasketService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends every requested line to the user's basket, creating the basket
    /// if needed.
    ///
    /// Repeated item ids become separate entries; nothing is merged.
    #[tracing::instrument(skip(self, cmd), fields(lines = cmd.items.len()))]
    pub async fn add_items(&self, user_id: UserId, cmd: AddToBasket) -> Result<BasketId> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;
        for line in &cmd.items {
            if tx.menu_item(line.item_id).await?.is_none() {
                return Err(DomainError::menu_item_not_found(line.item_id));
            }
        }

        let basket = tx.basket_for_user_or_create(user_id).await?;
        for line in &cmd.items {
            tx.add_basket_entry(basket.id, line.item_id, line.quantity)
                .await?;
        }
        tx.commit().await?;

        metrics::counter!("basket_items_added_total").increment(cmd.items.len() as u64);
        tracing::info!(basket_id = %basket.id, "items added to basket");

        Ok(basket.id)
    }

    /// Prices the user's basket at current catalog prices.
    ///
    /// A user without a basket gets [`BasketView::empty`].
    #[tracing::instrument(skip(self))]
    pub async fn get_basket(&self, user_id: UserId) -> Result<BasketView> {
        let mut tx = self.store.begin().await?;
        let Some(basket) = tx.basket_for_user(user_id).await? else {
            return Ok(BasketView::empty());
        };

        let mut items = Vec::with_capacity(basket.entries.len());
        let mut total_price = Money::zero();

        for entry in &basket.entries {
            let Some(item) = tx.menu_item(entry.item_id).await? else {
                continue;
            };
            let line_total = item.price.checked_multiply(entry.quantity).ok_or_else(|| {
                DomainError::InvalidRequest(format!("basket total overflows at item {}", item.id))
            })?;
            total_price = total_price.checked_add(line_total).ok_or_else(|| {
                DomainError::InvalidRequest(format!("basket total overflows at item {}", item.id))
            })?;

            items.push(BasketLine {
                item_id: item.id,
                name: item.name,
                description: item.description,
                price: item.price,
                quantity: entry.quantity,
                total_price: line_total,
            });
        }

        Ok(BasketView {
            basket_id: basket.id,
            items,
            total_price,
        })
    }

    /// Deletes the user's basket with all its entries.
    ///
    /// Returns `false` when there was nothing to delete.
    #[tracing::instrument(skip(self))]
    pub async fn clear_basket(&self, user_id: UserId) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let Some(basket) = tx.basket_for_user_for_update(user_id).await? else {
            return Ok(false);
        };

        if !tx.delete_basket(basket.id).await? {
            return Ok(false);
        }
        tx.commit().await?;

        tracing::info!(basket_id = %basket.id, "basket cleared");
        Ok(true)
    }
}
