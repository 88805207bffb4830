//! Basket endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::{MenuItemId, Money};
use domain::{AddToBasket, BasketLineRequest, BasketView};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Authenticated;

use super::orders::{MessageResponse, OrderResponse};

#[derive(Deserialize)]
pub struct AddToBasketRequest {
    pub items: Vec<BasketItemRequest>,
}

#[derive(Deserialize)]
pub struct BasketItemRequest {
    pub item_id: u64,
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct BasketUpdatedResponse {
    pub message: &'static str,
    pub basket_id: i64,
}

#[derive(Serialize)]
pub struct BasketResponse {
    pub basket_id: i64,
    pub items: Vec<BasketItemResponse>,
    pub total_price: Money,
}

#[derive(Serialize)]
pub struct BasketItemResponse {
    pub item_id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub quantity: i32,
    pub total_price: Money,
}

impl From<BasketView> for BasketResponse {
    fn from(view: BasketView) -> Self {
        Self {
            basket_id: view.basket_id.get(),
            items: view
                .items
                .into_iter()
                .map(|line| BasketItemResponse {
                    item_id: line.item_id.get(),
                    name: line.name,
                    description: line.description,
                    price: line.price,
                    quantity: line.quantity,
                    total_price: line.total_price,
                })
                .collect(),
            total_price: view.total_price,
        }
    }
}

/// POST /basket
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<AddToBasketRequest>, JsonRejection>,
) -> Result<Json<BasketUpdatedResponse>, ApiError> {
    let Json(req) = payload?;

    let items = req
        .items
        .into_iter()
        .map(|line| {
            i64::try_from(line.item_id)
                .map(|id| BasketLineRequest::new(MenuItemId::new(id), line.quantity))
                .map_err(|_| {
                    ApiError::BadRequest(format!("item_id {} is out of range", line.item_id))
                })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let basket_id = state
        .baskets
        .add_items(caller.user_id, AddToBasket::new(items))
        .await?;

    Ok(Json(BasketUpdatedResponse {
        message: "Items added to basket",
        basket_id: basket_id.get(),
    }))
}

/// GET /basket
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<BasketResponse>, ApiError> {
    let view = state.baskets.get_basket(caller.user_id).await?;
    Ok(Json(view.into()))
}

/// DELETE /basket
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<MessageResponse>, ApiError> {
    let existed = state.baskets.clear_basket(caller.user_id).await?;
    let message = if existed {
        "Basket deleted successfully"
    } else {
        "Basket not found"
    };
    Ok(Json(MessageResponse { message }))
}

/// POST /basket/checkout: place an order from the basket and empty it.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.checkout_basket(caller.user_id).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}
