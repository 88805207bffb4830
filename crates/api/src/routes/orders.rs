//! Order placement, query, status and deletion endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{MenuItemId, Money, OrderId};
use domain::{OrderDetails, OrderLineRequest, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{Order, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Authenticated;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub order_items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: u64,
    pub quantity: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

/// A stored order exactly as placed.
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub order_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub total_price: Money,
    pub order_items: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub id: i64,
    pub order_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub total_cost: Money,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.get(),
            user_id: order.user_id.get(),
            order_status: order.status.to_string(),
            created_at: timestamp(order.created_at),
            updated_at: timestamp(order.updated_at),
            total_price: order.total_price,
            order_items: order
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    id: line.id.get(),
                    order_id: line.order_id.get(),
                    item_id: line.item_id.get(),
                    quantity: line.quantity,
                    total_cost: line.line_cost,
                })
                .collect(),
        }
    }
}

/// An order as shown in a customer's order history.
#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: i64,
    pub order_items: Vec<OrderSummaryItem>,
    pub order_status: String,
    pub order_cost: Money,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderSummaryItem {
    pub id: i64,
    /// `null` only if the item was removed from the catalog.
    pub item: Option<ItemSnapshot>,
    pub quantity: i32,
    pub total_price: Money,
}

#[derive(Serialize)]
pub struct ItemSnapshot {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
}

impl From<OrderDetails> for OrderSummaryResponse {
    fn from(details: OrderDetails) -> Self {
        let OrderDetails { order, lines } = details;
        Self {
            order_id: order.id.get(),
            order_items: lines
                .into_iter()
                .map(|detail| OrderSummaryItem {
                    id: detail.line.id.get(),
                    item: detail.item.map(|item| ItemSnapshot {
                        id: item.id.get(),
                        name: item.name,
                        description: item.description,
                        price: item.price,
                    }),
                    quantity: detail.line.quantity,
                    total_price: detail.line.line_cost,
                })
                .collect(),
            order_status: order.status.to_string(),
            order_cost: order.total_price,
            created_at: timestamp(order.created_at),
            updated_at: timestamp(order.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// POST /orders: place an order, reserving stock for every line.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;

    let items = req
        .order_items
        .into_iter()
        .map(|line| {
            let item_id = i64::try_from(line.product_id).map_err(|_| {
                ApiError::BadRequest(format!("product_id {} is out of range", line.product_id))
            })?;
            Ok(OrderLineRequest::new(MenuItemId::new(item_id), line.quantity))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let order = state
        .orders
        .place_order(caller.user_id, PlaceOrder::new(items))
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: the caller's order history with line snapshots.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let orders = state.orders.list_orders(caller.user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{order_id}: a single order, visible to its owner and admins.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let Path(order_id) = path?;
    let details = state
        .orders
        .get_order(&caller, OrderId::new(order_id))
        .await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/{order_id}: move an order to a new status (admin only).
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(order_id) = path?;
    let Json(req) = payload?;

    let order = state
        .orders
        .transition_status(OrderId::new(order_id), &req.status, &caller)
        .await?;

    Ok(Json(order.into()))
}

/// DELETE /orders/{order_id}: delete one of the caller's preparing orders.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(order_id) = path?;
    state
        .orders
        .delete_order(OrderId::new(order_id), caller.user_id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Order deleted successfully",
    }))
}

/// RFC 3339 in UTC with nanosecond precision.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
