//! Menu endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MenuItemId, Money};
use serde::{Deserialize, Serialize};
use store::{MenuItem, MenuItemPatch, NewMenuItem, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Authenticated;

use super::orders::MessageResponse;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMenuItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

/// Fields an admin may change. Anything else in the body is rejected.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<i32>,
    pub available: Option<bool>,
}

impl From<UpdateMenuItemRequest> for MenuItemPatch {
    fn from(req: UpdateMenuItemRequest) -> Self {
        MenuItemPatch {
            name: req.name,
            description: req.description,
            price: req.price,
            stock_quantity: req.stock_quantity,
            available: req.available,
        }
    }
}

#[derive(Serialize)]
pub struct MenuItemResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub available: bool,
}

impl From<MenuItem> for MenuItemResponse {
    fn from(item: MenuItem) -> Self {
        Self {
            id: item.id.get(),
            name: item.name,
            description: item.description,
            price: item.price,
            stock_quantity: item.stock_quantity,
            available: item.available,
        }
    }
}

#[derive(Serialize)]
pub struct MenuResponse {
    pub menu_items: Vec<MenuItemResponse>,
}

#[derive(Serialize)]
pub struct MenuItemCreatedResponse {
    pub message: &'static str,
    pub menu_item_id: i64,
}

/// GET /menu: any authenticated caller.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _caller: Authenticated,
) -> Result<Json<MenuResponse>, ApiError> {
    let items = state.menu.list_menu().await?;
    Ok(Json(MenuResponse {
        menu_items: items.into_iter().map(Into::into).collect(),
    }))
}

/// POST /menu (admin only)
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<CreateMenuItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MenuItemCreatedResponse>), ApiError> {
    let Json(req) = payload?;

    let item = state
        .menu
        .create_item(
            &caller,
            NewMenuItem {
                name: req.name,
                description: req.description,
                price: req.price,
                stock_quantity: req.stock_quantity,
                available: req.available,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MenuItemCreatedResponse {
            message: "Menu item created successfully",
            menu_item_id: item.id.get(),
        }),
    ))
}

/// PATCH /menu/{item_id} (admin only)
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMenuItemRequest>, JsonRejection>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let Path(item_id) = path?;
    let Json(req) = payload?;

    let item = state
        .menu
        .update_item(&caller, MenuItemId::new(item_id), req.into())
        .await?;

    Ok(Json(item.into()))
}

/// DELETE /menu/{item_id} (admin only)
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(item_id) = path?;
    state
        .menu
        .delete_item(&caller, MenuItemId::new(item_id))
        .await?;

    Ok(Json(MessageResponse {
        message: "Menu item deleted successfully",
    }))
}
