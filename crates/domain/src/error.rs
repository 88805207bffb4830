//! Domain error types.

use common::{MenuItemId, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Every business-rule failure aborts the enclosing transaction before it is
/// returned, so an `Err` always means nothing was committed.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request is malformed (empty item list, non-positive quantity, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Not enough stock to reserve the requested quantity.
    #[error("Not enough stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: MenuItemId,
        requested: i32,
        available: i32,
    },

    /// The item has been taken off the menu.
    #[error("Item {item_id} is not available")]
    ItemUnavailable { item_id: MenuItemId },

    /// The caller's role or ownership does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested status is not one of the recognised values.
    #[error("Invalid order status: {0:?}")]
    InvalidStatus(String),

    /// The requested status is recognised but cannot follow the current one.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// The menu item is still referenced by placed orders.
    #[error("Item {item_id} is referenced by existing orders")]
    ItemInUse { item_id: MenuItemId },

    /// A storage or transaction failure.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Coarse failure category, stable enough for a boundary layer to map onto
/// its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    InsufficientStock,
    Forbidden,
    Conflict,
    InternalFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InternalFailure => "internal_failure",
        }
    }
}

impl DomainError {
    pub(crate) fn menu_item_not_found(id: MenuItemId) -> Self {
        DomainError::NotFound {
            entity: "Menu item",
            id: id.get(),
        }
    }

    pub(crate) fn order_not_found(id: common::OrderId) -> Self {
        DomainError::NotFound {
            entity: "Order",
            id: id.get(),
        }
    }

    /// Returns the failure category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidRequest(_) | DomainError::InvalidStatus(_) => {
                ErrorKind::InvalidRequest
            }
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::InsufficientStock { .. } | DomainError::ItemUnavailable { .. } => {
                ErrorKind::InsufficientStock
            }
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::IllegalTransition { .. } | DomainError::ItemInUse { .. } => {
                ErrorKind::Conflict
            }
            DomainError::Store(_) => ErrorKind::InternalFailure,
        }
    }

    /// Returns the menu item that caused the failure, if there is one.
    pub fn item_id(&self) -> Option<MenuItemId> {
        match self {
            DomainError::NotFound {
                entity: "Menu item",
                id,
            } => Some(MenuItemId::new(*id)),
            DomainError::InsufficientStock { item_id, .. }
            | DomainError::ItemUnavailable { item_id }
            | DomainError::ItemInUse { item_id } => Some(*item_id),
            _ => None,
        }
    }
}
