//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a placed order.
///
/// State transitions:
/// ```text
/// Preparing ──► Ready ──► Completed
///     │           │
///     └───────────┴──► Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Freshly placed; the kitchen is working on it. Orders may only be
    /// deleted by their owner while in this state.
    #[default]
    Preparing,

    /// Ready for pickup.
    Ready,

    /// Picked up (terminal state).
    Completed,

    /// Canceled by staff (terminal state).
    Canceled,
}

impl OrderStatus {
    /// Every recognised status, in lifecycle order.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    /// Returns true if an order in this state may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Preparing, OrderStatus::Ready)
                | (OrderStatus::Preparing, OrderStatus::Canceled)
                | (OrderStatus::Ready, OrderStatus::Completed)
                | (OrderStatus::Ready, OrderStatus::Canceled)
        )
    }

    /// Returns true if the owner may still delete an order in this state.
    pub fn is_deletable(&self) -> bool {
        matches!(self, OrderStatus::Preparing)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Returns the wire/storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string is not one of the four recognised statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised order status: {0:?}")]
pub struct StatusParseError(pub String);

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "completed" => Ok(OrderStatus::Completed),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}
