//! Transactional storage for the canteen ordering backend.
//!
//! The core only needs one thing from storage: atomic multi-statement
//! transactions that roll back when dropped uncommitted. [`Store`] hands out
//! [`StoreTransaction`]s; [`PostgresStore`] backs them with row-locking SQL
//! transactions and [`InMemoryStore`] with a single-writer copy of the data.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{
    Basket, BasketEntry, MenuItem, MenuItemPatch, NewMenuItem, NewOrder, NewOrderLine, Order,
    OrderLine,
};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{Store, StoreTransaction};
