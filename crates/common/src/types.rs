use serde::{Deserialize, Serialize};

/// Declares an integer-backed identifier newtype.
///
/// Every persisted entity is keyed by a database sequence, so ids are `i64`
/// under the hood. Wrapping them keeps an order id from being passed where a
/// menu item id is expected.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of an authenticated user, as supplied by the identity provider.
    UserId
);

define_id!(
    /// Identifier of a catalog entry.
    MenuItemId
);

define_id!(
    /// Identifier of a placed order.
    OrderId
);

define_id!(
    /// Identifier of a single line within an order.
    OrderLineId
);

define_id!(
    /// Identifier of a user's basket.
    BasketId
);

define_id!(BasketEntryId);
