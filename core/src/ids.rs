//! Identifier newtypes.
//!
//! Every entity is keyed by a UUID wrapped in its own type so a `ProductId`
//! can never be passed where an `OrderId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a product
    ProductId
);
uuid_id!(
    /// Unique identifier for a category
    CategoryId
);
uuid_id!(
    /// Unique identifier for a cart line
    CartItemId
);
uuid_id!(
    /// Unique identifier for an order
    OrderId
);
uuid_id!(
    /// Unique identifier for an order line
    OrderItemId
);
uuid_id!(
    /// Identifier of a shopper, issued by the upstream identity provider
    UserId
);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(ProductId::from_uuid(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn ids_serialize_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&OrderId::from(uuid)).unwrap_or_default();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
