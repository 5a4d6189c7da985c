//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a user account (actor identity).
    UserId,
    "UserId"
);
uuid_newtype!(
    /// Identifier of an RBAC role.
    RoleId,
    "RoleId"
);
uuid_newtype!(
    /// Identifier of a node in the category hierarchy.
    CategoryId,
    "CategoryId"
);
uuid_newtype!(BrandId, "BrandId");
uuid_newtype!(
    /// Identifier of a store, warehouse or service center.
    LocationId,
    "LocationId"
);
uuid_newtype!(CustomerId, "CustomerId");
uuid_newtype!(SupplierId, "SupplierId");
uuid_newtype!(
    /// Identifier of a catalog item (the rentable/sellable product definition).
    ItemId,
    "ItemId"
);
uuid_newtype!(
    /// Identifier of one physical, individually tracked unit of an item.
    UnitId,
    "UnitId"
);
uuid_newtype!(StockLevelId, "StockLevelId");
uuid_newtype!(TransactionId, "TransactionId");
uuid_newtype!(
    /// Identifier of a transaction line (unique across transactions).
    LineId,
    "LineId"
);
uuid_newtype!(
    /// Identifier of a rental return.
    ReturnId,
    "ReturnId"
);
uuid_newtype!(ReturnLineId, "ReturnLineId");
uuid_newtype!(
    /// Identifier of a key/value system setting.
    SettingId,
    "SettingId"
);
