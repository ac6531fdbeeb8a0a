//! Integer identifiers for marketplace entities.
//!
//! Ids are assigned by the store in insertion order, so sorting by id is the
//! same as sorting by creation.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn value(&self) -> u64 {
                self.0
            }

            /// Big-endian key bytes, so byte order matches numeric order.
            pub fn to_key(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifies a registered account.
    AccountId
);
entity_id!(
    /// Identifies a game listing.
    ListingId
);
entity_id!(PurchaseId);
entity_id!(CommentId);
