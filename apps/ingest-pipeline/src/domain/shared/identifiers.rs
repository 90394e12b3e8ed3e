//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(SourceId, "Identifier for a registered market-data source.");
define_id!(AssetId, "Identifier for a canonical asset.");
define_id!(CycleId, "Unique identifier for one pipeline cycle.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_new_and_display() {
        let id = SourceId::new("binance");
        assert_eq!(id.as_str(), "binance");
        assert_eq!(format!("{id}"), "binance");
    }

    #[test]
    fn cycle_id_generate_is_unique() {
        let id1 = CycleId::generate();
        let id2 = CycleId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn asset_id_equality() {
        let id1 = AssetId::new("asset-btc");
        let id2 = AssetId::new("asset-btc");
        let id3 = AssetId::new("asset-eth");
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn asset_id_serde_transparent() {
        let id = AssetId::new("asset-btc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"asset-btc\"");
    }
}
