//! Marketplace key types
//!
//! On-chain records are addressed by opaque base58 strings. Each role gets
//! its own newtype so an item key can never be passed where an owner is
//! expected.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a key from anything string-like
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the key as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_key!(
    /// Address of the order account; stable for the order's lifetime
    OrderId
);
string_key!(
    /// Mint of the tradable item an order targets
    ItemKey
);
string_key!(
    /// Mint of the settlement currency
    CurrencyKey
);
string_key!(
    /// Wallet that created the order
    OwnerKey
);

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// Both sides, buy first
    pub const ALL: [Side; 2] = [Side::Buy, Side::Sell];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "buy" | "bid" => Ok(Side::Buy),
            "sell" | "ask" => Ok(Side::Sell),
            other => Err(crate::Error::invalid_input(format!("unknown side: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_side() {
        assert_eq!(Side::ALL, [Side::Buy, Side::Sell]);
        assert_eq!("ASK".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_keys_are_transparent_in_json() {
        let id = OrderId::new("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin\"");

        let side: Side = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_key_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ItemKey::from("item-1"), 3);
        assert_eq!(map.get("item-1"), Some(&3));
        assert_eq!(ItemKey::from("item-1").to_string(), "item-1");
    }
}
