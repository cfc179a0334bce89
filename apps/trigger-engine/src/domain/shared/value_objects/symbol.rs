//! Symbol value object for instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// A market symbol (exchange instrument pair).
///
/// Examples: "BTCUSDT", "ETHUSDT", "SOLUSDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol.
    ///
    /// The symbol is normalized to uppercase.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Lowercase form used in stream subscription paths.
    ///
    /// Exchange stream names are lowercase ("btcusdt@miniTicker") while the
    /// canonical symbol is uppercase.
    #[must_use]
    pub fn stream_name(&self) -> String {
        self.0.to_lowercase()
    }

    /// Validate the symbol before subscribing or indexing.
    ///
    /// # Errors
    ///
    /// Returns error if the symbol is empty, too long, or contains
    /// non-alphanumeric characters.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "symbol cannot be empty".to_string(),
            });
        }

        if self.0.len() > 20 {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "symbol exceeds maximum length".to_string(),
            });
        }

        if !self.0.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "symbol contains invalid characters".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_new_normalizes_case() {
        let s = Symbol::new("btcusdt");
        assert_eq!(s.as_str(), "BTCUSDT");
    }

    #[test]
    fn symbol_display() {
        let s = Symbol::new("ETHUSDT");
        assert_eq!(format!("{s}"), "ETHUSDT");
    }

    #[test]
    fn symbol_stream_name() {
        let s = Symbol::new("BTCUSDT");
        assert_eq!(s.stream_name(), "btcusdt");
    }

    #[test]
    fn symbol_validate_empty() {
        assert!(Symbol::new("").validate().is_err());
    }

    #[test]
    fn symbol_validate_too_long() {
        assert!(Symbol::new("A".repeat(25)).validate().is_err());
    }

    #[test]
    fn symbol_validate_invalid_chars() {
        assert!(Symbol::new("BTC/USDT").validate().is_err());
        assert!(Symbol::new("BTC USDT").validate().is_err());
    }

    #[test]
    fn symbol_validate_valid() {
        assert!(Symbol::new("BTCUSDT").validate().is_ok());
        assert!(Symbol::new("1000PEPEUSDT").validate().is_ok());
    }

    #[test]
    fn symbol_hash_dedups_case_variants() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Symbol::new("BTCUSDT"));
        set.insert(Symbol::new("btcusdt"));
        set.insert(Symbol::new("ETHUSDT"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn symbol_serde_roundtrip() {
        let s = Symbol::new("BTCUSDT");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"BTCUSDT\"");

        let parsed: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, s);
    }
}
