//! Identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to the position (or recommendation) a trigger belongs to.
///
/// The engine never interprets this beyond equality; it is handed back to the
/// persistence collaborator when a hit is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(i64);

impl PositionId {
    /// Create a new position id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PositionId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_id_display() {
        assert_eq!(PositionId::new(42).to_string(), "42");
    }

    #[test]
    fn position_id_roundtrip() {
        let id = PositionId::from(7);
        assert_eq!(id.value(), 7);
    }
}
