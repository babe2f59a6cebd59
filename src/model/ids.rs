//! Type-safe ID wrappers for tickets and window categories

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every ticket id
pub const TICKET_PREFIX: &str = "T";

/// Type-safe wrapper for ticket IDs
///
/// Derived from the ticket number: `"T" + number` (e.g., "T1", "T42").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Create a TicketId from an arbitrary string (e.g., operator input)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id for a ticket number
    pub fn from_number(number: u64) -> Self {
        Self(format!("{}{}", TICKET_PREFIX, number))
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TicketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Type-safe wrapper for window category IDs
///
/// Time-derived (milliseconds since the epoch), e.g. "1718000000123".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    /// Create a WindowId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WindowId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for WindowId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_from_number() {
        let id = TicketId::from_number(42);
        assert_eq!(id.as_str(), "T42");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&TicketId::from_number(7)).unwrap();
        assert_eq!(json, "\"T7\"");

        let id: WindowId = serde_json::from_str("\"1718000000123\"").unwrap();
        assert_eq!(id.as_str(), "1718000000123");
    }
}
