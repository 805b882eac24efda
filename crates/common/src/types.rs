use serde::{Deserialize, Serialize};

/// Stock-keeping unit identifying a product.
///
/// Every batch and order line carries one; the `Product` aggregate is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a sku from any string-like value.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    /// Returns the sku as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique reference of a batch of stock.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRef(String);

impl BatchRef {
    /// Creates a batch reference from any string-like value.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BatchRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BatchRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_equality_is_by_value() {
        assert_eq!(Sku::new("RED-CHAIR"), Sku::from("RED-CHAIR"));
        assert_ne!(Sku::new("RED-CHAIR"), Sku::new("BLUE-CHAIR"));
    }

    #[test]
    fn batch_ref_display_matches_inner_value() {
        let reference = BatchRef::new("batch-001");
        assert_eq!(reference.to_string(), "batch-001");
        assert_eq!(reference.as_str(), "batch-001");
    }

    #[test]
    fn sku_serializes_transparently() {
        let sku = Sku::new("SMALL-TABLE");
        let json = serde_json::to_string(&sku).unwrap();
        assert_eq!(json, "\"SMALL-TABLE\"");

        let back: Sku = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sku);
    }
}
