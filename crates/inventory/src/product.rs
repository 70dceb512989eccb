use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, ValueObject};

/// Maximum SKU length accepted by the ledger.
pub const MAX_SKU_LEN: usize = 64;

/// Stock keeping unit: the unique, immutable product identifier.
///
/// SKUs are case-sensitive; surrounding whitespace is rejected rather than trimmed so
/// that two spellings of the same code can never name different streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if raw.trim() != raw {
            return Err(DomainError::validation("sku cannot have surrounding whitespace"));
        }
        if raw.len() > MAX_SKU_LEN {
            return Err(DomainError::validation(format!(
                "sku cannot be longer than {MAX_SKU_LEN} characters"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(DomainError::validation("sku cannot contain control characters"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Sku::parse(value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

impl core::str::FromStr for Sku {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sku::parse(s)
    }
}

/// Whether stock for a product may go below zero pending replenishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackorderPolicy {
    Allowed,
    #[default]
    Disallowed,
}

impl BackorderPolicy {
    pub fn allows_negative(self) -> bool {
        matches!(self, BackorderPolicy::Allowed)
    }
}

/// Product reference held by the ledger.
///
/// The product catalog owns the full product record; the ledger keeps only what it
/// needs to enforce its rules (threshold, backorder policy) plus a few descriptive
/// fields for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    /// Quantity at or below which a low-stock alert is raised.
    pub reorder_threshold: i64,
    #[serde(default)]
    pub backorder: BackorderPolicy,
}

impl Product {
    pub fn new(sku: Sku, name: impl Into<String>) -> Self {
        Self {
            sku,
            name: name.into(),
            category: None,
            unit_of_measure: None,
            reorder_threshold: 0,
            backorder: BackorderPolicy::Disallowed,
        }
    }

    pub fn with_threshold(mut self, reorder_threshold: i64) -> Self {
        self.reorder_threshold = reorder_threshold;
        self
    }

    pub fn with_backorder(mut self, backorder: BackorderPolicy) -> Self {
        self.backorder = backorder;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.reorder_threshold < 0 {
            return Err(DomainError::validation("reorder threshold cannot be negative"));
        }
        Ok(())
    }
}

impl Entity for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_rejects_blank_and_padded_values() {
        assert!(Sku::parse("").is_err());
        assert!(Sku::parse(" A-1").is_err());
        assert!(Sku::parse("A-1\n").is_err());
        assert!(Sku::parse("x".repeat(MAX_SKU_LEN + 1)).is_err());
        assert_eq!(Sku::parse("A-1").unwrap().as_str(), "A-1");
    }

    #[test]
    fn sku_deserialization_validates() {
        let ok: Sku = serde_json::from_str("\"WIDGET-9\"").unwrap();
        assert_eq!(ok.as_str(), "WIDGET-9");
        assert!(serde_json::from_str::<Sku>("\"\"").is_err());
    }

    #[test]
    fn product_defaults_to_disallowing_backorders() {
        let product = Product::new(Sku::parse("A").unwrap(), "Widget");
        assert_eq!(product.backorder, BackorderPolicy::Disallowed);
        assert!(!product.backorder.allows_negative());
        assert_eq!(product.id().as_str(), "A");
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let product = Product::new(Sku::parse("A").unwrap(), "Widget").with_threshold(-1);
        assert!(matches!(product.validate(), Err(DomainError::Validation(_))));
    }
}
