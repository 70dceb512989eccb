//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**: two value objects with the same attribute
//! values are the same value. In the ledger, a SKU and a FIFO cost layer are values,
//! while a product reference is an entity keyed by its SKU.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one with the new values.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct CostLayer { quantity: i64, unit_cost: Decimal }
///
/// impl ValueObject for CostLayer {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
