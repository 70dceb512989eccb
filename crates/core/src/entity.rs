//! Ledger records with a stable identity.

/// A record whose identity survives changes to its other fields: a product keeps its
/// SKU across threshold updates, an alert keeps its id from raise to resolve.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
