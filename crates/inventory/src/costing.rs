//! Costing books: per-SKU cost state under weighted-average or FIFO costing.
//!
//! A book answers two questions for the ledger: what a movement costs (the realized
//! unit cost of an issue, or the incoming cost of a receipt) and what the stock on
//! hand is worth. Books are deterministic: replaying the same committed movements
//! into an empty book always reproduces the same state.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ValueObject};

use crate::movement::{PositionSnapshot, StockMovement};
use crate::position::check_stock;
use crate::product::BackorderPolicy;

/// Decimal places kept for averaged and blended unit costs.
pub const COST_SCALE: u32 = 10;

/// Costing method, selected per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostingMethod {
    #[default]
    WeightedAverage,
    Fifo,
}

impl CostingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostingMethod::WeightedAverage => "weighted_average",
            CostingMethod::Fifo => "fifo",
        }
    }
}

impl core::str::FromStr for CostingMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "weighted_average" | "average" => Ok(CostingMethod::WeightedAverage),
            "fifo" => Ok(CostingMethod::Fifo),
            other => Err(DomainError::validation(format!("unknown costing method '{other}'"))),
        }
    }
}

/// A FIFO batch of stock with its own unit cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayer {
    pub quantity: i64,
    pub unit_cost: Decimal,
}

impl ValueObject for CostLayer {}

/// Cost of one movement as decided by a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostedMovement {
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

fn out_of_range() -> DomainError {
    DomainError::validation("monetary amount out of range")
}

/// `quantity × unit_cost`, rejecting results `Decimal` cannot represent.
fn checked_amount(quantity: i64, unit_cost: Decimal) -> DomainResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_cost)
        .ok_or_else(out_of_range)
}

fn checked_sum(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(out_of_range)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeightedAverageBook {
    quantity: i64,
    average: Decimal,
    valuation: Decimal,
}

impl WeightedAverageBook {
    fn receive(&mut self, quantity: i64, unit_cost: Decimal) -> DomainResult<()> {
        let next = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        let average = if self.quantity <= 0 || next <= 0 {
            // Nothing on hand to blend with (or still backordered): the receipt sets the basis.
            unit_cost
        } else {
            let held = checked_amount(self.quantity, self.average)?;
            let incoming = checked_amount(quantity, unit_cost)?;
            (checked_sum(held, incoming)? / Decimal::from(next)).round_dp(COST_SCALE)
        };
        let valuation = checked_amount(next, average)?;

        self.quantity = next;
        self.average = average;
        self.valuation = valuation;
        Ok(())
    }

    fn issue(&mut self, quantity: i64, backorder: BackorderPolicy) -> DomainResult<CostedMovement> {
        let next = check_stock(self.quantity, -quantity, backorder)?;
        let total_cost = checked_amount(quantity, self.average)?;
        let valuation = checked_amount(next, self.average)?;

        self.quantity = next;
        self.valuation = valuation;
        Ok(CostedMovement {
            unit_cost: self.average,
            total_cost,
        })
    }

    pub fn average(&self) -> Decimal {
        self.average
    }
}

/// FIFO cost state. While `shortfall` is positive the layer queue is empty: receipts
/// fill the shortfall before opening a new layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FifoBook {
    layers: VecDeque<CostLayer>,
    /// Units issued beyond the available layers (backorders).
    shortfall: i64,
    /// Cost of the most recent receipt; prices uncovered issues.
    last_cost: Decimal,
    /// Layer values minus the shortfall priced at `last_cost`.
    valuation: Decimal,
}

impl FifoBook {
    fn receive(&mut self, quantity: i64, unit_cost: Decimal) -> DomainResult<()> {
        self.quantity()
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        let filled = self.shortfall.min(quantity);
        let shortfall = self.shortfall - filled;
        let remaining = quantity - filled;

        let valuation = if self.shortfall == 0 {
            checked_sum(self.valuation, checked_amount(quantity, unit_cost)?)?
        } else {
            // No layers while backordered; the remaining shortfall reprices at the new cost.
            checked_amount(remaining - shortfall, unit_cost)?
        };

        self.shortfall = shortfall;
        if remaining > 0 {
            self.layers.push_back(CostLayer {
                quantity: remaining,
                unit_cost,
            });
        }
        self.last_cost = unit_cost;
        self.valuation = valuation;
        Ok(())
    }

    fn issue(&mut self, quantity: i64, backorder: BackorderPolicy) -> DomainResult<CostedMovement> {
        check_stock(self.quantity(), -quantity, backorder)?;

        // Price against the layers first so a rejected issue leaves the book untouched.
        let mut remaining = quantity;
        let mut total = Decimal::ZERO;
        let mut consumed = 0usize;
        let mut split = 0i64;
        for layer in &self.layers {
            if remaining == 0 {
                break;
            }
            let take = layer.quantity.min(remaining);
            total = checked_sum(total, checked_amount(take, layer.unit_cost)?)?;
            remaining -= take;
            if take == layer.quantity {
                consumed += 1;
            } else {
                split = take;
            }
        }
        if remaining > 0 {
            total = checked_sum(total, checked_amount(remaining, self.last_cost)?)?;
        }
        let valuation = self.valuation.checked_sub(total).ok_or_else(out_of_range)?;
        let shortfall = self
            .shortfall
            .checked_add(remaining)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;

        self.layers.drain(..consumed);
        if let Some(front) = self.layers.front_mut() {
            front.quantity -= split;
        }
        self.shortfall = shortfall;
        self.valuation = valuation;

        Ok(CostedMovement {
            unit_cost: (total / Decimal::from(quantity)).round_dp(COST_SCALE),
            total_cost: total,
        })
    }

    fn quantity(&self) -> i64 {
        self.layers.iter().map(|l| l.quantity).sum::<i64>() - self.shortfall
    }

    pub fn layers(&self) -> impl Iterator<Item = &CostLayer> {
        self.layers.iter()
    }

    pub fn shortfall(&self) -> i64 {
        self.shortfall
    }
}

/// Per-SKU cost state.
///
/// Every amount a book holds was computed with checked arithmetic when the movement
/// was posted; a movement whose amounts `Decimal` cannot represent is rejected with a
/// validation error and the book is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CostBook {
    WeightedAverage(WeightedAverageBook),
    Fifo(FifoBook),
}

impl CostBook {
    pub fn new(method: CostingMethod) -> Self {
        match method {
            CostingMethod::WeightedAverage => CostBook::WeightedAverage(WeightedAverageBook::default()),
            CostingMethod::Fifo => CostBook::Fifo(FifoBook::default()),
        }
    }

    pub fn method(&self) -> CostingMethod {
        match self {
            CostBook::WeightedAverage(_) => CostingMethod::WeightedAverage,
            CostBook::Fifo(_) => CostingMethod::Fifo,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            CostBook::WeightedAverage(b) => b.quantity,
            CostBook::Fifo(b) => b.quantity(),
        }
    }

    pub fn valuation(&self) -> Decimal {
        match self {
            CostBook::WeightedAverage(b) => b.valuation,
            CostBook::Fifo(b) => b.valuation,
        }
    }

    /// Current cost basis per unit.
    pub fn unit_cost(&self) -> Decimal {
        match self {
            CostBook::WeightedAverage(b) => b.average,
            CostBook::Fifo(b) => {
                let quantity = b.quantity();
                if quantity > 0 {
                    (b.valuation / Decimal::from(quantity)).round_dp(COST_SCALE)
                } else {
                    b.last_cost
                }
            }
        }
    }

    /// Remaining FIFO layers, oldest first (empty for weighted-average books).
    pub fn layers(&self) -> Vec<CostLayer> {
        match self {
            CostBook::WeightedAverage(_) => Vec::new(),
            CostBook::Fifo(b) => b.layers().copied().collect(),
        }
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            quantity: self.quantity(),
            unit_cost: self.unit_cost(),
            valuation: self.valuation(),
        }
    }

    /// Post a movement into the book.
    ///
    /// Increases are received at `incoming_cost`, or at the current basis when no
    /// cost was supplied (upward adjustments). Decreases are issued under the
    /// book's method and fail with `InsufficientStock` when the stock rule rejects
    /// them. On error the book is unchanged.
    pub fn post(
        &mut self,
        delta: i64,
        incoming_cost: Option<Decimal>,
        backorder: BackorderPolicy,
    ) -> DomainResult<CostedMovement> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        if delta > 0 {
            let unit_cost = incoming_cost.unwrap_or_else(|| self.unit_cost());
            let total_cost = checked_amount(delta, unit_cost)?;
            match self {
                CostBook::WeightedAverage(b) => b.receive(delta, unit_cost)?,
                CostBook::Fifo(b) => b.receive(delta, unit_cost)?,
            }
            return Ok(CostedMovement {
                unit_cost,
                total_cost,
            });
        }

        match self {
            CostBook::WeightedAverage(b) => b.issue(-delta, backorder),
            CostBook::Fifo(b) => b.issue(-delta, backorder),
        }
    }

    /// Decide the cost of a movement without changing the book.
    ///
    /// Returns the cost together with the position the book would hold afterwards.
    pub fn preview(
        &self,
        delta: i64,
        incoming_cost: Option<Decimal>,
        backorder: BackorderPolicy,
    ) -> DomainResult<(CostedMovement, PositionSnapshot)> {
        let mut next = self.clone();
        let costed = next.post(delta, incoming_cost, backorder)?;
        Ok((costed, next.snapshot()))
    }

    /// Apply an already committed movement.
    ///
    /// The stock rule was enforced at commit time, so issues are never re-rejected
    /// here (the product's backorder policy may have changed since).
    pub fn apply(&mut self, movement: &StockMovement) -> DomainResult<()> {
        let incoming = movement.is_increase().then_some(movement.unit_cost);
        self.post(movement.delta, incoming, BackorderPolicy::Allowed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn post(book: &mut CostBook, delta: i64, cost: Option<Decimal>) -> CostedMovement {
        book.post(delta, cost, BackorderPolicy::Disallowed).unwrap()
    }

    #[test]
    fn weighted_average_follows_the_reorder_scenario() {
        let mut book = CostBook::new(CostingMethod::WeightedAverage);

        post(&mut book, 50, Some(dec!(2.00)));
        assert_eq!(book.quantity(), 50);
        assert_eq!(book.valuation(), dec!(100.00));

        let issued = post(&mut book, -45, None);
        assert_eq!(issued.unit_cost, dec!(2.00));
        assert_eq!(issued.total_cost, dec!(90.00));
        assert_eq!(book.valuation(), dec!(10.00));
        assert_eq!(book.unit_cost(), dec!(2.00));

        post(&mut book, 20, Some(dec!(3.00)));
        assert_eq!(book.quantity(), 25);
        assert_eq!(book.unit_cost(), dec!(2.80));
        assert_eq!(book.valuation(), dec!(70.00));
    }

    #[test]
    fn fifo_consumes_oldest_layers_and_splits() {
        let mut book = CostBook::new(CostingMethod::Fifo);
        post(&mut book, 10, Some(dec!(1.00)));
        post(&mut book, 10, Some(dec!(2.00)));

        let issued = post(&mut book, -15, None);
        assert_eq!(issued.total_cost, dec!(20.00));
        assert_eq!(issued.unit_cost, dec!(1.3333333333));

        assert_eq!(
            book.layers(),
            vec![CostLayer {
                quantity: 5,
                unit_cost: dec!(2.00)
            }]
        );
        assert_eq!(book.valuation(), dec!(10.00));
        assert_eq!(book.unit_cost(), dec!(2.00));
    }

    #[test]
    fn fifo_rejects_uncovered_issue_without_backorder() {
        let mut book = CostBook::new(CostingMethod::Fifo);
        post(&mut book, 5, Some(dec!(1.00)));

        let err = book.post(-6, None, BackorderPolicy::Disallowed).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(5, 6));
        assert_eq!(book.quantity(), 5);
    }

    #[test]
    fn fifo_backorder_is_filled_by_next_receipt() {
        let mut book = CostBook::new(CostingMethod::Fifo);
        post(&mut book, 5, Some(dec!(1.00)));

        let issued = book.post(-8, None, BackorderPolicy::Allowed).unwrap();
        assert_eq!(issued.total_cost, dec!(8.00));
        assert_eq!(book.quantity(), -3);
        assert_eq!(book.valuation(), dec!(-3.00));

        post(&mut book, 10, Some(dec!(4.00)));
        assert_eq!(book.quantity(), 7);
        assert_eq!(
            book.layers(),
            vec![CostLayer {
                quantity: 7,
                unit_cost: dec!(4.00)
            }]
        );
        assert_eq!(book.valuation(), dec!(28.00));
    }

    #[test]
    fn weighted_average_receipt_after_backorder_resets_basis() {
        let mut book = CostBook::new(CostingMethod::WeightedAverage);
        post(&mut book, 2, Some(dec!(5.00)));
        book.post(-4, None, BackorderPolicy::Allowed).unwrap();
        assert_eq!(book.quantity(), -2);

        post(&mut book, 6, Some(dec!(7.00)));
        assert_eq!(book.quantity(), 4);
        assert_eq!(book.unit_cost(), dec!(7.00));
    }

    #[test]
    fn upward_adjustment_without_cost_uses_current_basis() {
        let mut book = CostBook::new(CostingMethod::WeightedAverage);
        post(&mut book, 10, Some(dec!(3.00)));
        let adjusted = post(&mut book, 2, None);
        assert_eq!(adjusted.unit_cost, dec!(3.00));
        assert_eq!(book.valuation(), dec!(36.00));
    }

    #[test]
    fn receipt_too_large_to_value_is_rejected_and_book_unchanged() {
        for method in [CostingMethod::WeightedAverage, CostingMethod::Fifo] {
            let mut book = CostBook::new(method);
            post(&mut book, 10, Some(dec!(2.00)));
            let before = book.clone();

            let err = book
                .post(1_000_000_000_000, Some(Decimal::from(100_000_000_000_000_000i64)), BackorderPolicy::Disallowed)
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{method:?}: {err:?}");
            assert_eq!(book, before);
        }
    }

    #[test]
    fn holdings_past_the_decimal_range_are_rejected() {
        let big = Decimal::from(50_000_000_000_000_000i64);
        for method in [CostingMethod::WeightedAverage, CostingMethod::Fifo] {
            let mut book = CostBook::new(method);
            post(&mut book, 1_000_000_000_000, Some(big));
            let before = book.clone();

            assert!(book.post(1_000_000_000_000, Some(big), BackorderPolicy::Disallowed).is_err());
            assert!(book.preview(1_000_000_000_000, Some(big), BackorderPolicy::Disallowed).is_err());
            assert_eq!(book, before);
            assert_eq!(book.valuation(), big * dec!(1000000000000));
        }
    }

    #[test]
    fn fifo_partial_issue_across_three_layers() {
        let mut book = CostBook::new(CostingMethod::Fifo);
        post(&mut book, 2, Some(dec!(1.00)));
        post(&mut book, 3, Some(dec!(2.00)));
        post(&mut book, 4, Some(dec!(3.00)));

        let issued = post(&mut book, -6, None);
        assert_eq!(issued.total_cost, dec!(11.00));
        assert_eq!(
            book.layers(),
            vec![CostLayer {
                quantity: 3,
                unit_cost: dec!(3.00)
            }]
        );
        assert_eq!(book.valuation(), dec!(9.00));
    }

    #[test]
    fn preview_leaves_book_untouched() {
        let mut book = CostBook::new(CostingMethod::Fifo);
        post(&mut book, 3, Some(dec!(1.50)));
        let before = book.clone();

        let (costed, after) = book.preview(-2, None, BackorderPolicy::Disallowed).unwrap();
        assert_eq!(costed.total_cost, dec!(3.00));
        assert_eq!(after.quantity, 1);
        assert_eq!(book, before);
    }

    #[test]
    fn costing_method_parses_common_spellings() {
        assert_eq!("FIFO".parse::<CostingMethod>().unwrap(), CostingMethod::Fifo);
        assert_eq!(
            "weighted-average".parse::<CostingMethod>().unwrap(),
            CostingMethod::WeightedAverage
        );
        assert!("lifo".parse::<CostingMethod>().is_err());
    }

    fn method_strategy() -> impl Strategy<Value = CostingMethod> {
        prop_oneof![Just(CostingMethod::WeightedAverage), Just(CostingMethod::Fifo)]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: FIFO layers always sum to the book quantity, and the valuation is
        /// the sum of layer values.
        #[test]
        fn fifo_layers_sum_to_quantity(
            moves in prop::collection::vec((-40i64..60i64, 1u32..500u32), 1..40)
        ) {
            let mut book = CostBook::new(CostingMethod::Fifo);
            let mut quantity = 0i64;

            for (delta, cents) in moves.into_iter().filter(|(d, _)| *d != 0) {
                let cost = Decimal::new(cents as i64, 2);
                if book.post(delta, Some(cost), BackorderPolicy::Disallowed).is_ok() {
                    quantity += delta;
                }
                let layers = book.layers();
                prop_assert_eq!(layers.iter().map(|l| l.quantity).sum::<i64>(), quantity);
                let value: Decimal = layers
                    .iter()
                    .map(|l| Decimal::from(l.quantity) * l.unit_cost)
                    .sum();
                prop_assert_eq!(value, book.valuation());
                prop_assert!(layers.iter().all(|l| l.quantity > 0));
            }
        }

        /// Property: re-applying the recorded movements to an empty book reproduces the
        /// incrementally maintained book, for both methods, with and without backorders.
        #[test]
        fn replay_reproduces_book(
            method in method_strategy(),
            allow_backorder in any::<bool>(),
            moves in prop::collection::vec((-40i64..60i64, 1u32..500u32), 1..40)
        ) {
            let backorder = if allow_backorder {
                BackorderPolicy::Allowed
            } else {
                BackorderPolicy::Disallowed
            };
            let mut live = CostBook::new(method);
            let mut recorded = Vec::new();

            for (delta, cents) in moves.into_iter().filter(|(d, _)| *d != 0) {
                let incoming = (delta > 0).then(|| Decimal::new(cents as i64, 2));
                if let Ok(costed) = live.post(delta, incoming, backorder) {
                    recorded.push((delta, costed.unit_cost));
                }
            }

            let mut replayed = CostBook::new(method);
            for (delta, unit_cost) in recorded {
                let incoming = (delta > 0).then_some(unit_cost);
                replayed.post(delta, incoming, BackorderPolicy::Allowed).unwrap();
            }

            prop_assert_eq!(replayed, live);
        }
    }
}
