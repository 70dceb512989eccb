//! The inventory ledger: commit path and read side.
//!
//! ```text
//! RecordMovement
//!   ↓
//! 1. Validate request (quantity, cost, actor)
//!   ↓
//! 2. Reserve idempotency key (replay the prior result if already committed)
//!   ↓
//! 3. Decide against a lane snapshot (stock rule, costing preview)
//!   ↓
//! 4. Lane guard + version compare (retry on mismatch)
//!   ↓
//! 5. Append to the movement log (ExpectedVersion::Exact)
//!   ↓
//! 6. Quantity projector → costing engine → threshold monitor
//!   ↓
//! 7. Publish LedgerEvent envelopes (best-effort)
//! ```
//!
//! Once step 5 succeeds the movement is final; the only undo is a compensating
//! adjustment.

mod error;
mod event;
mod idempotency;
mod lanes;
mod report;

use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use stockledger_core::{DomainError, ExpectedVersion, MovementId};
use stockledger_events::{Event, EventBus, EventEnvelope, Subscription};
use stockledger_inventory::{
    Alert, CostLayer, InventoryPosition, PositionSnapshot, Product, RecordMovement, Sku,
    StockMovement, ThresholdTransition,
};

use crate::audit::{AuditFilter, AuditPage, AuditQuery, ContinuationToken, page_limit};
use crate::catalog::ProductCatalog;
use crate::config::LedgerConfig;
use crate::movement_log::{MovementStore, MovementStoreError};
use crate::projections::{
    AlertStatus, CostingEngine, ProjectionError, QuantityProjector, ThresholdMonitor,
};
use crate::replay::{self, VerificationReport};

pub use error::LedgerError;
pub use event::{LedgerEvent, SKU_STREAM_TYPE};
pub use report::{
    MovementResult, PositionQuery, PositionSort, StockReportLine, ValuationReport,
};

use idempotency::{IdempotencyCache, Reservation};
use lanes::{Lane, LaneArena};

type AlertChange = Option<(ThresholdTransition, Alert)>;

pub struct InventoryLedger<S, C, B> {
    store: S,
    catalog: C,
    bus: B,
    config: LedgerConfig,

    quantities: QuantityProjector,
    costing: CostingEngine,
    alerts: ThresholdMonitor,

    lanes: LaneArena,
    idempotency: IdempotencyCache,
    /// Commits and reads share it; rebuild/verify take it exclusively.
    gate: RwLock<()>,
}

impl<S, C, B> InventoryLedger<S, C, B>
where
    S: MovementStore,
    C: ProductCatalog,
    B: EventBus<EventEnvelope<LedgerEvent>>,
{
    /// Build a ledger over an existing log, replaying it into fresh projections.
    pub fn open(store: S, catalog: C, bus: B, config: LedgerConfig) -> Result<Self, LedgerError> {
        let ledger = Self {
            store,
            catalog,
            bus,
            costing: CostingEngine::new(config.costing_method),
            config,
            quantities: QuantityProjector::new(),
            alerts: ThresholdMonitor::new(),
            lanes: LaneArena::default(),
            idempotency: IdempotencyCache::default(),
            gate: RwLock::new(()),
        };

        let replayed = ledger.replay_log()?;
        info!(
            movements = replayed,
            costing = ?ledger.config.costing_method,
            "inventory ledger opened"
        );
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to ledger events published after each commit.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<LedgerEvent>> {
        self.bus.subscribe()
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Record one stock movement.
    ///
    /// Either the movement is fully committed (logged and applied to every
    /// projection) or nothing is persisted. Resubmitting an idempotency key returns
    /// the original result.
    #[instrument(
        skip(self, request),
        fields(sku = %request.sku, kind = request.kind.as_str(), actor = %request.actor)
    )]
    pub fn record_movement(&self, request: RecordMovement) -> Result<MovementResult, LedgerError> {
        let delta = request.signed_delta().map_err(invalid_quantity)?;
        request.validate_unit_cost().map_err(invalid_quantity)?;
        request.validate_metadata()?;

        let _gate = self.gate.read().map_err(|_| LedgerError::Poisoned)?;

        let key_guard = match &request.idempotency_key {
            Some(key) => match self.idempotency.reserve(key, &request.sku)? {
                Reservation::Replay(prior) => {
                    if !same_request(&prior, &request, delta) {
                        warn!(
                            idempotency_key = %key,
                            prior_movement = %prior.id,
                            "idempotency key reused with a different payload; returning original result"
                        );
                    } else {
                        debug!(idempotency_key = %key, prior_movement = %prior.id, "idempotent replay");
                    }
                    return Ok(prior.into());
                }
                Reservation::Owner(guard) => Some(guard),
            },
            None => None,
        };

        let movement = self.commit(&request, delta)?;
        if let Some(guard) = key_guard {
            guard.complete(&movement);
        }
        Ok(movement.into())
    }

    /// Register or update a product reference in the catalog.
    ///
    /// A changed threshold is applied from the next committed movement onwards.
    pub fn register_product(&self, product: Product) -> Result<Option<Product>, LedgerError> {
        let previous = self.catalog.upsert(product)?;
        Ok(previous)
    }

    fn commit(&self, request: &RecordMovement, delta: i64) -> Result<StockMovement, LedgerError> {
        let sku = &request.sku;
        let product = self
            .catalog
            .get(sku)
            .ok_or_else(|| LedgerError::UnknownProduct(sku.clone()))?;
        let lane = self.lane(sku)?;
        let attempts = self.config.max_commit_retries.max(1);

        for attempt in 1..=attempts {
            let version = lane.version()?;
            let draft = match self.decide(request, delta, &product, version) {
                Ok(draft) => draft,
                // A rejection decided on a snapshot that has since moved is not final.
                Err(_) if lane.version()? != version => continue,
                Err(e) => return Err(e),
            };

            let mut current = lane.lock()?;
            if *current != version {
                debug!(attempt, expected = version, found = *current, "lane moved; retrying");
                drop(current);
                std::thread::yield_now();
                continue;
            }

            let stored = match self.store.append(draft, ExpectedVersion::Exact(version)) {
                Ok(stored) => stored,
                Err(MovementStoreError::Concurrency(reason)) => {
                    debug!(attempt, %reason, "movement log rejected version; retrying");
                    drop(current);
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let change = self.apply_committed(&stored, product.reorder_threshold)?;
            *current = stored.sequence;

            info!(
                sku = %stored.sku,
                sequence = stored.sequence,
                position = stored.commit_position,
                delta = stored.delta,
                quantity = stored.resulting.quantity,
                "movement committed"
            );
            self.publish(&stored, change);
            return Ok(stored);
        }

        warn!(sku = %sku, attempts, "commit retries exhausted");
        Err(LedgerError::Contention {
            sku: sku.clone(),
            attempts,
        })
    }

    /// Decide a movement against the projections as of `version`.
    fn decide(
        &self,
        request: &RecordMovement,
        delta: i64,
        product: &Product,
        version: u64,
    ) -> Result<StockMovement, LedgerError> {
        let sku = &request.sku;
        let quantity = self
            .quantities
            .check(sku, delta, product.backorder)
            .map_err(rejected)?;
        let incoming = if delta > 0 { request.unit_cost } else { None };
        let (costed, after) = self
            .costing
            .preview(sku, delta, incoming, product.backorder)
            .map_err(rejected)?;

        Ok(StockMovement {
            id: MovementId::new(),
            sku: sku.clone(),
            kind: request.kind,
            direction: request.direction,
            sequence: version + 1,
            commit_position: 0,
            delta,
            unit_cost: costed.unit_cost,
            total_cost: costed.total_cost,
            actor: request.actor.clone(),
            reference: request.reference.clone(),
            idempotency_key: request.idempotency_key.clone(),
            recorded_at: Utc::now(),
            resulting: PositionSnapshot {
                quantity,
                unit_cost: after.unit_cost,
                valuation: after.valuation,
            },
            reorder_threshold: Some(product.reorder_threshold),
        })
    }

    fn apply_committed(
        &self,
        movement: &StockMovement,
        threshold: i64,
    ) -> Result<AlertChange, LedgerError> {
        let applied = self
            .quantities
            .apply(movement)
            .and_then(|_| self.costing.apply(movement))
            .and_then(|_| self.alerts.evaluate(movement, threshold));
        applied.map_err(LedgerError::Projection)
    }

    fn publish(&self, movement: &StockMovement, change: AlertChange) {
        let mut events = vec![LedgerEvent::MovementRecorded(movement.clone())];
        match change {
            Some((ThresholdTransition::Raised, alert)) => events.push(LedgerEvent::AlertRaised(alert)),
            Some((ThresholdTransition::Resolved, alert)) => {
                events.push(LedgerEvent::AlertResolved(alert))
            }
            None => {}
        }

        for event in events {
            let event_type = event.event_type();
            match self.bus.publish(event.into_envelope(movement.sequence)) {
                Ok(subscribers) => debug!(event_type, subscribers, "ledger event published"),
                Err(err) => {
                    warn!(sku = %movement.sku, event_type, error = ?err, "event publication failed; commit stands")
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn product(&self, sku: &Sku) -> Option<Product> {
        self.catalog.get(sku)
    }

    /// Current quantity and cost basis of a known product.
    pub fn get_position(&self, sku: &Sku) -> Result<InventoryPosition, LedgerError> {
        self.known(sku)?;
        let _gate = self.gate.read().map_err(|_| LedgerError::Poisoned)?;
        self.read_position(sku)
    }

    /// Positions of every catalogued product (never-moved products report zero).
    pub fn list_positions(&self, query: &PositionQuery) -> Result<Vec<StockReportLine>, LedgerError> {
        let _gate = self.gate.read().map_err(|_| LedgerError::Poisoned)?;
        let wanted = query.category.as_deref().map(str::to_lowercase);

        let mut lines = Vec::new();
        for product in self.catalog.list() {
            let in_category = match (&wanted, &product.category) {
                (None, _) => true,
                (Some(w), Some(c)) => c.to_lowercase() == *w,
                (Some(_), None) => false,
            };
            if !in_category {
                continue;
            }
            let position = self.read_position(&product.sku)?;
            lines.push(StockReportLine::new(&product, &position));
        }

        report::sort_lines(&mut lines, query);
        Ok(lines)
    }

    /// Point-in-time report of products at or below their reorder threshold.
    pub fn low_stock(&self) -> Result<Vec<StockReportLine>, LedgerError> {
        let mut lines = self.list_positions(&PositionQuery::default())?;
        lines.retain(StockReportLine::is_low);
        Ok(lines)
    }

    /// Valuation of one SKU, or of the whole inventory when `sku` is `None`.
    pub fn valuation(&self, sku: Option<&Sku>) -> Result<Decimal, LedgerError> {
        match sku {
            Some(sku) => Ok(self.get_position(sku)?.valuation),
            None => {
                let _gate = self.gate.read().map_err(|_| LedgerError::Poisoned)?;
                Ok(self.costing.total_valuation()?)
            }
        }
    }

    /// Total valuation with the per-product breakdown.
    pub fn valuation_report(&self) -> Result<ValuationReport, LedgerError> {
        let lines = self.list_positions(&PositionQuery::default())?;
        let total = lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.valuation))
            .ok_or(LedgerError::Projection(ProjectionError::ValuationOverflow))?;
        Ok(ValuationReport {
            method: self.costing.method(),
            total,
            lines,
        })
    }

    /// Remaining FIFO cost layers for a SKU (empty under weighted-average costing).
    pub fn layers(&self, sku: &Sku) -> Result<Vec<CostLayer>, LedgerError> {
        self.known(sku)?;
        let _gate = self.gate.read().map_err(|_| LedgerError::Poisoned)?;
        let lane = self.lane(sku)?;
        let _guard = lane.lock()?;
        Ok(self.costing.layers(sku)?)
    }

    pub fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<Alert>, LedgerError> {
        Ok(self.alerts.list(status)?)
    }

    /// Lazy audit scan in commit order.
    pub fn audit(&self, filter: AuditFilter) -> AuditQuery<'_, S> {
        AuditQuery::new(&self.store, filter)
    }

    /// One page of audit history; `token` continues a previous page.
    pub fn query_audit(
        &self,
        filter: AuditFilter,
        token: Option<&str>,
        limit: Option<u32>,
    ) -> Result<AuditPage, LedgerError> {
        let query = match token {
            Some(raw) => {
                let token: ContinuationToken = raw.parse()?;
                AuditQuery::from_token(&self.store, filter, &token)?
            }
            None => AuditQuery::new(&self.store, filter),
        };
        Ok(query.page(page_limit(limit))?)
    }

    // ---------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------

    /// Replay the log into fresh projections and compare with the live state; with
    /// `repair`, rebuild the projections when anything differs.
    pub fn verify(&self, repair: bool) -> Result<VerificationReport, LedgerError> {
        let _gate = self.gate.write().map_err(|_| LedgerError::Poisoned)?;
        let mut report = replay::verify(
            &self.store,
            self.config.costing_method,
            &self.quantities,
            &self.costing,
        )?;

        if repair && !report.is_consistent() {
            self.rebuild_locked()?;
            report.repaired = true;
            info!(mismatches = report.mismatches.len(), "projections rebuilt from the movement log");
        }
        Ok(report)
    }

    /// Drop every projection and rebuild it from the log.
    pub fn rebuild(&self) -> Result<u64, LedgerError> {
        let _gate = self.gate.write().map_err(|_| LedgerError::Poisoned)?;
        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> Result<u64, LedgerError> {
        self.quantities.clear()?;
        self.costing.clear()?;
        self.alerts.clear()?;
        self.lanes.reset()?;
        self.idempotency.clear()?;
        self.replay_log()
    }

    fn replay_log(&self) -> Result<u64, LedgerError> {
        let movements = self.store.load_all()?;
        let applied = replay::replay_into(
            &movements,
            &self.quantities,
            &self.costing,
            &self.alerts,
            |sku| self.catalog.get(sku).map(|p| p.reorder_threshold),
        )?;
        for movement in &movements {
            self.idempotency.record(movement)?;
        }
        Ok(applied)
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn known(&self, sku: &Sku) -> Result<Product, LedgerError> {
        self.catalog
            .get(sku)
            .ok_or_else(|| LedgerError::UnknownProduct(sku.clone()))
    }

    fn lane(&self, sku: &Sku) -> Result<Arc<Lane>, LedgerError> {
        self.lanes.lane(sku, || {
            Ok(self
                .quantities
                .level(sku)?
                .map(|l| l.last_sequence)
                .unwrap_or(0))
        })
    }

    /// Read a position under the SKU's lane guard. Callers hold the gate.
    fn read_position(&self, sku: &Sku) -> Result<InventoryPosition, LedgerError> {
        let lane = self.lane(sku)?;
        let _guard = lane.lock()?;
        Ok(match self.quantities.level(sku)? {
            Some(level) => InventoryPosition::from_parts(sku.clone(), &level, &self.costing.book(sku)?),
            None => InventoryPosition::empty(sku.clone()),
        })
    }
}

fn invalid_quantity(err: DomainError) -> LedgerError {
    match err {
        DomainError::Validation(msg) => LedgerError::InvalidQuantity(msg),
        other => other.into(),
    }
}

/// A decision the projections refused: the stock rule or an amount out of range.
fn rejected(err: ProjectionError) -> LedgerError {
    match err {
        ProjectionError::Domain(e) => invalid_quantity(e),
        other => other.into(),
    }
}

/// Whether a replayed movement was produced by an equivalent request.
fn same_request(prior: &StockMovement, request: &RecordMovement, delta: i64) -> bool {
    prior.sku == request.sku && prior.kind == request.kind && prior.delta == delta
}
