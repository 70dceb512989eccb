use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::audit::AuditFilter;
use stockledger_infra::{
    InMemoryMovementStore, InMemoryProductCatalog, InventoryLedger, LedgerConfig, LedgerEvent,
};
use stockledger_inventory::{CostingMethod, Product, RecordMovement, Sku};

type BenchLedger = InventoryLedger<
    Arc<InMemoryMovementStore>,
    Arc<InMemoryProductCatalog>,
    Arc<InMemoryEventBus<EventEnvelope<LedgerEvent>>>,
>;

/// Naive counter table: direct quantity updates (no log, no costing).
#[derive(Debug, Clone, Default)]
struct NaiveCounterStore {
    inner: Arc<RwLock<HashMap<Sku, i64>>>,
}

impl NaiveCounterStore {
    fn apply(&self, sku: &Sku, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        let qty = map.entry(sku.clone()).or_insert(0);
        if *qty + delta < 0 {
            return Err(());
        }
        *qty += delta;
        Ok(())
    }
}

fn sku(raw: &str) -> Sku {
    Sku::parse(raw).unwrap()
}

fn setup_ledger(method: CostingMethod, skus: usize) -> BenchLedger {
    let products = (0..skus).map(|i| Product::new(sku(&format!("SKU-{i}")), "Bench item").with_threshold(5));
    InventoryLedger::open(
        Arc::new(InMemoryMovementStore::new()),
        Arc::new(InMemoryProductCatalog::with_products(products).unwrap()),
        Arc::new(InMemoryEventBus::new()),
        LedgerConfig {
            costing_method: method,
            ..LedgerConfig::default()
        },
    )
    .unwrap()
}

/// Alternating receipts and issues so stock stays positive and FIFO keeps a few layers.
fn churn(ledger: &BenchLedger, sku: &Sku, i: u64) {
    let request = if i % 2 == 0 {
        RecordMovement::inbound(sku.clone(), 10, Decimal::new(100 + (i % 7) as i64, 2), "bench")
    } else {
        RecordMovement::outbound(sku.clone(), 7, "bench")
    };
    ledger.record_movement(request).unwrap();
}

fn bench_commit_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_latency");
    group.sample_size(500);

    for method in [CostingMethod::WeightedAverage, CostingMethod::Fifo] {
        group.bench_function(BenchmarkId::new("record_movement", method.as_str()), |b| {
            let ledger = setup_ledger(method, 1);
            let target = sku("SKU-0");
            let mut i = 0u64;
            b.iter(|| {
                churn(&ledger, black_box(&target), i);
                i += 1;
            });
        });
    }

    group.bench_function("idempotent_replay", |b| {
        let ledger = setup_ledger(CostingMethod::WeightedAverage, 1);
        let request = RecordMovement::inbound(sku("SKU-0"), 10, Decimal::ONE, "bench")
            .with_idempotency_key("grn-bench");
        ledger.record_movement(request.clone()).unwrap();
        b.iter(|| black_box(ledger.record_movement(request.clone()).unwrap()));
    });

    group.finish();
}

fn bench_concurrent_commits(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_commits");

    for threads in [1usize, 4, 8] {
        let per_thread = 100u64;
        group.throughput(Throughput::Elements(threads as u64 * per_thread));
        group.bench_with_input(BenchmarkId::new("distinct_skus", threads), &threads, |b, &threads| {
            b.iter(|| {
                let ledger = Arc::new(setup_ledger(CostingMethod::Fifo, threads));
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let ledger = ledger.clone();
                        std::thread::spawn(move || {
                            let target = sku(&format!("SKU-{t}"));
                            for i in 0..per_thread {
                                churn(&ledger, &target, i);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_speed");

    for count in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("rebuild_from_log", count), &count, |b, &count| {
            let ledger = setup_ledger(CostingMethod::Fifo, 10);
            for i in 0..count {
                churn(&ledger, &sku(&format!("SKU-{}", (i / 2) % 10)), i);
            }
            b.iter(|| black_box(ledger.rebuild().unwrap()));
        });
    }

    group.finish();
}

fn bench_audit_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_scan");

    let ledger = setup_ledger(CostingMethod::WeightedAverage, 10);
    for i in 0..5_000u64 {
        churn(&ledger, &sku(&format!("SKU-{}", (i / 2) % 10)), i);
    }

    group.bench_function("single_sku_full_history", |b| {
        b.iter(|| {
            let filter = AuditFilter::for_sku(sku("SKU-3"));
            black_box(ledger.audit(filter).count())
        });
    });

    group.bench_function("first_page", |b| {
        b.iter(|| black_box(ledger.query_audit(AuditFilter::default(), None, Some(100)).unwrap()));
    });

    group.finish();
}

fn bench_ledger_vs_naive_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_vs_naive_counter");
    group.sample_size(500);

    group.bench_function("ledger_receive_and_issue", |b| {
        let ledger = setup_ledger(CostingMethod::WeightedAverage, 1);
        let target = sku("SKU-0");
        b.iter(|| {
            churn(&ledger, &target, 0);
            churn(&ledger, &target, 1);
        });
    });

    group.bench_function("naive_receive_and_issue", |b| {
        let store = NaiveCounterStore::default();
        let target = sku("SKU-0");
        b.iter(|| {
            store.apply(&target, 10).unwrap();
            store.apply(&target, -7).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_commit_latency,
    bench_concurrent_commits,
    bench_rebuild_speed,
    bench_audit_scan,
    bench_ledger_vs_naive_counter
);
criterion_main!(benches);
