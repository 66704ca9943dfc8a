//! Projection and aggregation throughput over a synthetic SKU map.
//!
//! Run with: `cargo bench --bench pipeline`

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use delivery_plan::config::PipelineConfig;
use delivery_plan::plan::aggregate::{aggregate_rows, aggregate_table, AggregateRules};
use delivery_plan::plan::project::{project, rows_to_table};
use delivery_plan::plan::record::{SkuMap, SkuRecord};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
}

/// `count` SKUs with deliveries spread over 90 days, a third of them past the window.
fn synthetic_records(count: usize) -> SkuMap {
    (0..count)
        .map(|i| {
            let sku = format!("SKU{i:06}");
            let mut record = SkuRecord::new(&sku);
            for batch in 0..8u64 {
                let offset = (i as u64 * 7 + batch * 11) % 90;
                let date = today()
                    .checked_add_days(Days::new(offset))
                    .expect("date in range");
                record.add_quantity(date, (batch + 1) as f64 * 10.0);
            }
            (sku, record)
        })
        .collect()
}

fn bench_project(c: &mut Criterion) {
    let records = synthetic_records(5_000);
    let mut group = c.benchmark_group("project");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("5k_skus", |b| {
        b.iter(|| black_box(project(black_box(&records), today(), "%Y-%m-%d")))
    });
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let records = synthetic_records(5_000);
    let projected = project(&records, today(), "%Y-%m-%d").expect("projection");
    // Every SKU twice, so each group collapses.
    let doubled: Vec<_> = projected.iter().chain(projected.iter()).cloned().collect();
    let rules = AggregateRules::from_config(&PipelineConfig::default()).expect("rules");

    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(doubled.len() as u64));
    group.bench_function("rows_10k", |b| b.iter(|| black_box(aggregate_rows(black_box(&doubled)))));
    group.bench_function("table_10k", |b| {
        b.iter_batched(
            || rows_to_table(&doubled),
            |table| black_box(aggregate_table(&table, &rules)),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_project, bench_aggregate);
criterion_main!(benches);
