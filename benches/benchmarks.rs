use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use panel_align::{
    align::{merge_with, MergeOptions},
    panel::Panel,
};

fn build_panels(entities: usize, days: i64) -> (Panel, Panel) {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut factors = Panel::new((0..20).map(|i| format!("factor_{}", i)));
    let mut returns = Panel::new(["ret_1d"]);

    for e in 0..entities {
        let entity = format!("SH{:06}", e);
        for i in 0..days {
            let date = start + Duration::days(i);
            // Sparse factor calendar so labels skip dates
            if (i + e as i64) % 7 != 0 {
                let row = (0..20).map(|j| (i * j) as f64 * 0.001).collect();
                factors.insert(entity.clone(), date, row).unwrap();
            }
            returns.insert(entity.clone(), date, vec![i as f64 * 0.0001]).unwrap();
        }
    }

    (factors, returns)
}

fn benchmark_merge_sequential(c: &mut Criterion) {
    let (factors, returns) = build_panels(200, 250);
    let options = MergeOptions::default();

    c.bench_function("merge_200x250_sequential", |b| {
        b.iter(|| {
            let _ = merge_with(black_box(&factors), black_box(&returns), &options);
        });
    });
}

fn benchmark_merge_parallel(c: &mut Criterion) {
    let (factors, returns) = build_panels(200, 250);
    let options = MergeOptions {
        parallel: true,
        ..MergeOptions::default()
    };

    c.bench_function("merge_200x250_parallel", |b| {
        b.iter(|| {
            let _ = merge_with(black_box(&factors), black_box(&returns), &options);
        });
    });
}

fn benchmark_drop_missing(c: &mut Criterion) {
    let (factors, returns) = build_panels(200, 250);
    let options = MergeOptions {
        drop_missing: false,
        ..MergeOptions::default()
    };
    let unfiltered = merge_with(&factors, &returns, &options).unwrap().table;

    c.bench_function("drop_missing_200x250", |b| {
        b.iter(|| {
            let mut table = unfiltered.clone();
            black_box(table.drop_missing());
        });
    });
}

criterion_group!(
    benches,
    benchmark_merge_sequential,
    benchmark_merge_parallel,
    benchmark_drop_missing
);
criterion_main!(benches);
