use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use depot_core::LotId;
use depot_warehouse::{Matcher, WarehouseLot};

const FIGURE: [&str; 6] = ["H129FSQ", "H1SEM", "801", "6830", "H23RA", "8392"];
const DESCRIPTIONS: [&str; 4] = [
    "fresa carburo tungsteno",
    "fresa diamantata pallina",
    "gommino lucidatura",
    "disco separatore",
];

/// Synthetic catalog with realistic code collisions (shared figure and gambi).
fn catalog(size: usize) -> Vec<WarehouseLot> {
    (0..size)
        .map(|i| {
            let code = format!(
                "{}.{:03}.{:03}",
                FIGURE[i % FIGURE.len()],
                100 + (i / FIGURE.len()) % 50,
                10 + i % 17
            );
            WarehouseLot::new(
                LotId::new(format!("L{i:06}")).unwrap(),
                code,
                DESCRIPTIONS[i % DESCRIPTIONS.len()],
                format!("BOX-{}", i % 40),
                (i % 25) as u32,
                Utc::now(),
            )
            .unwrap()
        })
        .collect()
}

fn bench_match_article(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_article");
    let matcher = Matcher::default();

    for size in [1_000usize, 10_000] {
        let lots = catalog(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("code_query", size), &lots, |b, lots| {
            b.iter(|| {
                matcher.match_article(black_box(lots), black_box("h129fsq-104-013"), None, 10, &[])
            })
        });

        group.bench_with_input(BenchmarkId::new("description_fallback", size), &lots, |b, lots| {
            b.iter(|| {
                matcher.match_article(
                    black_box(lots),
                    black_box("ZZZ.1"),
                    Some("fresa diamantata"),
                    10,
                    &[],
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_article);
criterion_main!(benches);
