use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use svao_geom::Resolution;
use svao_sdmath::{build_lookup_table, compute_stochastic_map_size};

fn bench_lookup_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_lookup_table");
    for n in [8u32, 16, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let t = build_lookup_table(black_box(n)).unwrap();
                black_box(t);
            })
        });
    }
    group.finish();
}

fn bench_map_size(c: &mut Criterion) {
    let full = Resolution::new(3840, 2160);
    c.bench_function("stochastic_map_size_4k", |b| {
        b.iter(|| {
            let r = compute_stochastic_map_size(black_box(full), true, black_box(4), 512).unwrap();
            black_box(r);
        })
    });
}

fn config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5))
}

criterion_group! {
    name = benches;
    config = config();
    targets = bench_lookup_table, bench_map_size
}
criterion_main!(benches);
