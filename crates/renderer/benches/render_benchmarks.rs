//! Benchmarks for map rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use biodiv_common::{CellId, CellMap, CrsCode, GridTemplate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use renderer::{png, render_choropleth, MapStyle};

/// Richness-like values on a random share of the template's cells.
fn generate_values(template: &GridTemplate, occupied_pct: u32) -> CellMap<f64> {
    let mut rng = rand::thread_rng();
    (0..template.len() as u32)
        .filter(|_| rng.gen_range(0..100) < occupied_pct)
        .map(|i| (CellId(i), rng.gen_range(1..40) as f64))
        .collect()
}

fn bench_choropleth(c: &mut Criterion) {
    let mut group = c.benchmark_group("choropleth");

    for resolution_km in [220.0, 110.0, 55.0] {
        let template = GridTemplate::global(CrsCode::Esri54017, resolution_km * 1000.0).unwrap();
        let values = generate_values(&template, 30);
        let style = MapStyle::default();

        group.throughput(Throughput::Elements(template.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("render", format!("{}km", resolution_km)),
            &(template, values),
            |b, (template, values)| {
                b.iter(|| render_choropleth(black_box(template), black_box(values), &[], &style).unwrap())
            },
        );
    }

    group.finish();
}

fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encode");

    let template = GridTemplate::global(CrsCode::Esri54017, 110_000.0).unwrap();
    let values = generate_values(&template, 30);
    let pixmap = render_choropleth(&template, &values, &[], &MapStyle::default()).unwrap();

    group.throughput(Throughput::Bytes(pixmap.data().len() as u64));
    group.bench_function("encode_pixmap", |b| {
        b.iter(|| png::encode_pixmap(black_box(&pixmap)).unwrap())
    });
    group.bench_function("create_png_rgba", |b| {
        b.iter(|| {
            png::create_png(
                black_box(pixmap.data()),
                pixmap.width() as usize,
                pixmap.height() as usize,
            )
            .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_choropleth, bench_png_encoding);
criterion_main!(benches);
