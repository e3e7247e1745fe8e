use bytes::{BufMut, BytesMut};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use shapestore::{
    Bounds, Crs, CrsTransformer, Envelope, FeatureStore, IndexEntry, PackedRTree, QueryOptions,
    StoreBuilder,
};
use std::path::Path;

fn grid_entries(count: u32) -> Vec<IndexEntry> {
    let side = (count as f64).sqrt().ceil() as u32;
    (0..count)
        .map(|i| {
            let x = (i % side) as f64;
            let y = (i / side) as f64;
            IndexEntry::new(i, Bounds::new(x, y, x + 0.5, y + 0.5))
        })
        .collect()
}

/// Point geometry file with `count` records on a unit grid.
fn write_points(dir: &Path, name: &str, count: u32) -> std::path::PathBuf {
    let side = (count as f64).sqrt().ceil() as u32;
    let mut body = BytesMut::new();
    for i in 0..count {
        body.put_i32(i as i32 + 1);
        body.put_i32(10);
        body.put_i32_le(1);
        body.put_f64_le((i % side) as f64);
        body.put_f64_le((i / side) as f64);
    }

    let mut buf = BytesMut::new();
    buf.put_i32(9994);
    buf.put_bytes(0, 20);
    buf.put_i32(((100 + body.len()) / 2) as i32);
    buf.put_i32_le(1000);
    buf.put_i32_le(1);
    buf.put_f64_le(0.0);
    buf.put_f64_le(0.0);
    buf.put_f64_le(side as f64);
    buf.put_f64_le(side as f64);
    buf.put_bytes(0, 32);
    buf.put_slice(&body);

    let base = dir.join(name);
    std::fs::write(base.with_extension("shp"), &buf).unwrap();
    base
}

fn benchmark_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for size in [1_000u32, 10_000, 100_000] {
        let entries = grid_entries(size);
        group.bench_with_input(BenchmarkId::new("str_pack", size), &entries, |b, entries| {
            b.iter(|| PackedRTree::build(black_box(entries.iter().copied()), 16))
        });
    }

    let entries = grid_entries(10_000);
    for fanout in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::new("fanout", fanout), &fanout, |b, &fanout| {
            b.iter(|| PackedRTree::build(entries.iter().copied(), black_box(fanout)))
        });
    }

    group.finish();
}

fn benchmark_index_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_query");
    let tree = PackedRTree::build(grid_entries(100_000), 16);

    for extent in [1.0f64, 10.0, 50.0] {
        let query = Bounds::new(100.0, 100.0, 100.0 + extent, 100.0 + extent);
        group.bench_with_input(BenchmarkId::new("window", extent as u32), &query, |b, query| {
            b.iter(|| tree.query(black_box(query)).count())
        });
    }

    let mut encoded = Vec::new();
    tree.serialize(&mut encoded).unwrap();
    group.bench_function("deserialize_100k", |b| {
        b.iter(|| PackedRTree::deserialize(black_box(encoded.as_slice())).unwrap())
    });

    group.finish();
}

fn benchmark_store_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_query");
    let dir = tempfile::tempdir().unwrap();
    let base = write_points(dir.path(), "grid", 50_000);

    group.bench_function("open_cached", |b| {
        FeatureStore::open(&base).unwrap();
        b.iter(|| FeatureStore::open(black_box(&base)).unwrap())
    });

    group.bench_function("open_uncached", |b| {
        b.iter(|| StoreBuilder::new(&base).index_cache(false).open().unwrap())
    });

    let store = FeatureStore::open(&base).unwrap();
    let window = Envelope::new(10.0, 10.0, 30.0, 30.0);
    group.bench_function("envelope_query", |b| {
        b.iter(|| {
            store
                .query(QueryOptions::within(black_box(window.clone())), |_| true)
                .count()
        })
    });

    group.bench_function("envelope_query_exact", |b| {
        b.iter(|| {
            store
                .query(QueryOptions::within(window.clone()).exact(true), |_| true)
                .count()
        })
    });

    group.bench_function("reprojected_query", |b| {
        let options = QueryOptions::within(window.clone()).output_crs(Crs::web_mercator());
        b.iter(|| store.query(black_box(options.clone()), |_| true).count())
    });

    group.finish();
}

fn benchmark_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");
    let mut points: Vec<[f64; 3]> = (0..1_000)
        .map(|i| [(i % 360) as f64 - 180.0, (i % 170) as f64 - 85.0, 0.0])
        .collect();

    let mercator = CrsTransformer::new(Crs::wgs84(), Crs::web_mercator());
    group.bench_function("geographic_to_mercator_1k", |b| {
        b.iter(|| {
            let mut batch = points.clone();
            mercator.transform_points(black_box(&mut batch)).unwrap();
            batch
        })
    });

    let nad27 = CrsTransformer::new(Crs::wgs84(), Crs::from_code("EPSG:4267").unwrap());
    group.bench_function("ellipsoid_change_1k", |b| {
        b.iter(|| nad27.transform_points(black_box(&mut points)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_index_build,
    benchmark_index_query,
    benchmark_store_query,
    benchmark_transforms
);

criterion_main!(benches);
