/// Criterion benchmarks for the spatial IRNN scan.
///
/// Measures forward and forward+backward across channel widths on a 32x32 grid,
/// and the two scan orders at a fixed width.
///
/// Run: cargo bench --bench scan_bench
/// Reports saved to: target/criterion/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spatial_irnn_core::tensor::SimpleRng;
use spatial_irnn_core::{Direction, FillerConfig, SpatialRnn, SpatialRnnConfig, Tensor};

const GRID: usize = 32;
const BATCH: usize = 2;

fn make_layer(direction: Direction, c: usize) -> SpatialRnn {
    let cfg = SpatialRnnConfig::new(direction).with_filler(FillerConfig::Uniform { scale: 0.1, seed: 42 });
    let mut layer = SpatialRnn::new(cfg);
    layer.setup(&[GRID, c, BATCH, GRID]).unwrap();
    layer
}

fn make_input(c: usize, seed: u64) -> Tensor {
    let mut x = Tensor::zeros(&[GRID, c, BATCH, GRID]);
    SimpleRng::new(seed).fill_uniform(&mut x.data, 1.0);
    x
}

/// Forward sweep cost per channel width.
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");
    for ch in [8, 16, 32] {
        let mut layer = make_layer(Direction::Down, ch);
        let x = make_input(ch, 1);
        group.bench_with_input(BenchmarkId::new("down", format!("C={ch}")), &ch, |b, _| {
            b.iter(|| layer.forward(&x).unwrap());
        });
    }
    group.finish();
}

/// Forward + BPTT per channel width.
fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_backward");
    for ch in [8, 16, 32] {
        let mut layer = make_layer(Direction::Down, ch);
        let x = make_input(ch, 1);
        let dy = make_input(ch, 2);
        group.bench_with_input(BenchmarkId::new("down", format!("C={ch}")), &ch, |b, _| {
            b.iter(|| {
                let y = layer.forward(&x).unwrap();
                layer.backward(&y, &dy, true).unwrap()
            });
        });
    }
    group.finish();
}

/// Ascending vs descending scans should cost the same.
fn bench_directions(c: &mut Criterion) {
    let mut group = c.benchmark_group("direction");
    let ch = 16;
    for dir in Direction::ALL {
        let mut layer = make_layer(dir, ch);
        let x = make_input(ch, 3);
        group.bench_with_input(BenchmarkId::new("forward", dir.layer_type()), &dir, |b, _| {
            b.iter(|| layer.forward(&x).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_forward_backward, bench_directions);
criterion_main!(benches);
