//! Finite-difference verification of the manual BPTT.
//!
//! Loss: L(y) = sum_i r_i * y_i for a fixed random r, so dL/dy = r.
//! Central differences on single input / weight elements are compared with
//! the analytical gradients returned by backward. Perturbations that move a
//! pre-activation across the ReLU kink are skipped (the mask pattern differs
//! between the +eps and -eps evaluations); between kinks the FD is exact up to
//! rounding for inputs.

use spatial_irnn_core::tensor::SimpleRng;
use spatial_irnn_core::{Direction, SpatialRnn, SpatialRnnConfig, Tensor};

const SHAPE: [usize; 4] = [4, 3, 2, 2];
const C: usize = 3;

fn rand_vec(n: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; n];
    SimpleRng::new(seed).fill_uniform(&mut v, scale);
    v
}

fn loss(y: &[f32], r: &[f32]) -> f64 {
    y.iter().zip(r.iter()).map(|(&a, &b)| a as f64 * b as f64).sum()
}

fn mask(y: &[f32]) -> Vec<bool> {
    y.iter().map(|&v| v > 0.0).collect()
}

/// Forward with explicit weights; returns the activations as a flat vector.
fn run(direction: Direction, w: &[f32], x: &Tensor) -> Vec<f32> {
    let mut layer = SpatialRnn::with_weights(SpatialRnnConfig::new(direction), C, w.to_vec()).unwrap();
    layer.forward(x).unwrap().into_tensor().data
}

struct FdReport {
    checked: usize,
    skipped: usize,
    max_abs_err: f64,
}

fn check_input_gradient(direction: Direction, seed: u64) -> FdReport {
    let n: usize = SHAPE.iter().product();
    let x = Tensor::from_vec(&SHAPE, rand_vec(n, seed, 1.0)).unwrap();
    let w = rand_vec(C * C, seed + 1, 0.5);
    let r = rand_vec(n, seed + 2, 1.0);

    let mut layer = SpatialRnn::with_weights(SpatialRnnConfig::new(direction), C, w.clone()).unwrap();
    let y = layer.forward(&x).unwrap();
    let dy = Tensor::from_vec(&SHAPE, r.clone()).unwrap();
    let dx = layer.backward(&y, &dy, true).unwrap().unwrap();

    let eps = 1e-2f32;
    let mut report = FdReport { checked: 0, skipped: 0, max_abs_err: 0.0 };
    for idx in 0..n {
        let mut x_plus = x.clone();
        x_plus.data[idx] += eps;
        let mut x_minus = x.clone();
        x_minus.data[idx] -= eps;
        let y_plus = run(direction, &w, &x_plus);
        let y_minus = run(direction, &w, &x_minus);
        if mask(&y_plus) != mask(&y_minus) {
            report.skipped += 1;
            continue;
        }
        let numerical = (loss(&y_plus, &r) - loss(&y_minus, &r)) / (2.0 * eps as f64);
        let analytical = dx.data[idx] as f64;
        let err = (analytical - numerical).abs();
        report.max_abs_err = report.max_abs_err.max(err);
        assert!(
            err < 1e-3 + 1e-2 * analytical.abs().max(numerical.abs()),
            "{direction} dx[{idx}]: analytical={analytical:.6e}, numerical={numerical:.6e}"
        );
        report.checked += 1;
    }
    report
}

fn check_weight_gradient(direction: Direction, seed: u64) -> FdReport {
    let n: usize = SHAPE.iter().product();
    // Positive-leaning inputs keep most units active so W gets signal.
    let x_data: Vec<f32> = rand_vec(n, seed, 1.0).iter().map(|v| v + 0.5).collect();
    let x = Tensor::from_vec(&SHAPE, x_data).unwrap();
    let w = rand_vec(C * C, seed + 1, 0.3);
    let r = rand_vec(n, seed + 2, 1.0);

    let mut layer = SpatialRnn::with_weights(SpatialRnnConfig::new(direction), C, w.clone()).unwrap();
    let y = layer.forward(&x).unwrap();
    let dy = Tensor::from_vec(&SHAPE, r.clone()).unwrap();
    layer.backward(&y, &dy, false).unwrap();
    let dw = layer.weight_grad().to_vec();

    let eps = 1e-3f32;
    let mut report = FdReport { checked: 0, skipped: 0, max_abs_err: 0.0 };
    for idx in 0..C * C {
        let mut w_plus = w.clone();
        w_plus[idx] += eps;
        let mut w_minus = w.clone();
        w_minus[idx] -= eps;
        let y_plus = run(direction, &w_plus, &x);
        let y_minus = run(direction, &w_minus, &x);
        if mask(&y_plus) != mask(&y_minus) {
            report.skipped += 1;
            continue;
        }
        let numerical = (loss(&y_plus, &r) - loss(&y_minus, &r)) / (2.0 * eps as f64);
        let analytical = dw[idx] as f64;
        let err = (analytical - numerical).abs();
        report.max_abs_err = report.max_abs_err.max(err);
        assert!(
            err < 1e-2 + 2e-2 * analytical.abs().max(numerical.abs()),
            "{direction} dW[{idx}]: analytical={analytical:.6e}, numerical={numerical:.6e}"
        );
        report.checked += 1;
    }
    report
}

#[test]
fn test_input_gradient_all_directions() {
    for (i, dir) in Direction::ALL.into_iter().enumerate() {
        let report = check_input_gradient(dir, 100 + 10 * i as u64);
        eprintln!(
            "{dir} dx: {} checked, {} skipped at kinks, max_abs_err={:.3e}",
            report.checked, report.skipped, report.max_abs_err
        );
        assert!(report.checked * 2 >= report.checked + report.skipped,
            "{dir}: too many kink crossings to be meaningful");
    }
}

#[test]
fn test_weight_gradient_all_directions() {
    for (i, dir) in Direction::ALL.into_iter().enumerate() {
        let report = check_weight_gradient(dir, 200 + 10 * i as u64);
        eprintln!(
            "{dir} dW: {} checked, {} skipped at kinks, max_abs_err={:.3e}",
            report.checked, report.skipped, report.max_abs_err
        );
        assert!(report.checked >= C * C / 2, "{dir}: too many kink crossings to be meaningful");
    }
}

#[test]
fn test_weight_gradient_accumulates_over_calls() {
    let n: usize = SHAPE.iter().product();
    let x = Tensor::from_vec(&SHAPE, rand_vec(n, 7, 1.0)).unwrap();
    let dy = Tensor::from_vec(&SHAPE, rand_vec(n, 8, 1.0)).unwrap();
    let mut layer = SpatialRnn::with_weights(SpatialRnnConfig::new(Direction::Up), C, rand_vec(C * C, 9, 0.5)).unwrap();

    let y = layer.forward(&x).unwrap();
    layer.backward(&y, &dy, false).unwrap();
    let once = layer.weight_grad().to_vec();
    layer.backward(&y, &dy, false).unwrap();
    for (a, b) in layer.weight_grad().iter().zip(once.iter()) {
        assert!((a - 2.0 * b).abs() <= 1e-5 * b.abs().max(1.0), "expected 2x accumulation: {a} vs {b}");
    }
}
