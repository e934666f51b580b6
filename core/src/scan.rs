/// Recurrent scan engine: one shared-weight IRNN sweep, forward and backward.
///
/// Forward over scan steps t (in `ScanOrder`):
///   y[first] = relu(x[first])
///   y[t]     = relu(x[t] + W @ y[prev])
///
/// Backward: reverse step loop with accumulated hidden gradient dh.
///   g[t]      = dh[t] * relu'(y[t])
///   dh[prev] += W^T @ g[t]
///   dW       += g[t] @ y[prev]^T
///   dx        = g
///
/// Each y[t], x[t], g[t] is a C x (P*Q) slice. The engine owns no tensor memory;
/// the output buffer doubles as the hidden-state sequence and as the activation
/// cache read by backward.

use crate::activation::{relu_inplace, relu_mask};
use crate::axis::{ScanGeometry, ScanOrder};
use crate::error::{ScanError, ScanResult};
use crate::tensor::{add_inplace_f32, gemm_f32, mul_inplace_f32, Transpose};

/// Backward work buffers, sized from a `ScanGeometry`.
///
/// Contents are only meaningful during (and, for `grad`, right after) a
/// backward call; they are reused across calls.
#[derive(Clone, Debug, Default)]
pub struct ScanScratch {
    /// Masked pre-activation gradient g. Equals dx once backward returns.
    pub grad: Vec<f32>,
    /// Accumulated hidden-state gradient dh.
    pub hidden_grad: Vec<f32>,
    /// One-step W^T @ g product, C x (P*Q).
    pub step: Vec<f32>,
}

impl ScanScratch {
    pub fn new(geom: &ScanGeometry) -> Self {
        let mut scratch = ScanScratch::default();
        scratch.resize(geom);
        scratch
    }

    /// Resize every buffer for `geom`. Keeps allocations when sizes match.
    pub fn resize(&mut self, geom: &ScanGeometry) {
        self.grad.resize(geom.numel(), 0.0);
        self.hidden_grad.resize(geom.numel(), 0.0);
        self.step.resize(geom.step_len(), 0.0);
    }

    fn fits(&self, geom: &ScanGeometry) -> bool {
        self.grad.len() == geom.numel()
            && self.hidden_grad.len() == geom.numel()
            && self.step.len() == geom.step_len()
    }
}

fn check_len(what: &'static str, geom: &ScanGeometry, actual: usize) -> ScanResult<()> {
    if actual != geom.numel() {
        return Err(ScanError::shape(what, &[geom.numel()], &[actual]));
    }
    Ok(())
}

fn check_weights(geom: &ScanGeometry, w_len: usize) -> ScanResult<()> {
    let c = geom.channels;
    if w_len != c * c {
        return Err(ScanError::shape("weight matrix", &[c * c], &[w_len]));
    }
    Ok(())
}

/// Split `buf` into the read-only slice of step `prev` and the mutable slice of
/// step `cur`. Steps are `len` elements wide and `prev != cur`.
fn split_steps(buf: &mut [f32], len: usize, prev: usize, cur: usize) -> (&[f32], &mut [f32]) {
    debug_assert_ne!(prev, cur);
    if prev < cur {
        let (lo, hi) = buf.split_at_mut(cur * len);
        (&lo[prev * len..(prev + 1) * len], &mut hi[..len])
    } else {
        let (lo, hi) = buf.split_at_mut(prev * len);
        (&hi[..len], &mut lo[cur * len..(cur + 1) * len])
    }
}

/// Forward sweep. Writes `y` (same layout as `x`); `w` is the C x C weight matrix.
///
/// All lengths are validated before `y` is touched.
pub fn scan_forward(
    geom: &ScanGeometry,
    order: ScanOrder,
    w: &[f32],
    x: &[f32],
    y: &mut [f32],
) -> ScanResult<()> {
    check_weights(geom, w.len())?;
    check_len("input", geom, x.len())?;
    check_len("output", geom, y.len())?;

    let c = geom.channels;
    let pq = geom.positions();
    let len = geom.step_len();
    let s = geom.steps;

    y.copy_from_slice(x);

    for t in order.steps(s) {
        if let Some(prev) = order.prev(t, s) {
            let (y_prev, y_t) = split_steps(y, len, prev, t);
            // y[t] = x[t] + W @ y[prev]
            gemm_f32(Transpose::No, Transpose::No, c, pq, c, 1.0, w, y_prev, 1.0, y_t);
        }
        relu_inplace(&mut y[t * len..(t + 1) * len]);
    }

    log::trace!("scan forward: {order:?} over {s} steps, C={c}, P*Q={pq}");
    Ok(())
}

/// Backward sweep (BPTT).
///
/// `y` is the output of the matching `scan_forward` call and `dy` the loss
/// gradient with respect to it. The weight gradient is ACCUMULATED into
/// `w_grad`; the input gradient is left in `scratch.grad`.
///
/// All lengths are validated before any buffer is touched, so a failed call
/// never leaves a partial sum in `w_grad`.
pub fn scan_backward(
    geom: &ScanGeometry,
    order: ScanOrder,
    w: &[f32],
    y: &[f32],
    dy: &[f32],
    scratch: &mut ScanScratch,
    w_grad: &mut [f32],
) -> ScanResult<()> {
    check_weights(geom, w.len())?;
    check_weights(geom, w_grad.len())?;
    check_len("cached output", geom, y.len())?;
    check_len("output gradient", geom, dy.len())?;
    if !scratch.fits(geom) {
        scratch.resize(geom);
    }

    let c = geom.channels;
    let pq = geom.positions();
    let len = geom.step_len();
    let s = geom.steps;

    let ScanScratch { grad, hidden_grad, step } = scratch;

    // g starts as relu'(y); dh starts as dy.
    relu_mask(grad, y);
    hidden_grad.copy_from_slice(dy);

    for t in order.steps(s).rev() {
        let g_t = &mut grad[t * len..(t + 1) * len];
        mul_inplace_f32(g_t, &hidden_grad[t * len..(t + 1) * len]);

        if let Some(prev) = order.prev(t, s) {
            let g_t = &grad[t * len..(t + 1) * len];
            // dh[prev] += W^T @ g[t]
            gemm_f32(Transpose::Yes, Transpose::No, c, pq, c, 1.0, w, g_t, 0.0, step);
            add_inplace_f32(&mut hidden_grad[prev * len..(prev + 1) * len], step);
            // dW += g[t] @ y[prev]^T
            let y_prev = &y[prev * len..(prev + 1) * len];
            gemm_f32(Transpose::No, Transpose::Yes, c, c, pq, 1.0, g_t, y_prev, 1.0, w_grad);
        }
    }

    log::trace!("scan backward: {order:?} over {s} steps, C={c}, P*Q={pq}");
    Ok(())
}
