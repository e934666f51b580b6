/// Tensor container and dense kernels for the spatial scan.
///
/// All kernels are free functions on flat f32 slices with explicit dimensions.
/// Row-major layout throughout. Length contracts are `debug_assert`ed; the
/// public scan entry points validate shapes with `ScanResult` before calling in.

use crate::error::{ScanError, ScanResult};

/// Flat f32 tensor with shape metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        let n: usize = shape.iter().product();
        Tensor {
            data: vec![0.0; n],
            shape: shape.to_vec(),
        }
    }

    /// Wrap an existing buffer. Fails if `data.len()` is not the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> ScanResult<Self> {
        let n: usize = shape.iter().product();
        if data.len() != n {
            return Err(ScanError::shape("tensor data", &[n], &[data.len()]));
        }
        Ok(Tensor { data, shape: shape.to_vec() })
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Resize in place to `shape`, keeping the allocation when the element
    /// count already matches. Contents are unspecified afterwards.
    pub fn reshape_to(&mut self, shape: &[usize]) {
        if self.shape == shape {
            return;
        }
        let n: usize = shape.iter().product();
        self.data.resize(n, 0.0);
        self.shape = shape.to_vec();
    }
}

// ── Dense kernels ────────────────────────────────────────────────────
//
// The recurrence needs exactly four primitives:
//
//   | kernel           | use                                   |
//   |------------------|---------------------------------------|
//   | gemm_f32         | W·y[prev], W^T·g[t], g[t]·y[prev]^T   |
//   | add_inplace_f32  | dh[prev] += W^T·g[t]                  |
//   | mul_inplace_f32  | g[t] = dh[t] ⊙ mask[t]                |
//   | copy_from_slice  | x → y, dy → dh, g → dx                |

/// Whether a gemm operand is read as stored or transposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transpose {
    No,
    Yes,
}

/// General matrix multiply: C[M,N] = alpha * op(A)[M,K] @ op(B)[K,N] + beta * C.
///
/// `op(A)` is A when `trans_a == No` (A stored [M,K]) and A^T when `Yes`
/// (A stored [K,M]). Same for B ([K,N] or [N,K]). With `beta == 0` the
/// previous contents of `c` are ignored, so stale NaNs cannot leak through.
pub fn gemm_f32(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    b: &[f32],
    beta: f32,
    c: &mut [f32],
) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(c.len(), m * n);

    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                let av = match trans_a {
                    Transpose::No => a[i * k + p],
                    Transpose::Yes => a[p * m + i],
                };
                let bv = match trans_b {
                    Transpose::No => b[p * n + j],
                    Transpose::Yes => b[j * k + p],
                };
                sum += av * bv;
            }
            let idx = i * n + j;
            c[idx] = if beta == 0.0 {
                alpha * sum
            } else {
                alpha * sum + beta * c[idx]
            };
        }
    }
}

/// Element-wise accumulate: acc[i] += x[i].
pub fn add_inplace_f32(acc: &mut [f32], x: &[f32]) {
    debug_assert_eq!(acc.len(), x.len());
    for (a, &v) in acc.iter_mut().zip(x.iter()) {
        *a += v;
    }
}

/// Element-wise product in place: acc[i] *= x[i].
pub fn mul_inplace_f32(acc: &mut [f32], x: &[f32]) {
    debug_assert_eq!(acc.len(), x.len());
    for (a, &v) in acc.iter_mut().zip(x.iter()) {
        *a *= v;
    }
}

/// Permute the axes of a 4-axis row-major tensor.
///
/// Output axis `i` is input axis `perm[i]`, so the output shape is
/// `[shape[perm[0]], .., shape[perm[3]]]`.
pub fn permute4_f32(src: &[f32], shape: [usize; 4], perm: [usize; 4], out: &mut [f32]) {
    debug_assert_eq!(src.len(), shape.iter().product::<usize>());
    debug_assert_eq!(out.len(), src.len());

    let in_strides = [
        shape[1] * shape[2] * shape[3],
        shape[2] * shape[3],
        shape[3],
        1,
    ];
    let out_shape = [shape[perm[0]], shape[perm[1]], shape[perm[2]], shape[perm[3]]];
    let step = [
        in_strides[perm[0]],
        in_strides[perm[1]],
        in_strides[perm[2]],
        in_strides[perm[3]],
    ];

    let mut o = 0;
    for i0 in 0..out_shape[0] {
        for i1 in 0..out_shape[1] {
            for i2 in 0..out_shape[2] {
                let base = i0 * step[0] + i1 * step[1] + i2 * step[2];
                for i3 in 0..out_shape[3] {
                    out[o] = src[base + i3 * step[3]];
                    o += 1;
                }
            }
        }
    }
}

/// Simple xorshift64 PRNG for deterministic weight init. Not crypto-safe.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        SimpleRng { state: seed.max(1) } // avoid zero state
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in [-scale, scale].
    pub fn uniform(&mut self, scale: f32) -> f32 {
        let u = (self.next_u64() as f64) / (u64::MAX as f64);
        (2.0 * u as f32 - 1.0) * scale
    }

    /// Fill slice with uniform random values in [-scale, scale].
    pub fn fill_uniform(&mut self, buf: &mut [f32], scale: f32) {
        for v in buf.iter_mut() {
            *v = self.uniform(scale);
        }
    }

    /// Zero-mean normal sample with standard deviation `std` (Box-Muller).
    pub fn normal(&mut self, std: f32) -> f32 {
        // u1 in (0, 1] so ln(u1) is finite
        let u1 = 1.0 - (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        let u2 = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z as f32 * std
    }
}
