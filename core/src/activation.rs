/// Rectifier and its derivative on flat buffers.

/// In place: buf[i] = max(buf[i], 0).
pub fn relu_inplace(buf: &mut [f32]) {
    for v in buf.iter_mut() {
        *v = v.max(0.0);
    }
}

/// Derivative mask from post-activation values: mask[i] = 1 if y[i] > 0 else 0.
///
/// `activated` must already be rectified, so `y > 0` is exactly "pre-activation
/// was positive". A pre-activation of exactly 0 gets derivative 0.
pub fn relu_mask(mask_out: &mut [f32], activated: &[f32]) {
    debug_assert_eq!(mask_out.len(), activated.len());
    for (m, &y) in mask_out.iter_mut().zip(activated.iter()) {
        *m = if y > 0.0 { 1.0 } else { 0.0 };
    }
}
