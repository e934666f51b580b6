/// Spatial IRNN layer: one direction, one shared C x C weight matrix.
///
/// Lifecycle mirrors a network layer:
///   setup(shape)    → weights created by the configured filler (once)
///   reshape(shape)  → geometry + scratch, idempotent
///   forward(x)      → `Activations` (the output doubles as hidden state)
///   backward(y, dy) → dx, and dW accumulated into `weight_grad`
///
/// Weight updates happen outside the layer through `weights_mut`, which needs
/// `&mut self` and therefore cannot overlap an in-flight forward/backward.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::axis::{Direction, ScanGeometry};
use crate::config::SpatialRnnConfig;
use crate::error::{ScanError, ScanResult};
use crate::filler::WeightFiller;
use crate::scan::{scan_backward, scan_forward, ScanScratch};
use crate::tensor::Tensor;

/// Output of a forward pass, kept for the matching backward pass.
///
/// Backward borrows this value instead of copying it: the activations ARE the
/// hidden-state cache, so they must not be overwritten between the two calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Activations {
    tensor: Tensor,
    direction: Direction,
}

impl Activations {
    /// Empty buffer for `SpatialRnn::forward_into` to fill.
    pub fn empty(direction: Direction) -> Self {
        Activations {
            tensor: Tensor { data: Vec::new(), shape: Vec::new() },
            direction,
        }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn shape(&self) -> &[usize] {
        &self.tensor.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.tensor.data
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }
}

/// On-disk weight format.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct WeightCheckpoint {
    direction: Direction,
    channels: usize,
    weights: Vec<f32>,
}

pub struct SpatialRnn {
    config: SpatialRnnConfig,
    channels: Option<usize>,
    weights: Option<Vec<f32>>,
    weight_grad: Vec<f32>,
    geometry: Option<ScanGeometry>,
    scratch: ScanScratch,
}

impl SpatialRnn {
    /// Layer without weights; `setup` creates them.
    pub fn new(config: SpatialRnnConfig) -> Self {
        SpatialRnn {
            config,
            channels: None,
            weights: None,
            weight_grad: Vec::new(),
            geometry: None,
            scratch: ScanScratch::default(),
        }
    }

    /// Layer with pre-existing weights; `setup` will skip the filler.
    pub fn with_weights(config: SpatialRnnConfig, channels: usize, weights: Vec<f32>) -> ScanResult<Self> {
        if weights.len() != channels * channels {
            return Err(ScanError::shape("weight matrix", &[channels, channels], &[weights.len()]));
        }
        let mut layer = SpatialRnn::new(config);
        layer.install_weights(channels, weights);
        Ok(layer)
    }

    /// Layer whose weights come from a file written by `save_weights`.
    pub fn from_checkpoint(config: SpatialRnnConfig, path: &Path) -> ScanResult<Self> {
        let mut layer = SpatialRnn::new(config);
        layer.load_weights(path)?;
        Ok(layer)
    }

    fn install_weights(&mut self, channels: usize, weights: Vec<f32>) {
        self.channels = Some(channels);
        self.weights = Some(weights);
        self.weight_grad = vec![0.0; channels * channels];
        self.geometry = None;
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    pub fn config(&self) -> &SpatialRnnConfig {
        &self.config
    }

    pub fn layer_type(&self) -> &'static str {
        self.config.direction.layer_type()
    }

    /// Channel count fixed at setup, None before.
    pub fn channels(&self) -> Option<usize> {
        self.channels
    }

    /// Geometry of the last reshape, None before the first one.
    pub fn geometry(&self) -> Option<ScanGeometry> {
        self.geometry
    }

    pub fn is_initialized(&self) -> bool {
        self.weights.is_some()
    }

    // ── Setup / reshape ──────────────────────────────────────────────

    /// Create the weight matrix for `input_shape` and reshape scratch.
    ///
    /// If weights already exist (loaded or passed in), initialization is
    /// skipped; the input channel count must then match them.
    pub fn setup(&mut self, input_shape: &[usize]) -> ScanResult<()> {
        let geom = self.direction().geometry(input_shape)?;
        match self.channels {
            Some(c) => {
                if c != geom.channels {
                    return Err(ScanError::shape("input channels", &[c], &[geom.channels]));
                }
                log::info!("{}: skipping parameter initialization", self.layer_type());
            }
            None => {
                let c = geom.channels;
                let mut w = vec![0.0f32; c * c];
                self.config.weight_filler.fill(&mut w, c);
                self.install_weights(c, w);
            }
        }
        self.reshape(input_shape)?;
        Ok(())
    }

    /// Derive the scan geometry for `input_shape` and size scratch buffers.
    ///
    /// Repeating the call with the same shape is a no-op. The weight gradient
    /// stays C x C whatever the shape.
    pub fn reshape(&mut self, input_shape: &[usize]) -> ScanResult<ScanGeometry> {
        let c = self.channels.ok_or(ScanError::UninitializedWeight)?;
        let geom = self.direction().geometry(input_shape)?;
        if geom.channels != c {
            return Err(ScanError::shape("input channels", &[c], &[geom.channels]));
        }
        if self.geometry == Some(geom) {
            return Ok(geom);
        }
        log::debug!(
            "{}: reshape to S={} C={} P*Q={}",
            self.layer_type(), geom.steps, geom.channels, geom.positions()
        );
        self.scratch.resize(&geom);
        self.geometry = Some(geom);
        Ok(geom)
    }

    // ── Forward ──────────────────────────────────────────────────────

    pub fn forward(&mut self, x: &Tensor) -> ScanResult<Activations> {
        let mut out = Activations::empty(self.direction());
        self.forward_into(x, &mut out)?;
        Ok(out)
    }

    /// Forward into an existing `Activations`, reusing its allocation.
    ///
    /// `out` is left untouched if the call fails.
    pub fn forward_into(&mut self, x: &Tensor, out: &mut Activations) -> ScanResult<()> {
        if self.weights.is_none() {
            return Err(ScanError::UninitializedWeight);
        }
        let geom = self.reshape(&x.shape)?;
        if x.numel() != geom.numel() {
            return Err(ScanError::shape("input data", &[geom.numel()], &[x.numel()]));
        }
        let w = self.weights.as_deref().ok_or(ScanError::UninitializedWeight)?;

        out.tensor.reshape_to(&x.shape);
        out.direction = self.config.direction;
        scan_forward(&geom, self.config.direction.scan_order(), w, &x.data, &mut out.tensor.data)
    }

    // ── Backward ─────────────────────────────────────────────────────

    /// Backward through the scan that produced `y`.
    ///
    /// The weight gradient is accumulated into `weight_grad` regardless of
    /// `propagate_down`; the input gradient is returned only when requested.
    pub fn backward(&mut self, y: &Activations, dy: &Tensor, propagate_down: bool) -> ScanResult<Option<Tensor>> {
        self.run_backward(y, dy)?;
        if !propagate_down {
            return Ok(None);
        }
        Ok(Some(Tensor {
            data: self.scratch.grad.clone(),
            shape: y.shape().to_vec(),
        }))
    }

    /// Backward writing the input gradient into `dx` (same shape as `y`).
    pub fn backward_into(&mut self, y: &Activations, dy: &Tensor, dx: &mut Tensor) -> ScanResult<()> {
        if dx.shape != y.shape() {
            return Err(ScanError::shape("input gradient", y.shape(), &dx.shape));
        }
        if dx.data.len() != y.data().len() {
            return Err(ScanError::shape("input gradient data", &[y.data().len()], &[dx.data.len()]));
        }
        self.run_backward(y, dy)?;
        dx.data.copy_from_slice(&self.scratch.grad);
        Ok(())
    }

    fn run_backward(&mut self, y: &Activations, dy: &Tensor) -> ScanResult<()> {
        if self.weights.is_none() {
            return Err(ScanError::UninitializedWeight);
        }
        if y.direction != self.config.direction {
            return Err(ScanError::DirectionMismatch {
                expected: self.config.direction,
                actual: y.direction,
            });
        }
        if dy.shape != y.shape() {
            return Err(ScanError::shape("output gradient", y.shape(), &dy.shape));
        }
        let geom = self.reshape(y.shape())?;
        let w = self.weights.as_deref().ok_or(ScanError::UninitializedWeight)?;
        scan_backward(
            &geom,
            self.config.direction.scan_order(),
            w,
            y.data(),
            &dy.data,
            &mut self.scratch,
            &mut self.weight_grad,
        )
    }

    // ── Parameters ───────────────────────────────────────────────────

    pub fn weights(&self) -> ScanResult<&[f32]> {
        self.weights.as_deref().ok_or(ScanError::UninitializedWeight)
    }

    /// Mutable weights for an external optimizer step.
    pub fn weights_mut(&mut self) -> ScanResult<&mut [f32]> {
        self.weights.as_deref_mut().ok_or(ScanError::UninitializedWeight)
    }

    /// Accumulated dL/dW, C x C row-major. Empty before setup.
    pub fn weight_grad(&self) -> &[f32] {
        &self.weight_grad
    }

    /// Reset the accumulated weight gradient (start of a training iteration).
    pub fn zero_weight_grad(&mut self) {
        self.weight_grad.fill(0.0);
    }

    // ── Checkpoints ──────────────────────────────────────────────────

    /// Save the weight matrix as JSON.
    pub fn save_weights(&self, path: &Path) -> ScanResult<()> {
        let channels = self.channels.ok_or(ScanError::UninitializedWeight)?;
        let checkpoint = WeightCheckpoint {
            direction: self.config.direction,
            channels,
            weights: self.weights()?.to_vec(),
        };
        let json = serde_json::to_string(&checkpoint)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load weights written by `save_weights`. Resets the weight gradient.
    ///
    /// The checkpoint must be for this layer's direction and, if the layer
    /// already has weights, for the same channel count.
    pub fn load_weights(&mut self, path: &Path) -> ScanResult<()> {
        let json = std::fs::read_to_string(path)?;
        let checkpoint: WeightCheckpoint = serde_json::from_str(&json)?;
        if checkpoint.direction != self.config.direction {
            return Err(ScanError::DirectionMismatch {
                expected: self.config.direction,
                actual: checkpoint.direction,
            });
        }
        let c = checkpoint.channels;
        if checkpoint.weights.len() != c * c {
            return Err(ScanError::shape("weight matrix", &[c, c], &[checkpoint.weights.len()]));
        }
        if let Some(existing) = self.channels {
            if existing != c {
                return Err(ScanError::shape("weight channels", &[existing], &[c]));
            }
        }
        self.install_weights(c, checkpoint.weights);
        Ok(())
    }
}
