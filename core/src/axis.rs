/// Direction → canonical scan view.
///
/// Every direction consumes a tensor whose leading axis is the scan axis:
///
///   | direction | raw layout      | S | P*Q | scan order |
///   |-----------|-----------------|---|-----|------------|
///   | down      | [H, C, N, W]    | H | N*W | ascending  |
///   | up        | [H, C, N, W]    | H | N*W | descending |
///   | right     | [W, C, H, N]    | W | H*N | ascending  |
///   | left      | [W, C, H, N]    | W | H*N | descending |
///
/// `to_scan_layout` / `from_scan_layout` convert a conventional [N, C, H, W]
/// batch into and out of these layouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::tensor::{permute4_f32, Tensor};

/// Feature tensors are 4-axis.
pub const RANK: usize = 4;

/// Which way the recurrence sweeps the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
    Left,
    Right,
}

/// Order in which scan indices are visited by the forward pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOrder {
    /// 0 → S-1
    Ascending,
    /// S-1 → 0
    Descending,
}

impl ScanOrder {
    /// Forward visiting order over `s` steps.
    pub fn steps(self, s: usize) -> Box<dyn DoubleEndedIterator<Item = usize>> {
        match self {
            ScanOrder::Ascending => Box::new(0..s),
            ScanOrder::Descending => Box::new((0..s).rev()),
        }
    }

    /// The step whose hidden state feeds step `t`, or None for the first step.
    pub fn prev(self, t: usize, s: usize) -> Option<usize> {
        match self {
            ScanOrder::Ascending => t.checked_sub(1),
            ScanOrder::Descending => {
                if t + 1 < s {
                    Some(t + 1)
                } else {
                    None
                }
            }
        }
    }
}

/// Canonical (S, C, P, Q) view of a feature tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanGeometry {
    /// S: number of recurrence steps.
    pub steps: usize,
    /// C: input width == hidden width.
    pub channels: usize,
    pub p: usize,
    pub q: usize,
}

impl ScanGeometry {
    /// Build from a raw 4-axis shape `[S, C, P, Q]`.
    pub fn from_shape(shape: &[usize]) -> ScanResult<Self> {
        if shape.len() != RANK {
            return Err(ScanError::Rank { expected: RANK, actual: shape.len() });
        }
        Ok(ScanGeometry {
            steps: shape[0],
            channels: shape[1],
            p: shape[2],
            q: shape[3],
        })
    }

    /// P*Q: independent positions advanced together at each step.
    pub fn positions(&self) -> usize {
        self.p * self.q
    }

    /// Elements in one `C x (P*Q)` step slice.
    pub fn step_len(&self) -> usize {
        self.channels * self.positions()
    }

    pub fn numel(&self) -> usize {
        self.steps * self.step_len()
    }

    pub fn shape(&self) -> [usize; RANK] {
        [self.steps, self.channels, self.p, self.q]
    }
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Down, Direction::Up, Direction::Left, Direction::Right];

    pub fn scan_order(self) -> ScanOrder {
        match self {
            Direction::Down | Direction::Right => ScanOrder::Ascending,
            Direction::Up | Direction::Left => ScanOrder::Descending,
        }
    }

    /// Registration name of the layer.
    pub fn layer_type(self) -> &'static str {
        match self {
            Direction::Down => "RNNDOWN",
            Direction::Up => "RNNUP",
            Direction::Left => "RNNLEFT",
            Direction::Right => "RNNRIGHT",
        }
    }

    /// True for the column-wise sweeps (scan axis is grid height).
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Down | Direction::Up)
    }

    /// Names of the four raw axes, leading (scan) axis first.
    pub fn axis_names(self) -> [&'static str; RANK] {
        if self.is_vertical() {
            ["height", "channels", "batch", "width"]
        } else {
            ["width", "channels", "height", "batch"]
        }
    }

    /// Derive the scan geometry of a raw tensor shape for this direction.
    pub fn geometry(self, shape: &[usize]) -> ScanResult<ScanGeometry> {
        ScanGeometry::from_shape(shape)
    }

    /// Axis permutation from [N, C, H, W] to this direction's raw layout.
    fn nchw_perm(self) -> [usize; RANK] {
        if self.is_vertical() {
            // [N, C, H, W] -> [H, C, N, W]
            [2, 1, 0, 3]
        } else {
            // [N, C, H, W] -> [W, C, H, N]
            [3, 1, 2, 0]
        }
    }

    /// Lay out a conventional [N, C, H, W] batch for this direction.
    pub fn to_scan_layout(self, nchw: &Tensor) -> ScanResult<Tensor> {
        permute(nchw, self.nchw_perm())
    }

    /// Inverse of [`Direction::to_scan_layout`]: back to [N, C, H, W].
    pub fn from_scan_layout(self, raw: &Tensor) -> ScanResult<Tensor> {
        let perm = self.nchw_perm();
        let mut inv = [0usize; RANK];
        for (i, &p) in perm.iter().enumerate() {
            inv[p] = i;
        }
        permute(raw, inv)
    }
}

fn permute(t: &Tensor, perm: [usize; RANK]) -> ScanResult<Tensor> {
    if t.shape.len() != RANK {
        return Err(ScanError::Rank { expected: RANK, actual: t.shape.len() });
    }
    let shape = [t.shape[0], t.shape[1], t.shape[2], t.shape[3]];
    let out_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
    let mut out = Tensor::zeros(&out_shape);
    permute4_f32(&t.data, shape, perm, &mut out.data);
    Ok(out)
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = ScanError;

    /// Accepts either a direction name ("down") or a layer type ("RNNDOWN"),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("rnn").unwrap_or(&lower);
        match name {
            "down" => Ok(Direction::Down),
            "up" => Ok(Direction::Up),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(ScanError::UnknownLayerType(s.to_string())),
        }
    }
}
