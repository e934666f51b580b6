pub mod error;
pub mod tensor;
pub mod activation;
pub mod axis;
pub mod scan;
pub mod filler;
pub mod config;
pub mod layer;

pub use axis::{Direction, ScanGeometry, ScanOrder};
pub use config::SpatialRnnConfig;
pub use error::{ScanError, ScanResult};
pub use filler::{FillerConfig, WeightFiller};
pub use layer::{Activations, SpatialRnn};
pub use scan::{scan_backward, scan_forward, ScanScratch};
pub use tensor::Tensor;
