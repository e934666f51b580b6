/// Layer configuration: direction plus weight filler, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::axis::Direction;
use crate::error::ScanResult;
use crate::filler::FillerConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialRnnConfig {
    pub direction: Direction,
    #[serde(default)]
    pub weight_filler: FillerConfig,
}

impl SpatialRnnConfig {
    pub fn new(direction: Direction) -> Self {
        SpatialRnnConfig {
            direction,
            weight_filler: FillerConfig::default(),
        }
    }

    pub fn with_filler(mut self, filler: FillerConfig) -> Self {
        self.weight_filler = filler;
        self
    }

    pub fn from_json(json: &str) -> ScanResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ScanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
