/// Weight fillers for the C x C recurrent matrix.
///
/// Invoked once per layer at setup. The IRNN default is the identity.

use serde::{Deserialize, Serialize};

use crate::tensor::SimpleRng;

/// Fills a row-major `channels x channels` weight buffer.
pub trait WeightFiller {
    fn fill(&self, w: &mut [f32], channels: usize);
}

fn default_gain() -> f32 {
    1.0
}

/// Serializable filler choice, the `weight_filler` field of a layer config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillerConfig {
    /// gain * I
    Identity {
        #[serde(default = "default_gain")]
        gain: f32,
    },
    Constant { value: f32 },
    /// Uniform in [-scale, scale].
    Uniform {
        scale: f32,
        #[serde(default)]
        seed: u64,
    },
    /// Zero-mean normal with standard deviation `std`.
    Gaussian {
        std: f32,
        #[serde(default)]
        seed: u64,
    },
}

impl Default for FillerConfig {
    fn default() -> Self {
        FillerConfig::Identity { gain: 1.0 }
    }
}

impl WeightFiller for FillerConfig {
    fn fill(&self, w: &mut [f32], channels: usize) {
        debug_assert_eq!(w.len(), channels * channels);
        match *self {
            FillerConfig::Identity { gain } => {
                w.fill(0.0);
                for i in 0..channels {
                    w[i * channels + i] = gain;
                }
            }
            FillerConfig::Constant { value } => w.fill(value),
            FillerConfig::Uniform { scale, seed } => {
                SimpleRng::new(seed).fill_uniform(w, scale);
            }
            FillerConfig::Gaussian { std, seed } => {
                let mut rng = SimpleRng::new(seed);
                for v in w.iter_mut() {
                    *v = rng.normal(std);
                }
            }
        }
        log::debug!("filled {channels}x{channels} weight matrix with {:?}", self);
    }
}
