//! Resampling kernels for the reprojection renderer.
//!
//! Rasters are `(rows, cols, 4)` RGBA views. Coordinates are corner-based:
//! pixel `(0, 0)` covers `[0, 1) x [0, 1)` and has its centre at `(0.5, 0.5)`.

pub mod bilinear;
pub mod nearest;

use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

use crate::canvas::CHANNELS;

/// Available resampling methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    Nearest,
    #[default]
    Bilinear,
}

impl ResamplingMethod {
    /// Parse from a string name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nearest" => Some(Self::Nearest),
            "bilinear" | "linear" => Some(Self::Bilinear),
            _ => None,
        }
    }

    /// Kernel radius in pixels (how far from center the kernel reaches).
    pub fn kernel_radius(&self) -> f64 {
        match self {
            Self::Nearest => 0.5,
            Self::Bilinear => 1.0,
        }
    }

    /// Sample `src` at the corner-based position `(x, y)`.
    ///
    /// Bilinear falls back to nearest where no neighbourhood can be formed.
    pub fn sample(&self, src: &ArrayView3<'_, u8>, x: f64, y: f64) -> Option<[u8; CHANNELS]> {
        match self {
            Self::Nearest => nearest::sample(src, x, y),
            Self::Bilinear => bilinear::sample(src, x, y).or_else(|| nearest::sample(src, x, y)),
        }
    }
}
