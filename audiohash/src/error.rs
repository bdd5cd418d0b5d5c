use std::fmt::{Display, Formatter};

use rubato::{ResampleError, ResamplerConstructionError};

/// Dimensions of an [EnergySpectrogram](crate::EnergySpectrogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub bands: usize,
    pub frames: usize,
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.bands, self.frames)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("spectrogram shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    #[error("fingerprint sequences differ in length: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("not enough sub-fingerprints: required {required}, available {available}")]
    InsufficientFrames { required: usize, available: usize },

    #[error("cannot create resampler: {0}")]
    CannotResample(#[from] ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Resample(#[from] ResampleError),
}
