use crate::error::{Error, Shape};
use crate::stages::{FeatureVectorConsumer, Stage};

/// Band energies over time, indexed `[band][frame]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySpectrogram {
    bands: usize,
    frames: usize,
    // frame-major
    data: Vec<f64>,
}

impl EnergySpectrogram {
    /// Builds a spectrogram from per-band rows, every row holding one value per frame.
    pub fn from_bands(rows: &[Vec<f64>]) -> Result<Self, Error> {
        let bands = rows.len();
        let frames = rows.first().map_or(0, Vec::len);

        if let Some(row) = rows.iter().find(|row| row.len() != frames) {
            return Err(Error::ShapeMismatch {
                expected: Shape { bands, frames },
                found: Shape { bands, frames: row.len() },
            });
        }

        let mut data = Vec::with_capacity(bands * frames);
        for frame in 0..frames {
            data.extend(rows.iter().map(|row| row[frame]));
        }

        Ok(Self { bands, frames, data })
    }

    fn empty(bands: usize) -> Self {
        Self { bands, frames: 0, data: Vec::new() }
    }

    fn push_frame(&mut self, features: &[f64]) {
        assert_eq!(features.len(), self.bands);
        self.data.extend_from_slice(features);
        self.frames += 1;
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn shape(&self) -> Shape {
        Shape { bands: self.bands, frames: self.frames }
    }

    /// Energy of `band` in `frame`.
    ///
    /// Panics when either index is out of range.
    pub fn energy(&self, band: usize, frame: usize) -> f64 {
        assert!(band < self.bands, "band {band} out of range");
        self.data[frame * self.bands + band]
    }

    /// All band energies of a single frame.
    pub fn frame(&self, frame: usize) -> &[f64] {
        &self.data[frame * self.bands..(frame + 1) * self.bands]
    }
}

/// Computes an [EnergySpectrogram] from a mono signal.
pub trait SpectrumAnalyzer: Sync {
    fn spectrogram(&self, signal: &[f32], sample_rate: u32) -> Result<EnergySpectrogram, Error>;
}

impl<A: SpectrumAnalyzer + ?Sized> SpectrumAnalyzer for &A {
    fn spectrogram(&self, signal: &[f32], sample_rate: u32) -> Result<EnergySpectrogram, Error> {
        (**self).spectrogram(signal, sample_rate)
    }
}

/// Final pipeline stage gathering feature vectors into a spectrogram.
pub(crate) struct SpectrogramCollector {
    spectrogram: EnergySpectrogram,
}

impl SpectrogramCollector {
    pub(crate) fn new(bands: usize) -> Self {
        Self { spectrogram: EnergySpectrogram::empty(bands) }
    }

    pub(crate) fn into_spectrogram(self) -> EnergySpectrogram {
        self.spectrogram
    }
}

impl Stage for SpectrogramCollector {
    type Output = EnergySpectrogram;

    fn output(&self) -> &Self::Output {
        &self.spectrogram
    }
}

impl FeatureVectorConsumer for SpectrogramCollector {
    fn consume(&mut self, features: &[f64]) {
        self.spectrogram.push_frame(features);
    }
}
