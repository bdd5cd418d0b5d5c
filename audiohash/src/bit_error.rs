use crate::error::{Error, Shape};
use crate::fingerprint::{SubFingerprint, NUM_BANDS, SUB_FINGERPRINT_BITS};
use crate::fingerprint_calculator::extract_sequence;
use crate::spectrogram::EnergySpectrogram;

/// Number of bit positions in which two sub-fingerprints differ.
pub fn hamming_distance(a: SubFingerprint, b: SubFingerprint) -> u32 {
    (a.bits() ^ b.bits()).count_ones()
}

/// Fraction of mismatched bits between two equally long runs of sub-fingerprints.
///
/// Two empty runs are identical and have a bit error rate of 0.
pub fn bit_error_rate(a: &[SubFingerprint], b: &[SubFingerprint]) -> Result<f64, Error> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch { left: a.len(), right: b.len() });
    }

    if a.is_empty() {
        return Ok(0.0);
    }

    let bit_errors: u64 = std::iter::zip(a, b)
        .map(|(x, y)| u64::from(hamming_distance(*x, *y)))
        .sum();
    let total_bits = (SUB_FINGERPRINT_BITS * a.len()) as f64;
    Ok(bit_errors as f64 / total_bits)
}

/// Bit error rate between the fingerprints of two whole spectrograms.
pub fn compare_spectrograms(a: &EnergySpectrogram, b: &EnergySpectrogram) -> Result<f64, Error> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch { expected: a.shape(), found: b.shape() });
    }

    if a.bands() != NUM_BANDS {
        return Err(Error::ShapeMismatch {
            expected: Shape { bands: NUM_BANDS, frames: a.frames() },
            found: a.shape(),
        });
    }

    let fp1 = extract_sequence(a)?;
    let fp2 = extract_sequence(b)?;
    bit_error_rate(&fp1, &fp2)
}
