use crate::error::{Error, Shape};
use crate::fingerprint::{FingerprintBlock, FingerprintSequence, SubFingerprint, BLOCK_LEN, NUM_BANDS, SUB_FINGERPRINT_BITS};
use crate::spectrogram::EnergySpectrogram;

/// Bit `band` of the sub-fingerprint of `frame`.
///
/// The bit is set when the energy difference between `band` and `band + 1`
/// grew compared to the previous frame. The frame before frame 0 is the last
/// frame of the spectrogram; for a single-frame spectrogram that is frame 0
/// itself and every bit is unset.
pub fn sub_fingerprint_bit(spectrogram: &EnergySpectrogram, frame: usize, band: usize) -> bool {
    let frames = spectrogram.frames();
    let prev = (frame + frames - 1) % frames;

    let diff_current = spectrogram.energy(band, frame) - spectrogram.energy(band + 1, frame);
    let diff_prev = spectrogram.energy(band, prev) - spectrogram.energy(band + 1, prev);
    (diff_current - diff_prev) > 0.0
}

/// Sub-fingerprint of a single frame.
pub fn sub_fingerprint(spectrogram: &EnergySpectrogram, frame: usize) -> SubFingerprint {
    (0..SUB_FINGERPRINT_BITS)
        .map(|band| sub_fingerprint_bit(spectrogram, frame, band))
        .collect()
}

/// Sub-fingerprints of every frame, in frame order.
pub fn extract_sequence(spectrogram: &EnergySpectrogram) -> Result<FingerprintSequence, Error> {
    if spectrogram.bands() != NUM_BANDS {
        return Err(Error::ShapeMismatch {
            expected: Shape { bands: NUM_BANDS, frames: spectrogram.frames() },
            found: spectrogram.shape(),
        });
    }

    Ok((0..spectrogram.frames())
        .map(|frame| sub_fingerprint(spectrogram, frame))
        .collect())
}

/// The [BLOCK_LEN] sub-fingerprints starting at index `start`.
pub fn extract_block(sequence: &[SubFingerprint], start: usize) -> Result<FingerprintBlock<'_>, Error> {
    let end = start.checked_add(BLOCK_LEN).filter(|&end| end <= sequence.len());
    match end {
        Some(end) => Ok(FingerprintBlock::new(start, &sequence[start..end])),
        None => Err(Error::InsufficientFrames {
            required: start.saturating_add(BLOCK_LEN),
            available: sequence.len(),
        }),
    }
}
