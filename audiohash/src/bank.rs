use log::{debug, info};
use rayon::prelude::*;

use crate::error::Error;
use crate::fingerprint::FingerprintSequence;
use crate::fingerprint_calculator::extract_sequence;
use crate::pitch_shift::PitchShifter;
use crate::spectrogram::SpectrumAnalyzer;

/// Upper bound on the number of entries of a bank.
pub const MAX_BANK_SHIFTS: usize = 1024;

/// Pitch shifts (in semitones) covered by a bank built with `offset` and `step`.
///
/// Starts at `-offset` and keeps adding `step` while the running value does
/// not exceed `offset`. The last value equals `offset` only when `step`
/// divides `2 * offset` without floating point drift.
///
/// Ranges holding more than [MAX_BANK_SHIFTS] shifts are rejected.
pub fn shift_amounts(offset: f64, step: f64) -> Result<Vec<f64>, Error> {
    if !(offset > 0.0) {
        return Err(Error::InvalidParameter("offset must be a positive number"));
    }
    if !(step > 0.0) {
        return Err(Error::InvalidParameter("step must be a positive number"));
    }
    if step > offset {
        return Err(Error::InvalidParameter("step must be less than or equal to offset"));
    }
    if !offset.is_finite() {
        return Err(Error::InvalidParameter("offset must be finite"));
    }
    // Also catches a step too small to move the running value.
    if !((2.0 * offset / step).floor() < MAX_BANK_SHIFTS as f64) {
        return Err(Error::InvalidParameter("step is too small for the offset"));
    }

    let mut shifts = Vec::new();
    let mut n = -offset;
    while n <= offset {
        shifts.push(n);
        n += step;
    }
    Ok(shifts)
}

/// Fingerprints of a reference signal and its pitch shifted variants, keyed
/// by the applied shift in semitones.
#[derive(Debug, Clone)]
pub struct PitchShiftBank {
    entries: Vec<(f64, FingerprintSequence)>,
}

impl PitchShiftBank {
    /// Fingerprints the signal shifted by every amount from [shift_amounts].
    ///
    /// The unshifted signal is fingerprinted directly. Shifts are processed in
    /// parallel and the bank is returned only once all of them succeeded.
    pub fn build<A, P>(signal: &[f32], sample_rate: u32, offset: f64, step: f64, analyzer: &A, shifter: &P) -> Result<Self, Error>
    where
        A: SpectrumAnalyzer + ?Sized,
        P: PitchShifter + ?Sized,
    {
        let shifts = shift_amounts(offset, step)?;

        let entries = shifts
            .par_iter()
            .map(|&shift| -> Result<(f64, FingerprintSequence), Error> {
                let spectrogram = if shift == 0.0 {
                    analyzer.spectrogram(signal, sample_rate)?
                } else {
                    let shifted = shifter.shift(signal, sample_rate, shift)?;
                    analyzer.spectrogram(&shifted, sample_rate)?
                };
                let sequence = extract_sequence(&spectrogram)?;
                debug!("bank entry {shift:+.3}: {} sub-fingerprints", sequence.len());
                Ok((shift, sequence))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        info!("built pitch shift bank with {} entries (offset {offset}, step {step})", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Covered shifts in ascending order.
    pub fn shifts(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(shift, _)| *shift)
    }

    /// Fingerprint computed for exactly `shift` semitones.
    pub fn get(&self, shift: f64) -> Option<&FingerprintSequence> {
        self.entries.iter().find(|(s, _)| *s == shift).map(|(_, fp)| fp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &FingerprintSequence)> {
        self.entries.iter().map(|(shift, fp)| (*shift, fp))
    }
}
