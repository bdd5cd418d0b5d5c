//! Pitch-shift robust audio fingerprinting.
//!
//! Every frame of a 33-band mel energy spectrogram is summarised by a 32-bit
//! sub-fingerprint; signals are compared by the bit error rate of their
//! sub-fingerprint sequences. A [PitchShiftBank] holds fingerprints of
//! pitch shifted copies of a reference so that shifted queries still match,
//! and [AttackEvaluator] measures how well either scheme resists pitch
//! shifting attacks.

pub use attack::{
    fingerprint_hit, least_ber, AttackConfig, AttackEvaluator, AttackMode, AttackTrial, Reference, TrialScores, Verdict,
    DEFAULT_BANK_OFFSET, DEFAULT_BANK_STEP, DEFAULT_MAX_OFFSET, DEFAULT_THRESHOLD,
};
pub use bank::{shift_amounts, PitchShiftBank, MAX_BANK_SHIFTS};
pub use bit_error::{bit_error_rate, compare_spectrograms, hamming_distance};
pub use error::{Error, Shape};
pub use fingerprint::{FingerprintBlock, FingerprintSequence, SubFingerprint, BLOCK_LEN, NUM_BANDS, SUB_FINGERPRINT_BITS};
pub use fingerprint_calculator::{extract_block, extract_sequence, sub_fingerprint, sub_fingerprint_bit};
pub use fingerprinter::{Configuration, Fingerprinter};
pub use pitch_shift::{GranularPitchShifter, PitchShifter};
pub use spectrogram::{EnergySpectrogram, SpectrumAnalyzer};

mod attack;
mod bank;
mod bit_error;
mod error;
mod fft;
mod fingerprint;
mod fingerprint_calculator;
mod fingerprinter;
mod mel;
mod pitch_shift;
mod spectrogram;
mod stages;
mod utils;
