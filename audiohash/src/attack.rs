use std::fmt::{Display, Formatter};

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::bank::{shift_amounts, PitchShiftBank};
use crate::bit_error::{bit_error_rate, compare_spectrograms};
use crate::error::Error;
use crate::fingerprint_calculator::extract_sequence;
use crate::pitch_shift::PitchShifter;
use crate::spectrogram::{EnergySpectrogram, SpectrumAnalyzer};

/// Highest bit error rate still accepted as a match.
pub const DEFAULT_THRESHOLD: f64 = 0.35;
/// Attack shifts are drawn from `[-DEFAULT_MAX_OFFSET, DEFAULT_MAX_OFFSET)` semitones.
pub const DEFAULT_MAX_OFFSET: f64 = 2.0;
pub const DEFAULT_BANK_OFFSET: f64 = 1.6;
pub const DEFAULT_BANK_STEP: f64 = 0.8;

/// How the detector compares an attacked signal with its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackMode {
    /// A single fingerprint of the unmodified reference.
    Simple,
    /// Every fingerprint of a [PitchShiftBank] built from the reference.
    Robust,
}

impl Display for AttackMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttackMode::Simple => f.write_str("simple"),
            AttackMode::Robust => f.write_str("robust"),
        }
    }
}

/// Structure containing configuration for an [AttackEvaluator].
#[derive(Debug, Clone, PartialEq)]
pub struct AttackConfig {
    threshold: f64,
    max_offset: f64,
    bank_offset: f64,
    bank_step: f64,
}

impl AttackConfig {
    /// Sets the highest bit error rate still considered a match.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the bound of the symmetric range attack shifts are sampled from.
    pub fn with_max_offset(mut self, semitones: f64) -> Self {
        self.max_offset = semitones.abs();
        self
    }

    /// Sets the range and spacing of the shifts covered by the robust bank.
    pub fn with_bank(mut self, offset: f64, step: f64) -> Self {
        self.bank_offset = offset;
        self.bank_step = step;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_offset(&self) -> f64 {
        self.max_offset
    }

    pub fn bank_offset(&self) -> f64 {
        self.bank_offset
    }

    pub fn bank_step(&self) -> f64 {
        self.bank_step
    }

    /// Checks that the sampling range and the bank are usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.threshold.is_nan() {
            return Err(Error::InvalidParameter("threshold must be a number"));
        }
        // The width of the sampling range has to be finite as well.
        if !(2.0 * self.max_offset).is_finite() {
            return Err(Error::InvalidParameter("maximum attack offset must be finite"));
        }
        shift_amounts(self.bank_offset, self.bank_step)?;
        Ok(())
    }

    /// Draws an attack shift uniformly from `[-max_offset, max_offset)`.
    pub fn sample_shift<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, Error> {
        if !(2.0 * self.max_offset).is_finite() {
            return Err(Error::InvalidParameter("maximum attack offset must be finite"));
        }
        if self.max_offset > 0.0 {
            Ok(rng.gen_range(-self.max_offset..self.max_offset))
        } else {
            Ok(0.0)
        }
    }
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_offset: DEFAULT_MAX_OFFSET,
            bank_offset: DEFAULT_BANK_OFFSET,
            bank_step: DEFAULT_BANK_STEP,
        }
    }
}

/// Whether a bit error rate is low enough for the detector to report a match.
pub fn fingerprint_hit(ber: f64, threshold: f64) -> bool {
    ber <= threshold
}

/// Smallest bit error rate of `(shift, ber)` pairs.
pub fn least_ber(bers: &[(f64, f64)]) -> Option<f64> {
    bers.iter().map(|(_, ber)| *ber).min_by(f64::total_cmp)
}

/// Outcome of a trial from the detector's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The distorted signal was still recognised, the attack failed.
    Hit,
    /// The distorted signal evaded detection, the attack succeeded.
    Miss,
}

impl Verdict {
    pub fn from_ber(ber: f64, threshold: f64) -> Self {
        if fingerprint_hit(ber, threshold) {
            Verdict::Hit
        } else {
            Verdict::Miss
        }
    }

    pub fn is_hit(self) -> bool {
        self == Verdict::Hit
    }

    pub fn attack_succeeded(self) -> bool {
        self == Verdict::Miss
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Hit => f.write_str("FINGERPRINT HIT. ATTACK UNSUCCESSFUL"),
            Verdict::Miss => f.write_str("FINGERPRINT MISS. ATTACK SUCCESSFUL"),
        }
    }
}

/// Bit error rates measured in a trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialScores {
    Simple { ber: f64 },
    /// One `(bank shift, ber)` pair per bank entry, in bank order.
    Robust { bers: Vec<(f64, f64)> },
}

impl TrialScores {
    /// The rate the verdict is based on.
    pub fn decisive_ber(&self) -> f64 {
        match self {
            TrialScores::Simple { ber } => *ber,
            // An empty bank matches nothing.
            TrialScores::Robust { bers } => least_ber(bers).unwrap_or(1.0),
        }
    }
}

/// Record of a single attack trial.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackTrial {
    /// Pitch shift applied to the attacked signal (in semitones).
    pub shift: f64,
    pub scores: TrialScores,
    pub verdict: Verdict,
}

impl AttackTrial {
    fn new(shift: f64, scores: TrialScores, threshold: f64) -> Self {
        let verdict = Verdict::from_ber(scores.decisive_ber(), threshold);
        Self { shift, scores, verdict }
    }

    pub fn mode(&self) -> AttackMode {
        match self.scores {
            TrialScores::Simple { .. } => AttackMode::Simple,
            TrialScores::Robust { .. } => AttackMode::Robust,
        }
    }
}

/// Reference state an attacked signal is scored against. Read-only and
/// shared between trials.
#[derive(Debug, Clone)]
pub enum Reference {
    Simple(EnergySpectrogram),
    Robust(PitchShiftBank),
}

impl Reference {
    pub fn mode(&self) -> AttackMode {
        match self {
            Reference::Simple(_) => AttackMode::Simple,
            Reference::Robust(_) => AttackMode::Robust,
        }
    }
}

/// Runs pitch shifting attacks against the fingerprinting scheme.
pub struct AttackEvaluator<A: SpectrumAnalyzer, P: PitchShifter> {
    config: AttackConfig,
    analyzer: A,
    shifter: P,
}

impl<A: SpectrumAnalyzer, P: PitchShifter> AttackEvaluator<A, P> {
    pub fn new(config: AttackConfig, analyzer: A, shifter: P) -> Self {
        Self { config, analyzer, shifter }
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    pub fn shifter(&self) -> &P {
        &self.shifter
    }

    /// Computes what `mode` compares attacked signals against.
    pub fn prepare(&self, mode: AttackMode, reference: &[f32], sample_rate: u32) -> Result<Reference, Error> {
        match mode {
            AttackMode::Simple => Ok(Reference::Simple(self.analyzer.spectrogram(reference, sample_rate)?)),
            AttackMode::Robust => Ok(Reference::Robust(self.build_bank(reference, sample_rate)?)),
        }
    }

    pub fn build_bank(&self, reference: &[f32], sample_rate: u32) -> Result<PitchShiftBank, Error> {
        PitchShiftBank::build(
            reference,
            sample_rate,
            self.config.bank_offset,
            self.config.bank_step,
            &self.analyzer,
            &self.shifter,
        )
    }

    /// Shifts the reference signal by `shift` semitones and scores it in simple mode.
    pub fn simple(&self, signal: &[f32], sample_rate: u32, shift: f64) -> Result<AttackTrial, Error> {
        let reference = self.prepare(AttackMode::Simple, signal, sample_rate)?;
        self.attack(&reference, signal, sample_rate, shift)
    }

    /// Shifts the reference signal by `shift` semitones and scores it in robust mode.
    pub fn robust(&self, signal: &[f32], sample_rate: u32, shift: f64) -> Result<AttackTrial, Error> {
        let reference = self.prepare(AttackMode::Robust, signal, sample_rate)?;
        self.attack(&reference, signal, sample_rate, shift)
    }

    /// Pitch shifts `signal` and scores the result against `reference`.
    pub fn attack(&self, reference: &Reference, signal: &[f32], sample_rate: u32, shift: f64) -> Result<AttackTrial, Error> {
        let shifted = self.shifter.shift(signal, sample_rate, shift)?;
        self.attack_shifted(reference, &shifted, sample_rate, shift)
    }

    /// Scores a signal that was already shifted by `shift` semitones.
    pub fn attack_shifted(&self, reference: &Reference, shifted: &[f32], sample_rate: u32, shift: f64) -> Result<AttackTrial, Error> {
        let spectrogram = self.analyzer.spectrogram(shifted, sample_rate)?;
        // No frames means no bits to compare; never report that as a match.
        if spectrogram.frames() == 0 {
            return Err(Error::InsufficientFrames { required: 1, available: 0 });
        }
        let scores = match reference {
            Reference::Simple(reference) => TrialScores::Simple {
                ber: compare_spectrograms(reference, &spectrogram)?,
            },
            Reference::Robust(bank) => {
                let sequence = extract_sequence(&spectrogram)?;
                let bers = bank
                    .iter()
                    .map(|(bank_shift, fp)| -> Result<(f64, f64), Error> {
                        Ok((bank_shift, bit_error_rate(fp, &sequence)?))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                TrialScores::Robust { bers }
            }
        };

        let trial = AttackTrial::new(shift, scores, self.config.threshold);
        debug!(
            "{} attack with {shift:+.3} semitones: ber {:.3}, {:?}",
            reference.mode(),
            trial.scores.decisive_ber(),
            trial.verdict
        );
        Ok(trial)
    }

    /// Runs one trial per shift on the rayon pool.
    ///
    /// The reference is prepared once up front; its failure fails the whole
    /// run. Failing trials are returned in place and do not affect the others.
    pub fn run_trials(&self, mode: AttackMode, signal: &[f32], sample_rate: u32, shifts: &[f64]) -> Result<Vec<Result<AttackTrial, Error>>, Error> {
        let reference = self.prepare(mode, signal, sample_rate)?;
        Ok(shifts
            .par_iter()
            .map(|&shift| self.attack(&reference, signal, sample_rate, shift))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::attack::{fingerprint_hit, least_ber, AttackConfig, AttackEvaluator, AttackMode, Reference, TrialScores, Verdict};
    use crate::bank::tests::{test_signal, StubAnalyzer, StubShifter};
    use crate::error::Error;
    use crate::fingerprinter::Fingerprinter;
    use crate::pitch_shift::{GranularPitchShifter, PitchShifter};

    const SAMPLE_RATE: u32 = 22050;

    fn evaluator() -> AttackEvaluator<StubAnalyzer, StubShifter> {
        AttackEvaluator::new(AttackConfig::default(), StubAnalyzer::default(), StubShifter::default())
    }

    #[test]
    fn threshold_boundary() {
        assert!(fingerprint_hit(0.35, 0.35));
        assert!(!fingerprint_hit(0.350001, 0.35));
        assert_eq!(Verdict::Hit, Verdict::from_ber(0.0, 0.35));
        assert_eq!(Verdict::Miss, Verdict::from_ber(1.0, 0.35));
    }

    #[test]
    fn robust_decision_uses_least_ber() {
        let bers = vec![(-1.0, 0.40), (0.0, 0.10), (1.0, 0.50)];
        assert_eq!(Some(0.10), least_ber(&bers));

        let scores = TrialScores::Robust { bers };
        assert_eq!(0.10, scores.decisive_ber());
        assert!(Verdict::from_ber(scores.decisive_ber(), 0.35).is_hit());
        assert_eq!(None, least_ber(&[]));
    }

    #[test]
    fn verdict_text() {
        assert_eq!("FINGERPRINT HIT. ATTACK UNSUCCESSFUL", Verdict::Hit.to_string());
        assert_eq!("FINGERPRINT MISS. ATTACK SUCCESSFUL", Verdict::Miss.to_string());
        assert!(Verdict::Miss.attack_succeeded());
    }

    #[test]
    fn sampled_shifts_stay_in_range() {
        let config = AttackConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let shift = config.sample_shift(&mut rng).unwrap();
            assert!((-2.0..2.0).contains(&shift), "{shift}");
        }
        assert_eq!(0.0, config.with_max_offset(0.0).sample_shift(&mut rng).unwrap());
    }

    #[test]
    fn unbounded_sampling_range_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        for max_offset in [f64::MAX, f64::INFINITY, f64::NAN] {
            let config = AttackConfig::default().with_max_offset(max_offset);
            assert!(matches!(config.sample_shift(&mut rng), Err(Error::InvalidParameter(_))), "{max_offset}");
            assert!(config.validate().is_err(), "{max_offset}");
        }
        let shift = AttackConfig::default().with_max_offset(1e300).sample_shift(&mut rng).unwrap();
        assert!(shift.is_finite());
    }

    #[test]
    fn validation() {
        assert!(AttackConfig::default().validate().is_ok());
        assert!(AttackConfig::default().with_threshold(f64::NAN).validate().is_err());
        assert!(matches!(
            AttackConfig::default().with_bank(f64::INFINITY, 1.0).validate(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(AttackConfig::default().with_bank(1e17, 1.0).validate().is_err());
    }

    #[test]
    fn simple_attack_without_shift_is_a_hit() {
        let trial = evaluator().simple(&test_signal(30), SAMPLE_RATE, 0.0).unwrap();
        assert_eq!(TrialScores::Simple { ber: 0.0 }, trial.scores);
        assert_eq!(Verdict::Hit, trial.verdict);
        assert_eq!(AttackMode::Simple, trial.mode());
    }

    #[test]
    fn robust_attack_matches_bank_entry() {
        let trial = evaluator().robust(&test_signal(30), SAMPLE_RATE, 0.8).unwrap();
        match &trial.scores {
            TrialScores::Robust { bers } => {
                assert_eq!(5, bers.len());
                assert_eq!(vec![-1.6, -0.8, 0.0, 0.8, 1.6], bers.iter().map(|(s, _)| *s).collect::<Vec<_>>());
                assert_eq!(Some(0.0), bers.iter().find(|(s, _)| *s == 0.8).map(|(_, ber)| *ber));
            }
            other => panic!("unexpected scores: {other:?}"),
        }
        assert_eq!(0.0, trial.scores.decisive_ber());
        assert_eq!(Verdict::Hit, trial.verdict);
    }

    #[test]
    fn strict_threshold_turns_hits_into_misses() {
        let config = AttackConfig::default().with_threshold(-1.0);
        let evaluator = AttackEvaluator::new(config, StubAnalyzer::default(), StubShifter::default());
        let trial = evaluator.simple(&test_signal(30), SAMPLE_RATE, 0.0).unwrap();
        assert_eq!(Verdict::Miss, trial.verdict);
    }

    #[test]
    fn trials_share_one_bank() {
        let evaluator = evaluator();
        let shifts = [-1.2, 0.3, 1.9];
        let trials = evaluator.run_trials(AttackMode::Robust, &test_signal(30), SAMPLE_RATE, &shifts).unwrap();

        assert_eq!(3, trials.len());
        for (trial, shift) in trials.iter().zip(shifts) {
            assert_eq!(shift, trial.as_ref().unwrap().shift);
        }
        // five bank entries plus one spectrogram per trial
        assert_eq!(8, evaluator.analyzer.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn invalid_bank_fails_the_run() {
        let config = AttackConfig::default().with_bank(1.0, 1.5);
        let evaluator = AttackEvaluator::new(config, StubAnalyzer::default(), StubShifter::default());
        let result = evaluator.run_trials(AttackMode::Robust, &test_signal(30), SAMPLE_RATE, &[0.5]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    /// Drops the last frame of the signal for large upward shifts.
    struct TruncatingShifter;

    impl PitchShifter for TruncatingShifter {
        fn shift(&self, signal: &[f32], _sample_rate: u32, semitones: f64) -> Result<Vec<f32>, Error> {
            let len = if semitones > 1.0 { signal.len() - crate::fingerprint::NUM_BANDS } else { signal.len() };
            Ok(signal[..len].to_vec())
        }
    }

    #[test]
    fn failing_trial_does_not_abort_siblings() {
        let evaluator = AttackEvaluator::new(AttackConfig::default().with_bank(1.0, 0.5), StubAnalyzer::default(), TruncatingShifter);
        let signal = test_signal(30);
        let reference = evaluator.prepare(AttackMode::Simple, &signal, SAMPLE_RATE).unwrap();
        assert_eq!(AttackMode::Simple, reference.mode());

        let trials = evaluator.run_trials(AttackMode::Simple, &signal, SAMPLE_RATE, &[0.5, 1.5, -0.5]).unwrap();
        assert!(trials[0].is_ok());
        assert!(matches!(trials[1], Err(Error::ShapeMismatch { .. })));
        assert!(trials[2].is_ok());

        let bank = evaluator.build_bank(&signal, SAMPLE_RATE).unwrap();
        let result = evaluator.attack(&Reference::Robust(bank), &signal, SAMPLE_RATE, 1.5);
        assert!(matches!(result, Err(Error::LengthMismatch { left: 30, right: 29 })));
    }

    #[test]
    fn empty_signal_is_not_a_hit() {
        let evaluator = evaluator();
        for mode in [AttackMode::Simple, AttackMode::Robust] {
            let reference = evaluator.prepare(mode, &[], SAMPLE_RATE).unwrap();
            let result = evaluator.attack(&reference, &[], SAMPLE_RATE, 1.0);
            assert!(matches!(result, Err(Error::InsufficientFrames { required: 1, available: 0 })), "{mode}");
        }

        let evaluator = AttackEvaluator::new(AttackConfig::default(), Fingerprinter::default(), GranularPitchShifter::default());
        let result = evaluator.simple(&[], 22050, 1.0);
        assert!(matches!(result, Err(Error::InsufficientFrames { .. })));
    }

    #[test]
    fn real_pipeline() {
        let sample_rate = 8000;
        let signal: Vec<f32> = (0..12_000)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.4 * (2.0 * std::f32::consts::PI * 523.25 * t).sin() + 0.2 * (2.0 * std::f32::consts::PI * 1318.5 * t).sin()
            })
            .collect();
        let evaluator = AttackEvaluator::new(AttackConfig::default(), Fingerprinter::default(), GranularPitchShifter::default());

        let trial = evaluator.simple(&signal, sample_rate, 0.0).unwrap();
        assert_eq!(0.0, trial.scores.decisive_ber());

        let trial = evaluator.robust(&signal, sample_rate, 0.8).unwrap();
        assert_eq!(0.0, trial.scores.decisive_ber());
        assert_eq!(Verdict::Hit, trial.verdict);
    }
}
