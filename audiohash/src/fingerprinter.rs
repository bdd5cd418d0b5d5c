use log::debug;

use crate::error::Error;
use crate::fft::Fft;
use crate::fingerprint::{FingerprintSequence, NUM_BANDS};
use crate::fingerprint_calculator::extract_sequence;
use crate::mel::MelBands;
use crate::spectrogram::{EnergySpectrogram, SpectrogramCollector, SpectrumAnalyzer};
use crate::stages::AudioConsumer;

/// Structure containing configuration for a [Fingerprinter].
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    frame_duration: f64,
    hop_duration: f64,
    min_freq: f64,
    max_freq: f64,
}

impl Configuration {
    /// Sets the duration of a single analysis frame (in seconds).
    pub fn with_frame_duration(mut self, seconds: f64) -> Self {
        self.frame_duration = seconds;
        self
    }

    /// Sets the distance between the starts of two consecutive frames (in seconds).
    pub fn with_hop_duration(mut self, seconds: f64) -> Self {
        self.hop_duration = seconds;
        self
    }

    /// Restricts the mel bands to the given frequency range (in Hz).
    pub fn with_frequency_range(mut self, min_freq: f64, max_freq: f64) -> Self {
        self.min_freq = min_freq;
        self.max_freq = max_freq;
        self
    }

    /// Frame length of 0.37s with 31/32 overlap over 300-2000 Hz.
    pub fn preset_default() -> Self {
        Self {
            frame_duration: DEFAULT_FRAME_DURATION,
            hop_duration: DEFAULT_FRAME_DURATION / DEFAULT_OVERLAP_FACTOR,
            min_freq: DEFAULT_MIN_FREQ,
            max_freq: DEFAULT_MAX_FREQ,
        }
    }

    /// Number of samples in a single frame for FFT.
    pub fn frame_size(&self, sample_rate: u32) -> usize {
        (self.frame_duration * sample_rate as f64).ceil() as usize
    }

    /// Number of samples between two consecutive frames.
    pub fn hop_size(&self, sample_rate: u32) -> usize {
        (self.hop_duration * sample_rate as f64).ceil() as usize
    }

    /// A duration of a single item from the fingerprint.
    pub fn item_duration_in_seconds(&self, sample_rate: u32) -> f64 {
        self.hop_size(sample_rate) as f64 / sample_rate as f64
    }

    fn validate(&self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::InvalidParameter("sample rate must be positive"));
        }
        if self.frame_size(sample_rate) < 2 {
            return Err(Error::InvalidParameter("frame must span at least two samples"));
        }
        let hop_size = self.hop_size(sample_rate);
        if hop_size == 0 || hop_size > self.frame_size(sample_rate) {
            return Err(Error::InvalidParameter("hop must be positive and no longer than a frame"));
        }
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq) {
            return Err(Error::InvalidParameter("minimum frequency must be below maximum frequency"));
        }
        if self.max_freq > sample_rate as f64 / 2.0 {
            return Err(Error::InvalidParameter("maximum frequency exceeds the Nyquist frequency"));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::preset_default()
    }
}

const DEFAULT_FRAME_DURATION: f64 = 0.37;
const DEFAULT_OVERLAP_FACTOR: f64 = 32.0;
const DEFAULT_MIN_FREQ: f64 = 300.0;
const DEFAULT_MAX_FREQ: f64 = 2000.0;

const CHUNK_SIZE: usize = 4096;

/// Computes mel-band energy spectrograms and fingerprints of mono signals.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    config: Configuration,
}

impl Fingerprinter {
    /// Creates a new [Fingerprinter] with the given [Configuration].
    pub fn new(config: &Configuration) -> Self {
        Self { config: config.clone() }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Fingerprint sequence of the whole signal.
    pub fn fingerprint(&self, signal: &[f32], sample_rate: u32) -> Result<FingerprintSequence, Error> {
        extract_sequence(&self.spectrogram(signal, sample_rate)?)
    }
}

impl SpectrumAnalyzer for Fingerprinter {
    fn spectrogram(&self, signal: &[f32], sample_rate: u32) -> Result<EnergySpectrogram, Error> {
        self.config.validate(sample_rate)?;

        let frame_size = self.config.frame_size(sample_rate);
        let hop_size = self.config.hop_size(sample_rate);
        let bands = MelBands::new(
            NUM_BANDS,
            self.config.min_freq,
            self.config.max_freq,
            frame_size,
            sample_rate,
            SpectrogramCollector::new(NUM_BANDS),
        );
        let mut fft = Fft::new(frame_size, frame_size - hop_size, bands);

        // Frames are centred on multiples of the hop, so the signal is
        // reflected by half a frame on both sides.
        let pad = frame_size / 2;
        let (left, right) = reflect_padding(signal, pad);
        fft.consume(&left);
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);
        for chunk in signal.chunks(CHUNK_SIZE) {
            buffer.clear();
            buffer.extend(chunk.iter().copied().map(f64::from));
            fft.consume(&buffer);
        }
        fft.consume(&right);
        fft.flush();

        let spectrogram = fft.into_consumer().into_consumer().into_spectrogram();
        debug!(
            "spectrogram of {} samples at {} Hz: {} bands x {} frames",
            signal.len(),
            sample_rate,
            spectrogram.bands(),
            spectrogram.frames()
        );
        Ok(spectrogram)
    }
}

/// Samples mirrored around the first and last sample, excluding the edge
/// samples themselves. Too short signals are padded with silence instead.
fn reflect_padding(signal: &[f32], pad: usize) -> (Vec<f64>, Vec<f64>) {
    if signal.len() <= pad {
        return (vec![0.0; pad], vec![0.0; pad]);
    }

    let n = signal.len();
    let left = (1..=pad).rev().map(|i| f64::from(signal[i])).collect();
    let right = (1..=pad).map(|i| f64::from(signal[n - 1 - i])).collect();
    (left, right)
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::fingerprint::NUM_BANDS;
    use crate::fingerprinter::{reflect_padding, Configuration, Fingerprinter};
    use crate::spectrogram::SpectrumAnalyzer;

    const SAMPLE_RATE: u32 = 8000;

    fn tone(freq: f64, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn default_sizes() {
        let config = Configuration::default();
        assert_eq!(8159, config.frame_size(22050));
        assert_eq!(255, config.hop_size(22050));
        assert_eq!(255.0 / 22050.0, config.item_duration_in_seconds(22050));
        assert_eq!(93.0 / 8000.0, config.item_duration_in_seconds(8000));
    }

    #[test]
    fn padding() {
        let (left, right) = reflect_padding(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(vec![3.0, 2.0], left);
        assert_eq!(vec![4.0, 3.0], right);

        let (left, right) = reflect_padding(&[1.0], 2);
        assert_eq!(vec![0.0, 0.0], left);
        assert_eq!(vec![0.0, 0.0], right);
    }

    #[test]
    fn frame_count() {
        let fingerprinter = Fingerprinter::default();
        let signal = tone(440.0, SAMPLE_RATE as usize);
        let spec = fingerprinter.spectrogram(&signal, SAMPLE_RATE).unwrap();

        let frame_size = fingerprinter.config().frame_size(SAMPLE_RATE);
        let hop_size = fingerprinter.config().hop_size(SAMPLE_RATE);
        let padded = signal.len() + 2 * (frame_size / 2);
        assert_eq!(NUM_BANDS, spec.bands());
        assert_eq!(1 + (padded - frame_size) / hop_size, spec.frames());
    }

    #[test]
    fn tone_lands_in_the_middle_bands() {
        let fingerprinter = Fingerprinter::default();
        let spec = fingerprinter.spectrogram(&tone(1000.0, SAMPLE_RATE as usize), SAMPLE_RATE).unwrap();

        let middle = spec.frames() / 2;
        let frame = spec.frame(middle);
        let peak = (0..NUM_BANDS)
            .max_by(|&a, &b| frame[a].total_cmp(&frame[b]))
            .unwrap();
        assert!((14..=20).contains(&peak), "peak at band {peak}");
        assert!(frame[peak] > 10.0 * frame[0]);
        assert!(frame[peak] > 10.0 * frame[NUM_BANDS - 1]);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let fingerprinter = Fingerprinter::default();
        let mut signal = tone(700.0, SAMPLE_RATE as usize);
        for (i, sample) in signal.iter_mut().enumerate() {
            *sample *= 1.0 + 0.5 * (i as f32 / 900.0).sin();
        }

        let fp1 = fingerprinter.fingerprint(&signal, SAMPLE_RATE).unwrap();
        let fp2 = fingerprinter.fingerprint(&signal, SAMPLE_RATE).unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fingerprinter.spectrogram(&signal, SAMPLE_RATE).unwrap().frames(), fp1.len());
    }

    #[test]
    fn invalid_configuration() {
        let signal = tone(440.0, 1000);

        let fingerprinter = Fingerprinter::default();
        assert!(matches!(fingerprinter.spectrogram(&signal, 0), Err(Error::InvalidParameter(_))));
        // Nyquist below 2000 Hz
        assert!(matches!(fingerprinter.spectrogram(&signal, 3000), Err(Error::InvalidParameter(_))));

        let config = Configuration::default().with_hop_duration(1.0);
        let result = Fingerprinter::new(&config).spectrogram(&signal, SAMPLE_RATE);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        let config = Configuration::default().with_frequency_range(2000.0, 300.0);
        let result = Fingerprinter::new(&config).spectrogram(&signal, SAMPLE_RATE);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
