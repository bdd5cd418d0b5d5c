use log::debug;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::Error;

/// Transposes a mono signal by a number of semitones without changing its duration.
pub trait PitchShifter: Sync {
    fn shift(&self, signal: &[f32], sample_rate: u32, semitones: f64) -> Result<Vec<f32>, Error>;
}

impl<P: PitchShifter + ?Sized> PitchShifter for &P {
    fn shift(&self, signal: &[f32], sample_rate: u32, semitones: f64) -> Result<Vec<f32>, Error> {
        (**self).shift(signal, sample_rate, semitones)
    }
}

/// Pitch shifter stretching the signal with overlapping Hann grains and
/// resampling it back to its original length.
#[derive(Debug, Clone)]
pub struct GranularPitchShifter {
    grain_size: usize,
}

const DEFAULT_GRAIN_SIZE: usize = 2048;
const RESAMPLER_CHUNK_SIZE: usize = 1024 * 8;

impl GranularPitchShifter {
    pub fn new(grain_size: usize) -> Self {
        Self { grain_size: grain_size.max(4) }
    }

    fn stretch(&self, signal: &[f64], factor: f64) -> Vec<f64> {
        let grain_size = self.grain_size;
        let synthesis_hop = grain_size / 4;
        let analysis_hop = synthesis_hop as f64 / factor;
        let output_len = (signal.len() as f64 * factor).round() as usize;

        let window: Vec<f64> = (0..grain_size)
            .map(|i| 0.5 - 0.5 * f64::cos(2.0 * std::f64::consts::PI * i as f64 / grain_size as f64))
            .collect();

        let mut output = vec![0.0; output_len + grain_size];
        let mut weights = vec![0.0; output_len + grain_size];
        let mut grain = 0;
        while grain * synthesis_hop < output_len {
            let input_offset = (grain as f64 * analysis_hop).round() as usize;
            let output_offset = grain * synthesis_hop;
            for (i, w) in window.iter().enumerate() {
                let sample = signal.get(input_offset + i).copied().unwrap_or(0.0);
                output[output_offset + i] += sample * w;
                weights[output_offset + i] += w;
            }
            grain += 1;
        }

        output.truncate(output_len);
        for (sample, weight) in output.iter_mut().zip(weights) {
            if weight > 1e-3 {
                *sample /= weight;
            }
        }
        output
    }
}

impl Default for GranularPitchShifter {
    fn default() -> Self {
        Self::new(DEFAULT_GRAIN_SIZE)
    }
}

impl PitchShifter for GranularPitchShifter {
    fn shift(&self, signal: &[f32], sample_rate: u32, semitones: f64) -> Result<Vec<f32>, Error> {
        if !semitones.is_finite() {
            return Err(Error::InvalidParameter("pitch shift must be a finite number of semitones"));
        }
        if semitones == 0.0 || signal.is_empty() {
            return Ok(signal.to_vec());
        }

        let factor = 2f64.powf(semitones / 12.0);
        let input: Vec<f64> = signal.iter().copied().map(f64::from).collect();
        let stretched = self.stretch(&input, factor);

        let mut resampler = SincFixedIn::<f64>::new(
            1.0 / factor,
            1.0,
            SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.9,
                oversampling_factor: 128,
                interpolation: SincInterpolationType::Linear,
                window: WindowFunction::Blackman,
            },
            RESAMPLER_CHUNK_SIZE,
            1,
        )?;

        let delay = resampler.output_delay();
        let required = signal.len() + delay;
        let mut output: Vec<f64> = Vec::with_capacity(required + RESAMPLER_CHUNK_SIZE);

        let mut offset = 0;
        while stretched.len() - offset >= resampler.input_frames_next() {
            let frames = resampler.input_frames_next();
            let wave_in: [&[f64]; 1] = [&stretched[offset..offset + frames]];
            let chunk = resampler.process(&wave_in[..], None)?;
            output.extend_from_slice(&chunk[0]);
            offset += frames;
        }
        if offset < stretched.len() {
            let wave_in: [&[f64]; 1] = [&stretched[offset..]];
            let chunk = resampler.process_partial(Some(&wave_in[..]), None)?;
            output.extend_from_slice(&chunk[0]);
        }
        while output.len() < required {
            let chunk = resampler.process_partial(None::<&[&[f64]]>, None)?;
            if chunk[0].is_empty() {
                break;
            }
            output.extend_from_slice(&chunk[0]);
        }

        output.drain(..delay.min(output.len()));
        output.resize(signal.len(), 0.0);
        debug!("shifted {} samples at {} Hz by {:.3} semitones", signal.len(), sample_rate, semitones);
        Ok(output.into_iter().map(|x| x as f32).collect())
    }
}
