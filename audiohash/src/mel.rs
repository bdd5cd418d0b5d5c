use crate::stages::{FeatureVectorConsumer, Stage};

/// Folds a magnitude spectrum into triangular mel-spaced bands.
pub(crate) struct MelBands<C: FeatureVectorConsumer> {
    filters: Box<[BandFilter]>,
    features: Box<[f64]>,
    consumer: C,
}

struct BandFilter {
    first_bin: usize,
    weights: Box<[f64]>,
}

impl<C: FeatureVectorConsumer> MelBands<C> {
    pub(crate) fn new(num_bands: usize, min_freq: f64, max_freq: f64, frame_size: usize, sample_rate: u32, consumer: C) -> Self {
        Self {
            filters: prepare_filters(num_bands, min_freq, max_freq, frame_size, sample_rate),
            features: vec![0.0; num_bands].into_boxed_slice(),
            consumer,
        }
    }

    pub(crate) fn into_consumer(self) -> C {
        self.consumer
    }
}

fn prepare_filters(num_bands: usize, min_freq: f64, max_freq: f64, frame_size: usize, sample_rate: u32) -> Box<[BandFilter]> {
    let mel_min = hz_to_mel(min_freq);
    let mel_max = hz_to_mel(max_freq);
    let edges: Vec<f64> = (0..num_bands + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (num_bands + 1) as f64))
        .collect();

    let num_bins = 1 + frame_size / 2;
    let mut filters = Vec::with_capacity(num_bands);
    for band in 0..num_bands {
        let (lower, center, upper) = (edges[band], edges[band + 1], edges[band + 2]);
        let norm = 2.0 / (upper - lower);

        let mut first_bin = None;
        let mut weights = Vec::new();
        for bin in 0..num_bins {
            let freq = index_to_freq(bin, frame_size, sample_rate);
            let weight = if freq > lower && freq <= center {
                (freq - lower) / (center - lower)
            } else if freq > center && freq < upper {
                (upper - freq) / (upper - center)
            } else {
                0.0
            };

            if weight > 0.0 {
                first_bin.get_or_insert(bin);
                weights.push(weight * norm);
            } else if first_bin.is_some() {
                break;
            }
        }

        filters.push(BandFilter {
            first_bin: first_bin.unwrap_or(0),
            weights: weights.into_boxed_slice(),
        });
    }
    filters.into_boxed_slice()
}

fn index_to_freq(i: usize, frame_size: usize, sample_rate: u32) -> f64 {
    (i as f64) * sample_rate as f64 / frame_size as f64
}

fn hz_to_mel(freq: f64) -> f64 {
    2595.0 * f64::log10(1.0 + freq / 700.0)
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

impl<C: FeatureVectorConsumer> Stage for MelBands<C> {
    type Output = C::Output;

    fn output(&self) -> &Self::Output {
        self.consumer.output()
    }
}

impl<C: FeatureVectorConsumer> FeatureVectorConsumer for MelBands<C> {
    fn consume(&mut self, frame: &[f64]) {
        for (feature, filter) in self.features.iter_mut().zip(self.filters.iter()) {
            *feature = frame
                .iter()
                .skip(filter.first_bin)
                .zip(filter.weights.iter())
                .map(|(magnitude, weight)| magnitude * weight)
                .sum();
        }

        self.consumer.consume(&self.features);
    }
}
