use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::{Complex, Complex64};
use rustfft::num_traits::Zero;

use crate::stages::{AudioConsumer, FeatureVectorConsumer, Stage};

/// Splits the incoming samples into overlapping windowed frames and emits
/// the magnitude spectrum (`1 + frame_size / 2` bins) of each frame.
pub(crate) struct Fft<C: FeatureVectorConsumer> {
    consumer: C,
    frame_size: usize,
    frame_overlap: usize,

    fft_plan: Arc<dyn rustfft::Fft<f64>>,
    fft_buffer_complex: Box<[Complex64]>,
    fft_frame: Box<[f64]>,
    fft_scratch: Box<[Complex64]>,

    window: Box<[f64]>,
    ring_buf: VecDeque<f64>,
}

impl<C: FeatureVectorConsumer> Fft<C> {
    pub(crate) fn new(frame_size: usize, frame_overlap: usize, consumer: C) -> Self {
        assert!(frame_overlap < frame_size);
        let fft_plan = rustfft::FftPlanner::new().plan_fft_forward(frame_size);

        Self {
            consumer,
            frame_size,
            frame_overlap,
            fft_buffer_complex: vec![Complex64::zero(); frame_size].into_boxed_slice(),
            fft_scratch: vec![Complex::zero(); fft_plan.get_inplace_scratch_len()].into_boxed_slice(),
            fft_frame: vec![0.0; 1 + frame_size / 2].into_boxed_slice(),
            fft_plan,
            window: make_hann_window(frame_size),
            ring_buf: VecDeque::new(),
        }
    }

    pub(crate) fn into_consumer(self) -> C {
        self.consumer
    }
}

impl<C: FeatureVectorConsumer> Stage for Fft<C> {
    type Output = C::Output;

    fn output(&self) -> &Self::Output {
        self.consumer.output()
    }
}

impl<C: FeatureVectorConsumer> AudioConsumer<f64> for Fft<C> {
    fn consume(&mut self, data: &[f64]) {
        self.ring_buf.extend(data.iter().copied());

        while self.ring_buf.len() >= self.frame_size {
            let window = self.ring_buf.iter().copied().take(self.frame_size);

            for (i, (output, input)) in self.fft_buffer_complex.iter_mut().zip(window).enumerate() {
                output.re = input * self.window[i];
                output.im = 0.0;
            }

            self.fft_plan.process_with_scratch(&mut self.fft_buffer_complex, &mut self.fft_scratch);

            for (bin, value) in self.fft_frame.iter_mut().zip(self.fft_buffer_complex.iter()) {
                *bin = value.norm();
            }

            self.consumer.consume(&self.fft_frame);
            self.ring_buf.drain(..self.frame_size - self.frame_overlap);
        }
    }

    fn flush(&mut self) {
        // Trailing samples shorter than a frame are dropped; callers pad the
        // signal beforehand when they want the tail analysed.
        self.ring_buf.clear();
    }
}

/// Periodic Hann window.
fn make_hann_window(size: usize) -> Box<[f64]> {
    let mut window = Vec::with_capacity(size);
    for i in 0..size {
        window.push(0.5 - 0.5 * f64::cos(2.0 * std::f64::consts::PI * (i as f64) / (size as f64)));
    }
    window.into_boxed_slice()
}
