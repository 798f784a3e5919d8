//! Byte-scaled frequency analysis of captured audio

use crate::constants::{audio, smoothing};
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Turns a window of time-domain samples into 0-255 energy per frequency bin.
///
/// Magnitudes are smoothed across successive frames, converted to decibels
/// and mapped linearly from `MIN_DECIBELS..MAX_DECIBELS` onto the byte range.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    time_constant: f32,
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new(audio::FFT_SIZE, smoothing::SPECTRUM_TIME_CONSTANT)
    }
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize, time_constant: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            window: (0..fft_size).map(|i| blackman_window(i, fft_size)).collect(),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            time_constant: time_constant.clamp(0.0, 1.0),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Analyse the most recent samples. Shorter input is zero-padded at the
    /// front so the newest sample always sits at the end of the window.
    pub fn analyse(&mut self, samples: &[f32]) -> Vec<u8> {
        let size = self.fft_size();
        let recent = &samples[samples.len().saturating_sub(size)..];
        let pad = size - recent.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let scale = 1.0 / size as f32;
        let tau = self.time_constant;
        for (bin, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[bin].norm() * scale;
            *value = tau * *value + (1.0 - tau) * magnitude;
        }

        self.smoothed.iter().map(|&m| magnitude_to_byte(m)).collect()
    }

    /// Forget the smoothing history
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Map a linear magnitude onto the 0-255 decibel scale
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }

    let db = 20.0 * magnitude.log10();
    let range = audio::MAX_DECIBELS - audio::MIN_DECIBELS;
    let scaled = 255.0 * (db - audio::MIN_DECIBELS) / range;
    scaled.clamp(0.0, 255.0) as u8
}

/// Blackman window function
pub fn blackman_window(index: usize, size: usize) -> f32 {
    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let x = index as f32 / size as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}
