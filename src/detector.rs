//! Blow detection from frequency-domain snapshots

use crate::constants::detection;

/// How hard a detected blow was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlowStrength {
    /// Enough to make the flames flicker
    Light,
    /// Puts out one candle
    Medium,
    /// Puts out up to two candles
    Strong,
}

/// Intensity bands used to classify a blow.
///
/// These are tuning values, not physics; `Default` yields the stock cake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlowBands {
    /// A tick must exceed this to count at all
    pub gate: f32,
    /// Above this a blow is medium
    pub medium: f32,
    /// Above this a blow is strong
    pub strong: f32,
}

impl Default for BlowBands {
    fn default() -> Self {
        Self {
            gate: detection::TRIGGER_GATE,
            medium: detection::MEDIUM_BAND,
            strong: detection::STRONG_BAND,
        }
    }
}

impl BlowBands {
    /// `None` when the intensity does not clear the gate (NaN never does)
    pub fn classify(&self, intensity: f32) -> Option<BlowStrength> {
        if intensity.is_nan() || intensity <= self.gate {
            None
        } else if intensity > self.strong {
            Some(BlowStrength::Strong)
        } else if intensity > self.medium {
            Some(BlowStrength::Medium)
        } else {
            Some(BlowStrength::Light)
        }
    }
}

/// A classified blow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blow {
    pub intensity: f32,
    pub strength: BlowStrength,
}

/// Converts spectrum snapshots into blow events while active
pub struct BlowDetector {
    threshold: f32,
    bands: BlowBands,
    active: bool,
    last_intensity: f32,
}

impl Default for BlowDetector {
    fn default() -> Self {
        Self::new(detection::DEFAULT_THRESHOLD, BlowBands::default())
    }
}

impl BlowDetector {
    pub fn new(threshold: f32, bands: BlowBands) -> Self {
        Self {
            threshold: clamp_threshold(threshold),
            bands,
            active: false,
            last_intensity: 0.0,
        }
    }

    /// Enter the active state. Callers only do this after the audio source
    /// was acquired.
    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.last_intensity = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Adjust the noise floor; values outside 0-255 are clamped
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = clamp_threshold(threshold);
    }

    pub fn bands(&self) -> BlowBands {
        self.bands
    }

    pub fn last_intensity(&self) -> f32 {
        self.last_intensity
    }

    /// Normalized blow intensity of one snapshot, in [0, 1]
    pub fn intensity(&self, frequency_data: Option<&[u8]>) -> f32 {
        let Some(data) = frequency_data else {
            return 0.0;
        };

        let average = low_band_average(data);
        let range = detection::MAX_ENERGY - self.threshold;
        if range <= 0.0 {
            // threshold at the ceiling: nothing can exceed it
            return 0.0;
        }

        ((average - self.threshold) / range).clamp(0.0, 1.0)
    }

    /// Process one sampling tick
    pub fn tick(&mut self, frequency_data: Option<&[u8]>) -> Option<Blow> {
        if !self.active {
            return None;
        }

        let intensity = self.intensity(frequency_data);
        self.last_intensity = intensity;

        self.bands
            .classify(intensity)
            .map(|strength| Blow { intensity, strength })
    }
}

/// Mean energy over the lowest portion of the spectrum
pub fn low_band_average(data: &[u8]) -> f32 {
    let end = (data.len() as f32 * detection::LOW_FREQUENCY_RATIO).floor() as usize;
    if end == 0 {
        return 0.0;
    }

    let sum: u32 = data[..end].iter().map(|&v| v as u32).sum();
    sum as f32 / end as f32
}

/// Keep a noise floor inside the 0-255 energy scale
pub fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        return detection::DEFAULT_THRESHOLD;
    }
    threshold.clamp(0.0, detection::MAX_ENERGY)
}

/// Summary of a calibration run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub peak: f32,
    pub average: f32,
    pub suggested_threshold: f32,
}

/// Collects ambient low-band energy while nobody is blowing
#[derive(Debug, Default)]
pub struct CalibrationTracker {
    peak: f32,
    sum: f64,
    samples: u64,
}

impl CalibrationTracker {
    pub fn record(&mut self, frequency_data: &[u8]) {
        let level = low_band_average(frequency_data);
        self.peak = self.peak.max(level);
        self.sum += level as f64;
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// The suggestion sits a margin above the loudest ambient tick
    pub fn finish(&self) -> Calibration {
        let average = if self.samples > 0 {
            (self.sum / self.samples as f64) as f32
        } else {
            0.0
        };
        Calibration {
            peak: self.peak,
            average,
            suggested_threshold: clamp_threshold(self.peak + detection::CALIBRATION_MARGIN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 128 bins with the low 38 set to `low` and the rest to `high`
    fn spectrum(low: u8, high: u8) -> Vec<u8> {
        (0..128).map(|i| if i < 38 { low } else { high }).collect()
    }

    #[test]
    fn test_only_low_band_counts() {
        let detector = BlowDetector::default();
        assert_eq!(detector.intensity(Some(&spectrum(0, 255))), 0.0);
        assert_eq!(detector.intensity(Some(&spectrum(255, 0))), 1.0);
    }

    #[test]
    fn test_intensity_normalizes_against_remaining_range() {
        let detector = BlowDetector::default();
        // (152.5 - 50) / 205 = 0.5
        let data: Vec<u8> = (0..128)
            .map(|i| if i < 38 { if i % 2 == 0 { 152 } else { 153 } } else { 0 })
            .collect();
        assert!((detector.intensity(Some(&data)) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_below_threshold_is_zero() {
        let detector = BlowDetector::default();
        assert_eq!(detector.intensity(Some(&spectrum(40, 40))), 0.0);
    }

    #[test]
    fn test_missing_data_is_idle() {
        let mut detector = BlowDetector::default();
        detector.start();
        assert_eq!(detector.intensity(None), 0.0);
        assert_eq!(detector.tick(None), None);
        assert_eq!(detector.last_intensity(), 0.0);
    }

    #[test]
    fn test_inactive_detector_never_fires() {
        let mut detector = BlowDetector::default();
        assert!(!detector.is_active());
        assert_eq!(detector.tick(Some(&spectrum(255, 255))), None);

        detector.start();
        assert!(detector.tick(Some(&spectrum(255, 255))).is_some());

        detector.stop();
        assert_eq!(detector.tick(Some(&spectrum(255, 255))), None);
    }

    #[test]
    fn test_threshold_is_clamped() {
        let mut detector = BlowDetector::default();
        detector.set_threshold(-20.0);
        assert_eq!(detector.threshold(), 0.0);
        detector.set_threshold(400.0);
        assert_eq!(detector.threshold(), 255.0);
        assert_eq!(detector.intensity(Some(&spectrum(255, 255))), 0.0);
        detector.set_threshold(f32::NAN);
        assert_eq!(detector.threshold(), detection::DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_classification_bands() {
        let bands = BlowBands::default();
        assert_eq!(bands.classify(0.2), None);
        assert_eq!(bands.classify(0.3), None);
        assert_eq!(bands.classify(0.35), Some(BlowStrength::Light));
        assert_eq!(bands.classify(0.4), Some(BlowStrength::Light));
        assert_eq!(bands.classify(0.5), Some(BlowStrength::Medium));
        assert_eq!(bands.classify(0.7), Some(BlowStrength::Medium));
        assert_eq!(bands.classify(0.75), Some(BlowStrength::Strong));
        assert_eq!(bands.classify(f32::NAN), None);
    }

    #[test]
    fn test_tick_reports_classified_blow() {
        let mut detector = BlowDetector::default();
        detector.start();

        let blow = detector.tick(Some(&spectrum(255, 0))).unwrap();
        assert_eq!(blow.strength, BlowStrength::Strong);
        assert_eq!(blow.intensity, 1.0);
        assert_eq!(detector.last_intensity(), 1.0);
    }

    #[test]
    fn test_calibration_suggests_threshold_above_peak() {
        let mut tracker = CalibrationTracker::default();
        tracker.record(&spectrum(20, 0));
        tracker.record(&spectrum(40, 0));
        assert_eq!(tracker.samples(), 2);

        let calibration = tracker.finish();
        assert_eq!(calibration.peak, 40.0);
        assert_eq!(calibration.average, 30.0);
        assert_eq!(calibration.suggested_threshold, 50.0);

        let mut loud = CalibrationTracker::default();
        loud.record(&spectrum(255, 255));
        assert_eq!(loud.finish().suggested_threshold, 255.0);
        assert_eq!(CalibrationTracker::default().finish().average, 0.0);
    }

    #[test]
    fn test_empty_buffer_averages_to_zero() {
        assert_eq!(low_band_average(&[]), 0.0);
        assert_eq!(low_band_average(&[200, 200, 200]), 0.0);
    }
}
