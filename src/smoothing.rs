//! Meter smoothing for the on-screen blow gauge

use crate::constants::smoothing;

/// Two-stage exponential smoother so the gauge eases instead of jumping.
///
/// Only the display uses it; blow classification works on the raw
/// per-tick intensity.
pub struct IntensityMeter {
    smoothed_value: f32,
    display_value: f32,
}

impl Default for IntensityMeter {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl IntensityMeter {
    /// Create a new meter initialized to the given value
    pub fn new(initial_value: f32) -> Self {
        Self {
            smoothed_value: initial_value,
            display_value: initial_value,
        }
    }

    /// Feed a raw intensity and return the value to display
    pub fn update(&mut self, raw_value: f32) -> f32 {
        let raw_value = raw_value.clamp(0.0, 1.0);

        let meter = smoothing::METER_SMOOTHING_FACTOR;
        self.smoothed_value = self.smoothed_value * (1.0 - meter) + raw_value * meter;

        let display = smoothing::DISPLAY_SMOOTHING_FACTOR;
        self.display_value = self.display_value * (1.0 - display) + self.smoothed_value * display;

        self.display_value
    }

    /// Get the current display value
    pub fn display(&self) -> f32 {
        self.display_value
    }

    /// Drop back to silence
    pub fn reset(&mut self) {
        self.smoothed_value = 0.0;
        self.display_value = 0.0;
    }
}
