//! Application constants and configuration values

/// Audio capture and frequency analysis constants
pub mod audio {
    /// Preferred capture channel count
    pub const DEFAULT_CHANNELS: u16 = 1;
    /// Buffer size for audio streams
    pub const BUFFER_SIZE: cpal::BufferSize = cpal::BufferSize::Default;
    /// Samples per analysis window
    pub const FFT_SIZE: usize = 256;
    /// Number of frequency bins reported per window
    pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;
    /// Lower end of the byte-scaled decibel range
    pub const MIN_DECIBELS: f32 = -100.0;
    /// Upper end of the byte-scaled decibel range
    pub const MAX_DECIBELS: f32 = -30.0;
    /// How long to wait for the microphone before giving up
    pub const PERMISSION_TIMEOUT_MS: u64 = 5000;
}

/// Blow detection policy
pub mod detection {
    /// Default noise floor on the 0-255 energy scale
    pub const DEFAULT_THRESHOLD: f32 = 50.0;
    /// Highest energy value a frequency bin can report
    pub const MAX_ENERGY: f32 = 255.0;
    /// Fraction of the spectrum (from the bottom) where breath noise lives
    pub const LOW_FREQUENCY_RATIO: f32 = 0.3;
    /// Intensity a tick must exceed to count as a blow
    pub const TRIGGER_GATE: f32 = 0.3;
    /// Intensity above which a blow is at least medium
    pub const MEDIUM_BAND: f32 = 0.4;
    /// Intensity above which a blow is strong
    pub const STRONG_BAND: f32 = 0.7;
    /// Candles put out by one strong blow
    pub const STRONG_BLOW_CANDLES: usize = 2;
    /// Threshold change per key press
    pub const THRESHOLD_STEP: f32 = 5.0;
    /// Headroom added to the calibrated ambient peak
    pub const CALIBRATION_MARGIN: f32 = 10.0;
    /// Longest calibration run accepted
    pub const MAX_CALIBRATION_SECONDS: f32 = 600.0;
}

/// Cake layout
pub mod candles {
    /// Candles on a fresh cake
    pub const DEFAULT_COUNT: usize = 7;
    /// Fewest candles a cake may carry
    pub const MIN_COUNT: usize = 1;
    /// Most candles a cake may carry
    pub const MAX_COUNT: usize = 10;
}

/// UI display constants
pub mod ui {
    /// Frame interval in milliseconds (one animation frame)
    pub const UPDATE_INTERVAL_MS: u64 = 16;
    /// Bar width calculation accounts for borders
    pub const BAR_BORDER_WIDTH: usize = 2;
    /// Time between the last candle going out and the slideshow
    pub const CELEBRATION_DELAY_MS: u64 = 2000;
    /// How long a flicker takes to settle
    pub const FLICKER_DECAY_MS: u64 = 1000;
    /// Columns reserved for each candle
    pub const CANDLE_WIDTH: u16 = 6;
}

/// Smoothing algorithm constants
pub mod smoothing {
    /// Analyser smoothing across frames (0 = none, closer to 1 = slower)
    pub const SPECTRUM_TIME_CONSTANT: f32 = 0.8;
    /// First stage meter smoothing factor (higher = more responsive)
    pub const METER_SMOOTHING_FACTOR: f32 = 0.4;
    /// Second stage display smoothing factor (lower = smoother)
    pub const DISPLAY_SMOOTHING_FACTOR: f32 = 0.15;
}

/// Local wish storage
pub mod storage {
    /// Key the wish list is stored under
    pub const WISHES_KEY: &str = "birthdayWishes";
    /// File name of the key-value store inside the temp directory
    pub const DEFAULT_STORE_FILE: &str = "makeawish-storage.json";
    /// Image given to the first wish when none carries one
    pub const DEFAULT_IMAGE: &str = "img/IMG_1434.HEIC";
}
