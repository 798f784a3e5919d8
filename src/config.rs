//! Configuration parsing and validation

use crate::constants::{audio, candles, detection};
use crate::detector::{BlowBands, clamp_threshold};
use crate::error::{AppError, AppResult};
use crate::wishes::FileStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for the makeawish application
#[derive(Parser)]
#[command(name = "makeawish")]
#[command(about = "Blow out the candles on a terminal birthday cake")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Write logs to this file (the cake screen otherwise discards them)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Light the cake and blow out the candles
    Blow(BlowArgs),
    /// List available audio input devices
    List(ListArgs),
    /// Measure room noise and suggest a threshold
    Calibrate(CalibrateArgs),
    /// Show or replace the stored wishes
    Wishes(WishesArgs),
}

#[derive(Parser)]
pub struct BlowArgs {
    /// Number of candles on the cake (1-10)
    #[arg(long, default_value_t = candles::DEFAULT_COUNT)]
    pub candles: usize,

    /// Noise floor on the 0-255 energy scale; out-of-range values are clamped
    #[arg(long, default_value_t = detection::DEFAULT_THRESHOLD, allow_negative_numbers = true)]
    pub threshold: f32,

    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    /// Skip the microphone and tap candles instead
    #[arg(long)]
    pub no_mic: bool,

    /// Key-value store the wishes are handed over through
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// How long to wait for the microphone before falling back to taps
    #[arg(long, default_value_t = audio::PERMISSION_TIMEOUT_MS)]
    pub permission_timeout_ms: u64,
}

#[derive(Parser)]
pub struct CalibrateArgs {
    /// Listening duration in seconds
    #[arg(long, default_value_t = 3.0)]
    pub seconds: f32,

    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    /// Output only the suggested threshold
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Parser)]
pub struct WishesArgs {
    /// Key-value store to read from or write to
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// JSON file with an array of {text, image?, headerImage?} to store
    #[arg(long)]
    pub import: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ListArgs {}

/// Application configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct Config {
    pub candle_count: usize,
    pub threshold: f32,
    pub bands: BlowBands,
    pub device_name: Option<String>,
    pub no_mic: bool,
    pub store_path: PathBuf,
    pub permission_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            candle_count: candles::DEFAULT_COUNT,
            threshold: detection::DEFAULT_THRESHOLD,
            bands: BlowBands::default(),
            device_name: None,
            no_mic: false,
            store_path: FileStore::default_path(),
            permission_timeout: Duration::from_millis(audio::PERMISSION_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Create configuration from blow arguments
    pub fn from_blow_args(blow_args: BlowArgs) -> AppResult<Self> {
        if blow_args.candles < candles::MIN_COUNT || blow_args.candles > candles::MAX_COUNT {
            return Err(AppError::Config(format!(
                "Candles must be between {} and {}, got {}",
                candles::MIN_COUNT,
                candles::MAX_COUNT,
                blow_args.candles
            )));
        }

        if blow_args.permission_timeout_ms == 0 {
            return Err(AppError::Config("Permission timeout must be positive".to_string()));
        }

        Ok(Config {
            candle_count: blow_args.candles,
            threshold: clamp_threshold(blow_args.threshold),
            bands: BlowBands::default(),
            device_name: blow_args.device,
            no_mic: blow_args.no_mic,
            store_path: blow_args.store.unwrap_or_else(FileStore::default_path),
            permission_timeout: Duration::from_millis(blow_args.permission_timeout_ms),
        })
    }

    /// Create configuration from calibrate arguments
    pub fn from_calibrate_args(calibrate_args: &CalibrateArgs) -> AppResult<Self> {
        let seconds = calibrate_args.seconds;
        if !(seconds > 0.0 && seconds <= detection::MAX_CALIBRATION_SECONDS) {
            return Err(AppError::Config(format!(
                "Seconds must be between 0 and {}, got {}",
                detection::MAX_CALIBRATION_SECONDS,
                seconds
            )));
        }

        Ok(Config {
            device_name: calibrate_args.device.clone(),
            ..Config::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    fn blow_args(argv: &[&str]) -> BlowArgs {
        match parse(argv).command {
            Commands::Blow(args) => args,
            _ => panic!("expected the blow subcommand"),
        }
    }

    #[test]
    fn test_blow_defaults() {
        let config = Config::from_blow_args(blow_args(&["makeawish", "blow"])).unwrap();
        assert_eq!(config.candle_count, 7);
        assert_eq!(config.threshold, 50.0);
        assert!(!config.no_mic);
        assert_eq!(config.bands, BlowBands::default());
        assert_eq!(config.permission_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_candle_count_is_validated() {
        let args = blow_args(&["makeawish", "blow", "--candles", "0"]);
        assert!(Config::from_blow_args(args).is_err());

        let args = blow_args(&["makeawish", "blow", "--candles", "11"]);
        assert!(Config::from_blow_args(args).is_err());

        let args = blow_args(&["makeawish", "blow", "--candles", "10"]);
        assert_eq!(Config::from_blow_args(args).unwrap().candle_count, 10);
    }

    #[test]
    fn test_threshold_is_clamped_not_rejected() {
        let args = blow_args(&["makeawish", "blow", "--threshold", "300"]);
        assert_eq!(Config::from_blow_args(args).unwrap().threshold, 255.0);

        let args = blow_args(&["makeawish", "blow", "--threshold", "-4"]);
        assert_eq!(Config::from_blow_args(args).unwrap().threshold, 0.0);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let args = blow_args(&["makeawish", "blow", "--permission-timeout-ms", "0"]);
        let err = Config::from_blow_args(args).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Permission timeout must be positive"
        );
    }

    #[test]
    fn test_store_and_log_file_paths() {
        let args = parse(&[
            "makeawish",
            "blow",
            "--store",
            "/tmp/cake.json",
            "--log-file",
            "/tmp/cake.log",
        ]);
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/cake.log")));
        let Commands::Blow(blow) = args.command else {
            panic!("expected the blow subcommand");
        };
        let config = Config::from_blow_args(blow).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/cake.json"));
    }

    #[test]
    fn test_calibrate_requires_positive_seconds() {
        let Commands::Calibrate(args) = parse(&["makeawish", "calibrate", "--seconds", "0"]).command
        else {
            panic!("expected the calibrate subcommand");
        };
        assert!(Config::from_calibrate_args(&args).is_err());

        for seconds in ["1e30", "601", "NaN"] {
            let Commands::Calibrate(args) =
                parse(&["makeawish", "calibrate", "--seconds", seconds]).command
            else {
                panic!("expected the calibrate subcommand");
            };
            assert!(matches!(
                Config::from_calibrate_args(&args),
                Err(AppError::Config(_))
            ));
        }

        let Commands::Calibrate(args) =
            parse(&["makeawish", "calibrate", "--device", "USB Mic"]).command
        else {
            panic!("expected the calibrate subcommand");
        };
        let config = Config::from_calibrate_args(&args).unwrap();
        assert_eq!(config.device_name.as_deref(), Some("USB Mic"));
    }
}
