//! Microphone capture and the spectrum source the detector pulls from

use crate::constants::audio;
use crate::error::{AppError, AppResult};
use crate::spectrum::SpectrumAnalyser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Audio configuration and device information
pub struct AudioConfig {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Outcome of asking for the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Granted { device: String },
    Denied(String),
}

/// Where frequency snapshots come from.
///
/// `start` is the only suspension point and must always resolve.
pub trait SpectrumSource {
    async fn start(&mut self) -> Acquisition;
    /// Latest 0-255 energy per bin, `None` while not capturing
    fn frequency_data(&mut self) -> Option<Vec<u8>>;
    fn stop(&mut self);
    /// False once stopped or once capture has died
    fn is_active(&self) -> bool;
}

/// Recent mono samples shared with the capture callback
pub type SampleWindow = Arc<Mutex<VecDeque<f32>>>;

/// Find and configure an audio input device
pub fn setup_audio_device(device_name: Option<String>) -> AppResult<(cpal::Device, AudioConfig)> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AppError::AudioDevice("Specified device not found".to_string()))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AppError::AudioDevice("No default input device available".to_string()))?
    };

    let device_name = device.name()?;

    // The callback takes f32; prefer a range that delivers it natively
    let ranges: Vec<_> = device.supported_input_configs()?.collect();
    let config_range = ranges
        .iter()
        .find(|r| r.sample_format() == cpal::SampleFormat::F32)
        .or_else(|| ranges.first())
        .ok_or_else(|| AppError::AudioDevice("No supported input configs found".to_string()))?;

    let sample_rate = if config_range.min_sample_rate().0 <= 44100 && config_range.max_sample_rate().0 >= 44100 {
        44100
    } else {
        config_range.min_sample_rate().0
    };

    let channels = if config_range.channels() >= audio::DEFAULT_CHANNELS {
        audio::DEFAULT_CHANNELS
    } else {
        config_range.channels()
    };

    let audio_config = AudioConfig {
        device_name,
        sample_rate,
        channels,
    };

    Ok((device, audio_config))
}

/// Build an audio input stream with the given callback
pub fn build_audio_stream<F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    data_callback: F,
) -> AppResult<cpal::Stream>
where
    F: FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static,
{
    let stream = device.build_input_stream(
        config,
        data_callback,
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Audio callback that mixes to mono and keeps the newest `FFT_SIZE` samples
pub fn create_audio_callback(
    samples: SampleWindow,
    channels: u16,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    let channels = channels.max(1) as usize;
    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let Ok(mut window) = samples.lock() else {
            return;
        };
        push_mono(&mut window, data, channels);
    }
}

fn push_mono(window: &mut VecDeque<f32>, data: &[f32], channels: usize) {
    for frame in data.chunks(channels) {
        window.push_back(frame.iter().sum::<f32>() / frame.len() as f32);
    }
    while window.len() > audio::FFT_SIZE {
        window.pop_front();
    }
}

/// Open the device and start streaming into `samples`
fn open_stream(device_name: Option<String>, samples: SampleWindow) -> AppResult<(cpal::Stream, String)> {
    let (device, audio_config) = setup_audio_device(device_name)?;

    let config = cpal::StreamConfig {
        channels: audio_config.channels,
        sample_rate: cpal::SampleRate(audio_config.sample_rate),
        buffer_size: audio::BUFFER_SIZE,
    };

    let callback = create_audio_callback(samples, audio_config.channels);
    let stream = build_audio_stream(&device, &config, callback)?;
    stream.play()?;

    Ok((stream, audio_config.device_name))
}

/// Owns the stream for its whole life; streams are not `Send` everywhere
fn run_capture(
    device_name: Option<String>,
    samples: SampleWindow,
    ready: oneshot::Sender<AppResult<String>>,
    stop: mpsc::Receiver<()>,
) {
    let (stream, name) = match open_stream(device_name, samples) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(name)).is_err() {
        // nobody is waiting any more (timed out)
        return;
    }

    // returns on an explicit stop or when the handle is dropped
    let _ = stop.recv();
    drop(stream);
}

struct CaptureHandle {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Microphone-backed spectrum source
pub struct MicrophoneSource {
    device_name: Option<String>,
    timeout: Duration,
    samples: SampleWindow,
    analyser: SpectrumAnalyser,
    capture: Option<CaptureHandle>,
}

impl MicrophoneSource {
    pub fn new(device_name: Option<String>, timeout: Duration) -> Self {
        Self {
            device_name,
            timeout,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(audio::FFT_SIZE))),
            analyser: SpectrumAnalyser::default(),
            capture: None,
        }
    }
}

impl SpectrumSource for MicrophoneSource {
    async fn start(&mut self) -> Acquisition {
        if self.capture.is_some() {
            return Acquisition::Granted {
                device: self.device_name.clone().unwrap_or_default(),
            };
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let samples = Arc::clone(&self.samples);
        let device_name = self.device_name.clone();

        let thread = thread::spawn(move || run_capture(device_name, samples, ready_tx, stop_rx));

        match tokio::time::timeout(self.timeout, ready_rx).await {
            Ok(Ok(Ok(device))) => {
                info!(device = %device, "microphone acquired");
                self.capture = Some(CaptureHandle { stop: stop_tx, thread });
                Acquisition::Granted { device }
            }
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "microphone unavailable");
                Acquisition::Denied(e.to_string())
            }
            Ok(Err(_)) => Acquisition::Denied("capture thread exited".to_string()),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "microphone request timed out");
                // dropping stop_tx lets a late-starting thread shut itself down
                Acquisition::Denied("timed out waiting for the microphone".to_string())
            }
        }
    }

    fn frequency_data(&mut self) -> Option<Vec<u8>> {
        self.capture.as_ref()?;

        let recent: Vec<f32> = match self.samples.lock() {
            Ok(window) => window.iter().copied().collect(),
            Err(_) => return None,
        };
        Some(self.analyser.analyse(&recent))
    }

    fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };

        let _ = capture.stop.send(());
        if capture.thread.join().is_err() {
            warn!("capture thread panicked");
        }
        if let Ok(mut window) = self.samples.lock() {
            window.clear();
        }
        self.analyser.reset();
        info!("microphone released");
    }

    fn is_active(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| !c.thread.is_finished())
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Names of every input device on the default host
pub fn input_device_names() -> AppResult<Vec<String>> {
    let host = cpal::default_host();
    Ok(host.input_devices()?.filter_map(|d| d.name().ok()).collect())
}
