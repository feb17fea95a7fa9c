//! System microphone capture via CPAL.
//!
//! Handles device enumeration and format conversion. Whatever the device
//! delivers is downmixed to mono 16-bit PCM and cut into fixed-size windows.

use super::capture::{CaptureFormat, CaptureOpener, CaptureSource};
use super::dispatch::{f32_to_pcm, i16_to_pcm, u16_to_pcm, FrameDispatcher};
use crate::error::MeterError;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Windows buffered between the audio callback and the reader.
const FRAME_CHANNEL_CAPACITY: usize = 8;

const INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
    preferred_device: Option<String>,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Create a recorder, optionally forcing a specific device so users can pick
    /// the right microphone when a laptop exposes multiple inputs.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let device = find_device(preferred_device)?;
        Ok(Self {
            device,
            preferred_device: preferred_device.map(str::to_string),
        })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }
}

impl CaptureOpener for Recorder {
    /// Build the input stream on a dedicated thread (CPAL streams must stay on
    /// the thread that created them) and wait for it to report readiness.
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn CaptureSource>, MeterError> {
        if format.buffer_samples == 0 {
            return Err(MeterError::CaptureInit(
                "unable to get the right buffer size".to_string(),
            ));
        }
        let (frame_tx, frame_rx) = bounded::<Vec<i16>>(FRAME_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = unbounded::<StreamCommand>();
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let dropped = Arc::new(AtomicUsize::new(0));

        let preferred = self.preferred_device.clone();
        let requested = *format;
        let overflow = frame_rx.clone();
        let dropped_for_stream = dropped.clone();
        let worker = thread::Builder::new()
            .name("sound-meter-stream".to_string())
            .spawn(move || {
                run_stream(
                    preferred.as_deref(),
                    &requested,
                    frame_tx,
                    overflow,
                    dropped_for_stream,
                    command_rx,
                    ready_tx,
                )
            })
            .map_err(|err| {
                MeterError::CaptureInit(format!("failed to spawn stream thread: {err}"))
            })?;

        match ready_rx.recv_timeout(INIT_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = worker.join();
                return Err(MeterError::CaptureInit(format!(
                    "{reason}. {}",
                    mic_permission_hint()
                )));
            }
            Err(_) => {
                let _ = command_tx.send(StreamCommand::Stop);
                return Err(MeterError::CaptureInit(
                    "timed out waiting for the audio device".to_string(),
                ));
            }
        }

        let read_timeout = Duration::from_millis(
            ((format.buffer_samples as u64 * 1000) / u64::from(format.sample_rate.max(1)))
                .saturating_mul(4)
                .clamp(50, 2_000),
        );
        Ok(Box::new(CpalSource {
            commands: command_tx,
            reader: WindowReader::new(frame_rx, read_timeout),
            dropped,
            worker: Some(worker),
        }))
    }
}

fn find_device(preferred_device: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match preferred_device {
        Some(name) => {
            let mut devices = host.input_devices().context("no input devices available")?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device '{name}' not found"))
        }
        None => host
            .default_input_device()
            .context("no default input device available"),
    }
}

/// Prefer a config that already matches the requested rate, 16-bit samples,
/// and the fewest channels; fall back to the device default.
fn choose_config(device: &cpal::Device, format: &CaptureFormat) -> Result<SupportedStreamConfig> {
    let wanted = SampleRate(format.sample_rate);
    let mut best: Option<SupportedStreamConfig> = None;
    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if range.min_sample_rate() > wanted || range.max_sample_rate() < wanted {
                continue;
            }
            if !matches!(
                range.sample_format(),
                SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16
            ) {
                continue;
            }
            let candidate = range.with_sample_rate(wanted);
            let better = match &best {
                None => true,
                Some(current) => config_rank(&candidate) < config_rank(current),
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    match best {
        Some(config) => Ok(config),
        None => device
            .default_input_config()
            .context("no usable input configuration"),
    }
}

fn config_rank(config: &SupportedStreamConfig) -> (u8, u16) {
    let format_rank = match config.sample_format() {
        SampleFormat::I16 => 0,
        SampleFormat::F32 => 1,
        _ => 2,
    };
    (format_rank, config.channels())
}

enum StreamCommand {
    Play,
    Stop,
}

fn run_stream(
    preferred_device: Option<&str>,
    format: &CaptureFormat,
    frames: Sender<Vec<i16>>,
    overflow: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    commands: Receiver<StreamCommand>,
    ready: Sender<Result<(), String>>,
) {
    let stream = match build_stream(preferred_device, format, frames, overflow, dropped) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(err) => {
            log_debug(&format!("audio capture init failed: {err:#}"));
            let _ = ready.send(Err(format!("{err:#}")));
            return;
        }
    };

    for command in commands.iter() {
        match command {
            StreamCommand::Play => {
                if let Err(err) = stream.play() {
                    log_debug(&format!("failed to start audio stream: {err}"));
                }
            }
            StreamCommand::Stop => break,
        }
    }

    if let Err(err) = stream.pause() {
        log_debug(&format!("failed to pause audio stream: {err}"));
    }
    drop(stream);
}

fn build_stream(
    preferred_device: Option<&str>,
    format: &CaptureFormat,
    frames: Sender<Vec<i16>>,
    overflow: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    let device = find_device(preferred_device)?;
    let supported = choose_config(&device, format)?;
    let sample_format = supported.sample_format();
    let device_config: StreamConfig = supported.into();
    let device_sample_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));

    // One frame per read; the reader never returns a partial window.
    let frame_samples = format.buffer_samples.max(1);

    log_debug(&format!(
        "Recorder config: format={sample_format:?} sample_rate={device_sample_rate}Hz channels={channels} window={frame_samples}"
    ));
    tracing::info!(
        target: "sound_meter::capture",
        sample_format = ?sample_format,
        sample_rate = device_sample_rate,
        channels,
        frame_samples,
        "input stream configured"
    );

    let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
        frame_samples,
        frames,
        overflow,
        dropped.clone(),
    )));
    let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &device_config,
            move |data: &[i16], _| {
                if let Ok(mut pump) = dispatcher.try_lock() {
                    pump.push(data, channels, i16_to_pcm);
                } else {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            &device_config,
            move |data: &[f32], _| {
                if let Ok(mut pump) = dispatcher.try_lock() {
                    pump.push(data, channels, f32_to_pcm);
                } else {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &device_config,
            move |data: &[u16], _| {
                if let Ok(mut pump) = dispatcher.try_lock() {
                    pump.push(data, channels, u16_to_pcm);
                } else {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )?,
        other => return Err(anyhow!("unsupported sample format: {other:?}")),
    };
    Ok(stream)
}

/// Reassembles callback frames into reads that always fill the caller's buffer.
struct WindowReader {
    frames: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    timeout: Duration,
}

impl WindowReader {
    fn new(frames: Receiver<Vec<i16>>, timeout: Duration) -> Self {
        Self {
            frames,
            pending: Vec::new(),
            timeout,
        }
    }

    /// Returns `buf.len()` once enough samples are queued, or `0` when the
    /// device stays quiet past the timeout. Partial windows are kept for the
    /// next call.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, MeterError> {
        while self.pending.len() < buf.len() {
            match self.frames.recv_timeout(self.timeout) {
                Ok(frame) => self.pending.extend_from_slice(&frame),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(MeterError::CaptureRead(
                        "audio stream disconnected".to_string(),
                    ))
                }
            }
        }
        let count = buf.len();
        buf.copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        Ok(count)
    }
}

/// Capture handle backed by a CPAL stream living on its own thread.
struct CpalSource {
    commands: Sender<StreamCommand>,
    reader: WindowReader,
    dropped: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureSource for CpalSource {
    fn start(&mut self) -> Result<(), MeterError> {
        self.commands
            .send(StreamCommand::Play)
            .map_err(|_| MeterError::CaptureInit("audio stream thread exited".to_string()))
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, MeterError> {
        self.reader.read(buf)
    }

    fn stop(&mut self) -> Result<(), MeterError> {
        let _ = self.commands.send(StreamCommand::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log_debug("audio stream thread panicked");
            }
        }
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            log_debug(&format!("audio capture dropped {dropped} windows"));
        }
        Ok(())
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
