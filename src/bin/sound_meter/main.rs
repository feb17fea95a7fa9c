//! `sound-meter` entrypoint: capture thread feeding a display on the main thread.
//!
//! - Capture thread: blocking reads from the microphone, one reading per window
//! - Main thread: polls the latest reading every refresh tick and redraws

use anyhow::{anyhow, Result};
use sound_meter::audio::{CaptureOpener, Recorder, PERMISSION_DENIED_TEXT};
use sound_meter::config::{AppConfig, OutputMode};
use sound_meter::display::{show_reading, DisplaySink, JsonSink, LineSink};
use sound_meter::permission::StaticPermission;
use sound_meter::telemetry::init_tracing;
use sound_meter::ui::{install_panic_hook, poll_quit, TuiSink};
use sound_meter::{init_logging, log_debug, MeterError, MeterSession};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug(&format!(
        "sound-meter v{} starting (output={})",
        env!("CARGO_PKG_VERSION"),
        config.output.label()
    ));

    if config.list_input_devices {
        list_input_devices();
        return Ok(());
    }

    let interactive = config.output == OutputMode::Tui;
    let mut sink: Box<dyn DisplaySink> = match config.output {
        OutputMode::Tui => Box::new(TuiSink::new()?),
        OutputMode::Line => Box::new(LineSink::new(io::stdout(), config.bar_width)),
        OutputMode::Json => Box::new(JsonSink::new(io::stdout())),
    };
    show_reading(sink.as_mut(), None)?;

    let session = match start_session(&config) {
        Ok(session) => session,
        Err(err) => {
            let message = match &err {
                MeterError::PermissionDenied => PERMISSION_DENIED_TEXT.to_string(),
                other => format!("Sound meter unavailable: {other}"),
            };
            sink.notify(&message)?;
            if interactive {
                while !poll_quit(config.refresh_interval())? {}
            }
            drop(sink);
            return Err(anyhow!(err));
        }
    };

    let result = run_meter(&config, &session, sink.as_mut(), interactive);
    let stats = session.stop();
    log_debug(&format!(
        "session ended: measured={} empty={}",
        stats.buffers_measured, stats.empty_reads
    ));
    result?;

    if let Some(err) = stats.read_error {
        sink.notify(&format!("Audio capture stopped: {err}"))?;
        if interactive {
            while !poll_quit(config.refresh_interval())? {}
        }
        drop(sink);
        return Err(anyhow!(err));
    }
    Ok(())
}

fn start_session(config: &AppConfig) -> Result<MeterSession, MeterError> {
    let gate = if config.deny_microphone {
        StaticPermission::denied()
    } else {
        StaticPermission::granted()
    };
    if config.deny_microphone {
        return MeterSession::start(&gate, &NoDevice, config.capture_format());
    }
    let recorder = Recorder::new(config.input_device.as_deref())
        .map_err(|err| MeterError::CaptureInit(format!("{err:#}")))?;
    log_debug(&format!("using input device: {}", recorder.device_name()));
    MeterSession::start(&gate, &recorder, config.capture_format())
}

/// Stand-in opener when the gate refuses access before any device is touched.
struct NoDevice;

impl CaptureOpener for NoDevice {
    fn open(
        &self,
        _format: &sound_meter::audio::CaptureFormat,
    ) -> Result<Box<dyn sound_meter::audio::CaptureSource>, MeterError> {
        Err(MeterError::CaptureInit("no input device selected".to_string()))
    }
}

fn run_meter(
    config: &AppConfig,
    session: &MeterSession,
    sink: &mut dyn DisplaySink,
    interactive: bool,
) -> Result<()> {
    let readings = session.readings();
    let deadline = config
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let interval = config.refresh_interval();
    let mut shown_generation = 0u64;

    loop {
        let generation = readings.generation();
        if generation != shown_generation {
            show_reading(sink, readings.latest())?;
            shown_generation = generation;
        }
        if !session.is_running() {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if interactive {
            if poll_quit(interval)? {
                break;
            }
        } else {
            thread::sleep(interval);
        }
    }
    Ok(())
}

fn list_input_devices() {
    match Recorder::list_devices() {
        Ok(devices) if devices.is_empty() => println!("No audio input devices detected."),
        Ok(devices) => {
            println!("Detected audio input devices:");
            for device in devices {
                println!("  - {device}");
            }
        }
        Err(err) => eprintln!("Failed to list audio input devices: {err:#}"),
    }
}
