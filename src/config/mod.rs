//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};

pub use defaults::{
    DEFAULT_BAR_WIDTH, DEFAULT_BUFFER_MS, DEFAULT_CAPTURE_SAMPLE_RATE, DEFAULT_REFRESH_MS,
};

/// CLI options for the sound meter. Validated before any device is touched.
#[derive(Debug, Parser, Clone)]
#[command(about = "Sound Meter: live microphone loudness in the terminal", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Capture sample rate requested from the device (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_CAPTURE_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Length of each measured capture window (milliseconds)
    #[arg(long = "buffer-ms", default_value_t = DEFAULT_BUFFER_MS)]
    pub buffer_ms: u64,

    /// How often the display picks up the latest reading (milliseconds)
    #[arg(long = "refresh-ms", default_value_t = DEFAULT_REFRESH_MS)]
    pub refresh_ms: u64,

    /// Width of the level bar in line output (characters)
    #[arg(long = "bar-width", default_value_t = DEFAULT_BAR_WIDTH)]
    pub bar_width: usize,

    /// How readings are displayed
    #[arg(long, value_enum, default_value_t = OutputMode::Tui)]
    pub output: OutputMode,

    /// Stop after this many seconds (runs until interrupted when unset)
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Refuse microphone access (exercises the permission-denied path)
    #[arg(long = "deny-microphone", default_value_t = false)]
    pub deny_microphone: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "SOUND_METER_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "SOUND_METER_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable per-window timing traces
    #[arg(long)]
    pub log_timings: bool,
}

/// Where readings go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Full-screen terminal meter
    Tui,
    /// One text line per refresh
    Line,
    /// One JSON object per refresh
    Json,
}

impl OutputMode {
    pub fn label(self) -> &'static str {
        match self {
            OutputMode::Tui => "tui",
            OutputMode::Line => "line",
            OutputMode::Json => "json",
        }
    }
}
