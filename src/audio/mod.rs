//! Microphone capture and loudness estimation.
//!
//! Audio is captured via CPAL, downmixed to mono 16-bit PCM, and cut into
//! fixed windows. Each window is reduced to one decibel reading.

/// Default capture rate requested from the device.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

mod capture;
mod dispatch;
mod meter;
mod recorder;

pub use capture::{CaptureFormat, CaptureOpener, CaptureSource, PcmOpener, PcmProbe, PcmSource};
pub use meter::{
    db_to_progress, estimate_db, format_db, over_threshold, Reading, ReadingSlot,
    FULL_SCALE_DB, PERMISSION_DENIED_TEXT, SILENCE_FLOOR_DB, THRESHOLD_DB, WAITING_TEXT,
    WARNING_TEXT,
};
pub use recorder::Recorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit PCM.
    I16,
}
