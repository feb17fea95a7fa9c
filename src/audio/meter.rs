use crate::error::MeterError;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Decibel value reported for an all-zero window.
pub const SILENCE_FLOOR_DB: f32 = 0.0;

/// Top of the displayed dynamic range; readings at or above it fill the bar.
pub const FULL_SCALE_DB: f32 = 120.0;

/// Readings strictly above this level raise the warning.
pub const THRESHOLD_DB: f32 = 50.0;

// One quantisation step of 16-bit PCM; 20 * log10(1.0) == SILENCE_FLOOR_DB.
const RMS_FLOOR: f64 = 1.0;

pub const WAITING_TEXT: &str = "Waiting...";
pub const WARNING_TEXT: &str = "The noise level exceeds the threshold";
pub const PERMISSION_DENIED_TEXT: &str = "Recording permission is denied to use this feature";

/// Estimate the loudness of the first `read_size` samples in decibels relative
/// to one PCM step.
///
/// Fails with [`MeterError::InvalidSampleCount`] when `read_size` is zero or
/// larger than the buffer. Silent windows return [`SILENCE_FLOOR_DB`].
pub fn estimate_db(samples: &[i16], read_size: usize) -> Result<f32, MeterError> {
    if read_size == 0 || read_size > samples.len() {
        return Err(MeterError::InvalidSampleCount {
            read_size,
            capacity: samples.len(),
        });
    }
    let sum: f64 = samples[..read_size]
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum();
    let mean_square = sum / read_size as f64;
    let rms = mean_square.sqrt().max(RMS_FLOOR);
    Ok((20.0 * rms.log10()) as f32)
}

/// Map a decibel reading onto the `[0, 1]` progress range.
pub fn db_to_progress(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    (db / FULL_SCALE_DB).clamp(0.0, 1.0)
}

pub fn over_threshold(db: f32) -> bool {
    db > THRESHOLD_DB
}

/// Render a reading the way the meter label shows it, e.g. `60.0 dB`.
pub fn format_db(db: f32) -> String {
    format!("{db:.1} dB")
}

/// One estimator result with everything the display needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub db: f32,
    pub progress: f32,
    pub over_threshold: bool,
}

impl Reading {
    pub fn from_db(db: f32) -> Self {
        let db = if db.is_finite() { db } else { SILENCE_FLOOR_DB };
        Self {
            db,
            progress: db_to_progress(db),
            over_threshold: over_threshold(db),
        }
    }

    pub fn text(&self) -> String {
        format_db(self.db)
    }
}

/// Latest-value cell shared between the capture thread and the UI.
///
/// Publishing overwrites the previous value; readers only ever see the most
/// recent reading. The generation counter starts at zero and increments once
/// per publish.
#[derive(Clone, Debug)]
pub struct ReadingSlot {
    inner: Arc<SlotInner>,
}

#[derive(Debug)]
struct SlotInner {
    db_bits: AtomicU32,
    generation: AtomicU64,
}

impl ReadingSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                db_bits: AtomicU32::new(SILENCE_FLOOR_DB.to_bits()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn publish(&self, db: f32) {
        let db = if db.is_finite() { db } else { SILENCE_FLOOR_DB };
        self.inner.db_bits.store(db.to_bits(), Ordering::Relaxed);
        self.inner.generation.fetch_add(1, Ordering::Release);
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// `None` until the first publish.
    pub fn latest(&self) -> Option<Reading> {
        if self.generation() == 0 {
            return None;
        }
        let db = f32::from_bits(self.inner.db_bits.load(Ordering::Relaxed));
        Some(Reading::from_db(db))
    }
}

impl Default for ReadingSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn three_sample_window_reads_sixty_db() {
        let db = estimate_db(&[1000, -1000, 1000], 3).unwrap();
        assert!(close(db, 60.0), "got {db}");
        let reading = Reading::from_db(db);
        assert!(close(reading.progress, 0.5));
        assert!(reading.over_threshold);
    }

    #[test]
    fn silent_window_reads_floor() {
        let db = estimate_db(&[0, 0], 2).unwrap();
        assert_eq!(db, SILENCE_FLOOR_DB);
        assert!(db.is_finite());
        assert_eq!(db_to_progress(db), 0.0);
        assert!(!over_threshold(db));
    }

    #[test]
    fn zero_read_size_is_rejected() {
        assert_eq!(
            estimate_db(&[1, 2, 3], 0),
            Err(MeterError::InvalidSampleCount {
                read_size: 0,
                capacity: 3
            })
        );
        assert!(estimate_db(&[], 0).is_err());
    }

    #[test]
    fn read_size_past_buffer_is_rejected() {
        assert!(matches!(
            estimate_db(&[1, 2], 3),
            Err(MeterError::InvalidSampleCount { read_size: 3, .. })
        ));
    }

    #[test]
    fn only_valid_prefix_counts() {
        let db = estimate_db(&[1000, -1000, 1000, 0, 0, 0], 3).unwrap();
        assert!(close(db, 60.0));
    }

    #[test]
    fn full_scale_samples_do_not_overflow() {
        let buf = [i16::MIN; 4096];
        let db = estimate_db(&buf, buf.len()).unwrap();
        assert!(db.is_finite());
        assert!(close(db, (20.0 * 32768f64.log10()) as f32));
    }

    #[test]
    fn nonzero_windows_are_finite() {
        for buf in [[1i16, 0, 0, 0], [0, 0, 0, -1], [i16::MAX, 0, 0, 0]] {
            let db = estimate_db(&buf, buf.len()).unwrap();
            assert!(db.is_finite());
            assert!(db >= SILENCE_FLOOR_DB);
        }
    }

    #[test]
    fn estimate_is_repeatable() {
        let buf: Vec<i16> = (0..512).map(|i| ((i * 37) % 2000 - 1000) as i16).collect();
        let first = estimate_db(&buf, buf.len()).unwrap();
        let second = estimate_db(&buf, buf.len()).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn progress_boundaries() {
        assert_eq!(db_to_progress(0.0), 0.0);
        assert_eq!(db_to_progress(120.0), 1.0);
        assert_eq!(db_to_progress(200.0), 1.0);
        assert_eq!(db_to_progress(-10.0), 0.0);
        assert_eq!(db_to_progress(f32::NAN), 0.0);
        assert_eq!(db_to_progress(f32::INFINITY), 1.0);
        assert_eq!(db_to_progress(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut last = db_to_progress(-50.0);
        let mut db = -50.0f32;
        while db <= 200.0 {
            let p = db_to_progress(db);
            assert!(p >= last, "progress dropped at {db}");
            assert!((0.0..=1.0).contains(&p));
            last = p;
            db += 0.25;
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!over_threshold(50.0));
        assert!(over_threshold(50.1));
        assert!(!over_threshold(49.99));
    }

    #[test]
    fn formats_one_decimal() {
        assert_eq!(format_db(60.0), "60.0 dB");
        assert_eq!(format_db(49.96), "50.0 dB");
        // Rounded text can read 50.0 while the raw value is over threshold.
        assert!(Reading::from_db(50.04).over_threshold);
        assert_eq!(Reading::from_db(50.04).text(), "50.0 dB");
    }

    #[test]
    fn reading_sanitizes_non_finite() {
        let reading = Reading::from_db(f32::NEG_INFINITY);
        assert_eq!(reading.db, SILENCE_FLOOR_DB);
        assert_eq!(reading.progress, 0.0);
        assert!(!reading.over_threshold);
    }

    #[test]
    fn slot_starts_empty() {
        let slot = ReadingSlot::new();
        assert_eq!(slot.generation(), 0);
        assert!(slot.latest().is_none());
    }

    #[test]
    fn slot_keeps_latest_value() {
        let slot = ReadingSlot::new();
        let handle = slot.clone();
        handle.publish(30.0);
        handle.publish(72.5);
        assert_eq!(slot.generation(), 2);
        let reading = slot.latest().unwrap();
        assert_eq!(reading.db, 72.5);
        assert!(reading.over_threshold);
    }

    #[test]
    fn slot_rejects_nan() {
        let slot = ReadingSlot::new();
        slot.publish(f32::NAN);
        assert_eq!(slot.latest().unwrap().db, SILENCE_FLOOR_DB);
    }
}
