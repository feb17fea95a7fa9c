//! Metering session: owns the capture thread and its stop flag.
//!
//! The capture thread blocks on the source, reduces each window to a reading,
//! and publishes it into a [`ReadingSlot`]. It never touches display state.

use crate::audio::{estimate_db, CaptureFormat, CaptureOpener, CaptureSource, ReadingSlot};
use crate::error::MeterError;
use crate::lock_or_recover;
use crate::log_debug;
use crate::permission::{ensure_microphone_permission, PermissionGate};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub buffers_measured: usize,
    pub empty_reads: usize,
    pub read_error: Option<MeterError>,
}

#[derive(Default)]
struct Counters {
    measured: AtomicUsize,
    empty: AtomicUsize,
}

pub struct MeterSession {
    stop: Arc<AtomicBool>,
    slot: ReadingSlot,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<Option<MeterError>>>>,
    read_error: Mutex<Option<MeterError>>,
}

impl MeterSession {
    /// Check permission, open the source, and start the capture thread.
    ///
    /// Permission refusal and initialisation failures are terminal: they are
    /// logged and returned, and nothing keeps running.
    pub fn start(
        gate: &dyn PermissionGate,
        opener: &dyn CaptureOpener,
        format: CaptureFormat,
    ) -> Result<Self, MeterError> {
        if !ensure_microphone_permission(gate) {
            log_debug("Missing microphone permission; metering disabled");
            tracing::warn!(target: "sound_meter::session", "microphone permission denied");
            return Err(MeterError::PermissionDenied);
        }

        let mut source = opener.open(&format).map_err(|err| {
            log_debug(&format!("capture initialization failure: {err}"));
            tracing::error!(target: "sound_meter::session", error = %err, "capture init failed");
            match err {
                MeterError::CaptureInit(_) => err,
                other => MeterError::CaptureInit(other.to_string()),
            }
        })?;
        source.start().map_err(|err| {
            log_debug(&format!("capture start failure: {err}"));
            MeterError::CaptureInit(err.to_string())
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let slot = ReadingSlot::new();
        let counters = Arc::new(Counters::default());

        let worker = {
            let stop = stop.clone();
            let slot = slot.clone();
            let counters = counters.clone();
            thread::Builder::new()
                .name("sound-meter-capture".to_string())
                .spawn(move || {
                    capture_loop(source, format.buffer_samples, &stop, &slot, &counters)
                })
                .map_err(|err| {
                    MeterError::CaptureInit(format!("failed to spawn capture thread: {err}"))
                })?
        };

        tracing::info!(
            target: "sound_meter::session",
            sample_rate = format.sample_rate,
            buffer_samples = format.buffer_samples,
            "metering started"
        );

        Ok(Self {
            stop,
            slot,
            counters,
            worker: Mutex::new(Some(worker)),
            read_error: Mutex::new(None),
        })
    }

    /// Handle the UI polls for the most recent reading.
    pub fn readings(&self) -> ReadingSlot {
        self.slot.clone()
    }

    /// True while the capture thread has not exited.
    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.worker, "MeterSession::is_running")
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Signal the capture thread and wait for it to release the device.
    ///
    /// The thread notices the flag between reads, so one more window may be
    /// published after this is called. Safe to call more than once.
    pub fn stop(&self) -> SessionStats {
        self.stop.store(true, Ordering::SeqCst);
        let worker = lock_or_recover(&self.worker, "MeterSession::stop").take();
        if let Some(worker) = worker {
            let outcome = match worker.join() {
                Ok(outcome) => outcome,
                Err(_) => {
                    log_debug("capture thread panicked");
                    Some(MeterError::CaptureRead("capture thread panicked".to_string()))
                }
            };
            *lock_or_recover(&self.read_error, "MeterSession::stop") = outcome;
            tracing::info!(target: "sound_meter::session", "metering stopped");
        }
        self.stats()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            buffers_measured: self.counters.measured.load(Ordering::Relaxed),
            empty_reads: self.counters.empty.load(Ordering::Relaxed),
            read_error: lock_or_recover(&self.read_error, "MeterSession::stats").clone(),
        }
    }
}

impl Drop for MeterSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    mut source: Box<dyn CaptureSource>,
    buffer_samples: usize,
    stop: &AtomicBool,
    slot: &ReadingSlot,
    counters: &Counters,
) -> Option<MeterError> {
    let mut buffer = vec![0i16; buffer_samples.max(1)];
    let mut failure = None;

    while !stop.load(Ordering::SeqCst) {
        let read_size = match source.read(&mut buffer) {
            Ok(count) => count,
            Err(err) => {
                log_debug(&format!("capture read failed: {err}"));
                tracing::error!(target: "sound_meter::capture", error = %err, "read failed");
                failure = Some(err);
                break;
            }
        };
        let started = Instant::now();
        match estimate_db(&buffer, read_size) {
            Ok(db) => {
                slot.publish(db);
                counters.measured.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    target: "sound_meter::capture",
                    read_size,
                    db,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "window measured"
                );
            }
            Err(err) if !err.is_terminal() => {
                // Nothing usable this round; keep the previous reading on screen.
                counters.empty.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    if let Err(err) = source.stop() {
        log_debug(&format!("failed to stop capture source: {err}"));
    }
    failure
}
