//! Capture source contract plus an in-memory PCM source.
//!
//! The session only talks to these traits, so the capture loop can run against
//! a real microphone or against synthetic samples without changes.

use super::{ChannelLayout, SampleFormat};
use crate::error::MeterError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Stream format requested when opening a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub sample: SampleFormat,
    /// Samples delivered per read.
    pub buffer_samples: usize,
}

impl CaptureFormat {
    pub fn mono_i16(sample_rate: u32, buffer_ms: u64) -> Self {
        let buffer_samples = ((u64::from(sample_rate) * buffer_ms) / 1000).max(1) as usize;
        Self {
            sample_rate,
            channels: ChannelLayout::Mono,
            sample: SampleFormat::I16,
            buffer_samples,
        }
    }
}

/// A started-or-startable microphone handle.
pub trait CaptureSource: Send {
    fn start(&mut self) -> Result<(), MeterError>;

    /// Block until a window of samples is available and copy it into `buf`.
    ///
    /// Returns the number of valid samples. Zero means nothing arrived in time
    /// and the caller should check its stop flag before reading again.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, MeterError>;

    fn stop(&mut self) -> Result<(), MeterError>;
}

/// Opens capture sources for a requested format.
pub trait CaptureOpener {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn CaptureSource>, MeterError>;
}

/// Observable counters for a [`PcmSource`], shared with whoever built it.
#[derive(Debug, Clone, Default)]
pub struct PcmProbe {
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl PcmProbe {
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Replays a fixed PCM buffer in windows, optionally looping forever.
pub struct PcmSource {
    samples: Vec<i16>,
    window: usize,
    position: usize,
    looping: bool,
    probe: PcmProbe,
}

impl PcmSource {
    pub fn new(samples: Vec<i16>, window: usize, looping: bool) -> Self {
        Self {
            samples,
            window: window.max(1),
            position: 0,
            looping,
            probe: PcmProbe::default(),
        }
    }

    pub fn probe(&self) -> PcmProbe {
        self.probe.clone()
    }
}

impl CaptureSource for PcmSource {
    fn start(&mut self) -> Result<(), MeterError> {
        self.probe.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, MeterError> {
        if !self.probe.started() {
            return Err(MeterError::CaptureRead("source not started".to_string()));
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if self.position >= self.samples.len() {
            if !self.looping || self.samples.is_empty() {
                // Exhausted: behave like a device that went quiet.
                std::thread::sleep(std::time::Duration::from_millis(1));
                return Ok(0);
            }
            self.position = 0;
        }
        let end = (self.position + self.window)
            .min(self.samples.len())
            .min(self.position + buf.len());
        let chunk = &self.samples[self.position..end];
        buf[..chunk.len()].copy_from_slice(chunk);
        self.position = end;
        Ok(chunk.len())
    }

    fn stop(&mut self) -> Result<(), MeterError> {
        self.probe.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`PcmSource`]s over the same samples, or fails like a device that
/// could not be initialised.
#[derive(Debug, Clone, Default)]
pub struct PcmOpener {
    samples: Vec<i16>,
    looping: bool,
    fail_with: Option<String>,
    probe: PcmProbe,
}

impl PcmOpener {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            ..Self::default()
        }
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Counters of the most recently opened source.
    pub fn probe(&self) -> PcmProbe {
        self.probe.clone()
    }
}

impl CaptureOpener for PcmOpener {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn CaptureSource>, MeterError> {
        if let Some(reason) = &self.fail_with {
            return Err(MeterError::CaptureInit(reason.clone()));
        }
        if format.buffer_samples == 0 {
            return Err(MeterError::CaptureInit("buffer size must be non-zero".into()));
        }
        let mut source = PcmSource::new(self.samples.clone(), format.buffer_samples, self.looping);
        source.probe = self.probe.clone();
        Ok(Box::new(source))
    }
}
