use super::defaults::{
    FORBIDDEN_DEVICE_CHARS, MAX_BAR_WIDTH, MAX_BUFFER_MS, MAX_REFRESH_MS, MAX_SAMPLE_RATE,
    MIN_BUFFER_MS, MIN_REFRESH_MS, MIN_SAMPLE_RATE,
};
use super::AppConfig;
use crate::audio::CaptureFormat;
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the device name.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_BUFFER_MS..=MAX_BUFFER_MS).contains(&self.buffer_ms) {
            bail!(
                "--buffer-ms must be between {MIN_BUFFER_MS} and {MAX_BUFFER_MS} ms, got {}",
                self.buffer_ms
            );
        }
        if !(MIN_REFRESH_MS..=MAX_REFRESH_MS).contains(&self.refresh_ms) {
            bail!(
                "--refresh-ms must be between {MIN_REFRESH_MS} and {MAX_REFRESH_MS} ms, got {}",
                self.refresh_ms
            );
        }
        if self.bar_width == 0 || self.bar_width > MAX_BAR_WIDTH {
            bail!(
                "--bar-width must be between 1 and {MAX_BAR_WIDTH}, got {}",
                self.bar_width
            );
        }
        if self.duration_secs == Some(0) {
            bail!("--duration-secs must be at least 1");
        }

        if let Some(device) = self.input_device.take() {
            let trimmed = device.trim();
            if trimmed.is_empty() {
                bail!("--input-device cannot be empty");
            }
            if trimmed.contains(FORBIDDEN_DEVICE_CHARS) {
                bail!("--input-device contains control characters");
            }
            self.input_device = Some(trimmed.to_string());
        }

        Ok(())
    }

    /// Capture format the session should request.
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat::mono_i16(self.sample_rate, self.buffer_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }
}
