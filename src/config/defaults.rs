use crate::audio::DEFAULT_SAMPLE_RATE;

pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = DEFAULT_SAMPLE_RATE;
pub const DEFAULT_BUFFER_MS: u64 = 100;
pub const DEFAULT_REFRESH_MS: u64 = 80;
pub const DEFAULT_BAR_WIDTH: usize = 30;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 192_000;
pub(super) const MIN_BUFFER_MS: u64 = 10;
pub(super) const MAX_BUFFER_MS: u64 = 2_000;
pub(super) const MIN_REFRESH_MS: u64 = 16;
pub(super) const MAX_REFRESH_MS: u64 = 5_000;
pub(super) const MAX_BAR_WIDTH: usize = 200;
pub(super) const FORBIDDEN_DEVICE_CHARS: &[char] = &['\0', '\n', '\r'];
