use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Downmix interleaved input to mono 16-bit PCM.
///
/// `convert` maps one device sample onto the signed 16-bit scale; each frame
/// is averaged across channels and saturated into `i16`.
pub(super) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<i16>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(|s| saturate(convert(s))));
        return;
    }

    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(saturate(acc / channels as f32));
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(saturate(acc / count as f32));
    }
}

#[inline]
fn saturate(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

#[inline]
pub(super) fn f32_to_pcm(sample: f32) -> f32 {
    sample * f32::from(i16::MAX)
}

#[inline]
pub(super) fn i16_to_pcm(sample: i16) -> f32 {
    f32::from(sample)
}

#[inline]
pub(super) fn u16_to_pcm(sample: u16) -> f32 {
    f32::from(sample) - 32_768.0
}

/// Cuts the callback stream into fixed-size capture windows and hands them to
/// the reader without blocking the audio thread.
pub(super) struct FrameDispatcher {
    frame_samples: usize,
    pending: Vec<i16>,
    scratch: Vec<i16>,
    sender: Sender<Vec<i16>>,
    // Same channel as the reader; used to evict the oldest window when full.
    overflow: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameDispatcher {
    pub(super) fn new(
        frame_samples: usize,
        sender: Sender<Vec<i16>>,
        overflow: Receiver<Vec<i16>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            scratch: Vec::new(),
            sender,
            overflow,
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            match self.sender.try_send(frame) {
                Ok(()) => {}
                // Reader is behind: drop the oldest window so the newest one lands.
                Err(TrySendError::Full(frame)) => {
                    if self.overflow.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    if self.sender.try_send(frame).is_err() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
    }
}
