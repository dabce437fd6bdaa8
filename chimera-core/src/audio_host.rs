//! Audio device boundary (§6: "audio capture/playback device (consumed)").
//!
//! The real device backend (cpal or similar) lives outside this crate; the
//! Core worker only depends on this trait, so it can run headless against
//! [`LoopbackAudioHost`] in tests and in any environment without a sound
//! card.

use crate::errors::DeviceError;

pub trait AudioHost: Send {
    fn open(&mut self, sample_rate: u32) -> Result<(), DeviceError>;

    /// Blocking capture of exactly `buf.len()` samples.
    fn capture(&mut self, buf: &mut [f32]) -> Result<(), DeviceError>;

    /// Blocking playback of exactly `buf.len()` samples.
    fn playback(&mut self, buf: &[f32]) -> Result<(), DeviceError>;

    fn set_playback_paused(&mut self, paused: bool) -> Result<(), DeviceError>;

    /// Samples currently queued for capture but not yet delivered.
    fn queued_capture_len(&self) -> usize;
}

/// Deterministic loopback double: whatever is written via `playback` is what
/// the next `capture` call returns, with a fixed-size FIFO in between. Used
/// by integration tests to drive a full modulate -> "over the air" ->
/// demodulate round trip without real hardware.
#[derive(Debug, Default)]
pub struct LoopbackAudioHost {
    queue: std::collections::VecDeque<f32>,
    paused: bool,
    opened: bool,
}

impl LoopbackAudioHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioHost for LoopbackAudioHost {
    fn open(&mut self, _sample_rate: u32) -> Result<(), DeviceError> {
        self.opened = true;
        Ok(())
    }

    fn capture(&mut self, buf: &mut [f32]) -> Result<(), DeviceError> {
        if !self.opened {
            return Err(DeviceError::CaptureFailed {
                requested: buf.len(),
                reason: "device not open".into(),
            });
        }
        for sample in buf.iter_mut() {
            *sample = self.queue.pop_front().unwrap_or(0.0);
        }
        Ok(())
    }

    fn playback(&mut self, buf: &[f32]) -> Result<(), DeviceError> {
        if !self.opened {
            return Err(DeviceError::PlaybackFailed {
                requested: buf.len(),
                reason: "device not open".into(),
            });
        }
        if self.paused {
            return Ok(());
        }
        self.queue.extend(buf.iter().copied());
        Ok(())
    }

    fn set_playback_paused(&mut self, paused: bool) -> Result<(), DeviceError> {
        self.paused = paused;
        Ok(())
    }

    fn queued_capture_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_is_immediately_capturable() {
        let mut host = LoopbackAudioHost::new();
        host.open(48_000).unwrap();
        host.playback(&[1.0, 2.0, 3.0]).unwrap();
        let mut buf = [0.0; 3];
        host.capture(&mut buf).unwrap();
        assert_eq!(buf, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn capture_before_any_playback_reads_silence() {
        let mut host = LoopbackAudioHost::new();
        host.open(48_000).unwrap();
        let mut buf = [1.0, 1.0];
        host.capture(&mut buf).unwrap();
        assert_eq!(buf, [0.0, 0.0]);
    }

    #[test]
    fn paused_playback_is_dropped() {
        let mut host = LoopbackAudioHost::new();
        host.open(48_000).unwrap();
        host.set_playback_paused(true).unwrap();
        host.playback(&[9.0]).unwrap();
        assert_eq!(host.queued_capture_len(), 0);
    }

    #[test]
    fn operations_before_open_fail() {
        let mut host = LoopbackAudioHost::new();
        assert!(host.playback(&[1.0]).is_err());
    }
}
