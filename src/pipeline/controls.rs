//! Pause and volume stages.
//!
//! Both controls are shared with the sink callback and the seek worker, so
//! their mutable state lives behind atomics rather than a lock the audio
//! thread would have to block on.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::decode::Frame;
use crate::pipeline::FrameSource;

/// Shared pause flag. While paused, frames are not pulled from the inner
/// source at all (so the decoder's position does not advance) and silence
/// is written instead.
#[derive(Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct PauseControl {
    inner: Box<dyn FrameSource>,
    handle: PauseHandle,
}

impl PauseControl {
    pub fn new(inner: Box<dyn FrameSource>, handle: PauseHandle) -> Self {
        Self { inner, handle }
    }
}

impl FrameSource for PauseControl {
    fn pull(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        if self.handle.get() {
            for frame in buf.iter_mut() {
                *frame = (0.0, 0.0);
            }
            return (buf.len(), true);
        }
        self.inner.pull(buf)
    }
}

/// Shared volume state: a linear gain in `[0.0, 1.0]` plus an independent
/// mute flag, stored as a bit-cast `u32` so both fields are lock-free.
#[derive(Clone)]
pub struct VolumeHandle {
    gain_bits: Arc<AtomicU32>,
    silent: Arc<AtomicBool>,
}

impl Default for VolumeHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeHandle {
    pub fn new() -> Self {
        Self {
            gain_bits: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            silent: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_gain(&self, level: f32) {
        let clamped = level.clamp(0.0, 1.0);
        self.gain_bits.store(clamped.to_bits(), Ordering::SeqCst);
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::SeqCst))
    }

    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::SeqCst)
    }
}

pub struct VolumeControl {
    inner: Box<dyn FrameSource>,
    handle: VolumeHandle,
}

impl VolumeControl {
    pub fn new(inner: Box<dyn FrameSource>, handle: VolumeHandle) -> Self {
        Self { inner, handle }
    }
}

impl FrameSource for VolumeControl {
    fn pull(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let (n, more) = self.inner.pull(buf);
        if self.handle.is_silent() {
            for frame in &mut buf[..n] {
                *frame = (0.0, 0.0);
            }
        } else {
            let gain = self.handle.gain();
            if gain != 1.0 {
                for frame in &mut buf[..n] {
                    frame.0 *= gain;
                    frame.1 *= gain;
                }
            }
        }
        (n, more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;
    impl FrameSource for Constant {
        fn pull(&mut self, buf: &mut [Frame]) -> (usize, bool) {
            for frame in buf.iter_mut() {
                *frame = (1.0, 1.0);
            }
            (buf.len(), true)
        }
    }

    #[test]
    fn pause_silences_without_consuming() {
        let handle = PauseHandle::new();
        handle.set(true);
        let mut ctrl = PauseControl::new(Box::new(Constant), handle);
        let mut buf = [(1.0, 1.0); 4];
        let (n, more) = ctrl.pull(&mut buf);
        assert_eq!(n, 4);
        assert!(more);
        assert_eq!(buf[0], (0.0, 0.0));
    }

    #[test]
    fn volume_scales_and_mute_silences() {
        let handle = VolumeHandle::new();
        handle.set_gain(0.5);
        let mut ctrl = VolumeControl::new(Box::new(Constant), handle.clone());
        let mut buf = [(0.0, 0.0); 2];
        ctrl.pull(&mut buf);
        assert_eq!(buf[0], (0.5, 0.5));

        handle.set_silent(true);
        let mut buf = [(0.0, 0.0); 2];
        ctrl.pull(&mut buf);
        assert_eq!(buf[0], (0.0, 0.0));
    }
}
