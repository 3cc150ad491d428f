//! Audio pipeline: decoder → resampler → pause → volume → gapless → sink.
//!
//! Grounded on `audio/audio_player.rs`'s cpal sink and per-stage control
//! structs; generalised from a single hardcoded stream into a
//! `Sink` trait so a test double can stand in for cpal.

pub mod controls;
pub mod gapless;
pub mod resampler;
pub mod sink;

pub use controls::{PauseControl, VolumeControl};
pub use gapless::GaplessStreamer;
pub use resampler::Resampler;
pub use sink::{CpalSink, Sink};

use crate::decode::Frame;

/// A pull-only frame producer: the stages downstream of the gapless switch
/// no longer expose `len`/`position`/`seek` (those belong to the decoder
/// that the gapless streamer may have already swapped out from under them).
pub trait FrameSource: Send {
    /// Writes up to `buf.len()` frames; `more` is true while playback has
    /// not definitively ended.
    fn pull(&mut self, buf: &mut [Frame]) -> (usize, bool);
}
