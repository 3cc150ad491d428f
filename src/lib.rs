//! Playback core: decode → pipeline → Player, PlayingQueue, PlaybackService.
//!
//! This crate is the audio engine underneath a larger music player; the
//! library, terminal UI, and network collaborators are out of scope here
//! (they talk to [`PlaybackService`] and read from [`events::Subscription`]).

pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod ogg;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod service;
pub mod state;
pub mod tag;
pub mod track;

pub use config::PlaybackConfig;
pub use error::{Error, Result};
pub use player::Player;
pub use queue::PlayingQueue;
pub use service::PlaybackService;
pub use state::{RepeatMode, State};
pub use track::Track;

/// Initializes the `log` facade with a sensible default filter. Library
/// code only ever calls `log::{debug,warn,error}!`; it never initializes a
/// logger itself, so embedding applications can install their own.
pub fn init_logging() {
    colog::init();
}
