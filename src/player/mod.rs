//! Player: owns one audio pipeline end to end — open/close a track, run the
//! sink, expose seek/pause/position, emit "finished".
//!
//! Grounded on `runtime/audio_runtime_reactor.rs` for the tokio-task-per-
//! concern shape (seek worker, preload monitor) and on `audio/audio_player.rs`
//! for the sink lifecycle.

mod signals;

pub use signals::{DoneSignal, FinishedSignal, SeekDelta};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::PlaybackConfig;
use crate::decode::{self, SampleStream};
use crate::error::Result;
use crate::pipeline::controls::{PauseHandle, VolumeHandle};
use crate::pipeline::{CpalSink, FrameSource, GaplessStreamer, PauseControl, Resampler, Sink, VolumeControl};
use crate::state::State;

type SharedCurrent = Arc<Mutex<Option<Arc<Mutex<GaplessStreamer>>>>>;
type PreloadProvider = Arc<dyn Fn() -> Option<PathBuf> + Send + Sync>;

/// Adapts a shared, lockable `GaplessStreamer` to the pull-only
/// `FrameSource` the sink expects, so the Player can keep mutating the
/// decoder (seeks, preload attach) after the streamer has been handed off
/// to the sink callback.
struct SharedGapless(Arc<Mutex<GaplessStreamer>>);

impl FrameSource for SharedGapless {
    fn pull(&mut self, buf: &mut [crate::decode::Frame]) -> (usize, bool) {
        self.0.lock().unwrap().pull(buf)
    }
}

pub struct Player {
    config: PlaybackConfig,
    sink: Box<dyn Sink>,
    current: SharedCurrent,
    pause: PauseHandle,
    volume: VolumeHandle,
    state: Arc<Mutex<State>>,
    seek_tx: watch::Sender<Option<i64>>,
    finished_tx: mpsc::Sender<()>,
    finished_signal: FinishedSignal,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    preload: Arc<Mutex<Option<PreloadProvider>>>,
    current_path: Option<PathBuf>,
    seek_worker: tokio::task::JoinHandle<()>,
    monitor: tokio::task::JoinHandle<()>,
}

impl Player {
    /// Must be called from inside a tokio runtime: it spawns the seek
    /// worker and the preload monitor as background tasks.
    pub fn new(config: PlaybackConfig) -> Self {
        let current: SharedCurrent = Arc::new(Mutex::new(None));
        let pause = PauseHandle::new();
        let volume = VolumeHandle::new();
        let state = Arc::new(Mutex::new(State::Stopped));
        let preload: Arc<Mutex<Option<PreloadProvider>>> = Arc::new(Mutex::new(None));

        let (seek_tx, seek_rx) = watch::channel(None);
        let (finished_tx, finished_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = watch::channel(false);

        let seek_worker = tokio::spawn(signals::run_seek_worker(
            seek_rx,
            current.clone(),
            volume.clone(),
            state.clone(),
            config.seek_settle_ms,
            config.sink_sample_rate_hz,
        ));
        let monitor = tokio::spawn(run_preload_monitor(
            current.clone(),
            state.clone(),
            preload.clone(),
            config.monitor_tick_ms,
            Duration::from_millis(config.preload_at_ms),
            config.sink_sample_rate_hz,
        ));

        let dither_on_bitdepth_reduce = config.dither_on_bitdepth_reduce;
        Self {
            config,
            sink: Box::new(CpalSink::new(dither_on_bitdepth_reduce)),
            current,
            pause,
            volume,
            state,
            seek_tx,
            finished_tx,
            finished_signal: FinishedSignal::new(finished_rx),
            done_tx,
            done_rx,
            preload,
            current_path: None,
            seek_worker,
            monitor,
        }
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Closes any current stream, opens and decodes `path`, builds the
    /// pipeline, pushes it to the sink, and transitions to Playing.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let decoder = decode::open(path)?;
        let sink_rate = self.config.sink_sample_rate_hz;
        let adapted = adapt_to_sink_rate(decoder, sink_rate)?;

        let gapless = Arc::new(Mutex::new(GaplessStreamer::new(adapted)));
        *self.current.lock().unwrap() = Some(gapless.clone());

        let pause_ctrl = PauseControl::new(Box::new(SharedGapless(gapless)), self.pause.clone());
        let volume_ctrl = VolumeControl::new(Box::new(pause_ctrl), self.volume.clone());

        let state = self.state.clone();
        let done_tx = self.done_tx.clone();
        let finished_tx = self.finished_tx.clone();
        self.sink.set_finish_callback(Box::new(move || {
            *state.lock().unwrap() = State::Stopped;
            done_tx.send_replace(true);
            let _ = finished_tx.try_send(());
        }));

        self.sink.push(Box::new(volume_ctrl), sink_rate)?;

        self.pause.set(false);
        self.volume.set_silent(false);
        self.done_tx.send_replace(false);
        *self.state.lock().unwrap() = State::Playing;
        self.current_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Idempotent: stopping an already-Stopped player is a no-op beyond
    /// clearing any stale current/next.
    pub fn stop(&mut self) {
        self.sink.stop();
        if let Some(gapless) = self.current.lock().unwrap().take() {
            gapless.lock().unwrap().clear_next();
            gapless.lock().unwrap().current_mut().close();
        }
        self.pause.set(false);
        self.volume.set_silent(false);
        *self.state.lock().unwrap() = State::Stopped;
        self.done_tx.send_replace(true);
        self.current_path = None;
    }

    pub fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        if *state == State::Playing {
            self.pause.set(true);
            *state = State::Paused;
        }
    }

    pub fn resume(&mut self) {
        let mut state = self.state.lock().unwrap();
        if *state == State::Paused {
            self.pause.set(false);
            *state = State::Playing;
        }
    }

    pub fn toggle(&mut self) {
        match self.state() {
            State::Playing => self.pause(),
            State::Paused => self.resume(),
            State::Stopped => {}
        }
    }

    pub fn position(&self) -> Duration {
        let frames = self
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|g| g.lock().unwrap().current().position())
            .unwrap_or(0);
        frames_to_duration(frames, self.config.sink_sample_rate_hz)
    }

    pub fn duration(&self) -> Duration {
        let frames = self
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|g| g.lock().unwrap().current().len())
            .unwrap_or(0);
        frames_to_duration(frames, self.config.sink_sample_rate_hz)
    }

    /// Publishes the requested delta onto the one-slot seek channel;
    /// non-blocking, and only the latest pending delta survives.
    pub fn seek(&self, delta: SeekDelta) {
        let _ = self.seek_tx.send(Some(delta.as_signed_millis()));
    }

    pub fn set_preload(&mut self, provider: impl Fn() -> Option<PathBuf> + Send + Sync + 'static) {
        *self.preload.lock().unwrap() = Some(Arc::new(provider));
    }

    pub fn clear_preload(&mut self) {
        *self.preload.lock().unwrap() = None;
        if let Some(gapless) = self.current.lock().unwrap().as_ref() {
            gapless.lock().unwrap().clear_next();
        }
    }

    pub fn finished_channel(&self) -> FinishedSignal {
        self.finished_signal.clone()
    }

    pub fn done_channel(&self) -> DoneSignal {
        DoneSignal::new(self.done_rx.clone())
    }

    pub fn set_volume(&self, level: f32) {
        self.volume.set_gain(level);
    }

    pub fn set_muted(&self, muted: bool) {
        self.volume.set_silent(muted);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.seek_worker.abort();
        self.monitor.abort();
    }
}

fn adapt_to_sink_rate(
    decoder: Box<dyn SampleStream>,
    sink_rate: u32,
) -> Result<Box<dyn SampleStream>> {
    if decoder.sample_rate() == sink_rate {
        Ok(decoder)
    } else {
        Ok(Box::new(Resampler::new(decoder, sink_rate)?))
    }
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64)
}

async fn run_preload_monitor(
    current: SharedCurrent,
    state: Arc<Mutex<State>>,
    preload: Arc<Mutex<Option<PreloadProvider>>>,
    tick_ms: u64,
    preload_at: Duration,
    sink_rate: u32,
) {
    loop {
        tokio::time::sleep(Duration::from_millis(tick_ms)).await;

        if *state.lock().unwrap() != State::Playing {
            continue;
        }
        let gapless = current.lock().unwrap().clone();
        let Some(gapless) = gapless else { continue };
        if gapless.lock().unwrap().has_next() {
            continue;
        }
        let (position, len) = {
            let g = gapless.lock().unwrap();
            (g.current().position(), g.current().len())
        };
        if len == 0 {
            continue;
        }
        let remaining = frames_to_duration(len.saturating_sub(position), sink_rate);
        if remaining > preload_at {
            continue;
        }
        let provider = preload.lock().unwrap().clone();
        let Some(provider) = provider else { continue };
        let Some(next_path) = provider() else { continue };

        match decode::open(&next_path).and_then(|d| adapt_to_sink_rate(d, sink_rate)) {
            Ok(adapted) => gapless.lock().unwrap().attach_next(adapted),
            Err(e) => log::warn!("preload open failed for {:?}: {}", next_path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_delta_sign_conversion() {
        assert_eq!(
            SeekDelta::Forward(Duration::from_millis(500)).as_signed_millis(),
            500
        );
        assert_eq!(
            SeekDelta::Backward(Duration::from_millis(500)).as_signed_millis(),
            -500
        );
    }
}
