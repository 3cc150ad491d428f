//! Seek worker and the two read-only signal handles Player exposes
//! seek handling and finished/done channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::pipeline::controls::VolumeHandle;
use crate::pipeline::GaplessStreamer;
use crate::state::State;

use super::SharedCurrent;

/// A signed seek request: how far, and in which direction.
#[derive(Debug, Clone, Copy)]
pub enum SeekDelta {
    Forward(Duration),
    Backward(Duration),
}

impl SeekDelta {
    pub fn as_signed_millis(self) -> i64 {
        match self {
            SeekDelta::Forward(d) => d.as_millis() as i64,
            SeekDelta::Backward(d) => -(d.as_millis() as i64),
        }
    }
}

/// One message per natural track end; extra messages are dropped, not
/// queued, because the previous end going unacknowledged means a caller
/// isn't keeping up and a backlog would just replay stale finishes.
#[derive(Clone)]
pub struct FinishedSignal(Arc<tokio::sync::Mutex<mpsc::Receiver<()>>>);

impl FinishedSignal {
    pub(super) fn new(rx: mpsc::Receiver<()>) -> Self {
        Self(Arc::new(tokio::sync::Mutex::new(rx)))
    }

    /// Awaits the next natural track end. Returns `false` once the
    /// underlying player has been dropped.
    pub async fn recv(&self) -> bool {
        self.0.lock().await.recv().await.is_some()
    }
}

/// Raised (and then held raised) when the current play cycle ends, whether
/// by `stop()` or by natural finish. A fresh cycle clears it on `open()`.
#[derive(Clone)]
pub struct DoneSignal(watch::Receiver<bool>);

impl DoneSignal {
    pub(super) fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    pub fn is_done(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until the signal is raised. Resolves immediately if it
    /// already is.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|done| *done).await;
    }
}

pub(super) async fn run_seek_worker(
    mut rx: watch::Receiver<Option<i64>>,
    current: SharedCurrent,
    volume: VolumeHandle,
    state: Arc<Mutex<State>>,
    settle_ms: u64,
    sink_rate: u32,
) {
    while rx.changed().await.is_ok() {
        let delta_ms = match *rx.borrow_and_update() {
            Some(d) => d,
            None => continue,
        };
        apply_seek(&current, &volume, &state, settle_ms, sink_rate, delta_ms).await;
    }
}

async fn apply_seek(
    current: &SharedCurrent,
    volume: &VolumeHandle,
    state: &Arc<Mutex<State>>,
    settle_ms: u64,
    sink_rate: u32,
    delta_ms: i64,
) {
    let gapless: Option<Arc<Mutex<GaplessStreamer>>> = current.lock().unwrap().clone();
    let Some(gapless) = gapless else { return };

    let (position, len) = {
        let g = gapless.lock().unwrap();
        (g.current().position(), g.current().len())
    };
    let delta_frames = (delta_ms.unsigned_abs() as u64 * sink_rate as u64) / 1000;
    let new_frame = if delta_ms >= 0 {
        position.saturating_add(delta_frames)
    } else {
        position.saturating_sub(delta_frames)
    };
    // Seeking past len is "track finished": clamp to len and let the next
    // sink pull report end-of-stream, driving the normal finish path.
    let target = new_frame.min(len);

    volume.set_silent(true);
    {
        let _ = gapless.lock().unwrap().current_mut().seek(target);
    }
    tokio::time::sleep(Duration::from_millis(settle_ms)).await;

    // Re-entrancy guard: if stop() ran while we were asleep, leave the
    // silence flag alone — it's about to be reset by stop()/open() anyway.
    if *state.lock().unwrap() != State::Stopped {
        volume.set_silent(false);
    }
}
