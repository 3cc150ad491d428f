//! PlaybackService: binds Player + PlayingQueue, runs the state machine,
//! and fans events out to subscriptions.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::events::{
    self, ErrorEvent, ModeChanged, PositionChanged, QueueChanged, StateChanged, Subscription,
    SubscriptionSender, TrackChanged,
};
use crate::player::{Player, SeekDelta};
use crate::queue::history::QueueHistory;
use crate::queue::PlayingQueue;
use crate::state::{RepeatMode, State};
use crate::track::Track;

struct Inner {
    player: Player,
    queue: PlayingQueue,
    history: QueueHistory,
    /// Mirrors `player.state()` at the moment of the last service-visible
    /// transition, so the finish watcher can tell "was active" without a
    /// race against the player having already moved on.
    last_state: State,
    closed: bool,
}

pub struct PlaybackService {
    inner: Arc<RwLock<Inner>>,
    subscriptions: Arc<RwLock<Vec<SubscriptionSender>>>,
    config: PlaybackConfig,
    finish_watcher: tokio::task::JoinHandle<()>,
}

impl PlaybackService {
    pub fn new(config: PlaybackConfig) -> Self {
        let player = Player::new(config.clone());
        let finished = player.finished_channel();

        let inner = Arc::new(RwLock::new(Inner {
            player,
            queue: PlayingQueue::new(),
            history: QueueHistory::new(config.history_limit),
            last_state: State::Stopped,
            closed: false,
        }));
        let subscriptions: Arc<RwLock<Vec<SubscriptionSender>>> = Arc::new(RwLock::new(Vec::new()));

        let finish_watcher = tokio::spawn(run_finish_watcher(
            inner.clone(),
            subscriptions.clone(),
            finished,
        ));

        Self {
            inner,
            subscriptions,
            config,
            finish_watcher,
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let (sender, subscription) = events::new_subscription(self.config.subscription_capacity);
        self.subscriptions.write().await.push(sender);
        subscription
    }

    /// Idempotent. Closes `done`, raises every live subscription's `done`.
    pub async fn close(&self) {
        let mut state = self.inner.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.player.stop();
        drop(state);

        for sub in self.subscriptions.read().await.iter() {
            sub.raise_done();
        }
    }

    pub async fn play(&self) -> Result<()> {
        let mut state = self.inner.write().await;
        if state.queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let track = state.queue.current_track().ok_or(Error::NoCurrentTrack)?;
        self.start_player(&mut state, &track.path).await?;
        Ok(())
    }

    pub async fn play_path(&self, path: &Path) -> Result<()> {
        let mut state = self.inner.write().await;
        self.start_player(&mut state, path).await
    }

    async fn start_player(&self, state: &mut Inner, path: &Path) -> Result<()> {
        let previous = state.last_state;
        state.player.open(path)?;
        state.last_state = State::Playing;
        if previous != State::Playing {
            self.emit_state_changed(previous, State::Playing).await;
        }
        Ok(())
    }

    pub async fn pause(&self) {
        let mut state = self.inner.write().await;
        if state.last_state != State::Playing {
            return;
        }
        state.player.pause();
        state.last_state = State::Paused;
        self.emit_state_changed(State::Playing, State::Paused).await;
    }

    pub async fn stop(&self) {
        let mut state = self.inner.write().await;
        if state.last_state == State::Stopped {
            return;
        }
        let previous = state.last_state;
        state.player.stop();
        state.last_state = State::Stopped;
        self.emit_state_changed(previous, State::Stopped).await;
    }

    pub async fn toggle(&self) -> Result<()> {
        let current = self.inner.read().await.last_state;
        match current {
            State::Playing => {
                self.pause().await;
                Ok(())
            }
            State::Paused => {
                let mut state = self.inner.write().await;
                state.player.resume();
                state.last_state = State::Playing;
                self.emit_state_changed(State::Paused, State::Playing).await;
                Ok(())
            }
            State::Stopped => self.play().await,
        }
    }

    pub async fn next(&self) -> Result<()> {
        let mut state = self.inner.write().await;
        let prev_track = state.queue.current_track();
        let prev_index = state.queue.current_index();
        let was_active = state.last_state.is_active();

        match state.queue.next() {
            None => {
                if was_active {
                    let previous = state.last_state;
                    state.player.stop();
                    state.last_state = State::Stopped;
                    self.emit_state_changed(previous, State::Stopped).await;
                }
            }
            Some(current) => {
                let index = state.queue.current_index();
                self.emit_track_changed(prev_track, Some(current.clone()), prev_index, index)
                    .await;
                if was_active {
                    self.start_player(&mut state, &current.path).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn previous(&self) -> Result<()> {
        let mut state = self.inner.write().await;
        let prev_index = state.queue.current_index();
        if prev_index <= 0 {
            return Ok(());
        }
        let prev_track = state.queue.current_track();
        let was_active = state.last_state.is_active();

        let Some(current) = state.queue.jump_to(prev_index - 1) else {
            return Ok(());
        };
        let index = state.queue.current_index();
        self.emit_track_changed(prev_track, Some(current.clone()), prev_index, index)
            .await;
        if was_active {
            self.start_player(&mut state, &current.path).await?;
        }
        Ok(())
    }

    pub async fn jump_to(&self, index: i32) -> Result<()> {
        let mut state = self.inner.write().await;
        if index < 0 || index as usize >= state.queue.len() {
            return Err(Error::InvalidIndex);
        }
        let prev_track = state.queue.current_track();
        let prev_index = state.queue.current_index();
        let was_active = state.last_state.is_active();

        let current = state.queue.jump_to(index).ok_or(Error::InvalidIndex)?;
        self.emit_track_changed(prev_track, Some(current.clone()), prev_index, index)
            .await;
        if was_active {
            self.start_player(&mut state, &current.path).await?;
        }
        Ok(())
    }

    /// Advances the queue without touching the player; deliberately emits
    /// no event, since rapid navigation shouldn't flood subscribers with notifications.
    pub async fn queue_advance(&self) -> Option<Track> {
        self.inner.write().await.queue.next()
    }

    pub async fn queue_move_to(&self, index: i32) -> Option<Track> {
        self.inner.write().await.queue.jump_to(index)
    }

    pub async fn add_tracks(&self, tracks: Vec<Track>) {
        let mut state = self.inner.write().await;
        state.queue.add(tracks);
        self.snapshot_and_emit(&mut state).await;
    }

    pub async fn replace_tracks(&self, tracks: Vec<Track>) {
        let mut state = self.inner.write().await;
        state.queue.replace(tracks);
        self.snapshot_and_emit(&mut state).await;
    }

    pub async fn clear_queue(&self) {
        let mut state = self.inner.write().await;
        state.queue.clear();
        self.snapshot_and_emit(&mut state).await;
    }

    async fn snapshot_and_emit(&self, state: &mut Inner) {
        state.history.push(state.queue.tracks().to_vec());
        let tracks = state.queue.tracks().to_vec();
        let index = state.queue.current_index();
        self.emit_queue_changed(tracks, index).await;
    }

    pub async fn undo(&self) -> bool {
        let mut state = self.inner.write().await;
        let Some(tracks) = state.history.undo() else {
            return false;
        };
        state.queue.restore_tracks(tracks);
        let tracks = state.queue.tracks().to_vec();
        let index = state.queue.current_index();
        self.emit_queue_changed(tracks, index).await;
        true
    }

    pub async fn redo(&self) -> bool {
        let mut state = self.inner.write().await;
        let Some(tracks) = state.history.redo() else {
            return false;
        };
        state.queue.restore_tracks(tracks);
        let tracks = state.queue.tracks().to_vec();
        let index = state.queue.current_index();
        self.emit_queue_changed(tracks, index).await;
        true
    }

    pub async fn seek(&self, delta: SeekDelta) {
        let state = self.inner.read().await;
        state.player.seek(delta);
        let position = state.player.position();
        drop(state);
        self.emit_position_changed(position).await;
    }

    pub async fn seek_to(&self, target: std::time::Duration) {
        let state = self.inner.read().await;
        let current = state.player.position();
        let delta = if target >= current {
            SeekDelta::Forward(target - current)
        } else {
            SeekDelta::Backward(current - target)
        };
        state.player.seek(delta);
        drop(state);
        self.emit_position_changed(target).await;
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut state = self.inner.write().await;
        state.queue.set_repeat_mode(mode);
        let shuffle = state.queue.shuffle();
        self.emit_mode_changed(mode, shuffle).await;
    }

    pub async fn cycle_repeat_mode(&self) -> RepeatMode {
        let mut state = self.inner.write().await;
        let mode = state.queue.cycle_repeat_mode();
        let shuffle = state.queue.shuffle();
        self.emit_mode_changed(mode, shuffle).await;
        mode
    }

    pub async fn set_shuffle(&self, shuffle: bool) {
        let mut state = self.inner.write().await;
        state.queue.set_shuffle(shuffle);
        let mode = state.queue.repeat_mode();
        self.emit_mode_changed(mode, shuffle).await;
    }

    pub async fn toggle_shuffle(&self) -> bool {
        let mut state = self.inner.write().await;
        let shuffle = state.queue.toggle_shuffle();
        let mode = state.queue.repeat_mode();
        self.emit_mode_changed(mode, shuffle).await;
        shuffle
    }

    pub async fn current_track(&self) -> Option<Track> {
        self.inner.read().await.queue.current_track()
    }

    pub async fn state(&self) -> State {
        self.inner.read().await.last_state
    }

    async fn emit_state_changed(&self, previous: State, current: State) {
        if previous == current {
            return;
        }
        for sub in self.subscriptions.read().await.iter() {
            sub.send_state_changed(StateChanged { previous, current });
        }
    }

    async fn emit_track_changed(
        &self,
        previous: Option<Track>,
        current: Option<Track>,
        previous_index: i32,
        index: i32,
    ) {
        if previous_index == index {
            return;
        }
        for sub in self.subscriptions.read().await.iter() {
            sub.send_track_changed(TrackChanged {
                previous: previous.clone(),
                current: current.clone(),
                previous_index,
                index,
            });
        }
    }

    async fn emit_position_changed(&self, position: std::time::Duration) {
        for sub in self.subscriptions.read().await.iter() {
            sub.send_position_changed(PositionChanged { position });
        }
    }

    async fn emit_queue_changed(&self, tracks: Vec<Track>, index: i32) {
        for sub in self.subscriptions.read().await.iter() {
            sub.send_queue_changed(QueueChanged {
                tracks: tracks.clone(),
                index,
            });
        }
    }

    async fn emit_mode_changed(&self, repeat: RepeatMode, shuffle: bool) {
        for sub in self.subscriptions.read().await.iter() {
            sub.send_mode_changed(ModeChanged { repeat, shuffle });
        }
    }

}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.finish_watcher.abort();
    }
}

/// Background watcher on `player.finished_channel()`: advances the queue
/// on every natural track end.
async fn run_finish_watcher(
    inner: Arc<RwLock<Inner>>,
    subscriptions: Arc<RwLock<Vec<SubscriptionSender>>>,
    finished: crate::player::FinishedSignal,
) {
    loop {
        if !finished.recv().await {
            return;
        }
        let mut state = inner.write().await;
        if state.closed {
            return;
        }

        let prev_track = state.queue.current_track();
        let prev_index = state.queue.current_index();

        match state.queue.next() {
            None => {
                state.player.stop();
                state.last_state = State::Stopped;
                drop(state);
                for sub in subscriptions.read().await.iter() {
                    sub.send_state_changed(StateChanged {
                        previous: State::Playing,
                        current: State::Stopped,
                    });
                }
            }
            Some(current) => {
                let index = state.queue.current_index();
                for sub in subscriptions.read().await.iter() {
                    sub.send_track_changed(TrackChanged {
                        previous: prev_track.clone(),
                        current: Some(current.clone()),
                        previous_index: prev_index,
                        index,
                    });
                }
                match state.player.open(&current.path) {
                    Ok(()) => {
                        state.last_state = State::Playing;
                    }
                    Err(e) => {
                        state.player.stop();
                        state.last_state = State::Stopped;
                        let path = current.path.display().to_string();
                        drop(state);
                        for sub in subscriptions.read().await.iter() {
                            sub.send_state_changed(StateChanged {
                                previous: State::Playing,
                                current: State::Stopped,
                            });
                            sub.send_error_event(ErrorEvent {
                                operation: "play_next".to_string(),
                                path: path.clone(),
                                err: e.detail(),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn track(id: u64, title: &str) -> Track {
        Track {
            id,
            path: std::path::PathBuf::from(format!("/music/{title}.flac")),
            title: title.to_string(),
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            duration: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn play_on_empty_queue_errors_without_events() {
        let service = PlaybackService::new(PlaybackConfig::default());
        let mut sub = service.subscribe().await;
        let err = service.play().await.unwrap_err();
        assert!(matches!(err, Error::EmptyQueue));
        assert!(sub.state_changed.try_recv().is_err());
    }

    #[tokio::test]
    async fn jump_to_out_of_range_is_rejected_without_events() {
        let service = PlaybackService::new(PlaybackConfig::default());
        service.add_tracks(vec![track(1, "a")]).await;
        let mut sub = service.subscribe().await;
        let err = service.jump_to(5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidIndex));
        assert!(sub.track_changed.try_recv().is_err());
    }

    #[tokio::test]
    async fn add_tracks_emits_queue_changed_and_is_undoable() {
        let service = PlaybackService::new(PlaybackConfig::default());
        let mut sub = service.subscribe().await;

        service.add_tracks(vec![track(1, "a"), track(2, "b")]).await;
        let event = sub.queue_changed.recv().await.unwrap();
        assert_eq!(event.tracks.len(), 2);

        assert!(service.undo().await);
        let event = sub.queue_changed.recv().await.unwrap();
        assert!(event.tracks.is_empty());

        assert!(service.redo().await);
        let event = sub.queue_changed.recv().await.unwrap();
        assert_eq!(event.tracks.len(), 2);
    }

    #[tokio::test]
    async fn next_while_stopped_changes_track_without_state_event() {
        let service = PlaybackService::new(PlaybackConfig::default());
        service.add_tracks(vec![track(1, "a"), track(2, "b")]).await;
        service.jump_to(0).await.unwrap();

        let mut sub = service.subscribe().await;
        service.next().await.unwrap();

        let event = sub.track_changed.recv().await.unwrap();
        assert_eq!(event.previous_index, 0);
        assert_eq!(event.index, 1);
        assert!(sub.state_changed.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeat_all_wraps_after_three_advances() {
        let service = PlaybackService::new(PlaybackConfig::default());
        service
            .add_tracks(vec![track(1, "a"), track(2, "b"), track(3, "c")])
            .await;
        service.set_repeat_mode(RepeatMode::All).await;
        service.jump_to(0).await.unwrap();

        service.next().await.unwrap();
        service.next().await.unwrap();
        service.next().await.unwrap();
        assert_eq!(service.current_track().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn queue_advance_emits_no_event() {
        let service = PlaybackService::new(PlaybackConfig::default());
        service.add_tracks(vec![track(1, "a"), track(2, "b")]).await;
        service.jump_to(0).await.unwrap();

        let mut sub = service.subscribe().await;
        let advanced = service.queue_advance().await;
        assert_eq!(advanced.unwrap().id, 2);
        assert!(sub.track_changed.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_raises_done() {
        let service = PlaybackService::new(PlaybackConfig::default());
        let mut sub = service.subscribe().await;
        service.close().await;
        assert!(sub.is_done());
        service.close().await; // second close is a no-op
        sub.wait_done().await;
    }
}
