//! PlayingQueue: ordered track list, current index, repeat/shuffle modes,
//! and the advancement algebra.

pub mod history;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::state::RepeatMode;
use crate::track::Track;

pub struct PlayingQueue {
    tracks: Vec<Track>,
    current_index: i32,
    repeat: RepeatMode,
    shuffle: bool,
    rng: StdRng,
}

impl PlayingQueue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current_index: -1,
            repeat: RepeatMode::Off,
            shuffle: false,
            rng: seeded_rng(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> i32 {
        self.current_index
    }

    pub fn current_track(&self) -> Option<Track> {
        self.get(self.current_index)
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    fn get(&self, index: i32) -> Option<Track> {
        if index < 0 {
            return None;
        }
        self.tracks.get(index as usize).cloned()
    }

    /// Replaces the whole queue and RNG state — used by history undo/redo,
    /// which restores snapshots without disturbing modes.
    pub(crate) fn restore_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = self.current_index.clamp(-1, self.tracks.len() as i32 - 1);
        if self.tracks.is_empty() {
            self.current_index = -1;
        }
    }

    pub fn add(&mut self, new_tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(new_tracks);
    }

    /// Appends tracks and sets `currentIndex` to the first newly added one.
    pub fn add_and_play(&mut self, new_tracks: Vec<Track>) -> Option<Track> {
        if new_tracks.is_empty() {
            return None;
        }
        let first_new_index = self.tracks.len() as i32;
        self.tracks.extend(new_tracks);
        self.current_index = first_new_index;
        self.get(self.current_index)
    }

    pub fn replace(&mut self, new_tracks: Vec<Track>) -> Option<Track> {
        self.tracks = new_tracks;
        self.current_index = if self.tracks.is_empty() { -1 } else { 0 };
        self.get(self.current_index)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = -1;
    }

    pub fn remove_at(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        self.tracks.remove(index);
        let removed = index as i32;
        if removed < self.current_index {
            self.current_index -= 1;
        } else if removed == self.current_index {
            self.current_index = -1;
        }
    }

    pub fn jump_to(&mut self, index: i32) -> Option<Track> {
        if index < 0 || index as usize >= self.tracks.len() {
            return None;
        }
        self.current_index = index;
        self.get(self.current_index)
    }

    /// Implements the repeat/shuffle advancement rules. `mutate` controls whether
    /// `currentIndex` is updated (true for `next()`, false for `peek_next()`).
    fn advance(&mut self, mutate: bool) -> Option<Track> {
        if self.tracks.is_empty() || self.current_index < 0 {
            return None;
        }
        let len = self.tracks.len() as i32;

        if self.repeat == RepeatMode::One || len == 1 {
            return self.get(self.current_index);
        }

        if self.shuffle {
            let target = self.rng.gen_range(0..len as usize) as i32;
            let target = if target == self.current_index {
                (target + 1) % len
            } else {
                target
            };
            if mutate {
                self.current_index = target;
            }
            return self.get(target);
        }

        let next_index = if self.current_index < len - 1 {
            Some(self.current_index + 1)
        } else if self.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        };

        match next_index {
            Some(i) => {
                if mutate {
                    self.current_index = i;
                }
                self.get(i)
            }
            None => None,
        }
    }

    pub fn next(&mut self) -> Option<Track> {
        self.advance(true)
    }

    pub fn peek_next(&mut self) -> Option<Track> {
        self.advance(false)
    }

    pub fn has_next(&mut self) -> bool {
        self.peek_next().is_some()
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycled();
        self.repeat
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    /// Shifts every index in `indices` by `delta`, preserving relative
    /// order. Fails (leaving the queue untouched) if any resulting position
    /// would fall outside `[0, len)`.
    pub fn move_indices(&mut self, indices: &[usize], delta: i32) -> Option<Vec<usize>> {
        let len = self.tracks.len() as i32;
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut targets = Vec::with_capacity(sorted.len());
        for &i in &sorted {
            let target = i as i32 + delta;
            if target < 0 || target >= len {
                return None;
            }
            targets.push(target as usize);
        }

        let moving: Vec<Track> = sorted.iter().map(|&i| self.tracks[i].clone()).collect();
        let mut remaining: Vec<Option<Track>> = self.tracks.drain(..).map(Some).collect();
        for &i in &sorted {
            remaining[i] = None;
        }
        let mut rebuilt: Vec<Track> = remaining.into_iter().flatten().collect();

        for (&target, track) in targets.iter().zip(moving.into_iter()) {
            let insert_at = target.min(rebuilt.len());
            rebuilt.insert(insert_at, track);
        }
        self.tracks = rebuilt;
        Some(targets)
    }
}

impl Default for PlayingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Seeds the shuffle RNG from the OS entropy source directly, rather than
/// relying on `rand`'s own entropy plumbing, so the seed source is explicit.
fn seeded_rng() -> StdRng {
    let mut seed = [0u8; 32];
    getrandom::fill(&mut seed).expect("failed to read OS entropy for shuffle RNG seed");
    StdRng::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn track(id: u64) -> Track {
        Track {
            id,
            path: PathBuf::from(format!("/music/{id}.flac")),
            title: format!("Track {id}"),
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn empty_queue_has_no_current() {
        let q = PlayingQueue::new();
        assert_eq!(q.current_index(), -1);
        assert!(q.current_track().is_none());
    }

    #[test]
    fn add_and_play_sets_index_to_first_new() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1)]);
        let played = q.add_and_play(vec![track(2), track(3)]).unwrap();
        assert_eq!(played.id, 2);
        assert_eq!(q.current_index(), 1);
    }

    #[test]
    fn remove_before_current_decrements_index() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2), track(3)]);
        q.jump_to(2);
        q.remove_at(0);
        assert_eq!(q.current_index(), 1);
        assert_eq!(q.current_track().unwrap().id, 3);
    }

    #[test]
    fn remove_current_clears_index() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2)]);
        q.jump_to(0);
        q.remove_at(0);
        assert_eq!(q.current_index(), -1);
    }

    #[test]
    fn sequential_advance_and_repeat_all_wraps() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2), track(3)]);
        q.set_repeat_mode(RepeatMode::All);
        q.jump_to(0);
        assert_eq!(q.next().unwrap().id, 2);
        assert_eq!(q.next().unwrap().id, 3);
        assert_eq!(q.next().unwrap().id, 1);
    }

    #[test]
    fn repeat_off_ends_at_last_track() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2)]);
        q.jump_to(1);
        assert!(q.next().is_none());
        assert_eq!(q.current_index(), 1);
    }

    #[test]
    fn repeat_one_returns_same_track_indefinitely() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2)]);
        q.set_repeat_mode(RepeatMode::One);
        q.jump_to(0);
        assert_eq!(q.next().unwrap().id, 1);
        assert_eq!(q.next().unwrap().id, 1);
        assert_eq!(q.current_index(), 0);
    }

    #[test]
    fn jump_to_out_of_range_is_rejected() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1)]);
        assert!(q.jump_to(-1).is_none());
        assert!(q.jump_to(5).is_none());
        assert_eq!(q.current_index(), -1);
    }

    #[test]
    fn move_indices_preserves_relative_order() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2), track(3), track(4)]);
        let moved = q.move_indices(&[0, 1], 2).unwrap();
        assert_eq!(moved, vec![2, 3]);
        let ids: Vec<u64> = q.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 4, 1, 2]);
    }

    #[test]
    fn move_indices_out_of_bounds_fails_without_mutating() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2)]);
        assert!(q.move_indices(&[1], 5).is_none());
        let ids: Vec<u64> = q.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn shuffle_never_repeats_current_with_multiple_tracks() {
        let mut q = PlayingQueue::new();
        q.add(vec![track(1), track(2), track(3)]);
        q.set_shuffle(true);
        q.jump_to(0);
        for _ in 0..20 {
            let next = q.peek_next().unwrap();
            assert_ne!(next.id, 1);
        }
    }
}
