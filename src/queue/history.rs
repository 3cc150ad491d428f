//! Bounded undo/redo stack of queue snapshots.

use crate::track::Track;

/// Deep-copied snapshots of a track sequence, with a cursor into them.
/// Pushing a new snapshot truncates anything past the cursor (the usual
/// undo-tree-as-a-stack behaviour); once `max` is exceeded the oldest
/// snapshot is dropped and the cursor shifts down to match.
pub struct QueueHistory {
    snapshots: Vec<Vec<Track>>,
    cursor: usize,
    max: usize,
}

impl QueueHistory {
    pub fn new(max: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            max: max.max(1),
        }
    }

    pub fn push(&mut self, tracks: Vec<Track>) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(tracks);
        self.cursor = self.snapshots.len() - 1;

        if self.snapshots.len() > self.max {
            let drop_count = self.snapshots.len() - self.max;
            self.snapshots.drain(0..drop_count);
            self.cursor = self.cursor.saturating_sub(drop_count);
        }
    }

    pub fn undo(&mut self) -> Option<Vec<Track>> {
        if self.snapshots.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.snapshots[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<Vec<Track>> {
        if self.snapshots.is_empty() || self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.snapshots[self.cursor].clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
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
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn bounded_length_drops_oldest() {
        let mut history = QueueHistory::new(2);
        history.push(vec![track(1)]);
        history.push(vec![track(2)]);
        history.push(vec![track(3)]);
        assert_eq!(history.len(), 2);
        let restored = history.undo().unwrap();
        assert_eq!(restored, vec![track(2)]);
    }

    #[test]
    fn undo_then_redo_restores_exact_snapshot() {
        let mut history = QueueHistory::new(10);
        history.push(vec![track(1)]);
        history.push(vec![track(1), track(2)]);
        let pre_undo = vec![track(1), track(2)];

        let undone = history.undo().unwrap();
        assert_eq!(undone, vec![track(1)]);
        let redone = history.redo().unwrap();
        assert_eq!(redone, pre_undo);
    }

    #[test]
    fn push_truncates_redo_branch() {
        let mut history = QueueHistory::new(10);
        history.push(vec![track(1)]);
        history.push(vec![track(2)]);
        history.undo();
        history.push(vec![track(3)]);
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_at_start_and_redo_at_end_return_none() {
        let mut history = QueueHistory::new(10);
        assert!(history.undo().is_none());
        history.push(vec![track(1)]);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }
}
