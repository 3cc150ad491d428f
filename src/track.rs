//! Track value type shared across the queue, player and event payloads.

use std::path::PathBuf;
use std::time::Duration;

/// A playable item. Cheap to clone; copied across every trust boundary
/// (queue getters, history snapshots, event payloads) so callers can never
/// mutate shared state through a returned value.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Stable library id, or 0 if this track did not come from the library
    /// (an ad-hoc file path played directly).
    pub id: u64,
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: u32,
    pub duration: Duration,
}

impl Track {
    /// Builds a Track for a bare file path with no library metadata.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            id: 0,
            path,
            title,
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            duration: Duration::ZERO,
        }
    }

    /// Invariant check used by tests and defensively by the queue: path must
    /// be non-empty (duration has no representable negative state in Rust's
    /// `Duration`, so negative durations are unrepresentable by construction).
    pub fn is_valid(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_derives_title_from_file_stem() {
        let track = Track::from_path("/music/Artist/Album/03 Song Name.flac");
        assert_eq!(track.title, "03 Song Name");
        assert_eq!(track.id, 0);
        assert!(track.is_valid());
    }

    #[test]
    fn empty_path_is_invalid() {
        let track = Track {
            id: 1,
            path: PathBuf::new(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            duration: Duration::ZERO,
        };
        assert!(!track.is_valid());
    }
}
