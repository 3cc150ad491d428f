//! `FileInfo`/`TagData`: Picard-compatible metadata read from an audio file at open time.
//!
//! Grounded on `metadata/metadata_tags.rs`'s lofty-backed reader; expanded
//! from a small metadata subset to the full Picard-compatible field list.

use std::path::Path;

use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::prelude::{Accessor, ItemKey, TagExt};
use lofty::probe::Probe;
use log::debug;

/// Metadata read from (or, out of this core's scope, written to) an audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInfo {
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub title: String,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,
    /// "YYYY" or "YYYY-MM-DD".
    pub date: String,
    /// "YYYY" or "YYYY-MM-DD".
    pub original_date: String,
    /// Semicolon-delimited list.
    pub genre: String,
    pub sort_name: String,
    pub label: String,
    pub catalog_number: String,
    pub barcode: String,
    pub media: String,
    pub release_status: String,
    pub release_type: String,
    pub release_script: String,
    pub release_country: String,
    pub musicbrainz_artist_id: String,
    pub musicbrainz_release_id: String,
    pub musicbrainz_release_group_id: String,
    pub musicbrainz_recording_id: String,
    pub musicbrainz_release_track_id: String,
    pub isrc: String,
    pub cover_art: Option<CoverArt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverArt {
    pub mime_type: String,
    pub data: Vec<u8>,
}

fn get_string(tagged: &TaggedFile, key: ItemKey) -> String {
    tagged
        .primary_tag()
        .and_then(|tag| tag.get_string(&key))
        .or_else(|| {
            tagged
                .tags()
                .iter()
                .find_map(|tag| tag.get_string(&key))
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn get_u32(tagged: &TaggedFile, key: ItemKey) -> Option<u32> {
    let raw = get_string(tagged, key);
    if raw.is_empty() {
        return None;
    }
    raw.split(['/', ' ']).next()?.parse::<u32>().ok()
}

/// Reads the full Picard-compatible tag set from `path`. Returns a default
/// (all-empty) `FileInfo` if the file carries no tags at all, matching the
/// a missing-field-is-not-an-error stance on metadata reads.
pub fn read_file_info(path: &Path) -> crate::error::Result<FileInfo> {
    let tagged = Probe::open(path)
        .map_err(|e| crate::error::Error::IoError(e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::DecoderError(e.to_string()))?;

    let title = tagged
        .primary_tag()
        .and_then(|t| t.title())
        .map(|v| v.into_owned())
        .unwrap_or_default();
    let artist = tagged
        .primary_tag()
        .and_then(|t| t.artist())
        .map(|v| v.into_owned())
        .unwrap_or_default();
    let album = tagged
        .primary_tag()
        .and_then(|t| t.album())
        .map(|v| v.into_owned())
        .unwrap_or_default();
    let genre = tagged
        .primary_tag()
        .and_then(|t| t.genre())
        .map(|v| v.into_owned())
        .unwrap_or_default();

    let cover_art = tagged.primary_tag().and_then(|tag| {
        tag.pictures().first().map(|pic| CoverArt {
            mime_type: pic
                .mime_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data: pic.data().to_vec(),
        })
    });

    debug!("read_file_info: {} -> title={:?}", path.display(), title);

    Ok(FileInfo {
        artist,
        album_artist: get_string(&tagged, ItemKey::AlbumArtist),
        album,
        title,
        track_number: get_u32(&tagged, ItemKey::TrackNumber),
        total_tracks: get_u32(&tagged, ItemKey::TrackTotal),
        disc_number: get_u32(&tagged, ItemKey::DiscNumber),
        total_discs: get_u32(&tagged, ItemKey::DiscTotal),
        date: get_string(&tagged, ItemKey::RecordingDate),
        original_date: get_string(&tagged, ItemKey::OriginalReleaseDate),
        genre,
        sort_name: get_string(&tagged, ItemKey::TitleSortOrder),
        label: get_string(&tagged, ItemKey::Label),
        catalog_number: get_string(&tagged, ItemKey::CatalogNumber),
        barcode: get_string(&tagged, ItemKey::Barcode),
        media: get_string(&tagged, ItemKey::OriginalMediaType),
        release_status: get_string(&tagged, ItemKey::MusicBrainzReleaseStatus),
        release_type: get_string(&tagged, ItemKey::MusicBrainzReleaseType),
        release_script: get_string(&tagged, ItemKey::Script),
        release_country: get_string(&tagged, ItemKey::MusicBrainzReleaseCountry),
        musicbrainz_artist_id: get_string(&tagged, ItemKey::MusicBrainzArtistId),
        musicbrainz_release_id: get_string(&tagged, ItemKey::MusicBrainzReleaseId),
        musicbrainz_release_group_id: get_string(&tagged, ItemKey::MusicBrainzReleaseGroupId),
        musicbrainz_recording_id: get_string(&tagged, ItemKey::MusicBrainzRecordingId),
        musicbrainz_release_track_id: get_string(&tagged, ItemKey::MusicBrainzTrackId),
        isrc: get_string(&tagged, ItemKey::ISRC),
        cover_art,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_info_is_all_empty() {
        let info = FileInfo::default();
        assert!(info.title.is_empty());
        assert!(info.cover_art.is_none());
        assert_eq!(info.track_number, None);
    }
}
