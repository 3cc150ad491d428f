//! Decoder adapters: a uniform seekable-sample-stream abstraction over every
//! supported container/codec.

pub mod flac;
pub mod m4a;
pub mod mp3;
pub mod ogg_opus;
pub mod ogg_vorbis;
mod symphonia_common;

use std::path::Path;

use crate::error::{Error, Result};

/// One stereo sample pair, normalised to `[-1.0, 1.0]`.
pub type Frame = (f32, f32);

/// The common contract every decoder adapter implements.
///
/// The pipeline always normalises to two-channel float output; mono sources
/// duplicate their single sample into both channels.
pub trait SampleStream: Send {
    /// Writes up to `buf.len()` stereo frames. The second element of the
    /// return tuple is `true` while the stream has not definitively ended.
    fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool);

    /// Total frame count, computed from duration or container/granule math.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current frame position.
    fn position(&self) -> u64;

    /// Clamps `frame` to `[0, len()]`; after return, `position()` reports the
    /// clamped target.
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// The native sample rate of the decoded stream (before resampling).
    fn sample_rate(&self) -> u32;

    /// Terminal decode error, if streaming has ended abnormally.
    fn err(&self) -> Option<&Error>;

    /// Releases the decoder and any open file handle. Idempotent.
    fn close(&mut self);
}

/// Opens a file by extension: `.mp3`, `.flac`, `.opus`, `.ogg`,
/// `.oga`, `.m4a`, `.mp4`. Any other extension is `UnsupportedFormat`.
pub fn open(path: &Path) -> Result<Box<dyn SampleStream>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or(Error::UnsupportedFormat)?;

    match ext.as_str() {
        "mp3" => Ok(Box::new(mp3::Mp3Stream::open(path)?)),
        "flac" => Ok(Box::new(flac::FlacStream::open(path)?)),
        "m4a" | "mp4" => Ok(Box::new(m4a::M4aStream::open(path)?)),
        "opus" | "ogg" | "oga" => open_ogg(path),
        _ => Err(Error::UnsupportedFormat),
    }
}

/// `.ogg`/`.oga`/`.opus` may carry either Opus or Vorbis; the codec is
/// identified from the first packet regardless of which extension was used.
fn open_ogg(path: &Path) -> Result<Box<dyn SampleStream>> {
    use std::fs::File;
    use std::io::BufReader;

    let file = File::open(path)?;
    let mut peek_reader = crate::ogg::PageReader::new(BufReader::new(file));
    let first_packet = peek_reader
        .next_packet()?
        .ok_or(Error::InvalidContainer)?;

    match crate::ogg::probe::detect_codec(&first_packet)? {
        crate::ogg::probe::Codec::Opus => Ok(Box::new(ogg_opus::OggOpusStream::open(path)?)),
        crate::ogg::probe::Codec::Vorbis => Ok(Box::new(ogg_vorbis::OggVorbisStream::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = open(&PathBuf::from("/tmp/song.wav")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let err = open(&PathBuf::from("/tmp/song")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat));
    }
}
