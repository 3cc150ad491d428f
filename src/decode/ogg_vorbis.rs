//! Ogg/Vorbis decode adapter: our own page/packet reassembly (`crate::ogg`)
//! feeding `lewton`'s header parser and per-packet decoder directly, rather
//! than delegating demuxing to `lewton::inside_ogg`.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lewton::audio::{read_audio_packet, PreviousWindowRight};
use lewton::header::{read_header_comment, read_header_ident, read_header_setup, IdentHeader, SetupHeader};

use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};
use crate::ogg::{seek_by_granule, PageReader};

pub struct OggVorbisStream {
    path: PathBuf,
    reader: PageReader<BufReader<File>>,
    ident: IdentHeader,
    setup: SetupHeader,
    pwr: PreviousWindowRight,
    channels: u8,
    data_start: u64,
    file_size: u64,
    len_frames: u64,
    position: u64,
    pending: VecDeque<Frame>,
    error: Option<Error>,
    closed: bool,
}

impl OggVorbisStream {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = PageReader::new(BufReader::new(file));

        let ident_packet = reader.next_packet()?.ok_or(Error::InvalidContainer)?;
        let ident = read_header_ident(&ident_packet).map_err(|e| Error::DecoderError(e.to_string()))?;

        let comment_packet = reader.next_packet()?.ok_or(Error::InvalidContainer)?;
        let _ = read_header_comment(&comment_packet).map_err(|e| Error::DecoderError(e.to_string()))?;

        let setup_packet = reader.next_packet()?.ok_or(Error::InvalidContainer)?;
        let setup = read_header_setup(
            &setup_packet,
            ident.audio_channels,
            (ident.blocksize_0, ident.blocksize_1),
        )
        .map_err(|e| Error::DecoderError(e.to_string()))?;

        let data_start = reader.position();
        let len_frames = last_granule(path, file_size)?.max(0) as u64;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            channels: ident.audio_channels,
            ident,
            setup,
            pwr: PreviousWindowRight::new(),
            data_start,
            file_size,
            len_frames,
            position: 0,
            pending: VecDeque::new(),
            error: None,
            closed: false,
        })
    }

    fn decode_one_packet(&mut self) -> Result<bool> {
        let Some(packet) = self.reader.next_packet()? else {
            return Ok(false);
        };
        match read_audio_packet(&self.ident, &self.setup, &packet, &mut self.pwr) {
            Ok(per_channel) => {
                let frames = per_channel.first().map(|c| c.len()).unwrap_or(0);
                for i in 0..frames {
                    let left = per_channel[0][i];
                    let right = if self.channels >= 2 {
                        per_channel[1][i]
                    } else {
                        left
                    };
                    self.pending.push_back((
                        left as f32 / i16::MAX as f32,
                        right as f32 / i16::MAX as f32,
                    ));
                }
                Ok(true)
            }
            // Corrupt packets are skipped; keeps the stream alive the way a
            // lossy format's error-resilient players behave.
            Err(_) => Ok(true),
        }
    }

    fn fill_pending(&mut self) -> bool {
        loop {
            if !self.pending.is_empty() {
                return true;
            }
            match self.decode_one_packet() {
                Ok(true) => continue,
                Ok(false) => return false,
                Err(e) => {
                    self.error = Some(e);
                    return false;
                }
            }
        }
    }
}

/// Scans the whole file once for the final page's granule position, which
/// is the Vorbis stream's total sample count.
fn last_granule(path: &Path, file_size: u64) -> Result<i64> {
    let file = File::open(path)?;
    let mut reader = PageReader::new(BufReader::new(file));
    let mut last = 0i64;
    while let Some(page) = reader.read_page()? {
        if page.granule_position >= 0 {
            last = page.granule_position;
        }
        if page.byte_offset >= file_size.saturating_sub(1) {
            break;
        }
    }
    Ok(last)
}

impl SampleStream for OggVorbisStream {
    fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let mut written = 0;
        while written < buf.len() {
            if let Some(frame) = self.pending.pop_front() {
                buf[written] = frame;
                written += 1;
                self.position += 1;
                continue;
            }
            if !self.fill_pending() {
                return (written, false);
            }
        }
        (written, true)
    }

    fn len(&self) -> u64 {
        self.len_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let target = frame.min(self.len_frames) as i64;
        let file = File::open(&self.path)?;
        let mut cursor = BufReader::new(file);
        let (offset, _) = seek_by_granule(&mut cursor, self.data_start, self.file_size, target)?;

        self.reader.seek_to_byte(offset)?;
        self.pwr = PreviousWindowRight::new();
        self.pending.clear();

        // Ogg/Vorbis packets decode relative to the previous window; the
        // first packet after a seek is discarded and position settles on
        // the following packet's boundary rather than an exact sample.
        let _ = self.decode_one_packet();
        self.pending.clear();

        self.position = target.max(0) as u64;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.ident.audio_sample_rate
    }

    fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_page(granule: i64, serial: u32, seq: u32, segment_lens: &[u8], data: &[u8]) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(0); // header type
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&seq.to_le_bytes());
        page.extend_from_slice(&0u32.to_le_bytes()); // checksum, unchecked
        page.push(segment_lens.len() as u8);
        page.extend_from_slice(segment_lens);
        page.extend_from_slice(data);
        page
    }

    #[test]
    fn last_granule_picks_final_non_negative_position() {
        let mut bytes = Vec::new();
        bytes.extend(build_page(-1, 1, 0, &[10], &[0u8; 10]));
        bytes.extend(build_page(4_410, 1, 1, &[10], &[0u8; 10]));
        bytes.extend(build_page(8_820, 1, 2, &[10], &[0u8; 10]));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let granule = last_granule(file.path(), bytes.len() as u64).unwrap();
        assert_eq!(granule, 8_820);
    }

    #[test]
    fn last_granule_on_empty_file_is_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let granule = last_granule(file.path(), 0).unwrap();
        assert_eq!(granule, 0);
    }
}
