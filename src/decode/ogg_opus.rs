//! Ogg/Opus decode adapter: our own page/packet reassembly (`crate::ogg`)
//! feeding `audiopus`'s libopus decoder one packet at a time.
//!
//! Opus always decodes at 48 kHz regardless of the identification header's
//! `original_sample_rate`, which is only a resampling hint for playback
//! devices that can't run at 48 kHz natively.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use audiopus::coder::Decoder as OpusDecoder;
use audiopus::{Channels, SampleRate};

use crate::config::OPUS_PRE_ROLL_SAMPLES_AT_48K;
use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};
use crate::ogg::probe::{parse_opus_header, OpusHeader};
use crate::ogg::{seek_by_granule, PageReader};

const OPUS_SAMPLE_RATE: u32 = 48_000;
/// Largest Opus frame: 120 ms at 48 kHz.
const MAX_FRAME_SAMPLES: usize = 5_760;

pub struct OggOpusStream {
    path: PathBuf,
    reader: PageReader<BufReader<File>>,
    decoder: OpusDecoder,
    header: OpusHeader,
    data_start: u64,
    file_size: u64,
    len_frames: u64,
    position: u64,
    pending: VecDeque<Frame>,
    error: Option<Error>,
    closed: bool,
    /// Frames still to discard after a seek: the gap between the landed
    /// page's granule and the seek target, floored at the decoder's minimum
    /// re-convergence run.
    preroll_remaining: u64,
}

impl OggOpusStream {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = PageReader::new(BufReader::new(file));

        let ident_packet = reader.next_packet()?.ok_or(Error::InvalidContainer)?;
        let header = parse_opus_header(&ident_packet)?;

        // Comment header ("OpusTags"), required by the format, unused here.
        reader.next_packet()?.ok_or(Error::InvalidContainer)?;

        let channels = if header.channels >= 2 {
            Channels::Stereo
        } else {
            Channels::Mono
        };
        let decoder = OpusDecoder::new(SampleRate::Hz48000, channels)
            .map_err(|e| Error::DecoderError(e.to_string()))?;

        let data_start = reader.position();
        let raw_len = last_granule(path, file_size)?.max(0) as u64;
        let len_frames = raw_len.saturating_sub(header.pre_skip as u64);

        let mut stream = Self {
            path: path.to_path_buf(),
            reader,
            decoder,
            header,
            data_start,
            file_size,
            len_frames,
            position: 0,
            pending: VecDeque::new(),
            error: None,
            closed: false,
            preroll_remaining: 0,
        };
        stream.preroll_remaining = stream.header.pre_skip as u64;
        Ok(stream)
    }

    fn decode_one_packet(&mut self) -> Result<bool> {
        let Some(packet) = self.reader.next_packet()? else {
            return Ok(false);
        };
        let mut out = vec![0i16; MAX_FRAME_SAMPLES * self.header.channels.max(1) as usize];
        match self.decoder.decode(Some(&packet), &mut out, false) {
            Ok(frame_count) => {
                let channels = self.header.channels.max(1) as usize;
                for i in 0..frame_count {
                    let left = out[i * channels];
                    let right = if channels >= 2 { out[i * channels + 1] } else { left };
                    if self.preroll_remaining > 0 {
                        self.preroll_remaining -= 1;
                        continue;
                    }
                    self.pending.push_back((
                        left as f32 / i16::MAX as f32,
                        right as f32 / i16::MAX as f32,
                    ));
                }
                Ok(true)
            }
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

/// The landed page's granule sits somewhere at or before the target; the
/// decoder needs to re-run from there and discard exactly that gap so
/// playback resumes aligned on the target rather than mid-page. A page with
/// no granule observed yet (`< 0`, i.e. right at the stream start) falls
/// back to the decoder's minimum re-convergence floor, same as a gap
/// smaller than that floor.
fn preroll_for_gap(target_granule: i64, landed_granule: i64) -> u64 {
    let gap = if landed_granule >= 0 {
        (target_granule - landed_granule).max(0) as u64
    } else {
        0
    };
    gap.max(OPUS_PRE_ROLL_SAMPLES_AT_48K)
}

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

impl SampleStream for OggOpusStream {
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
        let target_granule = frame.min(self.len_frames) as i64 + self.header.pre_skip as i64;
        let file = File::open(&self.path)?;
        let mut cursor = BufReader::new(file);
        let (offset, landed_granule) =
            seek_by_granule(&mut cursor, self.data_start, self.file_size, target_granule)?;

        self.reader.seek_to_byte(offset)?;
        self.pending.clear();
        self.preroll_remaining = preroll_for_gap(target_granule, landed_granule);
        self.position = frame.min(self.len_frames);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        OPUS_SAMPLE_RATE
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
        bytes.extend(build_page(48_000, 1, 1, &[10], &[0u8; 10]));
        bytes.extend(build_page(96_000, 1, 2, &[10], &[0u8; 10]));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let granule = last_granule(file.path(), bytes.len() as u64).unwrap();
        assert_eq!(granule, 96_000);
    }

    #[test]
    fn preroll_uses_the_floor_when_the_landed_page_is_close_to_target() {
        // Landed page is 100 samples short of target: well under the 80ms
        // floor, so the floor wins.
        assert_eq!(preroll_for_gap(50_000, 49_900), OPUS_PRE_ROLL_SAMPLES_AT_48K);
    }

    #[test]
    fn preroll_uses_the_actual_gap_when_it_exceeds_the_floor() {
        // A page carrying far more than 80ms of audio landed well short of
        // the target; the gap must win over the fixed floor.
        let gap = 20_000u64;
        assert_eq!(
            preroll_for_gap(100_000, 100_000 - gap as i64),
            gap
        );
    }

    #[test]
    fn preroll_falls_back_to_floor_for_an_unobserved_landed_granule() {
        assert_eq!(preroll_for_gap(10_000, -1), OPUS_PRE_ROLL_SAMPLES_AT_48K);
    }

    #[test]
    fn len_frames_subtracts_pre_skip_from_raw_granule() {
        // len_frames = last granule minus the header's pre_skip; verified
        // directly on the arithmetic rather than via a real encoded stream.
        let raw_len: u64 = 96_000;
        let pre_skip: u64 = 312;
        assert_eq!(raw_len.saturating_sub(pre_skip), 95_688);
    }
}
