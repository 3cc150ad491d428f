//! Shared symphonia-backed decode loop for mp3/flac/m4a.
//!
//! Grounded on `audio_decoder.rs`'s symphonia probe/decode worker: probe by
//! extension hint, pull packets from the one audio track, decode to a
//! `SampleBuffer<f32>`, and hand frames to the caller. The three format
//! adapters differ only in the extension hint they pass in, so the loop
//! itself lives here once.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::decode::Frame;
use crate::error::{Error, Result};

pub struct SymphoniaStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    len_frames: u64,
    position: u64,
    pending: std::collections::VecDeque<Frame>,
    error: Option<Error>,
    closed: bool,
}

impl SymphoniaStream {
    pub fn open(path: &Path, extension_hint: &str) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension_hint);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::DecoderError(e.to_string()))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(Error::InvalidContainer)?;
        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
        let n_frames = track.codec_params.n_frames.unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::DecoderError(e.to_string()))?;

        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let mut stream = Self {
            format,
            decoder,
            track_id,
            sample_rate,
            len_frames: n_frames,
            position: 0,
            pending: std::collections::VecDeque::new(),
            error: None,
            closed: false,
        };

        if n_frames == 0 {
            stream.len_frames = stream.estimate_len_frames(file_size);
        }

        Ok(stream)
    }

    /// A file with no frame-count metadata (e.g. a CBR MP3 with no Xing/LAME
    /// header) has no authoritative sample count to read. Decodes the first
    /// packet belonging to our track, then scales its byte size and sample
    /// count up by the ratio of the whole file's size to that one packet's
    /// size: for constant-bitrate audio every packet carries the same number
    /// of compressed bytes per sample, so that ratio holds across the file.
    fn estimate_len_frames(&mut self, file_size: u64) -> u64 {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(_) => return 0,
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let packet_bytes = packet.data().len() as u64;
            let packet_frames = packet.dur();
            let estimate = estimate_frames_from_ratio(file_size, packet_bytes, packet_frames);
            self.decode_one(packet);
            return estimate;
        }
    }

    fn decode_one(&mut self, packet: Packet) -> bool {
        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                let samples = buf.samples();
                match channels {
                    1 => {
                        for s in samples {
                            self.pending.push_back((*s, *s));
                        }
                    }
                    2 => {
                        for pair in samples.chunks_exact(2) {
                            self.pending.push_back((pair[0], pair[1]));
                        }
                    }
                    n if n > 2 => {
                        for frame in samples.chunks_exact(n) {
                            self.pending.push_back((frame[0], frame[1]));
                        }
                    }
                    _ => {}
                }
                !self.pending.is_empty()
            }
            Err(SymError::DecodeError(_)) => false,
            Err(e) => {
                self.error = Some(Error::DecoderError(e.to_string()));
                false
            }
        }
    }

    fn fill_pending(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return false;
                }
                Err(e) => {
                    self.error = Some(Error::DecoderError(e.to_string()));
                    return false;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            if self.decode_one(packet) {
                return true;
            }
            if self.error.is_some() {
                return false;
            }
        }
    }

    pub fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool) {
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

    pub fn len(&self) -> u64 {
        self.len_frames
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, frame: u64) -> Result<()> {
        let target = if self.len_frames > 0 {
            frame.min(self.len_frames)
        } else {
            frame
        };
        let seconds = target as f64 / self.sample_rate.max(1) as f64;
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(seconds),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::DecoderError(e.to_string()))?;
        self.decoder.reset();
        self.pending.clear();
        self.position = target;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Scales a single packet's sample count up by the ratio of the whole
/// file's byte size to that packet's own byte size.
fn estimate_frames_from_ratio(file_size: u64, packet_bytes: u64, packet_frames: u64) -> u64 {
    if packet_bytes == 0 {
        return 0;
    }
    (file_size as u128 * packet_frames as u128 / packet_bytes as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_packet_by_file_to_packet_byte_ratio() {
        // A 1,000-byte CBR MP3 frame carrying 1,152 samples, in a 100,000
        // byte file, implies roughly 100x as many samples overall.
        let estimate = estimate_frames_from_ratio(100_000, 1_000, 1_152);
        assert_eq!(estimate, 115_200);
    }

    #[test]
    fn estimate_is_zero_for_a_zero_byte_packet() {
        assert_eq!(estimate_frames_from_ratio(100_000, 0, 1_152), 0);
    }
}
