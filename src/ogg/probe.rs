//! Codec identification for the first packet of an Ogg stream.
//!
//! Distinguishes Opus from Vorbis by the magic bytes at the head of the
//! first packet's identification header.

use crate::error::{Error, Result};

const OPUS_MAGIC: &[u8; 8] = b"OpusHead";
const VORBIS_MAGIC: &[u8; 6] = b"vorbis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Opus,
    Vorbis,
}

#[derive(Debug, Clone)]
pub struct OpusHeader {
    pub channels: u8,
    pub pre_skip: u16,
    pub original_sample_rate: u32,
}

#[derive(Debug, Clone)]
pub struct VorbisIdHeader {
    pub channels: u8,
    pub sample_rate: u32,
}

/// Inspects the first packet of the first page and identifies the codec.
pub fn detect_codec(first_packet: &[u8]) -> Result<Codec> {
    if first_packet.len() >= 8 && &first_packet[0..8] == OPUS_MAGIC {
        return Ok(Codec::Opus);
    }
    if first_packet.len() >= 7 && first_packet[0] == 0x01 && &first_packet[1..7] == VORBIS_MAGIC {
        return Ok(Codec::Vorbis);
    }
    Err(Error::UnknownCodec)
}

/// Parses the Opus identification header ("OpusHead").
pub fn parse_opus_header(packet: &[u8]) -> Result<OpusHeader> {
    if packet.len() < 19 {
        return Err(Error::TruncatedHeader);
    }
    if &packet[0..8] != OPUS_MAGIC {
        return Err(Error::UnknownCodec);
    }
    let version = packet[8];
    if version != 1 {
        return Err(Error::UnknownCodec);
    }
    let channels = packet[9];
    let pre_skip = u16::from_le_bytes([packet[10], packet[11]]);
    let original_sample_rate = u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]);
    Ok(OpusHeader {
        channels,
        pre_skip,
        original_sample_rate,
    })
}

/// Parses the Vorbis identification header (first of the three header packets).
pub fn parse_vorbis_id_header(packet: &[u8]) -> Result<VorbisIdHeader> {
    if packet.len() < 30 {
        return Err(Error::TruncatedHeader);
    }
    if packet[0] != 0x01 || &packet[1..7] != VORBIS_MAGIC {
        return Err(Error::UnknownCodec);
    }
    let version = u32::from_le_bytes([packet[7], packet[8], packet[9], packet[10]]);
    if version != 0 {
        return Err(Error::UnknownCodec);
    }
    let channels = packet[11];
    let sample_rate = u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]);
    Ok(VorbisIdHeader {
        channels,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opus_head(channels: u8, pre_skip: u16) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(OPUS_MAGIC);
        packet.push(1); // version
        packet.push(channels);
        packet.extend_from_slice(&pre_skip.to_le_bytes());
        packet.extend_from_slice(&48_000u32.to_le_bytes()); // original sample rate
        packet.extend_from_slice(&[0, 0]); // output gain
        packet.push(0); // channel mapping family
        packet
    }

    fn vorbis_id_header(channels: u8, sample_rate: u32) -> Vec<u8> {
        let mut packet = vec![0x01];
        packet.extend_from_slice(VORBIS_MAGIC);
        packet.extend_from_slice(&0u32.to_le_bytes()); // version
        packet.push(channels);
        packet.extend_from_slice(&sample_rate.to_le_bytes());
        packet.extend_from_slice(&[0u8; 12]); // bitrate max/nominal/min
        packet.push(0); // blocksize byte
        packet.push(1); // framing flag
        packet
    }

    #[test]
    fn detects_opus_by_magic() {
        let packet = opus_head(2, 312);
        assert_eq!(detect_codec(&packet).unwrap(), Codec::Opus);
        let header = parse_opus_header(&packet).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.pre_skip, 312);
    }

    #[test]
    fn detects_vorbis_by_magic() {
        let packet = vorbis_id_header(2, 44_100);
        assert_eq!(detect_codec(&packet).unwrap(), Codec::Vorbis);
        let header = parse_vorbis_id_header(&packet).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44_100);
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let packet = vec![0u8; 32];
        assert!(matches!(detect_codec(&packet), Err(Error::UnknownCodec)));
    }
}
