//! FLAC decode adapter, backed by symphonia's flac feature.
//!
//! FLAC files occasionally carry a leading ID3v2 tag (Picard and others
//! write one); symphonia's flac reader expects the `fLaC` marker at byte 0,
//! so we skip the ID3v2 block ourselves before probing.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::decode::symphonia_common::SymphoniaStream;
use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};

pub struct FlacStream {
    inner: SymphoniaStream,
}

impl FlacStream {
    pub fn open(path: &Path) -> Result<Self> {
        skip_leading_id3v2(path)?;
        Ok(Self {
            inner: SymphoniaStream::open(path, "flac")?,
        })
    }
}

/// Returns an error if the file opens with an ID3v2 header whose declared
/// size runs past end of file; otherwise a no-op (symphonia's own probe
/// skips leading ID3v2 blocks, this only guards against a truncated one).
fn skip_leading_id3v2(path: &Path) -> Result<()> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 10];
    let n = file.read(&mut header)?;
    if n < 10 || &header[0..3] != b"ID3" {
        return Ok(());
    }
    // Syncsafe 28-bit size: each of the 4 bytes uses only its low 7 bits.
    let size = ((header[6] as u32) << 21)
        | ((header[7] as u32) << 14)
        | ((header[8] as u32) << 7)
        | (header[9] as u32);
    let file_len = file.metadata()?.len();
    if 10 + size as u64 > file_len {
        return Err(Error::TruncatedHeader);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn syncsafe_size_bytes(size: u32) -> [u8; 4] {
        [
            ((size >> 21) & 0x7f) as u8,
            ((size >> 14) & 0x7f) as u8,
            ((size >> 7) & 0x7f) as u8,
            (size & 0x7f) as u8,
        ]
    }

    fn id3v2_header(declared_size: u32) -> Vec<u8> {
        let mut header = Vec::with_capacity(10);
        header.extend_from_slice(b"ID3");
        header.extend_from_slice(&[4, 0]); // version 2.4.0
        header.push(0); // flags
        header.extend_from_slice(&syncsafe_size_bytes(declared_size));
        header
    }

    #[test]
    fn no_id3v2_header_is_a_no_op() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fLaC\x00\x00\x00\x22").unwrap();
        file.flush().unwrap();

        assert!(skip_leading_id3v2(file.path()).is_ok());
    }

    #[test]
    fn truncated_declared_size_is_an_error() {
        let mut bytes = id3v2_header(1_000);
        bytes.extend_from_slice(b"short tail"); // far short of the declared 1000 bytes

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let err = skip_leading_id3v2(file.path()).unwrap_err();
        assert!(matches!(err, Error::TruncatedHeader));
    }

    #[test]
    fn valid_declared_size_within_file_bounds_is_ok() {
        let tag_body = vec![0u8; 16];
        let mut bytes = id3v2_header(tag_body.len() as u32);
        bytes.extend_from_slice(&tag_body);
        bytes.extend_from_slice(b"fLaC\x00\x00\x00\x22");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        assert!(skip_leading_id3v2(file.path()).is_ok());
    }

    #[test]
    fn file_shorter_than_a_full_header_is_a_no_op() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ID3\x04").unwrap();
        file.flush().unwrap();

        assert!(skip_leading_id3v2(file.path()).is_ok());
    }
}

impl SampleStream for FlacStream {
    fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        self.inner.stream(buf)
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.inner.seek(frame)
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn err(&self) -> Option<&Error> {
        self.inner.err()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
