//! MP3 decode adapter, backed by symphonia's mp3 feature.

use std::path::Path;

use crate::decode::symphonia_common::SymphoniaStream;
use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};

pub struct Mp3Stream {
    inner: SymphoniaStream,
}

impl Mp3Stream {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            inner: SymphoniaStream::open(path, "mp3")?,
        })
    }
}

impl SampleStream for Mp3Stream {
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
