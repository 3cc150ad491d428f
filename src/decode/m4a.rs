//! M4A/MP4 decode adapter (AAC or ALAC payload), backed by symphonia's
//! isomp4/aac/alac features.

use std::path::Path;

use crate::decode::symphonia_common::SymphoniaStream;
use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};

pub struct M4aStream {
    inner: SymphoniaStream,
}

impl M4aStream {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            inner: SymphoniaStream::open(path, "m4a")?,
        })
    }
}

impl SampleStream for M4aStream {
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
