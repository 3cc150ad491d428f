//! Sample-rate conversion stage, inserted only when a decoder's native rate
//! differs from the sink's configured rate.
//!
//! Grounded on `audio_decoder.rs`'s rubato usage; wraps a decoder so the
//! rest of the pipeline can keep treating it as an ordinary `SampleStream`.

use rubato::{Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::decode::{Frame, SampleStream};
use crate::error::{Error, Result};

const CHUNK_FRAMES: usize = 1024;

pub struct Resampler {
    inner: Box<dyn SampleStream>,
    resampler: SincFixedIn<f32>,
    in_rate: u32,
    out_rate: u32,
    in_buf: [Vec<f32>; 2],
    out_queue: std::collections::VecDeque<Frame>,
    position: u64,
    eof: bool,
}

impl Resampler {
    pub fn new(inner: Box<dyn SampleStream>, out_rate: u32) -> Result<Self> {
        let in_rate = inner.sample_rate();
        let ratio = out_rate as f64 / in_rate.max(1) as f64;
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, 2)
            .map_err(|e| Error::DecoderError(e.to_string()))?;

        Ok(Self {
            inner,
            resampler,
            in_rate,
            out_rate,
            in_buf: [Vec::with_capacity(CHUNK_FRAMES), Vec::with_capacity(CHUNK_FRAMES)],
            out_queue: std::collections::VecDeque::new(),
            position: 0,
            eof: false,
        })
    }

    fn refill(&mut self) -> bool {
        if self.eof {
            return false;
        }
        let mut raw = vec![(0.0f32, 0.0f32); CHUNK_FRAMES];
        let (written, more) = self.inner.stream(&mut raw);
        if written == 0 {
            self.eof = !more;
            return false;
        }
        self.in_buf[0].clear();
        self.in_buf[1].clear();
        for frame in &raw[..written] {
            self.in_buf[0].push(frame.0);
            self.in_buf[1].push(frame.1);
        }
        // rubato requires exactly its configured chunk size on every call
        // except the final, partial one; pad the tail with silence.
        self.in_buf[0].resize(CHUNK_FRAMES, 0.0);
        self.in_buf[1].resize(CHUNK_FRAMES, 0.0);

        match self.resampler.process(&self.in_buf, None) {
            Ok(out) => {
                let n = out[0].len();
                for i in 0..n {
                    self.out_queue.push_back((out[0][i], out[1][i]));
                }
                if !more {
                    self.eof = true;
                }
                true
            }
            Err(_) => {
                self.eof = true;
                false
            }
        }
    }
}

impl SampleStream for Resampler {
    fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let mut written = 0;
        while written < buf.len() {
            if let Some(frame) = self.out_queue.pop_front() {
                buf[written] = frame;
                written += 1;
                self.position += 1;
                continue;
            }
            if !self.refill() {
                return (written, !self.eof || written > 0);
            }
        }
        (written, true)
    }

    fn len(&self) -> u64 {
        scale(self.inner.len(), self.in_rate, self.out_rate)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let native_frame = scale(frame, self.out_rate, self.in_rate);
        self.inner.seek(native_frame)?;
        self.out_queue.clear();
        self.eof = false;
        self.position = frame.min(self.len());
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.out_rate
    }

    fn err(&self) -> Option<&Error> {
        self.inner.err()
    }

    fn close(&mut self) {
        self.inner.close();
        self.out_queue.clear();
    }
}

fn scale(value: u64, from_rate: u32, to_rate: u32) -> u64 {
    ((value as u128 * to_rate.max(1) as u128) / from_rate.max(1) as u128) as u64
}
