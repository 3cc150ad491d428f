//! Gapless switch: swaps to a pre-loaded next stream at the exact sample
//! boundary where the current one ends.

use crate::decode::{Frame, SampleStream};
use crate::pipeline::FrameSource;

pub struct GaplessStreamer {
    current: Box<dyn SampleStream>,
    next: Option<Box<dyn SampleStream>>,
    on_switch: Option<Box<dyn FnMut() + Send>>,
}

impl GaplessStreamer {
    pub fn new(current: Box<dyn SampleStream>) -> Self {
        Self {
            current,
            next: None,
            on_switch: None,
        }
    }

    pub fn set_on_switch(&mut self, cb: Box<dyn FnMut() + Send>) {
        self.on_switch = Some(cb);
    }

    pub fn attach_next(&mut self, next: Box<dyn SampleStream>) {
        self.next = Some(next);
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn clear_next(&mut self) {
        if let Some(mut next) = self.next.take() {
            next.close();
        }
    }

    /// Replaces `current` outright (used by `Player::open`, not the
    /// mid-stream switch path).
    pub fn replace_current(&mut self, current: Box<dyn SampleStream>) {
        self.current.close();
        self.current = current;
        self.next = None;
    }

    pub fn current(&self) -> &dyn SampleStream {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> &mut dyn SampleStream {
        self.current.as_mut()
    }
}

impl FrameSource for GaplessStreamer {
    fn pull(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let (written, more) = self.current.stream(buf);
        if written == buf.len() || more {
            return (written, more || written > 0);
        }

        // Current stream is exhausted; switch if a next track is queued.
        if let Some(next) = self.next.take() {
            self.current.close();
            self.current = next;
            if let Some(cb) = self.on_switch.as_mut() {
                cb();
            }
            let (more_written, more) = self.current.stream(&mut buf[written..]);
            return (written + more_written, more || (written + more_written) > 0);
        }

        (written, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};

    struct Fixed {
        remaining: usize,
    }

    impl SampleStream for Fixed {
        fn stream(&mut self, buf: &mut [Frame]) -> (usize, bool) {
            let n = self.remaining.min(buf.len());
            for frame in &mut buf[..n] {
                *frame = (1.0, 1.0);
            }
            self.remaining -= n;
            (n, self.remaining > 0)
        }
        fn len(&self) -> u64 {
            self.remaining as u64
        }
        fn position(&self) -> u64 {
            0
        }
        fn seek(&mut self, _frame: u64) -> Result<()> {
            Ok(())
        }
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn err(&self) -> Option<&Error> {
            None
        }
        fn close(&mut self) {}
    }

    #[test]
    fn switches_to_next_at_exact_boundary() {
        let mut streamer = GaplessStreamer::new(Box::new(Fixed { remaining: 3 }));
        streamer.attach_next(Box::new(Fixed { remaining: 5 }));

        let mut buf = [(0.0, 0.0); 10];
        let (n, more) = streamer.pull(&mut buf);
        assert_eq!(n, 8); // 3 from current + 5 from next
        assert!(more);
        assert!(!streamer.has_next());
    }

    #[test]
    fn no_next_ends_stream() {
        let mut streamer = GaplessStreamer::new(Box::new(Fixed { remaining: 2 }));
        let mut buf = [(0.0, 0.0); 10];
        let (n, more) = streamer.pull(&mut buf);
        assert_eq!(n, 2);
        assert!(!more);
    }
}
