//! Audio output sink. A process-wide endpoint, lazily
//! initialised on the first `open`, never torn down within a process's
//! lifetime.
//!
//! Grounded on `audio/audio_player.rs`'s cpal device selection, stream
//! build, and TPDF-dithered bit-depth reduction for non-float output
//! formats; generalised behind a `Sink` trait so the pipeline doesn't
//! depend on cpal directly and a test double can stand in for it.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::error::{Error, Result};
use crate::pipeline::FrameSource;

/// The process-wide audio output. `push` replaces the frame source the
/// callback is currently pulling from; `on_finish` is invoked from the
/// audio thread the first time a pull reports `more == false`.
pub trait Sink: Send {
    fn push(&mut self, source: Box<dyn FrameSource>, sample_rate: u32) -> Result<()>;
    fn set_finish_callback(&mut self, cb: Box<dyn FnMut() + Send>);
    fn stop(&mut self);
}

struct SharedState {
    source: Option<Box<dyn FrameSource>>,
    on_finish: Option<Box<dyn FnMut() + Send>>,
    finished_fired: bool,
}

/// cpal-backed sink. Picks the device's default output config and adapts
/// every pushed source to it; a source at a different rate must already
/// have gone through the resampler stage before reaching here.
pub struct CpalSink {
    state: Arc<Mutex<SharedState>>,
    stream: Option<cpal::Stream>,
    stream_sample_rate: Option<u32>,
    configured_channels: u16,
    dither_on_bitdepth_reduce: bool,
}

impl CpalSink {
    pub fn new(dither_on_bitdepth_reduce: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                source: None,
                on_finish: None,
                finished_fired: false,
            })),
            stream: None,
            stream_sample_rate: None,
            configured_channels: 2,
            dither_on_bitdepth_reduce,
        }
    }

    fn ensure_stream(&mut self, sample_rate: u32) -> Result<()> {
        if self.stream.is_some() && self.stream_sample_rate == Some(sample_rate) {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DecoderError("no output device".into()))?;
        let supported = choose_best_stream_config(&device, sample_rate)
            .map_err(|e| Error::DecoderError(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        self.configured_channels = config.channels;

        let state = Arc::clone(&self.state);
        let channels = config.channels as usize;
        let dither = self.dither_on_bitdepth_reduce;

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _| {
                        fill_buffer(&state, data, channels, |sample| sample.clamp(-1.0, 1.0), 0.0)
                    },
                    |err| log::error!("cpal stream error: {err}"),
                    None,
                )
                .map_err(|e| Error::DecoderError(e.to_string()))?,
            SampleFormat::I16 => {
                let mut dither_state = 0x6d_75_73_69_63_5f_70_6c_u64;
                device
                    .build_output_stream(
                        &config,
                        move |data: &mut [i16], _| {
                            fill_buffer(
                                &state,
                                data,
                                channels,
                                |sample| quantize_i16(sample, dither, &mut dither_state),
                                0,
                            )
                        },
                        |err| log::error!("cpal stream error: {err}"),
                        None,
                    )
                    .map_err(|e| Error::DecoderError(e.to_string()))?
            }
            SampleFormat::U16 => {
                let mut dither_state = 0x72_6f_71_74_75_6e_65_01_u64;
                device
                    .build_output_stream(
                        &config,
                        move |data: &mut [u16], _| {
                            fill_buffer(
                                &state,
                                data,
                                channels,
                                |sample| quantize_u16(sample, dither, &mut dither_state),
                                u16::MAX / 2 + 1,
                            )
                        },
                        |err| log::error!("cpal stream error: {err}"),
                        None,
                    )
                    .map_err(|e| Error::DecoderError(e.to_string()))?
            }
            other => {
                return Err(Error::DecoderError(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };
        stream.play().map_err(|e| Error::DecoderError(e.to_string()))?;

        self.stream = Some(stream);
        self.stream_sample_rate = Some(sample_rate);
        Ok(())
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Sink for CpalSink {
    fn push(&mut self, source: Box<dyn FrameSource>, sample_rate: u32) -> Result<()> {
        self.ensure_stream(sample_rate)?;
        let mut state = self.state.lock().unwrap();
        state.source = Some(source);
        state.finished_fired = false;
        Ok(())
    }

    fn set_finish_callback(&mut self, cb: Box<dyn FnMut() + Send>) {
        self.state.lock().unwrap().on_finish = Some(cb);
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.source = None;
        state.finished_fired = false;
    }
}

fn fill_buffer<T: Copy>(
    state: &Arc<Mutex<SharedState>>,
    data: &mut [T],
    channels: usize,
    mut quantize: impl FnMut(f32) -> T,
    silence: T,
) {
    let mut guard = state.lock().unwrap();
    let frame_count = data.len() / channels.max(1);
    let mut frames = vec![(0.0f32, 0.0f32); frame_count];

    let (written, more) = match guard.source.as_mut() {
        Some(source) => source.pull(&mut frames),
        None => (0, true),
    };

    for (i, frame) in frames.iter().enumerate().take(written) {
        let base = i * channels;
        if base < data.len() {
            data[base] = quantize(frame.0);
        }
        if channels > 1 && base + 1 < data.len() {
            data[base + 1] = quantize(frame.1);
        }
    }
    for sample in data.iter_mut().skip(written * channels) {
        *sample = silence;
    }

    if !more && !guard.finished_fired {
        guard.finished_fired = true;
        if let Some(cb) = guard.on_finish.as_mut() {
            cb();
        }
    }
}

fn lcg_next(state: &mut u64) -> f32 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    ((*state >> 32) as u32) as f32 / u32::MAX as f32
}

/// Triangular-PDF dither noise in roughly [-1, 1]: the sum of two
/// independent uniform samples.
fn tpdf_noise(state: &mut u64) -> f32 {
    lcg_next(state) + lcg_next(state) - 1.0
}

fn quantize_i16(sample: f32, dither: bool, dither_state: &mut u64) -> i16 {
    let mut clamped = sample.clamp(-1.0, 1.0);
    if dither {
        clamped += tpdf_noise(dither_state) / i16::MAX as f32;
    }
    (clamped * i16::MAX as f32)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn quantize_u16(sample: f32, dither: bool, dither_state: &mut u64) -> u16 {
    let mut clamped = sample.clamp(-1.0, 1.0);
    if dither {
        clamped += tpdf_noise(dither_state) / u16::MAX as f32;
    }
    ((clamped * 0.5 + 0.5) * u16::MAX as f32)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16
}

/// Picks the device's default output config at the requested rate when the
/// device supports it, falling back to the device's own default rate
/// (the resampler stage then bridges the mismatch).
fn choose_best_stream_config(
    device: &cpal::Device,
    preferred_rate: u32,
) -> std::result::Result<cpal::SupportedStreamConfig, cpal::DefaultStreamConfigError> {
    if let Ok(ranges) = device.supported_output_configs() {
        for range in ranges {
            if range.channels() >= 2
                && range.min_sample_rate().0 <= preferred_rate
                && range.max_sample_rate().0 >= preferred_rate
            {
                return Ok(range.with_sample_rate(cpal::SampleRate(preferred_rate)));
            }
        }
    }
    device.default_output_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_i16_maps_full_scale_without_dither() {
        assert_eq!(quantize_i16(1.0, false, &mut 0), i16::MAX);
        assert_eq!(quantize_i16(-1.0, false, &mut 0), i16::MIN);
        assert_eq!(quantize_i16(0.0, false, &mut 0), 0);
    }

    #[test]
    fn quantize_u16_maps_full_scale_without_dither() {
        assert_eq!(quantize_u16(-1.0, false, &mut 0), 0);
        assert_eq!(quantize_u16(1.0, false, &mut 0), u16::MAX);
    }

    #[test]
    fn dither_state_advances_and_stays_in_range() {
        let mut state = 1u64;
        for _ in 0..64 {
            let out = quantize_i16(0.0, true, &mut state);
            assert!(out >= i16::MIN && out <= i16::MAX);
        }
        assert_ne!(state, 1);
    }
}
