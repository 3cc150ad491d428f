//! Tunables for the playback core, supplied by the (out-of-scope) config layer.

/// Default tunables, all overridable at construction time.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_sink_sample_rate_hz")]
    pub sink_sample_rate_hz: u32,
    #[serde(default = "default_sink_channels")]
    pub sink_channels: u16,
    #[serde(default = "default_preload_at_ms")]
    pub preload_at_ms: u64,
    #[serde(default = "default_monitor_tick_ms")]
    pub monitor_tick_ms: u64,
    #[serde(default = "default_seek_settle_ms")]
    pub seek_settle_ms: u64,
    #[serde(default = "default_subscription_capacity")]
    pub subscription_capacity: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_dither_on_bitdepth_reduce")]
    pub dither_on_bitdepth_reduce: bool,
}

fn default_sink_sample_rate_hz() -> u32 {
    44_100
}
fn default_sink_channels() -> u16 {
    2
}
fn default_preload_at_ms() -> u64 {
    3_000
}
fn default_monitor_tick_ms() -> u64 {
    500
}
fn default_seek_settle_ms() -> u64 {
    100
}
fn default_subscription_capacity() -> usize {
    16
}
fn default_history_limit() -> usize {
    64
}
fn default_dither_on_bitdepth_reduce() -> bool {
    true
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sink_sample_rate_hz: default_sink_sample_rate_hz(),
            sink_channels: default_sink_channels(),
            preload_at_ms: default_preload_at_ms(),
            monitor_tick_ms: default_monitor_tick_ms(),
            seek_settle_ms: default_seek_settle_ms(),
            subscription_capacity: default_subscription_capacity(),
            history_limit: default_history_limit(),
            dither_on_bitdepth_reduce: default_dither_on_bitdepth_reduce(),
        }
    }
}

/// Opus pre-roll floor: the minimum run of samples to decode-and-discard
/// after a granule-based seek so the decoder re-converges, used when the
/// landed page's granule already sits this close to (or past) the target.
pub const OPUS_PRE_ROLL_SAMPLES_AT_48K: u64 = 3_840; // 80ms @ 48kHz
