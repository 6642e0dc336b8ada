use thiserror::Error;

/// Construction-time failures. Nothing in the per-pass path returns an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("frame length must be a power of two >= 2, got {0}")]
    FrameLength(usize),

    #[error("bar count must be at least 1")]
    NoBars,

    #[error("exponent span must be positive and finite, got {0}")]
    ExponentSpan(f32),

    #[error("waveform capacity must be at least 1")]
    WaveformCapacity,

    #[error("intake capacity {capacity} is smaller than one frame ({frame_len} samples)")]
    IntakeCapacity { capacity: usize, frame_len: usize },

    #[error("channel count must be at least 1")]
    NoChannels,

    #[error("channel {channel} selected but the stream only has {channels} channel(s)")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("{name} must lie in [0, 1], got {value}")]
    Coefficient { name: &'static str, value: f32 },

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },
}
