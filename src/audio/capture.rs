use anyhow::{Context, Result};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream, StreamConfig, SupportedStreamConfig,
};

use crate::pipeline::CaptureSink;

/// An input device negotiated for interleaved `f32` capture.
pub struct CaptureDevice {
    device: cpal::Device,
    config: StreamConfig,
    name: String,
}

/// A running capture stream. Dropping it stops the callbacks.
pub struct LiveCapture {
    _stream: Stream,
}

impl CaptureDevice {
    /// Default input device, or the default output device where the host
    /// exposes it for loopback capture.
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .or_else(|| host.default_output_device())
            .context("No suitable audio capture device found")?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = stream_format(&device)?;
        if supported.sample_format() != SampleFormat::F32 {
            anyhow::bail!(
                "Device '{}' captures {:?}; only f32 capture is supported",
                name,
                supported.sample_format()
            );
        }

        Ok(Self {
            device,
            config: supported.config(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Starts the stream; every callback buffer is fed straight into `sink`
    /// on the audio thread.
    pub fn start(self, mut sink: CaptureSink) -> Result<LiveCapture> {
        let err_fn = |err: cpal::StreamError| {
            log::error!("Audio stream error: {}", err);
        };

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| sink.feed(data),
                err_fn,
                None,
            )
            .with_context(|| format!("Failed to build input stream on '{}'", self.name))?;
        stream.play().context("Failed to start audio stream")?;

        log::info!(
            "Capturing from '{}' ({} ch @ {} Hz)",
            self.name(),
            self.channels(),
            self.sample_rate()
        );

        Ok(LiveCapture { _stream: stream })
    }
}

/// Input format of `device`; an output device opened for loopback only
/// advertises an output format, which is captured as is.
fn stream_format(device: &cpal::Device) -> Result<SupportedStreamConfig> {
    device
        .default_input_config()
        .or_else(|_| device.default_output_config())
        .context("Device advertises neither an input nor an output format")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a sound card; run with `cargo test --features capture -- --ignored`.
    #[test]
    #[ignore]
    fn output_device_negotiates_a_loopback_format() {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            return;
        };
        let format = stream_format(&device).unwrap();
        assert!(format.channels() > 0);
        assert!(format.sample_rate().0 > 0);
    }
}
