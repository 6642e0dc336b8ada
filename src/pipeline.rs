//! Capture-side analysis and display-side consumption of the spectrum.
//!
//! The pipeline is split into two owned handles. [`CaptureSink`] runs on the
//! thread delivering samples: it assembles frames and runs every analysis
//! pass. [`DisplayTap`] runs on the render clock: it owns the auto-gain state
//! and reads what the sink last published. A pass is published whole under a
//! write lock, so a reader sees either the previous pass or the new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::audio::bars::{BarTracker, SpectrumBar};
use crate::audio::bins::LogBinning;
use crate::audio::gain::AutoGain;
use crate::audio::intake::SampleIntake;
use crate::audio::transform::SpectralTransform;
use crate::audio::waveform::WaveformHistory;
use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Lowest opacity of a released peak marker (100 of 255).
const PEAK_MIN_ALPHA: f32 = 100.0 / 255.0;
/// Keeps the peak fade ratio finite for silent bars.
const PEAK_ALPHA_EPSILON: f32 = 0.001;

/// State of the last completed analysis pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassSnapshot {
    /// Completed passes; 0 until the first frame has been analyzed
    pub pass: u64,
    pub bars: Vec<SpectrumBar>,
    /// Waveform history, oldest sample first
    pub waveform: Vec<f32>,
}

impl PassSnapshot {
    fn copy_from(&mut self, other: &PassSnapshot) {
        self.pass = other.pass;
        self.bars.clone_from(&other.bars);
        self.waveform.clone_from(&other.waveform);
    }
}

/// One bar as the renderer should draw it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DisplayBar {
    pub value: f32,
    pub normalized: f32,
    pub peak: f32,
    pub peak_normalized: f32,
    pub hold: u32,
    /// Peak marker opacity in `[0, 1]`; opaque while held
    pub peak_alpha: f32,
}

/// Everything a renderer needs for one display frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DisplayFrame {
    pub pass: u64,
    pub gain: f32,
    pub bars: Vec<DisplayBar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waveform: Vec<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub passes: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub repaired: u64,
}

struct Shared {
    published: RwLock<PassSnapshot>,
    closed: AtomicBool,
}

impl Shared {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Capture-side handle: the only writer of bars and waveform.
pub struct CaptureSink {
    shared: Arc<Shared>,
    intake: SampleIntake,
    frame: Vec<f32>,
    transform: SpectralTransform,
    binning: LogBinning,
    raw: Vec<f32>,
    tracker: BarTracker,
    waveform: WaveformHistory,
    magnitude_scale: f32,
    passes: u64,
    released: bool,
}

impl CaptureSink {
    /// Accepts one interleaved chunk and runs a pass for every full frame.
    ///
    /// Ignored once the pipeline is closed.
    pub fn feed(&mut self, chunk: &[f32]) {
        if self.shared.is_closed() {
            self.release();
            return;
        }
        // Slices sized so each one can be drained before the next arrives;
        // samples are only dropped when a pass cannot keep up.
        let step = self.intake.burst_len(self.frame.len());
        for piece in chunk.chunks(step) {
            self.intake.push(piece);
            while self.intake.next_frame(&mut self.frame) {
                self.run_pass();
            }
        }
    }

    fn run_pass(&mut self) {
        self.waveform.push_decimated(&self.frame);

        let magnitudes = self.transform.process(&mut self.frame);
        self.binning
            .aggregate(magnitudes, self.magnitude_scale, &mut self.raw);
        self.tracker.update(&self.raw);
        self.passes += 1;

        let mut published = self.shared.published.write();
        published.pass = self.passes;
        published.bars.copy_from_slice(self.tracker.bars());
        self.waveform.copy_ordered(&mut published.waveform);
        drop(published);

        log::trace!("Analysis pass {} published", self.passes);
    }

    /// Drops samples still waiting in the intake, e.g. after the capture
    /// device changed. Published state is left as is.
    pub fn discard_pending(&mut self) {
        self.intake.clear();
    }

    pub fn stats(&self) -> CaptureStats {
        let intake = self.intake.stats();
        CaptureStats {
            passes: self.passes,
            accepted: intake.accepted,
            dropped: intake.dropped,
            repaired: intake.repaired,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stops accepting input and frees the intake. The last snapshot stays
    /// readable through the [`DisplayTap`].
    pub fn close(&mut self) {
        self.shared.close();
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.intake.release();
            self.released = true;
            log::debug!("Capture sink closed after {} passes", self.passes);
        }
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Display-side handle: the only writer of the gain, a pure reader otherwise.
pub struct DisplayTap {
    shared: Arc<Shared>,
    gain: AutoGain,
    local: PassSnapshot,
}

impl DisplayTap {
    /// Copy of the last published pass.
    pub fn snapshot(&self) -> PassSnapshot {
        self.shared.published.read().clone()
    }

    pub fn gain(&self) -> f32 {
        self.gain.gain()
    }

    /// Advances the auto-gain by one display frame and returns the frame to
    /// draw. Keeps working on the frozen snapshot after the pipeline closes.
    pub fn tick(&mut self) -> DisplayFrame {
        {
            let published = self.shared.published.read();
            self.local.copy_from(&published);
        }

        let gain = self.gain.update(&self.local.bars);
        let bars = self
            .local
            .bars
            .iter()
            .map(|bar| DisplayBar {
                value: bar.value,
                normalized: self.gain.normalize(bar.value),
                peak: bar.peak,
                peak_normalized: self.gain.normalize(bar.peak),
                hold: bar.hold,
                peak_alpha: peak_alpha(bar),
            })
            .collect();

        DisplayFrame {
            pass: self.local.pass,
            gain,
            bars,
            waveform: self.local.waveform.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Asks the capture side to stop; its next `feed` releases its buffers.
    pub fn shutdown(&self) {
        self.shared.close();
    }
}

fn peak_alpha(bar: &SpectrumBar) -> f32 {
    if bar.hold > 0 {
        1.0
    } else {
        (bar.peak / (bar.value + PEAK_ALPHA_EPSILON))
            .max(PEAK_MIN_ALPHA)
            .clamp(0.0, 1.0)
    }
}

/// Both halves of a pipeline, for callers that drive them from one thread.
pub struct Pipeline {
    sink: CaptureSink,
    tap: DisplayTap,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let frame_len = config.frame_len;
        let available_bins = frame_len / 2;
        let binning = LogBinning::new(config.bar_count, config.exponent_span, available_bins);
        let transform = SpectralTransform::new(frame_len)?;

        log::debug!(
            "Pipeline: frame={} bars={} span={} waveform={} channels={} policy={:?}",
            frame_len,
            config.bar_count,
            config.exponent_span,
            config.waveform_capacity,
            config.channels,
            config.channel_policy
        );
        log::debug!("Bar bin ranges: {:?}", binning.ranges());

        let shared = Arc::new(Shared {
            published: RwLock::new(PassSnapshot {
                pass: 0,
                bars: vec![SpectrumBar::default(); config.bar_count],
                waveform: vec![0.0; config.waveform_capacity],
            }),
            closed: AtomicBool::new(false),
        });

        let sink = CaptureSink {
            shared: Arc::clone(&shared),
            intake: SampleIntake::new(
                config.channels,
                config.channel_policy,
                config.effective_intake_capacity(),
            ),
            frame: vec![0.0; frame_len],
            transform,
            binning,
            raw: vec![0.0; config.bar_count],
            tracker: BarTracker::new(
                config.bar_count,
                config.smoothing,
                config.peak_hold_frames,
                config.peak_fall_speed,
            ),
            waveform: WaveformHistory::with_capacity(config.waveform_capacity),
            magnitude_scale: 1.0 / frame_len as f32,
            passes: 0,
            released: false,
        };

        let tap = DisplayTap {
            shared,
            gain: AutoGain::new(config.gain_decay, config.gain_floor, config.headroom),
            local: PassSnapshot::default(),
        };

        Ok(Self { sink, tap })
    }

    pub fn feed(&mut self, chunk: &[f32]) {
        self.sink.feed(chunk);
    }

    pub fn tick(&mut self) -> DisplayFrame {
        self.tap.tick()
    }

    pub fn snapshot(&self) -> PassSnapshot {
        self.tap.snapshot()
    }

    pub fn sink(&mut self) -> &mut CaptureSink {
        &mut self.sink
    }

    pub fn tap(&mut self) -> &mut DisplayTap {
        &mut self.tap
    }

    /// Separates the handles so they can move to different threads.
    pub fn split(self) -> (CaptureSink, DisplayTap) {
        (self.sink, self.tap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn config() -> PipelineConfig {
        PipelineConfig {
            frame_len: 1024,
            waveform_capacity: 512,
            ..Default::default()
        }
    }

    fn tone(bin: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / len as f32).sin())
            .collect()
    }

    fn loudest(bars: &[SpectrumBar]) -> usize {
        bars.iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, b)| if b.value > acc.1 { (i, b.value) } else { acc })
            .0
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Pipeline::new(PipelineConfig {
            frame_len: 1000,
            ..Default::default()
        });
        assert!(matches!(result, Err(PipelineError::FrameLength(1000))));
    }

    #[test]
    fn nothing_published_before_a_full_frame() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.feed(&[0.5; 1000]);
        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.pass, 0);
        assert_eq!(snapshot.bars.len(), 64);
        assert_eq!(snapshot.waveform.len(), 512);

        pipeline.feed(&[0.5; 24]);
        assert_eq!(pipeline.snapshot().pass, 1);
    }

    #[test]
    fn pure_tone_lights_its_bar() {
        let config = config();
        let binning = LogBinning::new(config.bar_count, config.exponent_span, config.frame_len / 2);
        let bin = 300;
        let expected = binning
            .ranges()
            .iter()
            .position(|r| r.contains(&bin))
            .unwrap();

        let mut pipeline = Pipeline::new(config).unwrap();
        let frame = tone(bin, 1024);
        pipeline.feed(&frame);
        assert_eq!(loudest(&pipeline.snapshot().bars), expected);

        let mut last = DisplayFrame::default();
        for _ in 0..60 {
            pipeline.feed(&frame);
            last = pipeline.tick();
        }
        let bar = last.bars[expected];
        assert!((bar.normalized - 0.9).abs() < 1e-3, "normalized {}", bar.normalized);
        for (i, other) in last.bars.iter().enumerate() {
            if i != expected {
                assert!(other.normalized < bar.normalized);
            }
        }
    }

    #[test]
    fn silence_settles_to_zero_and_gain_floor() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        let frame = tone(64, 1024);
        for _ in 0..10 {
            pipeline.feed(&frame);
            pipeline.tick();
        }
        assert!(pipeline.tap().gain() > 0.001);

        let silence = vec![0.0; 1024];
        for _ in 0..100 {
            pipeline.feed(&silence);
        }
        for _ in 0..3000 {
            let frame = pipeline.tick();
            assert!(frame.gain >= 0.001);
        }
        let snapshot = pipeline.snapshot();
        assert!(snapshot.bars.iter().all(|b| b.value < 1e-6));
        assert!((pipeline.tap().gain() - 0.001).abs() < 1e-6);
    }

    #[test]
    fn gain_never_drops_on_a_new_maximum() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        let mut amplitude = 0.01;
        for _ in 0..20 {
            let frame: Vec<f32> = tone(40, 1024).iter().map(|s| s * amplitude).collect();
            let before = pipeline.tap().gain();
            pipeline.feed(&frame);
            let max = pipeline
                .snapshot()
                .bars
                .iter()
                .map(|b| b.value)
                .fold(0.0f32, f32::max);
            let after = pipeline.tick().gain;
            if max > before {
                assert!(after >= before);
                assert_eq!(after, max);
            }
            amplitude *= 1.5;
        }
    }

    #[test]
    fn waveform_takes_every_other_sample() {
        let mut pipeline = Pipeline::new(PipelineConfig {
            frame_len: 8,
            bar_count: 4,
            exponent_span: 2.0,
            waveform_capacity: 4,
            ..Default::default()
        })
        .unwrap();
        pipeline.feed(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);
        assert_eq!(pipeline.snapshot().waveform, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn oversized_callback_is_analyzed_without_drops() {
        let mut pipeline = Pipeline::new(PipelineConfig {
            frame_len: 256,
            ..Default::default()
        })
        .unwrap();
        pipeline.feed(&tone(20, 2560));
        let stats = pipeline.sink().stats();
        assert_eq!(stats.passes, 10);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.accepted, 2560);
    }

    #[test]
    fn peak_alpha_fades_after_hold() {
        let held = SpectrumBar { value: 0.5, peak: 0.5, hold: 3 };
        assert_eq!(peak_alpha(&held), 1.0);

        let released = SpectrumBar { value: 1.0, peak: 0.1, hold: 0 };
        assert!((peak_alpha(&released) - PEAK_MIN_ALPHA).abs() < 1e-6);

        let silent = SpectrumBar { value: 0.0, peak: 0.5, hold: 0 };
        assert_eq!(peak_alpha(&silent), 1.0);
    }

    #[test]
    fn close_freezes_published_state() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.feed(&tone(100, 1024));
        let before = pipeline.snapshot();
        assert_eq!(before.pass, 1);

        pipeline.sink().close();
        pipeline.feed(&tone(200, 4096));
        assert_eq!(pipeline.snapshot(), before);
        assert_eq!(pipeline.sink().stats().passes, 1);

        let frame = pipeline.tick();
        assert_eq!(frame.pass, 1);
        assert!(frame.bars.iter().any(|b| b.value > 0.0));
    }

    #[test]
    fn discard_pending_keeps_snapshot() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.feed(&tone(100, 1024));
        pipeline.feed(&[0.3; 700]);
        let before = pipeline.snapshot();

        pipeline.sink().discard_pending();
        assert_eq!(pipeline.snapshot(), before);

        pipeline.feed(&[0.3; 700]);
        assert_eq!(pipeline.snapshot().pass, 1);
        pipeline.feed(&[0.3; 324]);
        assert_eq!(pipeline.snapshot().pass, 2);
    }

    #[test]
    fn stereo_select_ignores_other_channel() {
        let mut left_only = Pipeline::new(PipelineConfig {
            channels: 2,
            channel_policy: crate::config::ChannelPolicy::Select(0),
            ..config()
        })
        .unwrap();
        let left = tone(50, 1024);
        let interleaved: Vec<f32> = left
            .iter()
            .zip(tone(200, 1024))
            .flat_map(|(&l, r)| [l, r])
            .collect();
        left_only.feed(&interleaved);

        let mut mono = Pipeline::new(config()).unwrap();
        mono.feed(&left);
        assert_eq!(left_only.snapshot().bars, mono.snapshot().bars);
    }
}
