use serde::Deserialize;
use std::path::PathBuf;

use crate::error::PipelineError;

/// Samples per analysis frame. Must be a power of two.
pub const DEFAULT_FRAME_LEN: usize = 4096;
/// Number of displayed bars.
pub const DEFAULT_BAR_COUNT: usize = 64;
/// Exponent span of the log bucketing: the top bar ends at bin `2^K`.
pub const DEFAULT_EXPONENT_SPAN: f32 = 10.0;
/// Decimated samples kept for the time-domain trace.
pub const DEFAULT_WAVEFORM_CAPACITY: usize = 2048;
/// Intake buffer bound, in frames.
pub const DEFAULT_INTAKE_FRAMES: usize = 4;
/// Weight of the previous smoothed value; the raw value gets `1 - SMOOTHING`.
pub const DEFAULT_SMOOTHING: f32 = 0.7;
/// Passes a new peak is held before it starts to fall.
pub const DEFAULT_PEAK_HOLD_FRAMES: u32 = 20;
/// Amount a released peak falls per pass.
pub const DEFAULT_PEAK_FALL_SPEED: f32 = 0.01;
/// Weight of the previous gain when the signal is quieter than the ceiling.
pub const DEFAULT_GAIN_DECAY: f32 = 0.995;
/// Lower bound of the auto-gain ceiling; keeps normalization finite.
pub const DEFAULT_GAIN_FLOOR: f32 = 0.001;
/// Fraction of full scale a bar at the gain ceiling is drawn at.
pub const DEFAULT_HEADROOM: f32 = 0.9;
/// Display refresh rate used by the replay driver.
pub const DEFAULT_FPS: u32 = 60;

/// How interleaved multi-channel input is folded into the mono analysis frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPolicy {
    /// Average every channel of each interleaved frame.
    #[default]
    Downmix,
    /// Keep a single channel (zero based) and ignore the rest.
    Select(usize),
}

/// Construction parameters of the pipeline. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_frame_len")]
    pub frame_len: usize,
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,
    #[serde(default = "default_exponent_span")]
    pub exponent_span: f32,
    #[serde(default = "default_waveform_capacity")]
    pub waveform_capacity: usize,
    /// Mono samples the intake may hold before dropping the oldest.
    /// Zero means `DEFAULT_INTAKE_FRAMES` frames.
    #[serde(default)]
    pub intake_capacity: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub channel_policy: ChannelPolicy,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_peak_hold_frames")]
    pub peak_hold_frames: u32,
    #[serde(default = "default_peak_fall_speed")]
    pub peak_fall_speed: f32,
    #[serde(default = "default_gain_decay")]
    pub gain_decay: f32,
    #[serde(default = "default_gain_floor")]
    pub gain_floor: f32,
    #[serde(default = "default_headroom")]
    pub headroom: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_len: default_frame_len(),
            bar_count: default_bar_count(),
            exponent_span: default_exponent_span(),
            waveform_capacity: default_waveform_capacity(),
            intake_capacity: 0,
            channels: default_channels(),
            channel_policy: ChannelPolicy::default(),
            smoothing: default_smoothing(),
            peak_hold_frames: default_peak_hold_frames(),
            peak_fall_speed: default_peak_fall_speed(),
            gain_decay: default_gain_decay(),
            gain_floor: default_gain_floor(),
            headroom: default_headroom(),
        }
    }
}

impl PipelineConfig {
    /// Intake bound after resolving the "zero means default" rule.
    pub fn effective_intake_capacity(&self) -> usize {
        if self.intake_capacity == 0 {
            self.frame_len.saturating_mul(DEFAULT_INTAKE_FRAMES)
        } else {
            self.intake_capacity
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.frame_len < 2 || !self.frame_len.is_power_of_two() {
            return Err(PipelineError::FrameLength(self.frame_len));
        }
        if self.bar_count == 0 {
            return Err(PipelineError::NoBars);
        }
        if !self.exponent_span.is_finite() || self.exponent_span <= 0.0 {
            return Err(PipelineError::ExponentSpan(self.exponent_span));
        }
        if self.waveform_capacity == 0 {
            return Err(PipelineError::WaveformCapacity);
        }
        let capacity = self.effective_intake_capacity();
        if capacity < self.frame_len {
            return Err(PipelineError::IntakeCapacity {
                capacity,
                frame_len: self.frame_len,
            });
        }
        if self.channels == 0 {
            return Err(PipelineError::NoChannels);
        }
        if let ChannelPolicy::Select(channel) = self.channel_policy {
            if channel >= self.channels {
                return Err(PipelineError::ChannelOutOfRange {
                    channel,
                    channels: self.channels,
                });
            }
        }
        check_unit("smoothing", self.smoothing)?;
        check_unit("gain_decay", self.gain_decay)?;
        check_unit("headroom", self.headroom)?;
        check_positive("peak_fall_speed", self.peak_fall_speed)?;
        check_positive("gain_floor", self.gain_floor)?;
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), PipelineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::Coefficient { name, value })
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::NonPositive { name, value })
    }
}

/// Settings file: `[pipeline]` plus the replay tool's `[display]` table.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub include_waveform: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            include_waveform: false,
        }
    }
}

fn default_frame_len() -> usize { DEFAULT_FRAME_LEN }
fn default_bar_count() -> usize { DEFAULT_BAR_COUNT }
fn default_exponent_span() -> f32 { DEFAULT_EXPONENT_SPAN }
fn default_waveform_capacity() -> usize { DEFAULT_WAVEFORM_CAPACITY }
fn default_channels() -> usize { 1 }
fn default_smoothing() -> f32 { DEFAULT_SMOOTHING }
fn default_peak_hold_frames() -> u32 { DEFAULT_PEAK_HOLD_FRAMES }
fn default_peak_fall_speed() -> f32 { DEFAULT_PEAK_FALL_SPEED }
fn default_gain_decay() -> f32 { DEFAULT_GAIN_DECAY }
fn default_gain_floor() -> f32 { DEFAULT_GAIN_FLOOR }
fn default_headroom() -> f32 { DEFAULT_HEADROOM }
fn default_fps() -> u32 { DEFAULT_FPS }

pub fn load_settings(path: &PathBuf) -> Option<Settings> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(err) => {
            log::debug!("settings parse error in {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path first, then `./sonoscope.toml`, then the user config dirs.
pub fn find_settings(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("sonoscope.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("sonoscope").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("sonoscope").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}
