//! Streaming spectrum analysis for live audio visualizers.
//!
//! Capture callbacks push interleaved `f32` chunks into a [`CaptureSink`];
//! a renderer pulls [`DisplayFrame`]s from a [`DisplayTap`] at its own rate.

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod replay;

pub use config::{ChannelPolicy, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{CaptureSink, DisplayFrame, DisplayTap, PassSnapshot, Pipeline};
