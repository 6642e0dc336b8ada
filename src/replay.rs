//! Drives a pipeline from decoded audio as if it were a capture device.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::decode::AudioData;
use crate::pipeline::{CaptureStats, DisplayFrame, Pipeline};

/// Callback sizes, in interleaved frames, cycled to mimic an irregular device.
const CHUNK_FRAMES: [usize; 6] = [441, 1024, 2000, 256, 960, 37];

/// Splits interleaved samples into capture-sized chunks.
pub fn chunks(samples: &[f32], channels: usize) -> impl Iterator<Item = &[f32]> + '_ {
    let channels = channels.max(1);
    let mut offset = 0;
    let mut turn = 0;
    std::iter::from_fn(move || {
        if offset >= samples.len() {
            return None;
        }
        let len = (CHUNK_FRAMES[turn % CHUNK_FRAMES.len()] * channels).min(samples.len() - offset);
        turn += 1;
        let chunk = &samples[offset..offset + len];
        offset += len;
        Some(chunk)
    })
}

#[derive(Serialize)]
struct TickRecord<'a> {
    time: f32,
    #[serde(flatten)]
    frame: &'a DisplayFrame,
}

/// Writes one JSON object per display frame.
pub struct JsonLines<W: Write> {
    writer: W,
    include_waveform: bool,
    written: u64,
}

impl<W: Write> JsonLines<W> {
    pub fn new(writer: W, include_waveform: bool) -> Self {
        Self {
            writer,
            include_waveform,
            written: 0,
        }
    }

    pub fn write(&mut self, time: f32, frame: &mut DisplayFrame) -> Result<()> {
        if !self.include_waveform {
            frame.waveform.clear();
        }
        serde_json::to_writer(&mut self.writer, &TickRecord { time, frame })
            .context("Failed to serialize display frame")?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write display frame")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("Failed to flush output")?;
        Ok(self.writer)
    }
}

/// True when `err` was caused by the reader of the output going away, e.g.
/// stdout piped into a consumer that exited.
pub fn is_closed_output(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let kind = if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            Some(io.kind())
        } else {
            cause
                .downcast_ref::<serde_json::Error>()
                .and_then(serde_json::Error::io_error_kind)
        };
        kind == Some(std::io::ErrorKind::BrokenPipe)
    })
}

/// Feeds the whole file and ticks the display every `1/fps` seconds of audio,
/// without waiting on the wall clock.
pub fn run_offline<F>(
    audio: &AudioData,
    pipeline: &mut Pipeline,
    fps: u32,
    mut on_frame: F,
) -> Result<CaptureStats>
where
    F: FnMut(f32, &mut DisplayFrame) -> Result<()>,
{
    let channels = audio.channels.max(1);
    let frames_per_tick = audio.sample_rate as f64 / fps.max(1) as f64;
    let mut next_tick = frames_per_tick;
    let mut fed_frames = 0usize;
    let mut tick_index = 0u64;

    let pb = ProgressBar::new(audio.frames() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    for chunk in chunks(&audio.samples, channels) {
        pipeline.feed(chunk);
        fed_frames += chunk.len() / channels;

        while fed_frames as f64 >= next_tick {
            tick_index += 1;
            let time = tick_index as f32 / fps.max(1) as f32;
            let mut frame = pipeline.tick();
            on_frame(time, &mut frame)?;
            next_tick += frames_per_tick;
        }
        pb.set_position(fed_frames as u64);
    }

    pb.finish_and_clear();
    log::info!("Replayed {} display frames", tick_index);
    Ok(pipeline.sink().stats())
}

/// Feeds the file from a capture thread paced by the wall clock while the
/// calling thread ticks the display at `fps`.
pub fn run_realtime<F>(
    audio: AudioData,
    pipeline: Pipeline,
    fps: u32,
    mut on_frame: F,
) -> Result<CaptureStats>
where
    F: FnMut(f32, &mut DisplayFrame) -> Result<()>,
{
    let (mut sink, mut tap) = pipeline.split();
    let sample_rate = audio.sample_rate.max(1) as f64;
    let channels = audio.channels.max(1);

    let feeder = thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            let start = Instant::now();
            let mut fed_frames = 0usize;
            for chunk in chunks(&audio.samples, channels) {
                if sink.is_closed() {
                    break;
                }
                fed_frames += chunk.len() / channels;
                let due = Duration::from_secs_f64(fed_frames as f64 / sample_rate);
                if let Some(wait) = due.checked_sub(start.elapsed()) {
                    thread::sleep(wait);
                }
                sink.feed(chunk);
            }
            let stats = sink.stats();
            sink.close();
            stats
        })
        .context("Failed to spawn capture thread")?;

    let interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let start = Instant::now();
    let mut next = start + interval;
    let mut result = Ok(());

    while !tap.is_closed() {
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        }
        next += interval;

        let mut frame = tap.tick();
        if let Err(err) = on_frame(start.elapsed().as_secs_f32(), &mut frame) {
            tap.shutdown();
            result = Err(err);
            break;
        }
    }

    let stats = feeder
        .join()
        .map_err(|_| anyhow::anyhow!("Capture thread panicked"))?;
    result?;
    Ok(stats)
}
