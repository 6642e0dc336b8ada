mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};

use cli::Cli;
use sonoscope::audio::decode::decode_audio;
use sonoscope::config::{self, ChannelPolicy, Settings};
use sonoscope::pipeline::{CaptureStats, Pipeline};
use sonoscope::replay::{self, JsonLines};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::default();
    if let Some(path) = config::find_settings(cli.config.clone()) {
        if let Some(loaded) = config::load_settings(&path) {
            log::info!("Loaded settings from {}", path.display());
            settings = loaded;
        } else {
            log::warn!("Failed to load settings from {}, using defaults", path.display());
        }
    }

    // CLI flags win over the settings file
    if let Some(fps) = cli.fps {
        settings.display.fps = fps;
    }
    if let Some(bars) = cli.bars {
        settings.pipeline.bar_count = bars;
    }
    if let Some(frame_size) = cli.frame_size {
        settings.pipeline.frame_len = frame_size;
    }
    if let Some(channel) = cli.channel {
        settings.pipeline.channel_policy = ChannelPolicy::Select(channel);
    }
    if cli.waveform {
        settings.display.include_waveform = true;
    }
    if settings.display.fps == 0 {
        anyhow::bail!("fps must be at least 1");
    }

    let writer: Box<dyn Write> = match cli.output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let mut out = JsonLines::new(writer, settings.display.include_waveform);

    #[cfg(feature = "capture")]
    if cli.live {
        run_live(&mut settings, &mut out, cli.duration)?;
        log::info!("Captured {} display frames", out.written());
        if let Err(err) = out.finish() {
            if !replay::is_closed_output(&err) {
                return Err(err);
            }
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("sonoscope - spectrum analyzer");
    log::info!("Input: {}", input.display());
    log::info!(
        "Bars: {}, frame: {}, display: {}fps",
        settings.pipeline.bar_count,
        settings.pipeline.frame_len,
        settings.display.fps
    );

    let audio = decode_audio(input)?;
    settings.pipeline.channels = audio.channels.max(1);
    let pipeline = Pipeline::new(settings.pipeline.clone()).context("Invalid pipeline settings")?;

    let fps = settings.display.fps;
    let stats = if cli.realtime {
        log::info!("Replaying in real time ({:.1}s)", audio.duration());
        replay::run_realtime(audio, pipeline, fps, |time, frame| out.write(time, frame))?
    } else {
        let mut pipeline = pipeline;
        replay::run_offline(&audio, &mut pipeline, fps, |time, frame| out.write(time, frame))?
    };

    finish(out, stats)
}

fn finish<W: Write>(out: JsonLines<W>, stats: CaptureStats) -> Result<()> {
    log::info!(
        "Done: {} analysis passes, {} display frames, {} samples dropped, {} repaired",
        stats.passes,
        out.written(),
        stats.dropped,
        stats.repaired
    );
    out.finish()?;
    Ok(())
}

#[cfg(feature = "capture")]
fn run_live<W: Write>(
    settings: &mut Settings,
    out: &mut JsonLines<W>,
    duration: Option<f64>,
) -> Result<()> {
    use sonoscope::audio::capture::CaptureDevice;
    use std::time::{Duration, Instant};

    let device = CaptureDevice::open_default()?;
    log::info!(
        "Live input: '{}' at {} Hz, {} channels",
        device.name(),
        device.sample_rate(),
        device.channels()
    );
    settings.pipeline.channels = device.channels();
    let (sink, mut tap) = Pipeline::new(settings.pipeline.clone())
        .context("Invalid pipeline settings")?
        .split();
    let _capture = device.start(sink)?;

    let limit = duration
        .map(|secs| Duration::try_from_secs_f64(secs).context("Invalid --duration"))
        .transpose()?;
    let interval = Duration::from_secs_f64(1.0 / settings.display.fps as f64);
    let start = Instant::now();
    let mut next = start + interval;
    loop {
        if limit.is_some_and(|limit| start.elapsed() >= limit) {
            log::info!("Capture duration reached");
            break;
        }
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        }
        next += interval;

        let mut frame = tap.tick();
        if let Err(err) = out.write(start.elapsed().as_secs_f32(), &mut frame) {
            if !replay::is_closed_output(&err) {
                tap.shutdown();
                return Err(err);
            }
            log::info!("Output closed, stopping capture");
            break;
        }
    }

    tap.shutdown();
    Ok(())
}
