use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sonoscope", about = "Live spectrum, peak and waveform analyzer for audio visualizers")]
pub struct Cli {
    /// Input audio file to replay (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Write one JSON line per display frame here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Settings file (TOML); defaults to sonoscope.toml or the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Display frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Number of spectrum bars
    #[arg(long)]
    pub bars: Option<usize>,

    /// Analysis frame length (power of two)
    #[arg(long)]
    pub frame_size: Option<usize>,

    /// Analyze a single channel (zero based) instead of the downmix
    #[arg(long)]
    pub channel: Option<usize>,

    /// Include the waveform history in every output line
    #[arg(long)]
    pub waveform: bool,

    /// Pace the replay by the wall clock on separate capture and display threads
    #[arg(long)]
    pub realtime: bool,

    /// Capture from the default audio device instead of a file
    #[cfg(feature = "capture")]
    #[arg(long, conflicts_with = "input")]
    pub live: bool,

    /// Stop live capture after this many seconds (default: until output closes)
    #[cfg(feature = "capture")]
    #[arg(long, requires = "live")]
    pub duration: Option<f64>,
}
