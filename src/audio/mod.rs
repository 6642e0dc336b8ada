pub mod bars;
pub mod bins;
#[cfg(feature = "capture")]
pub mod capture;
pub mod decode;
pub mod gain;
pub mod intake;
pub mod transform;
pub mod waveform;
pub mod window;
