use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::window;
use crate::error::PipelineError;

/// Windowed forward FFT of a fixed power-of-two size.
///
/// The plan, window, and buffers are allocated once; `process` does no
/// allocation. Output is unnormalized, so bin 0 holds the plain sum of the
/// windowed frame.
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralTransform {
    pub fn new(size: usize) -> Result<Self, PipelineError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(PipelineError::FrameLength(size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            window: window::hamming_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            magnitudes: vec![0.0; size],
        })
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Windows `frame` in place, transforms it, and returns all `M` magnitudes.
    pub fn process(&mut self, frame: &mut [f32]) -> &[f32] {
        debug_assert_eq!(frame.len(), self.size());
        window::apply(frame, &self.window);

        for (slot, &s) in self.buffer.iter_mut().zip(frame.iter()) {
            *slot = Complex::new(s, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm();
        }
        &self.magnitudes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_sizes() {
        assert!(SpectralTransform::new(0).is_err());
        assert!(SpectralTransform::new(1).is_err());
        assert!(SpectralTransform::new(48).is_err());
        assert!(SpectralTransform::new(2).is_ok());
    }

    #[test]
    fn dc_bin_matches_windowed_sum() {
        for &size in &[2usize, 4, 16, 256, 1024] {
            let mut transform = SpectralTransform::new(size).unwrap();
            let mut frame: Vec<f32> = (0..size)
                .map(|i| ((i * 7 % 11) as f32 - 4.0) * 0.1)
                .collect();
            let mut windowed = frame.clone();
            window::apply(&mut windowed, &window::hamming_window(size));
            let expected = windowed.iter().sum::<f32>().abs();

            let magnitudes = transform.process(&mut frame);
            assert_eq!(magnitudes.len(), size);
            assert!(
                (magnitudes[0] - expected).abs() < 1e-2,
                "size {}: dc {} vs {}",
                size,
                magnitudes[0],
                expected
            );
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let size = 512;
        let bin = 37;
        let mut transform = SpectralTransform::new(size).unwrap();
        let mut frame: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / size as f32).sin())
            .collect();
        let magnitudes = transform.process(&mut frame);
        let (argmax, _) = magnitudes[..size / 2]
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert_eq!(argmax, bin);
    }
}
