/// Hamming coefficients `0.54 - 0.46 cos(2πi / (M-1))` for a frame of `size`.
pub fn hamming_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f32;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

/// Multiplies `frame` by `window` in place.
pub fn apply(frame: &mut [f32], window: &[f32]) {
    debug_assert_eq!(frame.len(), window.len());
    for (sample, w) in frame.iter_mut().zip(window) {
        *sample *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_centre() {
        let w = hamming_window(9);
        assert!((w[0] - 0.08).abs() < 1e-6);
        assert!((w[8] - 0.08).abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn symmetric() {
        let w = hamming_window(64);
        for i in 0..32 {
            assert!((w[i] - w[63 - i]).abs() < 1e-5);
        }
    }

    #[test]
    fn apply_scales_in_place() {
        let window = hamming_window(4);
        let mut frame = vec![2.0; 4];
        apply(&mut frame, &window);
        for (s, w) in frame.iter().zip(&window) {
            assert!((s - 2.0 * w).abs() < 1e-6);
        }
    }
}
