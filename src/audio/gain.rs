use super::bars::SpectrumBar;

/// Display-side normalization ceiling.
///
/// Rises instantly to a louder signal and relaxes exponentially toward a
/// quieter one. Never drops below `floor`, so `normalize` is always finite.
#[derive(Debug, Clone)]
pub struct AutoGain {
    gain: f32,
    decay: f32,
    floor: f32,
    headroom: f32,
}

impl AutoGain {
    pub fn new(decay: f32, floor: f32, headroom: f32) -> Self {
        Self {
            gain: floor,
            decay,
            floor,
            headroom,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Advances the ceiling by one display frame and returns it.
    pub fn update(&mut self, bars: &[SpectrumBar]) -> f32 {
        let current_max = bars.iter().map(|b| b.value).fold(0.0f32, f32::max);

        if current_max > self.gain {
            self.gain = current_max;
        } else {
            self.gain = self.gain * self.decay + current_max * (1.0 - self.decay);
        }
        if self.gain.is_nan() || self.gain < self.floor {
            self.gain = self.floor;
        }
        self.gain
    }

    /// Scales `value` into `[0, 1]` against the current ceiling.
    pub fn normalize(&self, value: f32) -> f32 {
        ((value / self.gain) * self.headroom).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(values: &[f32]) -> Vec<SpectrumBar> {
        values
            .iter()
            .map(|&value| SpectrumBar { value, ..Default::default() })
            .collect()
    }

    fn gain() -> AutoGain {
        AutoGain::new(0.995, 0.001, 0.9)
    }

    #[test]
    fn starts_at_floor() {
        assert_eq!(gain().gain(), 0.001);
    }

    #[test]
    fn rises_instantly() {
        let mut g = gain();
        let before = g.gain();
        let after = g.update(&bars(&[0.1, 0.5, 0.2]));
        assert!(after >= before);
        assert_eq!(after, 0.5);
        assert!((g.normalize(0.5) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn decays_slowly_toward_quieter_signal() {
        let mut g = gain();
        g.update(&bars(&[1.0]));
        let next = g.update(&bars(&[0.5]));
        assert!((next - (0.995 + 0.0025)).abs() < 1e-6);

        for _ in 0..5000 {
            g.update(&bars(&[0.5]));
        }
        assert!((g.gain() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn silence_decays_to_floor_but_not_below() {
        let mut g = gain();
        g.update(&bars(&[2.0]));
        for _ in 0..10_000 {
            let value = g.update(&bars(&[0.0, 0.0]));
            assert!(value >= 0.001);
        }
        assert!((g.gain() - 0.001).abs() < 1e-6);
    }

    #[test]
    fn normalize_is_capped() {
        let mut g = gain();
        g.update(&bars(&[0.2]));
        assert_eq!(g.normalize(10.0), 1.0);
        assert_eq!(g.normalize(0.0), 0.0);
    }

    #[test]
    fn empty_bars_keep_floor() {
        let mut g = gain();
        assert_eq!(g.update(&[]), 0.001);
    }
}
