/// One display bar as of the last completed analysis pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectrumBar {
    /// Low-passed energy
    pub value: f32,
    /// Peak-hold level
    pub peak: f32,
    /// Passes left before the peak starts to fall
    pub hold: u32,
}

/// Per-bar smoothing and peak-hold, advanced once per analysis pass.
#[derive(Debug, Clone)]
pub struct BarTracker {
    bars: Vec<SpectrumBar>,
    smoothing: f32,
    hold_frames: u32,
    fall_speed: f32,
}

impl BarTracker {
    pub fn new(bar_count: usize, smoothing: f32, hold_frames: u32, fall_speed: f32) -> Self {
        Self {
            bars: vec![SpectrumBar::default(); bar_count],
            smoothing,
            hold_frames,
            fall_speed,
        }
    }

    pub fn bars(&self) -> &[SpectrumBar] {
        &self.bars
    }

    /// Folds one pass of raw bar values into the smoothed and peak state.
    pub fn update(&mut self, raw: &[f32]) {
        debug_assert_eq!(raw.len(), self.bars.len());
        for (bar, &raw) in self.bars.iter_mut().zip(raw) {
            bar.value = bar.value * self.smoothing + raw * (1.0 - self.smoothing);

            if bar.value > bar.peak {
                bar.peak = bar.value;
                bar.hold = self.hold_frames;
            } else if bar.hold > 0 {
                bar.hold -= 1;
            } else {
                bar.peak = (bar.peak - self.fall_speed).max(0.0);
            }
        }
    }
}
