use std::ops::Range;

/// Exponential mapping of FFT bins onto display bars.
///
/// Bar `i` of `N` nominally covers `[2^(iK/N), 2^((i+1)K/N))` (floored).
/// Nominal edges are shared between neighbours, so coverage is contiguous.
/// The effective range is clamped to the available bins and widened to a
/// single bin where the nominal range rounds to nothing.
#[derive(Debug, Clone)]
pub struct LogBinning {
    edges: Vec<usize>,
    ranges: Vec<Range<usize>>,
}

impl LogBinning {
    pub fn new(bar_count: usize, exponent_span: f32, available_bins: usize) -> Self {
        let n = bar_count as f64;
        let k = exponent_span as f64;
        let edges: Vec<usize> = (0..=bar_count)
            .map(|i| 2f64.powf(i as f64 * k / n) as usize)
            .collect();

        let ranges = edges
            .windows(2)
            .map(|pair| {
                let end = pair[1].min(available_bins);
                let mut start = pair[0];
                if start >= end {
                    start = end.saturating_sub(1);
                }
                start..end
            })
            .collect();

        Self { edges, ranges }
    }

    /// Unclamped `[start, end)` for bar `i`.
    pub fn nominal(&self, i: usize) -> Range<usize> {
        self.edges[i]..self.edges[i + 1]
    }

    /// Bins actually averaged for each bar.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Writes the mean scaled magnitude of each bar's range into `raw`.
    ///
    /// A bar whose range has no bins inside `magnitudes` keeps its previous
    /// value.
    pub fn aggregate(&self, magnitudes: &[f32], scale: f32, raw: &mut [f32]) {
        for (range, out) in self.ranges.iter().zip(raw.iter_mut()) {
            let end = range.end.min(magnitudes.len());
            if range.start >= end {
                continue;
            }
            let bins = &magnitudes[range.start..end];
            let sum: f32 = bins.iter().sum();
            *out = sum * scale / bins.len() as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_ranges_are_contiguous() {
        let binning = LogBinning::new(64, 10.0, 2048);
        for i in 0..63 {
            assert!(binning.nominal(i + 1).start >= binning.nominal(i).end);
        }
        assert_eq!(binning.nominal(63).end, 1024);
        assert_eq!(binning.nominal(0).start, 1);
    }

    #[test]
    fn effective_ranges_are_non_empty_and_ordered() {
        for &(bars, span, available) in &[(64, 10.0, 2048), (16, 6.0, 8), (32, 12.0, 512), (3, 1.0, 1)] {
            let binning = LogBinning::new(bars, span, available);
            let ranges = binning.ranges();
            assert_eq!(ranges.len(), bars);
            for range in ranges {
                assert!(range.start < range.end, "{:?}", range);
                assert!(range.end <= available);
            }
            for pair in ranges.windows(2) {
                assert!(pair[1].start >= pair[0].start);
                assert!(pair[1].end >= pair[0].end);
            }
        }
    }

    #[test]
    fn low_bars_collapse_to_single_bins() {
        let binning = LogBinning::new(64, 10.0, 2048);
        // 2^(10/64) floors to 1, so bar 0 falls back to the DC bin.
        assert_eq!(binning.ranges()[0], 0..1);
        // Bar 7 nominally [2, 2) and is widened to [1, 2).
        assert_eq!(binning.ranges()[7], 1..2);
    }

    #[test]
    fn end_is_clamped_to_available_bins() {
        let binning = LogBinning::new(8, 10.0, 100);
        let last = binning.ranges().last().cloned().unwrap();
        assert_eq!(last.end, 100);
        assert!(last.start < 100);
    }

    #[test]
    fn aggregate_averages_and_scales() {
        let binning = LogBinning::new(2, 2.0, 4);
        // bar 0: [1, 2), bar 1: [2, 4)
        let magnitudes = [100.0, 2.0, 4.0, 8.0];
        let mut raw = [0.0; 2];
        binning.aggregate(&magnitudes, 0.5, &mut raw);
        assert!((raw[0] - 1.0).abs() < 1e-6);
        assert!((raw[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn aggregate_keeps_value_without_bins() {
        let binning = LogBinning::new(2, 2.0, 4);
        let mut raw = [7.0, 9.0];
        binning.aggregate(&[1.0], 1.0, &mut raw);
        assert_eq!(raw, [7.0, 9.0]);
    }
}
