use serde::{Deserialize, Serialize};

/// Floor used when normalising bar values so silence divides by a small
/// constant instead of zero.
const NORMALISATION_FLOOR: f32 = 1e-9;

/// One visual bar: a contiguous range of spectrum bins reduced to a single
/// normalised value plus the frequency of the range's centre bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDatum {
    pub frequency_hz: f32,
    /// Normalised aggregate energy in [0, 1].
    pub value: f32,
}

/// Result of reducing one spectrum snapshot. Built fresh on every analyze
/// call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub bars: Vec<BarDatum>,
    /// Index of the first bar attaining the maximum value.
    pub highest_bar: usize,
}

/// Reduces a spectrum snapshot into `bar_count` normalised bars.
///
/// Each bar averages `max(1, spectrum.len() / bar_count)` consecutive bins,
/// reading bins past the end of the spectrum as zero, and is labelled with
/// the frequency of the centre bin of its range. Values are normalised so the
/// loudest bar reads 1.0; when the whole spectrum sits at or below the
/// normalisation floor the values stay near zero instead. Ties for the
/// highest bar resolve to the lowest index.
///
/// Pure and deterministic, O(spectrum.len()). `bar_count` must be positive;
/// callers validate it through [`AnalysisConfig::validate`].
///
/// [`AnalysisConfig::validate`]: crate::AnalysisConfig::validate
pub fn aggregate(
    spectrum: &[f32],
    bar_count: usize,
    bin_to_frequency: impl Fn(usize) -> f32,
) -> AnalysisResult {
    assert!(bar_count > 0, "bar_count must be positive");

    let bins_per_bar = (spectrum.len() / bar_count).max(1);
    let mut raw = Vec::with_capacity(bar_count);
    let mut frequencies = Vec::with_capacity(bar_count);

    for bar in 0..bar_count {
        let start = bar * bins_per_bar;
        let sum: f32 = (0..bins_per_bar)
            .map(|offset| spectrum.get(start + offset).copied().unwrap_or(0.0))
            .sum();
        raw.push(sum / bins_per_bar as f32);
        frequencies.push(bin_to_frequency(start + bins_per_bar / 2));
    }

    let mut raw_max = f32::MIN;
    let mut highest_bar = 0;
    for (index, &value) in raw.iter().enumerate() {
        if value > raw_max {
            raw_max = value;
            highest_bar = index;
        }
    }

    // The floor applies to the divisor only; the highest bar is picked from
    // the unfloored maximum.
    let divisor = raw_max.max(NORMALISATION_FLOOR);
    let bars = raw
        .into_iter()
        .zip(frequencies)
        .map(|(value, frequency_hz)| BarDatum {
            frequency_hz,
            value: value / divisor,
        })
        .collect();

    AnalysisResult { bars, highest_bar }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(index: usize) -> f32 {
        index as f32 * 100.0
    }

    #[test]
    fn reduces_bins_to_normalised_bars() {
        let result = aggregate(&[0.0, 0.0, 10.0, 0.0], 2, linear);

        assert_eq!(result.bars.len(), 2);
        assert_eq!(result.bars[0].value, 0.0);
        assert_eq!(result.bars[1].value, 1.0);
        assert_eq!(result.highest_bar, 1);
        // Bar 1 covers bins {2, 3}; its centre bin is 3.
        assert_eq!(result.bars[1].frequency_hz, 300.0);
    }

    #[test]
    fn silence_stays_near_zero_without_dividing_by_zero() {
        let result = aggregate(&[0.0; 4], 4, linear);

        assert_eq!(result.bars.len(), 4);
        for bar in &result.bars {
            assert!(bar.value.abs() < 1e-6);
        }
        assert_eq!(result.highest_bar, 0);
    }

    #[test]
    fn bar_count_beyond_bins_pads_with_zero_energy() {
        let result = aggregate(&[3.0, 1.0], 4, linear);

        assert_eq!(result.bars.len(), 4);
        assert_eq!(result.bars[0].value, 1.0);
        assert_eq!(result.bars[2].value, 0.0);
        assert_eq!(result.bars[3].value, 0.0);
        assert_eq!(result.highest_bar, 0);
    }

    #[test]
    fn loudest_bar_always_normalises_to_one() {
        let spectrum: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin().abs()).collect();
        let result = aggregate(&spectrum, 8, linear);

        let max = result
            .bars
            .iter()
            .map(|bar| bar.value)
            .fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(result.bars.iter().all(|bar| (0.0..=1.0).contains(&bar.value)));
    }

    #[test]
    fn sub_floor_energy_still_picks_the_true_maximum() {
        let result = aggregate(&[0.0, 1e-10], 2, linear);

        assert_eq!(result.highest_bar, 1);
        assert!(result.bars[1].value > result.bars[0].value);
        // Normalisation still divides by the floor, not by zero.
        assert!(result.bars[1].value <= 1.0);
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        let result = aggregate(&[5.0, 5.0, 5.0, 5.0], 2, linear);
        assert_eq!(result.highest_bar, 0);
        assert_eq!(result.bars[0].value, 1.0);
        assert_eq!(result.bars[1].value, 1.0);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let spectrum = [0.2, 0.9, 0.4, 0.1, 0.7, 0.3];
        let first = aggregate(&spectrum, 3, linear);
        let second = aggregate(&spectrum, 3, linear);
        assert_eq!(first, second);
    }
}
