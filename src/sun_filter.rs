//! Sun filter: force every sample outside the day's irradiance window to
//! zero, keeping the index intact for downstream alignment. Optional
//! centered moving-average smoothing for the `avg` artifact variants.

use crate::limits::PeriodLimits;
use crate::timeseries::SensorBlock;

/// Smoothing window of the `avg` variants, samples.
pub const SMOOTHING_WINDOW: usize = 11;

/// Zero everything outside `[morning.start, afternoon.end]`.
pub fn sun_filter_day(block: &SensorBlock, limits: &PeriodLimits) -> SensorBlock {
    let begin = limits.morning.start;
    let end = limits.afternoon.end;
    SensorBlock {
        timestamps: block.timestamps.clone(),
        columns: block
            .columns
            .iter()
            .map(|(name, values)| {
                let filtered = block
                    .timestamps
                    .iter()
                    .zip(values)
                    .map(|(&ts, &v)| if ts >= begin && ts <= end { v } else { 0.0 })
                    .collect();
                (name.clone(), filtered)
            })
            .collect(),
    }
}

/// Centered moving average; windows that fall off either edge yield 0,
/// matching a trailing rolling mean shifted back by half a window with
/// zero-filled gaps.
pub fn smooth_centered(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    let half = (window - 1) / 2;
    (0..values.len())
        .map(|i| {
            if i >= half && i + half < values.len() {
                let slice = &values[i - half..=i + half];
                slice.iter().sum::<f64>() / slice.len() as f64
            } else {
                0.0
            }
        })
        .collect()
}

pub fn smooth_block(block: &SensorBlock, window: usize) -> SensorBlock {
    SensorBlock {
        timestamps: block.timestamps.clone(),
        columns: block
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), smooth_centered(values, window)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{DayPeriod, Period, PeriodLimits};
    use crate::timeseries::TICK_SECONDS;

    fn limits(day: i64) -> PeriodLimits {
        PeriodLimits {
            morning: Period {
                tag: DayPeriod::Morning,
                start: day + 6 * 3600,
                end: day + 12 * 3600,
            },
            afternoon: Period {
                tag: DayPeriod::Afternoon,
                start: day + 12 * 3600 + 1,
                end: day + 18 * 3600,
            },
            ghi_range: (day + 6 * 3600, day + 18 * 3600),
        }
    }

    fn block(day: i64) -> SensorBlock {
        let timestamps: Vec<i64> = (0..144).map(|i| day + i * TICK_SECONDS).collect();
        let values = vec![5.0; 144];
        SensorBlock {
            timestamps,
            columns: vec![("Pyranometer A".to_string(), values)],
        }
    }

    #[test]
    fn test_zeroes_outside_window_preserves_index() {
        let day = 0;
        let filtered = sun_filter_day(&block(day), &limits(day));
        assert_eq!(filtered.len(), 144);
        let values = filtered.column("Pyranometer A").unwrap();
        // 05:50 outside, 06:00 inside, 18:00 inside, 18:10 outside.
        assert_eq!(values[35], 0.0);
        assert_eq!(values[36], 5.0);
        assert_eq!(values[108], 5.0);
        assert_eq!(values[109], 0.0);
    }

    #[test]
    fn test_idempotent() {
        let day = 0;
        let once = sun_filter_day(&block(day), &limits(day));
        let twice = sun_filter_day(&once, &limits(day));
        assert_eq!(
            once.column("Pyranometer A").unwrap(),
            twice.column("Pyranometer A").unwrap()
        );
    }

    #[test]
    fn test_smooth_constant_interior() {
        let values = vec![3.0; 20];
        let smoothed = smooth_centered(&values, SMOOTHING_WINDOW);
        // Edges lack a full window.
        assert_eq!(smoothed[0], 0.0);
        assert_eq!(smoothed[4], 0.0);
        assert_eq!(smoothed[5], 3.0);
        assert_eq!(smoothed[14], 3.0);
        assert_eq!(smoothed[15], 0.0);
        assert_eq!(smoothed[19], 0.0);
    }

    #[test]
    fn test_smooth_ramp_keeps_midpoint() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let smoothed = smooth_centered(&values, SMOOTHING_WINDOW);
        assert!((smoothed[15] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_of_one_is_identity() {
        let values = vec![1.0, 2.0, 3.0];
        assert_eq!(smooth_centered(&values, 1), values);
    }
}
