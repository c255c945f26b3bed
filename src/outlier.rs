//! Outlier rejection over one classification period's sensor columns.
//!
//! Three passes, in order: zero-signal / frozen-value rejection inside
//! the GHI-valid sub-window, weighted-time-deviation rejection over the
//! period, and cross-sensor reference-deviation rejection. The surviving
//! column subset may be empty.

use crate::config::{FilterParams, ReferenceRejection};
use crate::limits::Period;
use crate::timeseries::{minute_of_day, SensorBlock};

/// Value-weighted standard deviation of minute-of-day, the energy spread
/// of the curve around its weighted center. A healthy irradiance curve
/// concentrates energy near solar noon and scores low; a noisy or faulted
/// sensor spreads energy across the day and scores high.
pub fn weighted_time_std(timestamps: &[i64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let times: Vec<f64> = timestamps.iter().map(|&ts| minute_of_day(ts)).collect();
    let weighted_mean: f64 =
        times.iter().zip(weights).map(|(t, w)| t * w).sum::<f64>() / total;
    let weighted_variance: f64 = times
        .iter()
        .zip(weights)
        .map(|(t, w)| (t - weighted_mean).powi(2) * w)
        .sum::<f64>()
        / total;
    weighted_variance.sqrt()
}

/// True when `run_len` consecutive samples hold one identical value.
fn has_flat_run(values: &[f64], run_len: usize) -> bool {
    if run_len < 2 || values.len() < run_len {
        return false;
    }
    values
        .windows(run_len)
        .any(|w| w.iter().all(|&v| v == w[0]))
}

fn column_sums(columns: &[(String, Vec<f64>)]) -> Vec<f64> {
    columns
        .iter()
        .map(|(_, values)| values.iter().sum())
        .collect()
}

/// Pointwise cross-sensor mean.
fn mean_reference(columns: &[(String, Vec<f64>)], len: usize) -> Vec<f64> {
    if columns.is_empty() {
        return vec![0.0; len];
    }
    (0..len)
        .map(|i| columns.iter().map(|(_, v)| v[i]).sum::<f64>() / columns.len() as f64)
        .collect()
}

/// Pointwise cross-sensor median.
fn median_reference(columns: &[(String, Vec<f64>)], len: usize) -> Vec<f64> {
    if columns.is_empty() {
        return vec![0.0; len];
    }
    (0..len)
        .map(|i| {
            let mut row: Vec<f64> = columns.iter().map(|(_, v)| v[i]).collect();
            median_in_place(&mut row)
        })
        .collect()
}

pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Apply the rejection passes to one period of a day's sensor block.
/// Returns the period slice restricted to the surviving sensors.
pub fn filter_period(
    day_block: &SensorBlock,
    period: &Period,
    ghi_range: (i64, i64),
    params: &FilterParams,
) -> SensorBlock {
    let period_slice = day_block.slice(period.start, period.end);
    let window_slice = period_slice.slice(ghi_range.0, ghi_range.1);

    // Pass 1: no signal, or frozen at one value, inside the GHI window.
    let mut survivors: Vec<(String, Vec<f64>)> = Vec::new();
    for (name, values) in &period_slice.columns {
        let windowed = window_slice.column(name).unwrap_or(&[]);
        if windowed.iter().sum::<f64>() <= 0.0 {
            continue;
        }
        if has_flat_run(windowed, params.flat_run_len) {
            continue;
        }
        survivors.push((name.clone(), values.clone()));
    }

    // Pass 2: energy spread across the day.
    survivors.retain(|(_, values)| {
        weighted_time_std(&period_slice.timestamps, values) <= params.weighted_std_threshold
    });

    // Pass 3: systematic disagreement with the cross-sensor reference.
    let len = period_slice.timestamps.len();
    match params.reference {
        ReferenceRejection::MeanSumDeficit { threshold } => {
            let reference_sum: f64 = mean_reference(&survivors, len).iter().sum();
            let sums = column_sums(&survivors);
            let keep: Vec<bool> = sums
                .iter()
                .map(|&sum| sum - reference_sum >= -threshold)
                .collect();
            let mut index = 0;
            survivors.retain(|_| {
                let kept = keep[index];
                index += 1;
                kept
            });
        }
        ReferenceRejection::MedianMaxDistance { threshold } => {
            let reference = median_reference(&survivors, len);
            survivors.retain(|(_, values)| {
                values
                    .iter()
                    .zip(&reference)
                    .map(|(v, r)| (v - r).abs())
                    .fold(0.0_f64, f64::max)
                    <= threshold
            });
        }
    }

    SensorBlock {
        timestamps: period_slice.timestamps,
        columns: survivors,
    }
}
