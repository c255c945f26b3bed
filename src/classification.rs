//! Period classifier: labels each irradiance sensor per (day, period) as
//! available, stowed, or unusable.
//!
//! Two regimes: with a trustworthy GHI reference the decision compares
//! each sensor's distance to the GHI curve against its distance to the
//! cross-sensor max/mean curves; without one it falls back to a
//! period-mean ratio test.

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;

use crate::config::FilterParams;
use crate::errors::PipelineError;
use crate::limits::PeriodLimits;
use crate::outlier::filter_period;
use crate::timeseries::{date_label, SensorBlock, TIMESTAMP_COL};

/// Ratio-to-best-sensor floor of the no-reference regime.
const AVAILABILITY_RATIO: f64 = 0.8;
/// Fraction of the GHI period sum below which a GTI sensor counts as
/// "GHI-like" and is excluded from the reference curves.
const NEAR_GHI_FRACTION: f64 = 0.25;
/// Single-sensor escape hatch: a sole survivor this close to GHI is
/// treated as stowed rather than trusted.
const SUSPICIOUS_FRACTION: f64 = 0.025;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disponivel,
    Stow,
    Indisponivel,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Disponivel => "Disponível",
            Status::Stow => "Stow",
            Status::Indisponivel => "Indisponível",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disponível" => Ok(Status::Disponivel),
            "Stow" => Ok(Status::Stow),
            "Indisponível" => Ok(Status::Indisponivel),
            other => Err(format!("unknown classification label '{other}'")),
        }
    }
}

/// One period's labels, indexed at the first in-period sample.
#[derive(Debug, Clone)]
pub struct PeriodClassification {
    pub timestamp: i64,
    pub labels: Vec<(String, Status)>,
}

/// Regime A: no valid GHI reference. Compare each sensor's period mean
/// against the best sensor's.
pub fn classify_without_reference(gti: &SensorBlock) -> Vec<(String, Status)> {
    let means: Vec<f64> = gti
        .columns
        .iter()
        .map(|(_, values)| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        })
        .collect();
    let max_mean = means.iter().copied().fold(f64::MIN, f64::max);

    gti.columns
        .iter()
        .zip(&means)
        .map(|((name, _), &mean)| {
            let status = if max_mean > 0.0 && mean / max_mean > AVAILABILITY_RATIO {
                Status::Disponivel
            } else {
                Status::Stow
            };
            (name.clone(), status)
        })
        .collect()
}

/// Regime B: a valid GHI reference exists.
pub fn classify_with_reference(gti: &SensorBlock, ghi: &[f64]) -> Vec<(String, Status)> {
    let len = ghi.len();
    let ghi_sum: f64 = ghi.iter().sum();
    let near_threshold = NEAR_GHI_FRACTION * ghi_sum;

    // Sensors hugging the GHI curve are not genuinely tilted trackers;
    // keep them out of the reference curves.
    let tracking: Vec<&(String, Vec<f64>)> = gti
        .columns
        .iter()
        .filter(|(_, values)| {
            let distance: f64 = values.iter().zip(ghi).map(|(v, g)| (v - g).abs()).sum();
            distance >= near_threshold
        })
        .collect();

    let max_curve: Vec<f64> = (0..len)
        .map(|i| {
            gti.columns
                .iter()
                .map(|(_, v)| v[i])
                .fold(f64::MIN, f64::max)
        })
        .collect();
    let mean_source: Vec<&(String, Vec<f64>)> = if tracking.is_empty() {
        gti.columns.iter().collect()
    } else {
        tracking
    };
    let mean_curve: Vec<f64> = (0..len)
        .map(|i| {
            mean_source.iter().map(|(_, v)| v[i]).sum::<f64>() / mean_source.len() as f64
        })
        .collect();
    let mean_sum: f64 = mean_curve.iter().sum();

    gti.columns
        .iter()
        .map(|(name, values)| {
            let err_ghi: f64 = values.iter().zip(ghi).map(|(v, g)| (v - g).powi(2)).sum();
            let err_max: f64 = values
                .iter()
                .zip(&max_curve)
                .map(|(v, m)| (v - m).powi(2))
                .sum();
            let err_mean: f64 = values
                .iter()
                .zip(&mean_curve)
                .map(|(v, m)| (v - m).powi(2))
                .sum();

            let diff_ghi: f64 = values.iter().zip(ghi).map(|(v, g)| (v - g).abs()).sum();
            let diff_mean: f64 = values
                .iter()
                .zip(&mean_curve)
                .map(|(v, m)| (v - m).abs())
                .sum();

            // Closer to the plant's tracking consensus than to the flat
            // GHI curve?
            let tracks_consensus = (err_ghi - err_mean).powi(2) < (err_max - err_mean).powi(2)
                || err_ghi > err_max;
            // Sole-survivor escape hatch: indistinguishable from GHI.
            let suspiciously_flat = diff_ghi < SUSPICIOUS_FRACTION * ghi_sum
                && diff_mean < SUSPICIOUS_FRACTION * mean_sum;

            let status = if tracks_consensus && !suspiciously_flat {
                Status::Disponivel
            } else {
                Status::Stow
            };
            (name.clone(), status)
        })
        .collect()
}

/// Classify both periods of one day. `gti_day`/`ghi_day` are that day's
/// sun-filtered blocks on a shared grid.
pub fn classify_day(
    gti_day: &SensorBlock,
    ghi_day: &SensorBlock,
    limits: &PeriodLimits,
    params: &FilterParams,
) -> Result<Vec<PeriodClassification>, PipelineError> {
    let mut rows = Vec::with_capacity(2);
    for period in limits.periods() {
        let gti_filtered = filter_period(gti_day, &period, limits.ghi_range, params);
        let ghi_filtered = filter_period(ghi_day, &period, limits.ghi_range, params);

        if !gti_filtered.timestamps.is_empty()
            && !ghi_filtered.timestamps.is_empty()
            && gti_filtered.timestamps != ghi_filtered.timestamps
        {
            return Err(PipelineError::GridMismatch {
                left: "gti".to_string(),
                right: "ghi".to_string(),
                date: date_label(period.start),
            });
        }

        let timestamp = gti_filtered
            .timestamps
            .first()
            .copied()
            .unwrap_or(period.start);

        let mut labels = if ghi_filtered.is_empty() {
            let mut labels = classify_without_reference(&gti_filtered);
            for (name, _) in &ghi_day.columns {
                labels.push((name.clone(), Status::Indisponivel));
            }
            labels
        } else {
            let ghi_reference = &ghi_filtered.columns[0].1;
            let mut labels = classify_with_reference(&gti_filtered, ghi_reference);
            for (name, _) in &ghi_day.columns {
                labels.push((name.clone(), Status::Disponivel));
            }
            labels
        };
        labels.sort_by(|a, b| a.0.cmp(&b.0));
        rows.push(PeriodClassification { timestamp, labels });
    }
    Ok(rows)
}

/// Merge period rows into the classification artifact. Sensors a row
/// never labelled (dropped by filtering, or absent that day) are
/// backstopped to Indisponível, so labels are total.
pub fn classification_frame(
    mut rows: Vec<PeriodClassification>,
    sensor_columns: &[String],
) -> Result<DataFrame, PipelineError> {
    rows.sort_by_key(|row| row.timestamp);

    let timestamps: Vec<i64> = rows.iter().map(|row| row.timestamp).collect();
    let mut columns = vec![Series::new(TIMESTAMP_COL, timestamps)];
    for sensor in sensor_columns {
        let labels: Vec<&str> = rows
            .iter()
            .map(|row| {
                row.labels
                    .iter()
                    .find(|(name, _)| name == sensor)
                    .map(|(_, status)| status.as_str())
                    .unwrap_or(Status::Indisponivel.as_str())
            })
            .collect();
        columns.push(Series::new(sensor, labels));
    }
    Ok(DataFrame::new(columns)?)
}

/// Read a classification frame back into (timestamp, labels) rows.
pub fn frame_to_rows(df: &DataFrame) -> Result<Vec<PeriodClassification>, PipelineError> {
    let timestamps: Vec<i64> = df
        .column(TIMESTAMP_COL)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .flatten()
        .collect();

    let mut rows: Vec<PeriodClassification> = timestamps
        .iter()
        .map(|&timestamp| PeriodClassification {
            timestamp,
            labels: Vec::new(),
        })
        .collect();

    for series in df.get_columns() {
        if series.name() == TIMESTAMP_COL {
            continue;
        }
        let labels = series.str()?;
        for (i, label) in labels.into_iter().enumerate() {
            let status = label
                .unwrap_or(Status::Indisponivel.as_str())
                .parse::<Status>()
                .unwrap_or(Status::Indisponivel);
            rows[i].labels.push((series.name().to_string(), status));
        }
    }
    Ok(rows)
}
