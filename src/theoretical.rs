//! Theoretical reference signals: the consensus irradiance curve of the
//! sensors classified available, and the simulated AC power family for
//! nominal and stuck-tracker conditions.

use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::classification::{PeriodClassification, Status};
use crate::errors::PipelineError;
use crate::outlier::median_in_place;
use crate::power::{Conditions, FaultTracker, IrradianceSource, PowerModel};
use crate::timeseries::{self, SensorBlock, TIMESTAMP_COL};

pub const THEORETICAL_GTI_COL: &str = "Theoretical GTI";
pub const THEORETICAL_POWER_COL: &str = "Theoretical power";

pub fn stuck_power_column(angle: i32) -> String {
    format!("stuck_power_{angle}")
}

pub fn parse_stuck_angle(name: &str) -> Option<i32> {
    name.strip_prefix("stuck_power_")?.parse().ok()
}

/// One day's theoretical irradiance: per classification window, the
/// median across sensors labelled Disponível for the whole window; zero
/// when none qualify.
pub fn theoretical_irradiance_day(
    gti_day: &SensorBlock,
    class_rows: &[PeriodClassification],
) -> Vec<(i64, f64)> {
    let (first_ts, last_ts) = match (gti_day.timestamps.first(), gti_day.timestamps.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Vec::new(),
    };

    // Split the day at the afternoon classification row; with fewer than
    // two rows the whole day is one (possibly unavailable) window.
    let windows: Vec<(i64, i64)> = if class_rows.len() >= 2 {
        let split = class_rows[1].timestamp;
        vec![(first_ts, split - 1), (split, last_ts)]
    } else {
        vec![(first_ts, last_ts)]
    };

    let mut curve = Vec::with_capacity(gti_day.timestamps.len());
    for (begin, end) in windows {
        let rows_in_window: Vec<&PeriodClassification> = class_rows
            .iter()
            .filter(|row| row.timestamp >= begin && row.timestamp <= end)
            .collect();

        let qualifying: Vec<&str> = gti_day
            .column_names()
            .into_iter()
            .filter(|sensor| {
                !rows_in_window.is_empty()
                    && rows_in_window.iter().all(|row| {
                        row.labels
                            .iter()
                            .any(|(name, status)| name == sensor && *status == Status::Disponivel)
                    })
            })
            .collect();

        for (i, &ts) in gti_day.timestamps.iter().enumerate() {
            if ts < begin || ts > end {
                continue;
            }
            let value = if qualifying.is_empty() {
                0.0
            } else {
                let mut row: Vec<f64> = qualifying
                    .iter()
                    .filter_map(|sensor| gti_day.column(sensor).map(|v| v[i]))
                    .collect();
                median_in_place(&mut row)
            };
            curve.push((ts, value));
        }
    }
    curve
}

/// Assemble a simulation input from warehouse frames, aligned on the
/// irradiance grid. Missing weather samples fall back to zero, the
/// warehouse's null sentinel.
pub fn build_conditions(
    irradiance: &DataFrame,
    irradiance_col: &str,
    wind_speed: Option<&DataFrame>,
    air_temp: Option<&DataFrame>,
) -> Result<Conditions, PipelineError> {
    let timestamps = timeseries::timestamps(irradiance)?;
    let irradiance_values: Vec<f64> = irradiance
        .column(irradiance_col)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|opt| opt.unwrap_or(0.0))
        .collect();

    let lookup = |df: Option<&DataFrame>| -> Result<Vec<f64>, PipelineError> {
        let Some(df) = df else {
            return Ok(vec![0.0; timestamps.len()]);
        };
        let block = timeseries::frame_to_block(df)?;
        let Some((_, values)) = block.columns.first() else {
            return Ok(vec![0.0; timestamps.len()]);
        };
        let by_ts: std::collections::BTreeMap<i64, f64> = block
            .timestamps
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect();
        Ok(timestamps
            .iter()
            .map(|ts| by_ts.get(ts).copied().unwrap_or(0.0))
            .collect())
    };

    Ok(Conditions {
        irradiance: irradiance_values,
        wind_speed: lookup(wind_speed)?,
        air_temp: lookup(air_temp)?,
        timestamps,
    })
}

/// Simulate the stuck-tracker power family, one column per angle,
/// skipping angles already present in the artifact and persisting after
/// every simulated angle so an interrupted sweep resumes where it left
/// off.
pub fn sweep_stuck_angles(
    model: &dyn PowerModel,
    conditions: &Conditions,
    angles: &[i32],
    n_strings: u32,
    existing: Option<DataFrame>,
    path: &Path,
) -> Result<DataFrame, PipelineError> {
    let mut artifact = match existing {
        Some(df) => {
            let existing_ts = timeseries::timestamps(&df)?;
            if existing_ts != conditions.timestamps {
                return Err(PipelineError::GridMismatch {
                    left: "stopped_trackers_power".to_string(),
                    right: "conditions".to_string(),
                    date: timeseries::date_label(
                        conditions.timestamps.first().copied().unwrap_or(0),
                    ),
                });
            }
            df
        }
        None => DataFrame::new(vec![Series::new(
            TIMESTAMP_COL,
            conditions.timestamps.clone(),
        )])?,
    };

    for &angle in angles {
        let column = stuck_power_column(angle);
        if artifact.get_column_names().iter().any(|n| *n == column) {
            debug!(angle, "stuck-tracker power already computed, skipping");
            continue;
        }
        info!(angle, "simulating stuck-tracker power");
        let pac = model.simulate(
            conditions,
            IrradianceSource::Ghi,
            Some(FaultTracker {
                n_strings,
                angle_deg: angle as f64,
            }),
        )?;
        artifact.with_column(Series::new(&column, pac))?;
        timeseries::write_frame(&mut artifact, path)?;
    }
    Ok(artifact)
}
