//! Unavailability-loss stage: scales the plant's configured loss
//! equation, evaluated at the day's CSI and each profile row's mean
//! tracker angle, by the reported unavailability percentage.

use polars::prelude::*;

use crate::equation::Equation;
use crate::errors::PipelineError;
use crate::loss::{round2, CSI_COL, DATE_COL};

pub const MEAN_ANGLE_COL: &str = "mean_angle_deg";
pub const UNAVAILABILITY_COL: &str = "unavailability_percent";
pub const UNAVAILABILITY_LOSS_COL: &str = "unavailability_loss_percent";

#[derive(Debug, Clone, PartialEq)]
pub struct UnavailabilityRow {
    pub date: i64,
    pub csi: f64,
    pub mean_angle_deg: f64,
    pub unavailability_percent: f64,
    pub loss_percent: f64,
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, PipelineError> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|opt| opt.unwrap_or(0.0))
        .collect())
}

fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<i64>, PipelineError> {
    Ok(df
        .column(name)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .map(|opt| opt.unwrap_or(0))
        .collect())
}

/// Join the unavailability profile against the loss table's daily CSI
/// and evaluate the restricted equation per (date, mean angle) row.
/// Dates without a CSI in the loss table are skipped, mirroring the
/// loss table's own day-exclusion semantics.
pub fn unavailability_losses(
    profile: &DataFrame,
    loss_table: &DataFrame,
    equation: &Equation,
) -> Result<Vec<UnavailabilityRow>, PipelineError> {
    let profile_dates = i64_column(profile, DATE_COL)?;
    let mean_angles = f64_column(profile, MEAN_ANGLE_COL)?;
    let percentages = f64_column(profile, UNAVAILABILITY_COL)?;

    let table_dates = i64_column(loss_table, DATE_COL)?;
    let table_csi = f64_column(loss_table, CSI_COL)?;
    let csi_by_date: std::collections::BTreeMap<i64, f64> = table_dates
        .iter()
        .copied()
        .zip(table_csi.iter().copied())
        .collect();

    let mut rows: Vec<UnavailabilityRow> = profile_dates
        .iter()
        .zip(mean_angles.iter().zip(&percentages))
        .filter_map(|(&date, (&mean_angle_deg, &unavailability_percent))| {
            let csi = *csi_by_date.get(&date)?;
            let loss_percent =
                round2(equation.evaluate(csi, mean_angle_deg) * unavailability_percent / 100.0);
            Some(UnavailabilityRow {
                date,
                csi,
                mean_angle_deg,
                unavailability_percent,
                loss_percent,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.date, a.mean_angle_deg)
            .partial_cmp(&(b.date, b.mean_angle_deg))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

pub fn unavailability_frame(rows: &[UnavailabilityRow]) -> Result<DataFrame, PipelineError> {
    let df = df![
        DATE_COL => rows.iter().map(|r| r.date).collect::<Vec<i64>>(),
        CSI_COL => rows.iter().map(|r| r.csi).collect::<Vec<f64>>(),
        MEAN_ANGLE_COL => rows.iter().map(|r| r.mean_angle_deg).collect::<Vec<f64>>(),
        UNAVAILABILITY_COL => rows.iter().map(|r| r.unavailability_percent).collect::<Vec<f64>>(),
        UNAVAILABILITY_LOSS_COL => rows.iter().map(|r| r.loss_percent).collect::<Vec<f64>>(),
    ]?;
    Ok(df)
}
