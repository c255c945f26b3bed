//! Loss table: daily clear-sky index and percentage generation loss per
//! stuck-tracker angle, gated on classification validity.

use polars::prelude::*;

use crate::classification::{PeriodClassification, Status};
use crate::errors::PipelineError;
use crate::theoretical::parse_stuck_angle;
use crate::timeseries::SensorBlock;

pub const DATE_COL: &str = "date";
pub const CSI_COL: &str = "csi";
pub const ANGLE_COL: &str = "angle_deg";
pub const LOSS_COL: &str = "loss_percent";

#[derive(Debug, Clone, PartialEq)]
pub struct LossRow {
    /// Midnight of the day, plant-local epoch seconds.
    pub date: i64,
    pub csi: f64,
    pub angle_deg: i32,
    pub loss_percent: f64,
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Daily clear-sky index: measured GHI irradiation over the
/// clearsky-positive sub-window against the full-day clear-sky
/// irradiation, rounded then clamped to 1. `None` (day excluded) unless
/// every GHI classification row of the day is Disponível.
pub fn day_csi(
    ghi_day: &SensorBlock,
    ghi_labels: &[Status],
    clearsky_day: &SensorBlock,
) -> Option<f64> {
    if ghi_labels.is_empty() || ghi_labels.iter().any(|s| *s != Status::Disponivel) {
        return None;
    }
    let (_, clearsky_values) = clearsky_day.columns.first()?;
    let (_, ghi_values) = ghi_day.columns.first()?;

    let theoretical: f64 = clearsky_values.iter().sum();
    if theoretical <= 0.0 {
        return None;
    }

    let positive: std::collections::BTreeSet<i64> = clearsky_day
        .timestamps
        .iter()
        .zip(clearsky_values)
        .filter(|(_, &v)| v > 0.0)
        .map(|(&ts, _)| ts)
        .collect();
    let measured: f64 = ghi_day
        .timestamps
        .iter()
        .zip(ghi_values)
        .filter(|(ts, _)| positive.contains(ts))
        .map(|(_, &v)| v)
        .sum();

    Some(round2(measured / theoretical).min(1.0))
}

/// One day's loss rows, or `None` when the day fails a precondition:
/// no valid CSI, a classification row without a single Disponível GTI
/// sensor, or no theoretical generation to attribute against.
pub fn day_loss(
    date: i64,
    csi: Option<f64>,
    gti_class_rows: &[PeriodClassification],
    theoretical_power: &[f64],
    stuck_power_day: &SensorBlock,
) -> Option<Vec<LossRow>> {
    let csi = csi?;

    let every_row_has_available = !gti_class_rows.is_empty()
        && gti_class_rows.iter().all(|row| {
            row.labels
                .iter()
                .any(|(_, status)| *status == Status::Disponivel)
        });
    if !every_row_has_available {
        return None;
    }

    let day_power: f64 = theoretical_power.iter().sum();
    if day_power <= 0.0 {
        return None;
    }

    let mut rows: Vec<LossRow> = stuck_power_day
        .columns
        .iter()
        .filter_map(|(name, values)| {
            let angle_deg = parse_stuck_angle(name)?;
            let stuck_sum: f64 = values.iter().sum();
            Some(LossRow {
                date,
                csi,
                angle_deg,
                loss_percent: round2((day_power - stuck_sum) / day_power * 100.0),
            })
        })
        .collect();
    rows.sort_by_key(|row| row.angle_deg);
    Some(rows)
}

/// Merge per-day rows (parallel completion order) into the sorted
/// artifact.
pub fn loss_table_frame(mut rows: Vec<LossRow>) -> Result<DataFrame, PipelineError> {
    rows.sort_by_key(|row| (row.date, row.angle_deg));
    let df = df![
        DATE_COL => rows.iter().map(|r| r.date).collect::<Vec<i64>>(),
        CSI_COL => rows.iter().map(|r| r.csi).collect::<Vec<f64>>(),
        ANGLE_COL => rows.iter().map(|r| r.angle_deg as i64).collect::<Vec<i64>>(),
        LOSS_COL => rows.iter().map(|r| r.loss_percent).collect::<Vec<f64>>(),
    ]?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::TICK_SECONDS;

    fn grid(day: i64, n: usize) -> Vec<i64> {
        (0..n).map(|i| day + i as i64 * TICK_SECONDS).collect()
    }

    fn single_column_block(day: i64, name: &str, values: Vec<f64>) -> SensorBlock {
        SensorBlock {
            timestamps: grid(day, values.len()),
            columns: vec![(name.to_string(), values)],
        }
    }

    fn class_row(day: i64, labels: &[(&str, Status)]) -> PeriodClassification {
        PeriodClassification {
            timestamp: day,
            labels: labels.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        }
    }

    #[test]
    fn test_csi_basic_ratio() {
        let day = 0;
        let clearsky = single_column_block(day, "clearsky_ghi", vec![0.0, 500.0, 500.0, 0.0]);
        let ghi = single_column_block(day, "GHI", vec![100.0, 400.0, 350.0, 0.0]);
        let csi = day_csi(&ghi, &[Status::Disponivel, Status::Disponivel], &clearsky);
        // Measured only over clearsky-positive samples: (400 + 350) / 1000.
        assert_eq!(csi, Some(0.75));
    }

    #[test]
    fn test_csi_clamped_to_one() {
        let day = 0;
        let clearsky = single_column_block(day, "clearsky_ghi", vec![0.0, 400.0, 400.0, 0.0]);
        let ghi = single_column_block(day, "GHI", vec![0.0, 600.0, 600.0, 0.0]);
        let csi = day_csi(&ghi, &[Status::Disponivel], &clearsky);
        assert_eq!(csi, Some(1.0));
    }

    #[test]
    fn test_csi_excluded_when_ghi_not_available() {
        let day = 0;
        let clearsky = single_column_block(day, "clearsky_ghi", vec![500.0; 4]);
        let ghi = single_column_block(day, "GHI", vec![400.0; 4]);
        assert_eq!(
            day_csi(&ghi, &[Status::Disponivel, Status::Indisponivel], &clearsky),
            None
        );
        assert_eq!(day_csi(&ghi, &[], &clearsky), None);
    }

    #[test]
    fn test_day_loss_percentages() {
        let day = 0;
        let stuck = SensorBlock {
            timestamps: grid(day, 4),
            columns: vec![
                ("stuck_power_-5".to_string(), vec![20.0; 4]),
                ("stuck_power_0".to_string(), vec![25.0; 4]),
            ],
        };
        let rows = day_loss(
            day,
            Some(0.9),
            &[class_row(day, &[("A", Status::Disponivel), ("B", Status::Stow)])],
            &[25.0; 4],
            &stuck,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].angle_deg, -5);
        assert_eq!(rows[0].loss_percent, 20.0);
        assert_eq!(rows[1].angle_deg, 0);
        assert_eq!(rows[1].loss_percent, 0.0);
        assert!(rows.iter().all(|r| r.csi == 0.9));
    }

    #[test]
    fn test_day_excluded_without_available_gti() {
        let day = 0;
        let stuck = single_column_block(day, "stuck_power_0", vec![10.0; 4]);
        let rows = day_loss(
            day,
            Some(0.9),
            &[
                class_row(day, &[("A", Status::Disponivel)]),
                class_row(day, &[("A", Status::Stow)]),
            ],
            &[25.0; 4],
            &stuck,
        );
        assert!(rows.is_none());

        // And excluded entirely without a CSI.
        assert!(day_loss(
            day,
            None,
            &[class_row(day, &[("A", Status::Disponivel)])],
            &[25.0; 4],
            &stuck,
        )
        .is_none());
    }

    #[test]
    fn test_table_sorted_and_bounded() {
        let rows = vec![
            LossRow { date: 86_400, csi: 0.8, angle_deg: 5, loss_percent: 1.0 },
            LossRow { date: 0, csi: 0.9, angle_deg: 5, loss_percent: 2.0 },
            LossRow { date: 0, csi: 0.9, angle_deg: -5, loss_percent: 3.0 },
        ];
        let df = loss_table_frame(rows).unwrap();
        assert_eq!(df.height(), 3);
        let dates: Vec<i64> = df.column(DATE_COL).unwrap().i64().unwrap().into_no_null_iter().collect();
        let angles: Vec<i64> = df.column(ANGLE_COL).unwrap().i64().unwrap().into_no_null_iter().collect();
        assert_eq!(dates, vec![0, 0, 86_400]);
        assert_eq!(angles, vec![-5, 5, 5]);
    }
}
