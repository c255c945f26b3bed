//! Columnar artifact IO and the in-memory view the statistical passes
//! run on.
//!
//! Every warehouse artifact is a parquet file keyed by a `timestamp`
//! column of plant-local naive epoch seconds on a fixed (typically
//! 10-minute) grid. Numeric work happens on `SensorBlock`s: plain
//! `Vec<f64>` columns extracted once per day.

use chrono::DateTime;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::errors::PipelineError;

pub const TIMESTAMP_COL: &str = "timestamp";
pub const TICK_SECONDS: i64 = 600;
pub const DAY_SECONDS: i64 = 86_400;

/// Midnight of the day containing `ts`.
pub fn day_start(ts: i64) -> i64 {
    ts - ts.rem_euclid(DAY_SECONDS)
}

pub fn minute_of_day(ts: i64) -> f64 {
    (ts.rem_euclid(DAY_SECONDS) / 60) as f64
}

/// `YYYY-MM-DD` label for logs and error messages.
pub fn date_label(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => format!("ts={ts}"),
    }
}

/// Floor a duration in seconds to the 10-minute grid.
pub fn floor_to_tick(seconds: f64) -> i64 {
    (seconds / TICK_SECONDS as f64).floor() as i64 * TICK_SECONDS
}

/// One day's (or period's) multi-sensor samples, timestamp-aligned.
#[derive(Debug, Clone, Default)]
pub struct SensorBlock {
    pub timestamps: Vec<i64>,
    pub columns: Vec<(String, Vec<f64>)>,
}

impl SensorBlock {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.timestamps.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Rows with `begin <= timestamp <= end` (pandas `.loc` bounds).
    pub fn slice(&self, begin: i64, end: i64) -> SensorBlock {
        let keep: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, &ts)| ts >= begin && ts <= end)
            .map(|(i, _)| i)
            .collect();
        SensorBlock {
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    (name.clone(), keep.iter().map(|&i| values[i]).collect())
                })
                .collect(),
        }
    }

}

/// Read an artifact that the current stage cannot proceed without.
pub fn read_frame(path: &Path, role: &str) -> Result<DataFrame, PipelineError> {
    match read_frame_optional(path)? {
        Some(df) => Ok(df),
        None => Err(PipelineError::MissingArtifact {
            role: role.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

/// Read an artifact that may legitimately be absent (e.g. an AC-power
/// channel that was never exported). Returns `None` when the file does
/// not exist.
pub fn read_frame_optional(path: &Path) -> Result<Option<DataFrame>, PipelineError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file).finish()?;
    Ok(Some(sort_by_timestamp(df)?))
}

pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

fn sort_by_timestamp(df: DataFrame) -> Result<DataFrame, PipelineError> {
    if df.get_column_names().iter().any(|n| *n == TIMESTAMP_COL) {
        Ok(df.sort([TIMESTAMP_COL], SortMultipleOptions::default())?)
    } else {
        Ok(df)
    }
}

/// Coerce every non-timestamp column to f64 and zero-fill whatever does
/// not parse, mirroring the warehouse loader's `to_numeric` + `fillna(0)`
/// contract.
pub fn coerce_numeric(df: &DataFrame) -> Result<DataFrame, PipelineError> {
    let mut columns = Vec::with_capacity(df.width());
    for series in df.get_columns() {
        if series.name() == TIMESTAMP_COL {
            columns.push(series.cast(&DataType::Int64)?);
        } else {
            let values: Vec<f64> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|opt| opt.unwrap_or(0.0))
                .collect();
            columns.push(Series::new(series.name(), values));
        }
    }
    Ok(DataFrame::new(columns)?)
}

pub fn timestamps(df: &DataFrame) -> Result<Vec<i64>, PipelineError> {
    Ok(df
        .column(TIMESTAMP_COL)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .flatten()
        .collect())
}

/// Midnights of every calendar day spanned by the frame, oldest first.
pub fn day_range(df: &DataFrame) -> Result<Vec<i64>, PipelineError> {
    let ts = timestamps(df)?;
    let (first, last) = match (ts.first(), ts.last()) {
        (Some(&first), Some(&last)) => (day_start(first), day_start(last)),
        _ => return Ok(Vec::new()),
    };
    Ok((0..).map(|i| first + i * DAY_SECONDS).take_while(|&d| d <= last).collect())
}

/// Rows with `begin <= timestamp < end`.
pub fn slice_frame(df: &DataFrame, begin: i64, end: i64) -> Result<DataFrame, PipelineError> {
    let out = df
        .clone()
        .lazy()
        .filter(
            col(TIMESTAMP_COL)
                .gt_eq(lit(begin))
                .and(col(TIMESTAMP_COL).lt(lit(end))),
        )
        .collect()?;
    Ok(out)
}

pub fn day_slice(df: &DataFrame, day: i64) -> Result<DataFrame, PipelineError> {
    slice_frame(df, day, day + DAY_SECONDS)
}

pub fn frame_to_block(df: &DataFrame) -> Result<SensorBlock, PipelineError> {
    let ts = timestamps(df)?;
    let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
    for series in df.get_columns() {
        if series.name() == TIMESTAMP_COL {
            continue;
        }
        let values: Vec<f64> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|opt| opt.unwrap_or(0.0))
            .collect();
        columns.push((series.name().to_string(), values));
    }
    Ok(SensorBlock {
        timestamps: ts,
        columns,
    })
}

pub fn block_to_frame(block: &SensorBlock) -> Result<DataFrame, PipelineError> {
    let mut columns = vec![Series::new(TIMESTAMP_COL, block.timestamps.clone())];
    for (name, values) in &block.columns {
        columns.push(Series::new(name, values.clone()));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(day: i64, n: usize) -> Vec<i64> {
        (0..n).map(|i| day + i as i64 * TICK_SECONDS).collect()
    }

    #[test]
    fn test_day_start_and_minute_of_day() {
        let day = 1_700_000_000 - 1_700_000_000 % DAY_SECONDS;
        assert_eq!(day_start(day + 3 * 3600), day);
        assert_eq!(minute_of_day(day + 12 * 3600), 720.0);
    }

    #[test]
    fn test_floor_to_tick_never_rounds_up() {
        assert_eq!(floor_to_tick(599.0), 0);
        assert_eq!(floor_to_tick(600.0), 600);
        assert_eq!(floor_to_tick(1199.9), 600);
    }

    #[test]
    fn test_block_slice_is_inclusive() {
        let ts = grid(0, 6);
        let block = SensorBlock {
            timestamps: ts.clone(),
            columns: vec![("A".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])],
        };
        let sliced = block.slice(ts[1], ts[3]);
        assert_eq!(sliced.timestamps, &ts[1..=3]);
        assert_eq!(sliced.column("A").unwrap(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_coerce_numeric_zero_fills() {
        let df = df![
            TIMESTAMP_COL => &[0i64, 600, 1200],
            "A" => &[Some(1.5), None, Some(2.5)],
        ]
        .unwrap();
        let coerced = coerce_numeric(&df).unwrap();
        let block = frame_to_block(&coerced).unwrap();
        assert_eq!(block.column("A").unwrap(), &[1.5, 0.0, 2.5]);
    }

    #[test]
    fn test_day_range_covers_span() {
        let df = df![
            TIMESTAMP_COL => &[100i64, DAY_SECONDS + 100, 2 * DAY_SECONDS + 100],
            "A" => &[1.0, 2.0, 3.0],
        ]
        .unwrap();
        let days = day_range(&df).unwrap();
        assert_eq!(days, vec![0, DAY_SECONDS, 2 * DAY_SECONDS]);
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.parquet");
        let mut df = df![
            TIMESTAMP_COL => grid(0, 4),
            "Pyranometer A" => &[0.0, 10.0, 20.0, 30.0],
        ]
        .unwrap();
        write_frame(&mut df, &path).unwrap();
        let back = read_frame(&path, "gti").unwrap();
        assert_eq!(back.shape(), (4, 2));
    }

    #[test]
    fn test_missing_artifact_taxonomy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.parquet");
        assert!(read_frame_optional(&path).unwrap().is_none());
        match read_frame(&path, "ca_power") {
            Err(PipelineError::MissingArtifact { role, .. }) => assert_eq!(role, "ca_power"),
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
    }
}
