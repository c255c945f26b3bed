//! Morning/afternoon classification windows and the GHI-valid range,
//! derived per calendar day from that day's clear-sky curve.

use crate::errors::PipelineError;
use crate::timeseries::{date_label, day_start, floor_to_tick};

const NOON_SECONDS: i64 = 12 * 3600;
const AFTERNOON_TAIL_SECONDS: f64 = 10.0 * 3600.0;
const MORNING_FRACTION: f64 = 0.75;
const AFTERNOON_FRACTION: f64 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
}

/// Inclusive classification interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub tag: DayPeriod,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodLimits {
    pub morning: Period,
    pub afternoon: Period,
    /// First/last timestamp with positive clear-sky GHI.
    pub ghi_range: (i64, i64),
}

impl PeriodLimits {
    pub fn periods(&self) -> [Period; 2] {
        [self.morning, self.afternoon]
    }
}

/// Derive the day's windows from its clear-sky curve.
///
/// The morning window opens `floor_to_tick(0.75 × (noon_peak − first
/// light))` after midnight and closes at 12:00 sharp; the afternoon
/// window opens at 12:00:01 and closes `floor_to_tick(1.15 × (last light
/// − noon_peak + 10 h))` after midnight. Flooring to the 10-minute grid
/// never rounds up, which keeps residual shadow/transition samples out.
///
/// A curve with no positive sample is a diagnosable condition, not a
/// degenerate zero-width window.
pub fn calculate_period_limits(curve: &[(i64, f64)]) -> Result<PeriodLimits, PipelineError> {
    let first = curve
        .first()
        .ok_or_else(|| PipelineError::DegenerateClearSky {
            date: "<empty curve>".to_string(),
        })?;
    let day = day_start(first.0);

    let begin_irradiance = curve.iter().find(|&&(_, g)| g > 0.0).map(|&(t, _)| t);
    let end_irradiance = curve.iter().rev().find(|&&(_, g)| g > 0.0).map(|&(t, _)| t);
    let (begin_irradiance, end_irradiance) = match (begin_irradiance, end_irradiance) {
        (Some(b), Some(e)) => (b, e),
        _ => {
            return Err(PipelineError::DegenerateClearSky {
                date: date_label(day),
            })
        }
    };

    // First occurrence of the maximum, the solar-noon estimate.
    let max_irradiance = curve
        .iter()
        .fold((first.0, f64::MIN), |(best_ts, best), &(ts, g)| {
            if g > best {
                (ts, g)
            } else {
                (best_ts, best)
            }
        })
        .0;

    let morning_offset = floor_to_tick(MORNING_FRACTION * (max_irradiance - begin_irradiance) as f64);
    let afternoon_offset = floor_to_tick(
        AFTERNOON_FRACTION * ((end_irradiance - max_irradiance) as f64 + AFTERNOON_TAIL_SECONDS),
    );

    Ok(PeriodLimits {
        morning: Period {
            tag: DayPeriod::Morning,
            start: day + morning_offset,
            end: day + NOON_SECONDS,
        },
        afternoon: Period {
            tag: DayPeriod::Afternoon,
            start: day + NOON_SECONDS + 1,
            end: day + afternoon_offset,
        },
        ghi_range: (begin_irradiance, end_irradiance),
    })
}
