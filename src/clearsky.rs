//! Clear-sky oracle: expected cloudless-sky GHI for a plant location and
//! date, on the warehouse's 10-minute grid.
//!
//! The pipeline only depends on the `ClearSkyOracle` trait; the default
//! implementation combines the NOAA solar-position equations with a
//! Kasten-Young atmospheric attenuation.

use chrono::{DateTime, Datelike, Timelike};
use polars::prelude::*;

use crate::config::Location;
use crate::errors::PipelineError;
use crate::timeseries::{self, TICK_SECONDS, TIMESTAMP_COL};

pub const CLEARSKY_COL: &str = "clearsky_ghi";

const SOLAR_CONSTANT_W_M2: f64 = 1367.0;
/// Atmospheric pressure scale height, metres.
const SCALE_HEIGHT_M: f64 = 8435.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    pub elevation_deg: f64,
    pub zenith_deg: f64,
    /// Clockwise from north.
    pub azimuth_deg: f64,
}

impl SolarPosition {
    pub fn is_above_horizon(&self) -> bool {
        self.elevation_deg > 0.0
    }
}

/// NOAA solar-position equations for one plant location.
#[derive(Debug, Clone)]
pub struct SolarGeometry {
    latitude_deg: f64,
    longitude_deg: f64,
    utc_offset_hours: f64,
}

impl SolarGeometry {
    pub fn from_location(location: &Location) -> Self {
        Self {
            latitude_deg: location.latitude,
            longitude_deg: location.longitude,
            utc_offset_hours: location.utc_offset_hours,
        }
    }

    /// Sun position for a plant-local naive epoch timestamp.
    pub fn position(&self, ts: i64) -> Result<SolarPosition, PipelineError> {
        let local = DateTime::from_timestamp(ts, 0)
            .ok_or(PipelineError::InvalidTimestamp(ts))?
            .naive_utc();

        let year = local.year();
        let is_leap_year = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
        let days_in_year = if is_leap_year { 366.0 } else { 365.0 };
        let day_of_year = local.ordinal() as f64;
        let hour = local.hour() as f64
            + local.minute() as f64 / 60.0
            + local.second() as f64 / 3600.0;

        // Fractional year, radians.
        let gamma =
            2.0 * std::f64::consts::PI * (day_of_year - 1.0 + (hour - 12.0) / 24.0) / days_in_year;

        // Equation of time, minutes.
        let eqtime = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());

        // Solar declination, radians.
        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        let time_offset = eqtime + 4.0 * self.longitude_deg - 60.0 * self.utc_offset_hours;
        let true_solar_minutes = hour * 60.0 + time_offset;
        let hour_angle_rad = (true_solar_minutes / 4.0 - 180.0).to_radians();

        let lat_rad = self.latitude_deg.to_radians();
        let cos_zenith =
            lat_rad.sin() * decl.sin() + lat_rad.cos() * decl.cos() * hour_angle_rad.cos();
        let zenith_deg = cos_zenith.clamp(-1.0, 1.0).acos().to_degrees();

        let zenith_rad = zenith_deg.to_radians();
        let sin_az = -decl.cos() * lat_rad.sin() * hour_angle_rad.sin();
        let cos_az = -lat_rad.sin() * zenith_rad.cos() - decl.sin() * lat_rad.cos() * zenith_rad.sin();
        let mut azimuth_deg = (sin_az.atan2(cos_az).to_degrees() + 180.0) % 360.0;
        if azimuth_deg < 0.0 {
            azimuth_deg += 360.0;
        }

        Ok(SolarPosition {
            elevation_deg: 90.0 - zenith_deg,
            zenith_deg,
            azimuth_deg,
        })
    }
}

/// External collaborator boundary: given a plant-local midnight, produce
/// that day's expected clear-sky GHI curve on the 10-minute grid.
pub trait ClearSkyOracle: Sync {
    fn ghi_curve(&self, day: i64) -> Result<Vec<(i64, f64)>, PipelineError>;
}

/// Default oracle: NOAA position + Kasten-Young clear-sky attenuation.
#[derive(Debug, Clone)]
pub struct NoaaClearSky {
    geometry: SolarGeometry,
    altitude_m: f64,
}

impl NoaaClearSky {
    pub fn new(location: &Location) -> Self {
        Self {
            geometry: SolarGeometry::from_location(location),
            altitude_m: location.altitude,
        }
    }

    fn irradiance(&self, ts: i64) -> Result<f64, PipelineError> {
        let position = self.geometry.position(ts)?;
        if !position.is_above_horizon() {
            return Ok(0.0);
        }
        let elevation_rad = position.elevation_deg.to_radians();

        // Relative air mass; near the horizon the secant diverges, so
        // taper linearly below 5 degrees.
        let air_mass = if position.elevation_deg > 5.0 {
            1.0 / elevation_rad.sin()
        } else {
            12.0 - position.elevation_deg / 5.0
        };
        // Pressure-corrected for site altitude.
        let air_mass = air_mass * (-self.altitude_m / SCALE_HEIGHT_M).exp();

        let transmittance = 0.7_f64.powf(air_mass.powf(0.678));
        Ok(SOLAR_CONSTANT_W_M2 * transmittance * elevation_rad.sin())
    }
}

impl ClearSkyOracle for NoaaClearSky {
    fn ghi_curve(&self, day: i64) -> Result<Vec<(i64, f64)>, PipelineError> {
        let samples = (timeseries::DAY_SECONDS / TICK_SECONDS) as usize;
        let mut curve = Vec::with_capacity(samples);
        for i in 0..samples {
            let ts = day + i as i64 * TICK_SECONDS;
            curve.push((ts, self.irradiance(ts)?));
        }
        Ok(curve)
    }
}

/// One day's oracle output as a warehouse frame.
pub fn clearsky_day_frame(
    oracle: &dyn ClearSkyOracle,
    day: i64,
) -> Result<DataFrame, PipelineError> {
    let curve = oracle.ghi_curve(day)?;
    let ts: Vec<i64> = curve.iter().map(|&(t, _)| t).collect();
    let ghi: Vec<f64> = curve.iter().map(|&(_, g)| g).collect();
    let df = df![
        TIMESTAMP_COL => ts,
        CLEARSKY_COL => ghi,
    ]?;
    Ok(df)
}
